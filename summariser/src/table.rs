use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::model::SuiteSummary;

/// Length of the fingerprint prefix shown in the table.
const FINGERPRINT_PREFIX: usize = 12;

#[derive(Tabled)]
struct SummaryRow {
    suite: String,
    fingerprint: String,
    status: String,
    scenario: String,
    attempts: u64,
    #[tabled(display = "percent")]
    failure_rate: Option<f64>,
    #[tabled(display = "millis")]
    p95_ms: Option<f64>,
}

fn percent(rate: &Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{:.2}%", rate * 100.0),
        None => "-".to_string(),
    }
}

fn millis(ms: &Option<f64>) -> String {
    match ms {
        Some(ms) => format!("{ms:.2}"),
        None => "-".to_string(),
    }
}

/// Render one row per scenario of each suite.
pub fn summary_table(summaries: &[SuiteSummary]) -> String {
    let rows = summaries.iter().flat_map(|summary| {
        let status = match (summary.passed, summary.status) {
            (_, gale_summary_model::RunStatus::Cancelled) => "cancelled",
            (true, _) => "passed",
            (false, _) => "failed",
        };
        let fingerprint = summary
            .fingerprint
            .chars()
            .take(FINGERPRINT_PREFIX)
            .collect::<String>();

        summary
            .scenarios
            .iter()
            .map(move |(name, scenario)| SummaryRow {
                suite: summary.suite_name.clone(),
                fingerprint: fingerprint.clone(),
                status: status.to_string(),
                scenario: name.clone(),
                attempts: scenario.attempts,
                failure_rate: scenario.failure_rate,
                p95_ms: scenario.p95_ms,
            })
    });

    Table::new(rows).with(Style::modern()).to_string()
}
