mod operations_table;

use crate::outcome::RequestOutcome;
use crate::report::summary_report::operations_table::OperationRow;
use crate::report::ReportCollector;
use std::collections::BTreeMap;
use tabled::settings::Style;
use tabled::Table;

#[derive(Debug, Default)]
struct RequestTally {
    total: u64,
    failed: u64,
    total_ms: f64,
    min_ms: f64,
    max_ms: f64,
}

/// Prints a table of request timings per scenario and request name at the end of the run.
///
/// Only running totals are kept, so memory grows with the number of distinct requests and not
/// with the number of outcomes.
#[derive(Debug, Default)]
pub struct SummaryReportCollector {
    tallies: BTreeMap<(String, String), RequestTally>,
}

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Vec<OperationRow> {
        self.tallies
            .iter()
            .map(|((scenario, request), tally)| OperationRow {
                scenario: scenario.clone(),
                request: request.clone(),
                total_requests: tally.total,
                failed_requests: tally.failed,
                avg_time_ms: tally.total_ms / tally.total.max(1) as f64,
                min_time_ms: tally.min_ms,
                max_time_ms: tally.max_ms,
            })
            .collect()
    }

    fn print_summary_of_operations(&self) {
        println!("\nSummary of requests");

        let mut table = Table::new(self.rows());
        table.with(Style::modern());

        println!("{table}");
    }
}

impl ReportCollector for SummaryReportCollector {
    fn add_outcome(&mut self, outcome: &RequestOutcome) {
        let latency_ms = outcome.latency_ms();
        let tally = self
            .tallies
            .entry((
                outcome.scenario.clone(),
                format!("{} {}", outcome.method, outcome.name),
            ))
            .or_insert_with(|| RequestTally {
                min_ms: latency_ms,
                max_ms: latency_ms,
                ..Default::default()
            });

        tally.total += 1;
        if outcome.failed {
            tally.failed += 1;
        }
        tally.total_ms += latency_ms;
        tally.min_ms = tally.min_ms.min(latency_ms);
        tally.max_ms = tally.max_ms.max(latency_ms);
    }

    fn finalize(&self) {
        self.print_summary_of_operations();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{Method, OutcomeStatus, RequestRecord};
    use std::time::Duration;

    #[test]
    fn rows_group_by_scenario_and_request() {
        let mut collector = SummaryReportCollector::new();
        for (status, latency_ms) in [(200, 10), (500, 30), (200, 20)] {
            collector.add_outcome(
                &RequestRecord::start("products", "vu", "/api/products", Method::Get)
                    .finish_with_latency(
                        OutcomeStatus::Status(status),
                        Duration::from_millis(latency_ms),
                        0,
                        status != 200,
                    ),
            );
        }
        collector.add_outcome(
            &RequestRecord::start("products", "vu", "/api/products", Method::Post)
                .finish_with_latency(OutcomeStatus::Status(201), Duration::from_millis(5), 0, false),
        );

        let rows = collector.rows();
        assert_eq!(2, rows.len());

        let get = &rows[0];
        assert_eq!("GET /api/products", get.request);
        assert_eq!(3, get.total_requests);
        assert_eq!(1, get.failed_requests);
        assert_eq!(20.0, get.avg_time_ms);
        assert_eq!(10.0, get.min_time_ms);
        assert_eq!(30.0, get.max_time_ms);

        assert_eq!("POST /api/products", rows[1].request);
    }
}
