use std::collections::BTreeMap;

use gale_summary_model::{RunReport, RunStatus};
use serde::{Deserialize, Serialize};

const P95: &str = "p(95)";

/// The latest result for one suite configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuiteSummary {
    pub suite_name: String,
    pub fingerprint: String,
    pub run_id: String,
    pub started_at: i64,
    pub status: RunStatus,
    pub passed: bool,
    pub scenarios: BTreeMap<String, ScenarioSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioSummary {
    pub attempts: u64,
    pub failure_rate: Option<f64>,
    pub p95_ms: Option<f64>,
}

impl SuiteSummary {
    pub fn new(fingerprint: String, report: &RunReport) -> Self {
        Self {
            suite_name: report.summary.suite_name.clone(),
            fingerprint,
            run_id: report.summary.run_id.clone(),
            started_at: report.summary.started_at,
            status: report.status,
            passed: report.passed,
            scenarios: report
                .scenarios
                .iter()
                .map(|(name, scenario)| {
                    (
                        name.clone(),
                        ScenarioSummary {
                            attempts: scenario.attempts,
                            failure_rate: scenario.failure_rate,
                            p95_ms: scenario.latency.percentiles.get(P95).copied(),
                        },
                    )
                })
                .collect(),
        }
    }
}
