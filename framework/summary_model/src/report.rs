use crate::RunSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the run ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every scenario ran for its full duration
    Complete,
    /// The run was cancelled before the schedule finished, so the report is partial
    Cancelled,
}

/// Result of evaluating one threshold against a scenario
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdOutcome {
    Passed,
    Failed,
    /// There was no data to evaluate against, for example zero requests were attempted
    Inconclusive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdReport {
    /// The threshold as it was declared, for example `http_req_duration: p(95)<3000`
    pub threshold: String,
    pub outcome: ThresholdOutcome,
    /// The observed failure rate or percentile in milliseconds, if there was data to observe
    pub observed: Option<f64>,
    /// Whether an inconclusive outcome fails the run
    pub required: bool,
}

impl ThresholdReport {
    /// Whether this threshold causes its scenario, and so the run, to fail.
    pub fn fails_run(&self) -> bool {
        match self.outcome {
            ThresholdOutcome::Passed => false,
            ThresholdOutcome::Failed => true,
            ThresholdOutcome::Inconclusive => self.required,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub mean_ms: Option<f64>,
    /// Percentiles keyed as `p(95)`
    pub percentiles: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckSummary {
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScenarioReport {
    pub attempts: u64,
    pub failures: u64,
    /// `None` when nothing was attempted
    pub failure_rate: Option<f64>,
    pub bytes_received: u64,
    pub iterations: u64,
    pub failed_iterations: u64,
    /// The largest number of VUs that were active at the same time
    pub peak_vus: usize,
    pub latency: LatencySummary,
    pub checks: BTreeMap<String, CheckSummary>,
    pub thresholds: Vec<ThresholdReport>,
    pub passed: bool,
}

impl ScenarioReport {
    /// Whether none of the thresholds evaluated for this scenario fail the run.
    pub fn thresholds_passed(&self) -> bool {
        !self.thresholds.iter().any(ThresholdReport::fails_run)
    }
}

/// The final report of a run, as written to the report file and appended to the run history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub summary: RunSummary,
    pub status: RunStatus,
    /// The time the run finished, as a Unix timestamp in seconds
    pub finished_at: i64,
    pub scenarios: BTreeMap<String, ScenarioReport>,
    /// Whether every scenario passed its thresholds. A cancelled run can still have passed.
    pub passed: bool,
}

impl RunReport {
    pub fn new(
        summary: RunSummary,
        status: RunStatus,
        finished_at: i64,
        mut scenarios: BTreeMap<String, ScenarioReport>,
    ) -> Self {
        for scenario in scenarios.values_mut() {
            scenario.passed = scenario.thresholds_passed();
        }
        let passed = scenarios.values().all(|s| s.passed);

        Self {
            summary,
            status,
            finished_at,
            scenarios,
            passed,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    /// The process exit code for this report.
    ///
    /// - `0` the run completed and every threshold passed
    /// - `1` a threshold failed, or a required threshold was inconclusive
    /// - `2` the run was cancelled
    pub fn exit_code(&self) -> u8 {
        match (self.status, self.passed) {
            (RunStatus::Cancelled, _) => 2,
            (RunStatus::Complete, false) => 1,
            (RunStatus::Complete, true) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        RunSummary::new(
            "run".to_string(),
            "inventory".to_string(),
            0,
            40,
            "http://localhost:8000".to_string(),
            "0.1.0".to_string(),
        )
    }

    fn threshold(outcome: ThresholdOutcome, required: bool) -> ThresholdReport {
        ThresholdReport {
            threshold: "http_req_failed: rate<0.20".to_string(),
            outcome,
            observed: None,
            required,
        }
    }

    fn report_with(status: RunStatus, thresholds: Vec<ThresholdReport>) -> RunReport {
        RunReport::new(
            summary(),
            status,
            40,
            BTreeMap::from([(
                "inventory".to_string(),
                ScenarioReport {
                    thresholds,
                    ..Default::default()
                },
            )]),
        )
    }

    #[test]
    fn all_thresholds_passed() {
        let report = report_with(
            RunStatus::Complete,
            vec![threshold(ThresholdOutcome::Passed, true)],
        );
        assert!(report.passed);
        assert!(report.scenarios["inventory"].passed);
        assert_eq!(0, report.exit_code());
    }

    #[test]
    fn failed_threshold_fails_the_run() {
        let report = report_with(
            RunStatus::Complete,
            vec![
                threshold(ThresholdOutcome::Passed, true),
                threshold(ThresholdOutcome::Failed, false),
            ],
        );
        assert!(!report.passed);
        assert_eq!(1, report.exit_code());
    }

    #[test]
    fn inconclusive_only_fails_when_required() {
        let required = report_with(
            RunStatus::Complete,
            vec![threshold(ThresholdOutcome::Inconclusive, true)],
        );
        assert_eq!(1, required.exit_code());

        let optional = report_with(
            RunStatus::Complete,
            vec![threshold(ThresholdOutcome::Inconclusive, false)],
        );
        assert_eq!(0, optional.exit_code());
    }

    #[test]
    fn cancelled_run_is_partial() {
        let report = report_with(
            RunStatus::Cancelled,
            vec![threshold(ThresholdOutcome::Passed, true)],
        );
        assert!(report.is_partial());
        assert!(report.passed);
        assert_eq!(2, report.exit_code());
    }

    #[test]
    fn no_scenarios_passes() {
        let report = RunReport::new(summary(), RunStatus::Complete, 0, BTreeMap::new());
        assert!(report.passed);
    }
}
