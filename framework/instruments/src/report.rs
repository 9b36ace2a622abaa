mod outcome_file_reporter;
mod summary_report;

use crate::outcome::RequestOutcome;
use crate::recorder::{AggregationError, MetricRecorder};
use crate::reservoir::DEFAULT_RESERVOIR_CAPACITY;
use crate::snapshot::MetricSnapshot;
use parking_lot::Mutex;
use std::path::PathBuf;

pub use outcome_file_reporter::OutcomeFileReportCollector;
pub use summary_report::SummaryReportCollector;

/// Receives every request outcome as it is recorded, in addition to the [MetricRecorder].
pub trait ReportCollector: Send {
    fn add_outcome(&mut self, outcome: &RequestOutcome);

    /// Called once at the end of the run, after every VU has stopped.
    fn finalize(&self);
}

/// Configure which collectors a [Reporter] feeds.
///
/// ```rust
/// use gale_instruments::ReportConfig;
///
/// let reporter = ReportConfig::new("run-1".to_string(), "inventory".to_string())
///     .enable_summary()
///     .init_reporter(&tokio::runtime::Runtime::new().unwrap().handle())
///     .unwrap();
/// ```
pub struct ReportConfig {
    run_id: String,
    scenario_name: String,
    summary: bool,
    outcome_dir: Option<PathBuf>,
    reservoir_capacity: usize,
}

impl ReportConfig {
    pub fn new(run_id: String, scenario_name: String) -> Self {
        Self {
            run_id,
            scenario_name,
            summary: false,
            outcome_dir: None,
            reservoir_capacity: DEFAULT_RESERVOIR_CAPACITY,
        }
    }

    /// Print a table of request timings per scenario and request name when the run finishes.
    pub fn enable_summary(mut self) -> Self {
        self.summary = true;
        self
    }

    /// Stream every outcome as a JSON line to a file in `dir`.
    pub fn enable_outcome_file(mut self, dir: PathBuf) -> Self {
        self.outcome_dir = Some(dir);
        self
    }

    pub fn with_reservoir_capacity(mut self, capacity: usize) -> Self {
        self.reservoir_capacity = capacity;
        self
    }

    pub fn init_reporter(self, runtime: &tokio::runtime::Handle) -> anyhow::Result<Reporter> {
        let mut collectors: Vec<Mutex<Box<dyn ReportCollector>>> = Vec::new();

        if self.summary {
            collectors.push(Mutex::new(Box::new(SummaryReportCollector::new())));
        }

        if let Some(dir) = self.outcome_dir {
            collectors.push(Mutex::new(Box::new(OutcomeFileReportCollector::new(
                runtime,
                dir,
                &self.scenario_name,
                &self.run_id,
            )?)));
        }

        Ok(Reporter {
            recorder: MetricRecorder::with_reservoir_capacity(self.reservoir_capacity),
            collectors,
        })
    }
}

/// Shared sink for everything measured during a run.
///
/// Outcomes always go to the [MetricRecorder], which the thresholds are evaluated against, and
/// then to each configured [ReportCollector].
pub struct Reporter {
    recorder: MetricRecorder,
    collectors: Vec<Mutex<Box<dyn ReportCollector>>>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("recorder", &self.recorder)
            .field("collectors", &self.collectors.len())
            .finish()
    }
}

impl Reporter {
    pub fn add_outcome(&self, outcome: RequestOutcome) {
        self.recorder.record(&outcome);
        for collector in &self.collectors {
            collector.lock().add_outcome(&outcome);
        }
    }

    pub fn add_check(&self, scenario: &str, name: &str, passed: bool) {
        self.recorder.record_check(scenario, name, passed);
    }

    pub fn add_iteration(&self, scenario: &str, completed: bool) {
        self.recorder.record_iteration(scenario, completed);
    }

    pub fn snapshot(&self, scenario: &str) -> Result<MetricSnapshot, AggregationError> {
        self.recorder.snapshot(scenario)
    }

    pub fn recorder(&self) -> &MetricRecorder {
        &self.recorder
    }

    pub fn finalize(&self) {
        for collector in &self.collectors {
            collector.lock().finalize();
        }
    }
}
