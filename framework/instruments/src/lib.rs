mod outcome;
mod recorder;
mod report;
mod reservoir;
mod snapshot;

pub use outcome::{Method, OutcomeStatus, RequestOutcome, RequestRecord};
pub use recorder::{AggregationError, LiveTotals, MetricRecorder};
pub use report::{
    OutcomeFileReportCollector, ReportCollector, ReportConfig, Reporter, SummaryReportCollector,
};
pub use reservoir::{percentile, LatencyReservoir, DEFAULT_RESERVOIR_CAPACITY};
pub use snapshot::{CheckTally, LatencyDistribution, MetricSnapshot, REPORTED_PERCENTILES};
