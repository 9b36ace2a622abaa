mod cli;
mod config;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod progress;
mod run;
mod scheduler;
mod shutdown;
mod threshold;
mod types;
mod vu;

pub mod prelude {
    pub use crate::cli::{GaleScenarioCli, ReporterOpt};
    pub use crate::config::{
        ConfigError, ExecutorKind, RunOptions, ScenarioSpec, Stage, DEFAULT_GRACEFUL_STOP,
        DEFAULT_REQUEST_TIMEOUT,
    };
    pub use crate::context::UserValuesConstraint;
    pub use crate::context::{RunnerContext, VuContext};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::run;
    pub use crate::threshold::{
        evaluate, ThresholdMetric, ThresholdSpec, DURATION_METRIC, FAILURE_RATE_METRIC,
    };
    pub use crate::types::GaleResult;
    pub use crate::vu::{VuState, ITERATION_CHECK};

    pub use gale_core::prelude::{ShutdownSignalError, VuBailError};
    pub use gale_instruments::{
        Method, MetricSnapshot, OutcomeStatus, RequestOutcome, RequestRecord, Reporter,
    };
    pub use gale_summary_model::{RunReport, RunStatus, ThresholdOutcome};
}
