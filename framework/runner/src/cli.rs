use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct GaleScenarioCli {
    /// The base URL of the API gateway to test, for example `http://localhost:8000`
    #[clap(long, env = "TARGET_HOST")]
    pub target_host: Option<String>,

    /// A TOML file to load scenarios, thresholds and timeouts from.
    ///
    /// Values from the file replace the defaults declared by the scenario. Command line flags take
    /// precedence over the file.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Run a single constant-VU scenario named `default` with this many VUs, replacing the
    /// configured scenarios.
    #[clap(long)]
    pub vus: Option<usize>,

    /// Run a single constant-VU scenario named `default` for this long, replacing the configured
    /// scenarios. Accepts human-readable durations such as `30s` or `2m`.
    #[clap(long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// How long to wait for a response before recording the request as a timeout
    #[clap(long, value_parser = humantime::parse_duration)]
    pub request_timeout: Option<Duration>,

    /// How long in-flight requests may take to complete once a VU has been told to stop.
    ///
    /// Requests still running after this are abandoned and not recorded.
    #[clap(long, value_parser = humantime::parse_duration)]
    pub graceful_stop: Option<Duration>,

    /// Where to send request outcomes in addition to the in-memory aggregates that thresholds are
    /// evaluated against.
    #[clap(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Directory for the outcome file when `--reporter=outcome-file` is used
    #[clap(long, default_value = "outcomes")]
    pub outcome_dir: PathBuf,

    /// Write the run report to this file as pretty printed JSON
    #[clap(long)]
    pub report_path: Option<PathBuf>,

    /// File that the run report is appended to as a single JSON line, for the summariser
    #[clap(long, env = "RUN_SUMMARY_PATH", default_value = "run_summary.jsonl")]
    pub run_summary_path: PathBuf,

    /// The ID of this run. A random ID is generated if this is not set.
    #[clap(long)]
    pub run_id: Option<String>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterOpt {
    /// Print a summary table of every request when the run finishes
    InMemory,
    /// Print the summary table and also stream every outcome to a JSON lines file
    OutcomeFile,
    /// Only keep the aggregates that thresholds are evaluated against
    Noop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_human_durations() {
        let cli = GaleScenarioCli::parse_from([
            "gale",
            "--target-host",
            "http://localhost:8000",
            "--vus",
            "10",
            "--duration",
            "1m 30s",
            "--graceful-stop",
            "500ms",
            "--reporter",
            "outcome-file",
        ]);

        assert_eq!(Some(10), cli.vus);
        assert_eq!(Some(Duration::from_secs(90)), cli.duration);
        assert_eq!(Some(Duration::from_millis(500)), cli.graceful_stop);
        assert_eq!(ReporterOpt::OutcomeFile, cli.reporter);
        assert!(!cli.no_progress);
    }

    #[test]
    fn reject_invalid_duration() {
        let result = GaleScenarioCli::try_parse_from(["gale", "--duration", "soon"]);
        assert!(result.is_err());
    }
}
