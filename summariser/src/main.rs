use anyhow::Context;
use chrono::Utc;
use gale_summary_model::load_run_reports;
use std::fs::File;
use std::path::PathBuf;

/// Environment variable name to set a custom run summary file path
const RUN_SUMMARY_PATH_ENV: &str = "RUN_SUMMARY_PATH";
/// Default path for the run summary file
const DEFAULT_RUN_SUMMARY_PATH: &str = "run_summary.jsonl";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let summary_path = std::env::var(RUN_SUMMARY_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_RUN_SUMMARY_PATH));
    log::debug!("Loading run reports from {}", summary_path.display());
    let run_reports = load_run_reports(&summary_path).with_context(|| {
        format!(
            "Failed to load run reports from {}",
            summary_path.display()
        )
    })?;

    let summaries = gale_summariser::summarise(run_reports);
    if summaries.is_empty() {
        log::warn!("No run reports found in {}", summary_path.display());
    } else {
        println!("{}", gale_summariser::summary_table(&summaries));
    }

    let report = File::create_new(format!(
        "summariser-report-{}.json",
        Utc::now().format("%Y-%m-%dT%H.%M.%S%.fZ")
    ))?;

    serde_json::to_writer_pretty(report, &summaries)?;

    Ok(())
}
