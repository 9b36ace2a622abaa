use gale_summary_model::RunReport;

use crate::model::SuiteSummary;

pub mod filter;
pub mod model;
mod table;

pub use table::summary_table;

/// Summarise the latest run of every suite configuration found in the history.
pub fn summarise(run_reports: Vec<RunReport>) -> Vec<SuiteSummary> {
    filter::latest_run_reports_by_name_and_config(run_reports)
        .into_iter()
        .map(|(name, fingerprint, report)| {
            log::debug!(
                "Selected run {} for {name} ({fingerprint})",
                report.summary.run_id
            );
            SuiteSummary::new(fingerprint, &report)
        })
        .collect()
}
