use gale_summary_model::RunReport;
use itertools::Itertools;

/// Keep the most recent report for each combination of suite name and configuration fingerprint.
///
/// Results are ordered by suite name, then fingerprint.
pub fn latest_run_reports_by_name_and_config(
    run_reports: Vec<RunReport>,
) -> Vec<(String, String, RunReport)> {
    run_reports
        .into_iter()
        .into_group_map_by(|report| {
            (
                report.summary.suite_name.clone(),
                report.summary.fingerprint(),
            )
        })
        .into_iter()
        .filter_map(|((name, fingerprint), reports)| {
            let latest = reports
                .into_iter()
                .max_by_key(|report| (report.summary.started_at, report.finished_at))?;
            Some((name, fingerprint, latest))
        })
        .sorted_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)))
        .collect()
}
