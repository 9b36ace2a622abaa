mod report;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::collections::HashMap;
use std::io::{BufRead, Read, Write};
use std::path::Path;

pub use report::{
    CheckSummary, LatencySummary, RunReport, RunStatus, ScenarioReport, ThresholdOutcome,
    ThresholdReport,
};

/// Identity and configuration of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The name of the scenario suite that was run, usually the name of the scenario binary
    pub suite_name: String,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The planned duration of the run, in seconds
    ///
    /// This is the longest duration across all scenarios. A cancelled run finishes sooner.
    pub run_duration: u64,
    /// The base URL of the target service
    pub target_host: String,
    /// The load profile of each scenario, keyed by scenario name
    ///
    /// For example `constant-vus 20 for 40s` or `ramping-vus 0 -> 5 over 10s, 5 -> 0 over 10s`.
    pub scenario_plans: HashMap<String, String>,
    /// The threshold expressions declared for the run
    pub thresholds: Vec<String>,
    /// The version of Gale that was used for this run
    pub gale_version: String,
}

impl RunSummary {
    /// Create a new run summary
    pub fn new(
        run_id: String,
        suite_name: String,
        started_at: i64,
        run_duration: u64,
        target_host: String,
        gale_version: String,
    ) -> Self {
        Self {
            run_id,
            suite_name,
            started_at,
            run_duration,
            target_host,
            scenario_plans: HashMap::new(),
            thresholds: Vec::new(),
            gale_version,
        }
    }

    /// Record the load profile of a scenario
    pub fn add_scenario_plan(&mut self, scenario: String, plan: String) {
        self.scenario_plans.insert(scenario, plan);
    }

    /// Record a declared threshold expression
    pub fn add_threshold(&mut self, threshold: String) {
        self.thresholds.push(threshold);
    }

    /// Compute a fingerprint for this run summary
    ///
    /// The fingerprint is intended to uniquely identify the configuration used to run the suite.
    /// It uses the
    ///     - Suite name
    ///     - Run duration
    ///     - Scenario plans
    ///     - Thresholds
    ///     - Gale version
    ///
    /// The run id, start time and target host are deliberately excluded so that repeated runs of
    /// the same configuration against different deployments can be compared.
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(&self) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, self.suite_name.as_bytes());
        Digest::update(&mut hasher, self.run_duration.to_le_bytes());
        self.scenario_plans
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.as_bytes());
            });
        self.thresholds.iter().sorted().for_each(|t| {
            Digest::update(&mut hasher, t.as_bytes());
        });
        Digest::update(&mut hasher, self.gale_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Append the run report to a file
///
/// The report will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_report(run_report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_report(run_report, &mut file)?;
    file.write_all("\n".as_bytes())?;
    Ok(())
}

/// Write the run report to a file as pretty printed JSON, replacing any existing content
pub fn write_run_report(run_report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, run_report)?;
    Ok(())
}

/// Serialize the run report to a writer
pub fn store_run_report<W: Write>(run_report: &RunReport, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_report)?;
    Ok(())
}

/// Load a run report from a reader
pub fn load_run_report<R: Read>(reader: R) -> anyhow::Result<RunReport> {
    let reader = std::io::BufReader::new(reader);
    let run_report: RunReport = serde_json::from_reader(reader)?;
    Ok(run_report)
}

/// Load run reports from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_report]. Blank lines are skipped.
pub fn load_run_reports(path: &Path) -> anyhow::Result<Vec<RunReport>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunReport = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn summary(run_id: &str) -> RunSummary {
        let mut summary = RunSummary::new(
            run_id.to_string(),
            "gateway_mix".to_string(),
            1_700_000_000,
            40,
            "http://localhost:8000".to_string(),
            "0.1.0".to_string(),
        );
        summary.add_scenario_plan("products".to_string(), "constant-vus 20 for 40s".to_string());
        summary.add_scenario_plan("inventory".to_string(), "constant-vus 15 for 40s".to_string());
        summary.add_threshold("http_req_failed: rate<0.20".to_string());
        summary
    }

    fn report(run_id: &str) -> RunReport {
        RunReport::new(
            summary(run_id),
            RunStatus::Complete,
            1_700_000_040,
            BTreeMap::from([(
                "products".to_string(),
                ScenarioReport {
                    attempts: 100,
                    failures: 3,
                    ..Default::default()
                },
            )]),
        )
    }

    #[test]
    fn fingerprint_ignores_run_identity() {
        let first = summary("run-1");
        let mut second = summary("run-2");
        second.started_at += 3_600;
        second.target_host = "https://staging.example.com".to_string();

        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fingerprint_changes_with_configuration() {
        let first = summary("run-1");
        let mut second = summary("run-1");
        second.add_scenario_plan("products".to_string(), "constant-vus 25 for 40s".to_string());

        assert_ne!(first.fingerprint(), second.fingerprint());

        let mut third = summary("run-1");
        third.add_threshold("http_req_duration: p(95)<3000".to_string());
        assert_ne!(first.fingerprint(), third.fingerprint());
    }

    #[test]
    fn history_written_with_env_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_summary.jsonl");

        let mut line = serde_json::to_value(report("run-1")).unwrap();
        line["summary"]["env"] = serde_json::json!({ "TARGET_HOST": "http://localhost:9000" });
        std::fs::write(&path, format!("{line}\n")).unwrap();

        let loaded = load_run_reports(&path).unwrap();
        assert_eq!(vec![report("run-1")], loaded);
        assert_eq!(summary("run-1").fingerprint(), loaded[0].summary.fingerprint());
    }

    #[test]
    fn append_and_load_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_summary.jsonl");

        append_run_report(&report("run-1"), &path).unwrap();
        append_run_report(&report("run-2"), &path).unwrap();

        let loaded = load_run_reports(&path).unwrap();
        assert_eq!(vec![report("run-1"), report("run-2")], loaded);
    }

    #[test]
    fn write_pretty_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        write_run_report(&report("run-1"), &path).unwrap();

        let loaded = load_run_report(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(report("run-1"), loaded);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\n  \"summary\""));
    }

    #[test]
    fn loading_missing_history_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_run_reports(&dir.path().join("missing.jsonl")).is_err());
    }
}
