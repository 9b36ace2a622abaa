use std::collections::BTreeMap;

use gale_summariser::summarise;
use gale_summary_model::{
    append_run_report, load_run_reports, LatencySummary, RunReport, RunStatus, RunSummary,
    ScenarioReport,
};
use pretty_assertions::assert_eq;

fn report(suite: &str, run_id: &str, started_at: i64, vus: usize, attempts: u64) -> RunReport {
    let mut summary = RunSummary::new(
        run_id.to_string(),
        suite.to_string(),
        started_at,
        40,
        "http://localhost:8000".to_string(),
        "0.1.0".to_string(),
    );
    summary.add_scenario_plan("default".to_string(), format!("constant-vus {vus} for 40s"));

    RunReport::new(
        summary,
        RunStatus::Complete,
        started_at + 40,
        BTreeMap::from([(
            "default".to_string(),
            ScenarioReport {
                attempts,
                failures: attempts / 10,
                failure_rate: Some(0.1),
                latency: LatencySummary {
                    count: attempts,
                    percentiles: BTreeMap::from([("p(95)".to_string(), 120.0)]),
                    ..Default::default()
                },
                ..Default::default()
            },
        )]),
    )
}

#[test]
fn keeps_latest_run_of_each_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_summary.jsonl");

    for run in [
        report("inventory", "inv-old", 1_000, 20, 100),
        report("inventory", "inv-new", 2_000, 20, 200),
        // Same suite with a different load profile is kept separately
        report("inventory", "inv-heavy", 1_500, 50, 500),
        report("health_check", "health", 1_200, 5, 90),
    ] {
        append_run_report(&run, &path).unwrap();
    }

    let summaries = summarise(load_run_reports(&path).unwrap());

    assert_eq!(3, summaries.len());
    assert_eq!("health_check", summaries[0].suite_name);

    let inventory_runs = summaries
        .iter()
        .filter(|s| s.suite_name == "inventory")
        .map(|s| s.run_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(2, inventory_runs.len());
    assert!(inventory_runs.contains(&"inv-new"));
    assert!(inventory_runs.contains(&"inv-heavy"));

    let latest = summaries.iter().find(|s| s.run_id == "inv-new").unwrap();
    assert_eq!(200, latest.scenarios["default"].attempts);
    assert_eq!(Some(120.0), latest.scenarios["default"].p95_ms);
    assert_eq!(Some(0.1), latest.scenarios["default"].failure_rate);
}

#[test]
fn unreadable_history_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_summary.jsonl");
    std::fs::write(&path, "{ not json\n").unwrap();

    assert!(load_run_reports(&path).is_err());
}
