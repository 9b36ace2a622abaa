use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gale_runner::prelude::{
    run, GaleScenarioCli, HookResult, Method, OutcomeStatus, ReporterOpt, RequestRecord,
    ScenarioDefinitionBuilder, ScenarioSpec, UserValuesConstraint, VuContext,
};
use tempfile::TempDir;

#[derive(Default, Debug)]
struct RunnerContextValue {}

impl UserValuesConstraint for RunnerContextValue {}

#[derive(Default, Debug)]
struct VuContextValue {}

impl UserValuesConstraint for VuContextValue {}

type Ctx = VuContext<RunnerContextValue, VuContextValue>;

static FIRST_OBSERVED: AtomicU64 = AtomicU64::new(0);
static LAST_OBSERVED: AtomicU64 = AtomicU64::new(0);

fn sample_cli_cfg(dir: &TempDir) -> GaleScenarioCli {
    GaleScenarioCli {
        target_host: Some("http://localhost:8000".to_string()),
        config: None,
        vus: None,
        duration: None,
        request_timeout: None,
        graceful_stop: Some(Duration::from_secs(1)),
        reporter: ReporterOpt::Noop,
        outcome_dir: dir.path().join("outcomes"),
        report_path: None,
        run_summary_path: dir.path().join("run_summary.jsonl"),
        run_id: None,
        no_progress: true,
    }
}

fn behaviour(ctx: &mut Ctx) -> HookResult {
    let record = RequestRecord::start(ctx.scenario_name(), ctx.vu_id(), "/health", Method::Get);
    ctx.runner_context()
        .reporter()
        .add_outcome(record.finish(OutcomeStatus::Status(200), 2, false));

    let attempts = ctx
        .runner_context()
        .live_snapshot(ctx.scenario_name())?
        .attempts;
    FIRST_OBSERVED
        .compare_exchange(0, attempts, Ordering::SeqCst, Ordering::SeqCst)
        .ok();
    LAST_OBSERVED.fetch_max(attempts, Ordering::SeqCst);

    Ok(())
}

#[test]
fn live_snapshot_grows_during_the_run_without_changing_the_result() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "live_snapshot_grows_during_the_run_without_changing_the_result",
        sample_cli_cfg(&dir),
    )
    .with_default_scenario(
        ScenarioSpec::constant("health", 1, Duration::from_secs(1))
            .with_think_time(Duration::from_millis(20)),
    )
    .with_default_threshold("http_req_failed", "rate<0.01")
    .use_vu_behaviour(behaviour);

    let report = run(scenario).unwrap();

    let first = FIRST_OBSERVED.load(Ordering::SeqCst);
    let last = LAST_OBSERVED.load(Ordering::SeqCst);
    assert!(first > 0);
    assert!(last > first, "first {first}, last {last}");

    let health = &report.scenarios["health"];
    // Reading the snapshot records nothing, so every attempt is one iteration
    assert_eq!(health.iterations, health.attempts);
    assert_eq!(last, health.attempts);
    assert_eq!(0, health.failures);
    assert!(report.passed);
    assert_eq!(0, report.exit_code());
}
