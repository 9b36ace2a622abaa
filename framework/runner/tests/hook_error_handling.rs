use std::sync::Arc;
use std::time::Duration;

use gale_runner::prelude::{
    run, ConfigError, GaleScenarioCli, HookResult, ReporterOpt, RunStatus, RunnerContext,
    ScenarioDefinitionBuilder, ScenarioSpec, UserValuesConstraint, VuBailError, VuContext,
    ITERATION_CHECK,
};
use tempfile::TempDir;

#[derive(Default, Debug)]
struct RunnerContextValue {}

impl UserValuesConstraint for RunnerContextValue {}

#[derive(Default, Debug)]
struct VuContextValue {
    value: i32,
}

impl UserValuesConstraint for VuContextValue {}

type Ctx = VuContext<RunnerContextValue, VuContextValue>;

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

fn short_scenario(name: &str, vus: usize) -> ScenarioSpec {
    ScenarioSpec::constant(name, vus, Duration::from_secs(1))
        .with_think_time(Duration::from_millis(10))
}

fn noop(_ctx: &mut Ctx) -> HookResult {
    Ok(())
}

#[test]
fn propagate_error_in_setup_hook() {
    fn setup(_ctx: &mut RunnerContext<RunnerContextValue>) -> HookResult {
        Err(anyhow::anyhow!("Error in setup hook"))
    }

    let dir = tempfile::tempdir().unwrap();
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "propagate_error_in_setup_hook",
        sample_cli_cfg(&dir),
    )
    .with_default_scenario(short_scenario("default", 1))
    .use_setup(setup)
    .use_vu_behaviour(noop);

    let result = run(scenario);

    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "Error in setup hook");
    // Nothing ran, so nothing is appended to the history
    assert!(!dir.path().join("run_summary.jsonl").exists());
}

#[test]
fn configuration_error_aborts_before_any_vu() {
    fn vu_setup(_ctx: &mut Ctx) -> HookResult {
        panic!("No VU should start");
    }

    let dir = tempfile::tempdir().unwrap();
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "configuration_error_aborts_before_any_vu",
        sample_cli_cfg(&dir),
    )
    .with_default_scenario(short_scenario("products", 1).with_exec("products"))
    .use_vu_setup(vu_setup)
    .use_vu_behaviour(noop);

    let error = run(scenario).unwrap_err();

    assert!(matches!(
        error.downcast_ref::<ConfigError>(),
        Some(ConfigError::UnknownBehaviour { .. })
    ));
}

#[test]
fn capture_error_in_vu_setup() {
    fn vu_setup(_ctx: &mut Ctx) -> HookResult {
        Err(anyhow::anyhow!("Error in VU setup hook"))
    }

    let dir = tempfile::tempdir().unwrap();
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_vu_setup",
        sample_cli_cfg(&dir),
    )
    .with_default_scenario(short_scenario("default", 2))
    .use_vu_setup(vu_setup)
    .use_vu_behaviour(noop);

    let report = run(scenario).unwrap();

    assert_eq!(RunStatus::Complete, report.status);
    assert_eq!(0, report.scenarios["default"].iterations);
    assert_eq!(2, report.scenarios["default"].peak_vus);
}

#[test]
fn capture_error_in_vu_behaviour_and_continue() {
    fn vu_behaviour(ctx: &mut Ctx) -> HookResult {
        if ctx.get().value < 5 {
            ctx.get_mut().value += 1;
        } else {
            // Save time running this test by cancelling once this has run a few times.
            ctx.runner_context().force_stop_scenario();
        }

        Err(anyhow::anyhow!("Error in VU behaviour hook"))
    }

    let dir = tempfile::tempdir().unwrap();
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_vu_behaviour_and_continue",
        sample_cli_cfg(&dir),
    )
    .with_default_scenario(
        ScenarioSpec::constant("default", 1, Duration::from_secs(30))
            .with_think_time(Duration::from_millis(10)),
    )
    .use_vu_behaviour(vu_behaviour);

    let report = run(scenario).unwrap();

    let scenario = &report.scenarios["default"];
    assert!(scenario.failed_iterations >= 6);
    assert_eq!(scenario.iterations, scenario.failed_iterations);
    assert_eq!(0, scenario.checks[ITERATION_CHECK].passes);
    assert_eq!(RunStatus::Cancelled, report.status);
    assert_eq!(2, report.exit_code());
}

#[test]
fn bail_error_stops_vu_behaviour() {
    fn vu_behaviour_1(_ctx: &mut Ctx) -> HookResult {
        Err(VuBailError::default().into())
    }

    fn vu_behaviour_2(_ctx: &mut Ctx) -> HookResult {
        Ok(())
    }

    let dir = tempfile::tempdir().unwrap();
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "bail_error_stops_vu_behaviour",
        sample_cli_cfg(&dir),
    )
    .with_default_scenario(short_scenario("bail", 1).with_exec("bail"))
    .with_default_scenario(short_scenario("continue", 1).with_exec("continue"))
    .use_named_vu_behaviour("bail", vu_behaviour_1)
    .use_named_vu_behaviour("continue", vu_behaviour_2);

    let report = run(scenario).unwrap();

    assert_eq!(0, report.scenarios["bail"].iterations);
    assert_eq!(0, report.scenarios["bail"].failed_iterations);
    assert!(report.scenarios["continue"].iterations > 0);
    assert_eq!(0, report.exit_code());
}

#[test]
fn capture_error_in_vu_teardown() {
    fn vu_teardown(_ctx: &mut Ctx) -> HookResult {
        Err(anyhow::anyhow!("Error in VU teardown hook"))
    }

    let dir = tempfile::tempdir().unwrap();
    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_vu_teardown",
        sample_cli_cfg(&dir),
    )
    .with_default_scenario(short_scenario("default", 1))
    .use_vu_behaviour(noop)
    .use_vu_teardown(vu_teardown);

    let result = run(scenario);

    assert!(result.is_ok());
}

#[test]
fn capture_error_in_teardown() {
    fn teardown(_ctx: Arc<RunnerContext<RunnerContextValue>>) -> HookResult {
        Err(anyhow::anyhow!("Error in teardown hook"))
    }

    let dir = tempfile::tempdir().unwrap();
    let mut cli = sample_cli_cfg(&dir);
    let report_path = dir.path().join("report.json");
    cli.report_path = Some(report_path.clone());

    let scenario = ScenarioDefinitionBuilder::<RunnerContextValue, VuContextValue>::new(
        "capture_error_in_teardown",
        cli,
    )
    .with_default_scenario(short_scenario("default", 1))
    .use_vu_behaviour(noop)
    .use_teardown(teardown);

    let report = run(scenario).unwrap();

    // The report is still written and appended to the history
    assert!(report_path.exists());
    let history =
        gale_summary_model::load_run_reports(&dir.path().join("run_summary.jsonl")).unwrap();
    assert_eq!(1, history.len());
    assert_eq!(report.summary.run_id, history[0].summary.run_id);
    assert_eq!("capture_error_in_teardown", history[0].summary.suite_name);
}
