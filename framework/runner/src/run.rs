use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use gale_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use gale_instruments::{MetricSnapshot, ReportConfig, Reporter};
use gale_summary_model::{
    append_run_report, write_run_report, CheckSummary, LatencySummary, RunReport, RunStatus,
    RunSummary, ScenarioReport, ThresholdReport,
};

use crate::cli::ReporterOpt;
use crate::config::RunOptions;
use crate::context::{RunnerContext, UserValuesConstraint};
use crate::definition::{ScenarioDefinition, ScenarioDefinitionBuilder};
use crate::executor::Executor;
use crate::monitor::start_monitor;
use crate::progress::start_progress;
use crate::scheduler::Scheduler;
use crate::shutdown::start_shutdown_listener;
use crate::threshold::evaluate;
use crate::vu::{spawn_vu, VuHandle, VuHooks};

/// How long to wait for VU threads beyond the graceful stop period before giving up on them.
const JOIN_MARGIN: Duration = Duration::from_secs(5);

/// Run the scenarios of a definition to completion and return the report.
///
/// Configuration errors, a failing global setup and broken metric invariants are returned as
/// errors. Threshold failures and cancellation are reported through [RunReport::exit_code].
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<RunReport> {
    let definition = definition.build()?;
    let options = definition.options.clone();

    log::info!(
        "Running scenario suite {} against {}",
        definition.name,
        options.target_host
    );
    for scenario in &options.scenarios {
        log::info!("Scenario {}: {}", scenario.name, scenario.plan());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime);

    let run_id = options
        .run_id
        .clone()
        .unwrap_or_else(|| nanoid::nanoid!());
    let started_at = chrono::Utc::now().timestamp();

    let reporter = Arc::new(
        report_config(&options, &run_id, &definition.name).init_reporter(runtime.handle())?,
    );
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));

    let mut runner_context = RunnerContext::new(
        executor.clone(),
        reporter.clone(),
        shutdown_handle.clone(),
        run_id.clone(),
        options.target_host.clone(),
        options.request_timeout,
        options.graceful_stop,
    );

    if let Some(setup_fn) = definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let runner_context = Arc::new(runner_context);

    // Stops the progress display and the resource monitor once every VU has stopped.
    let background_shutdown = ShutdownHandle::new();
    if !options.no_progress {
        if let Err(e) = start_progress(
            options.run_duration(),
            runner_context.active_vus_counter(),
            reporter.clone(),
            background_shutdown.new_listener(),
        ) {
            log::warn!("Progress display unavailable: {e:?}");
        }
    }

    // Ready to start VUs so start the resource monitor to report high usage by the load generator,
    // which might lead to misleading latencies.
    if let Err(e) = start_monitor(background_shutdown.new_listener()) {
        log::warn!("Resource monitor unavailable: {e:?}");
    }

    let mut scheduler = Scheduler::new(options.scenarios.clone(), options.tick_interval);
    let outcome = drive(
        &mut scheduler,
        &definition,
        &runner_context,
        &executor,
        shutdown_handle.new_listener(),
    );

    // Whatever ended the schedule, every VU is told to stop before we wait on them.
    scheduler.stop_all();
    runner_context
        .active_vus_counter()
        .store(0, Ordering::Relaxed);
    let peaks = scheduler.peaks();
    join_vus(
        scheduler.into_handles(),
        options.graceful_stop + JOIN_MARGIN,
    );
    background_shutdown.shutdown();

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly. The hook is documented as 'best effort'
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    reporter.finalize();

    let status = outcome?;
    let report = build_report(
        &definition.name,
        &options,
        &reporter,
        &run_id,
        started_at,
        status,
        &peaks,
    )?;

    print_thresholds(&report);
    persist_report(&report, &options);

    Ok(report)
}

fn report_config(options: &RunOptions, run_id: &str, name: &str) -> ReportConfig {
    let config = ReportConfig::new(run_id.to_string(), name.to_string());
    match options.reporter {
        ReporterOpt::InMemory => config.enable_summary(),
        ReporterOpt::OutcomeFile => config
            .enable_summary()
            .enable_outcome_file(options.outcome_dir.clone()),
        ReporterOpt::Noop => config,
    }
}

/// Reconcile the scheduler every tick until the schedule ends or the run is cancelled.
fn drive<RV: UserValuesConstraint, V: UserValuesConstraint>(
    scheduler: &mut Scheduler,
    definition: &ScenarioDefinition<RV, V>,
    runner_context: &Arc<RunnerContext<RV>>,
    executor: &Executor,
    mut run_shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<RunStatus> {
    let active_vus = runner_context.active_vus_counter();
    let start = Instant::now();

    loop {
        if run_shutdown_listener.should_shutdown() {
            log::info!("Run cancelled after {:?}", start.elapsed());
            return Ok(RunStatus::Cancelled);
        }

        let elapsed = start.elapsed();
        scheduler.reconcile(elapsed, &mut |spec, vu_id| {
            let behaviour = definition
                .vu_behaviour
                .get(&spec.exec)
                .copied()
                .with_context(|| format!("No behaviour named {}", spec.exec))?;
            spawn_vu(
                vu_id,
                spec.name.clone(),
                runner_context.clone(),
                VuHooks {
                    setup: definition.setup_vu_fn,
                    behaviour,
                    teardown: definition.teardown_vu_fn,
                },
                spec.think_time,
            )
        })?;

        runner_context.reporter().recorder().verify()?;
        active_vus.store(scheduler.live_vus(), Ordering::Relaxed);

        if scheduler.is_finished(elapsed) {
            log::info!("All scenarios finished after {:?}", elapsed);
            return Ok(RunStatus::Complete);
        }

        executor.sleep_or_shutdown(scheduler.next_tick_in(elapsed), &mut run_shutdown_listener);
    }
}

/// Wait for stopped VUs to finish their teardown. VUs that are still running after `timeout` are
/// left behind with a warning.
fn join_vus(handles: Vec<VuHandle>, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline && !handles.iter().all(VuHandle::is_finished) {
        std::thread::sleep(Duration::from_millis(10));
    }

    for handle in handles {
        if !handle.is_finished() {
            log::warn!("VU {} did not stop within {:?}", handle.id(), timeout);
            continue;
        }
        if let Err(e) = handle.join() {
            log::error!("{e:?}");
        }
    }
}

fn build_report(
    name: &str,
    options: &RunOptions,
    reporter: &Reporter,
    run_id: &str,
    started_at: i64,
    status: RunStatus,
    peaks: &BTreeMap<String, usize>,
) -> anyhow::Result<RunReport> {
    let mut summary = RunSummary::new(
        run_id.to_string(),
        name.to_string(),
        started_at,
        options.run_duration().as_secs(),
        options.target_host.to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    for scenario in &options.scenarios {
        summary.add_scenario_plan(scenario.name.clone(), scenario.plan());
    }
    for threshold in options.threshold_sources() {
        summary.add_threshold(threshold);
    }

    let mut scenarios = BTreeMap::new();
    for scenario in &options.scenarios {
        let snapshot = reporter.snapshot(&scenario.name)?;
        let thresholds = evaluate(
            &scenario.name,
            &options.thresholds_for(scenario),
            &snapshot,
        )
        .remove(&scenario.name)
        .unwrap_or_default();

        scenarios.insert(
            scenario.name.clone(),
            scenario_report(
                &snapshot,
                thresholds,
                peaks.get(&scenario.name).copied().unwrap_or_default(),
            ),
        );
    }

    Ok(RunReport::new(
        summary,
        status,
        chrono::Utc::now().timestamp(),
        scenarios,
    ))
}

fn scenario_report(
    snapshot: &MetricSnapshot,
    thresholds: Vec<ThresholdReport>,
    peak_vus: usize,
) -> ScenarioReport {
    ScenarioReport {
        attempts: snapshot.attempts,
        failures: snapshot.failures,
        failure_rate: snapshot.failure_rate(),
        bytes_received: snapshot.bytes_received,
        iterations: snapshot.iterations,
        failed_iterations: snapshot.failed_iterations,
        peak_vus,
        latency: LatencySummary {
            count: snapshot.latency.count,
            min_ms: snapshot.latency.min_ms,
            max_ms: snapshot.latency.max_ms,
            mean_ms: snapshot.latency.mean_ms,
            percentiles: snapshot.percentiles(),
        },
        checks: snapshot
            .checks
            .iter()
            .map(|(name, tally)| {
                (
                    name.clone(),
                    CheckSummary {
                        passes: tally.passes,
                        fails: tally.fails,
                    },
                )
            })
            .collect(),
        thresholds,
        // Set from the thresholds by `RunReport::new`
        passed: false,
    }
}

fn print_thresholds(report: &RunReport) {
    for (name, scenario) in &report.scenarios {
        for threshold in &scenario.thresholds {
            let observed = threshold
                .observed
                .map(|v| format!("{v:.4}"))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "[{name}] {} => {:?} (observed {observed})",
                threshold.threshold, threshold.outcome
            );
        }
    }

    let verdict = if report.passed { "passed" } else { "failed" };
    if report.is_partial() {
        println!("Run {} was cancelled, thresholds {verdict} on partial data", report.summary.run_id);
    } else {
        println!("Run {} {verdict}", report.summary.run_id);
    }
}

fn persist_report(report: &RunReport, options: &RunOptions) {
    if let Some(path) = &options.report_path {
        match write_run_report(report, path) {
            Ok(()) => log::info!("Wrote run report to {}", path.display()),
            Err(e) => log::error!("Failed to write run report to {}: {e:?}", path.display()),
        }
    }

    if let Err(e) = append_run_report(report, &options.run_summary_path) {
        log::error!(
            "Failed to append run report to {}: {e:?}",
            options.run_summary_path.display()
        );
    }
}
