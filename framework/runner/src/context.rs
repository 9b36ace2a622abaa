use std::fmt::Debug;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gale_core::prelude::{DelegatedShutdownListener, ShutdownHandle};
use gale_instruments::{AggregationError, MetricSnapshot, Reporter};
use url::Url;

use crate::executor::Executor;

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// Shared state for the whole run. Available to every hook.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    run_id: String,
    target_host: Url,
    request_timeout: Duration,
    graceful_stop: Duration,
    active_vus: Arc<AtomicUsize>,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        run_id: String,
        target_host: Url,
        request_timeout: Duration,
        graceful_stop: Duration,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            run_id,
            target_host,
            request_timeout,
            graceful_stop,
            active_vus: Arc::new(AtomicUsize::new(0)),
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// The base URL of the service under test.
    pub fn target_host(&self) -> &Url {
        &self.target_host
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn graceful_stop(&self) -> Duration {
        self.graceful_stop
    }

    /// Number of VUs that are currently running or sleeping, across all scenarios.
    pub fn active_vus(&self) -> usize {
        self.active_vus.load(Ordering::Relaxed)
    }

    pub(crate) fn active_vus_counter(&self) -> Arc<AtomicUsize> {
        self.active_vus.clone()
    }

    /// The aggregates recorded for `scenario` so far. Reading this has no effect on the result of
    /// the run.
    pub fn live_snapshot(&self, scenario: &str) -> Result<MetricSnapshot, AggregationError> {
        self.reporter.snapshot(scenario)
    }

    /// Cancel the run as if the user had pressed Ctrl-C. The report will be marked as partial.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// State for a single VU, passed to the VU hooks.
pub struct VuContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    vu_id: String,
    scenario_name: String,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> VuContext<RV, V> {
    pub(crate) fn new(
        vu_id: String,
        scenario_name: String,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            vu_id,
            scenario_name,
            runner_context,
            shutdown_listener,
            value: Default::default(),
        }
    }

    /// A value which is unique within the run, such as `products-vu-3`.
    pub fn vu_id(&self) -> &str {
        &self.vu_id
    }

    pub fn scenario_name(&self) -> &str {
        &self.scenario_name
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    /// Fires when the scheduler stops this VU or the run is cancelled.
    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    /// Run async code for this VU, blocking until it completes.
    ///
    /// Once the VU has been told to stop no new work is started, and work already in flight gets
    /// the graceful stop period to complete. See [Executor::execute_draining].
    pub fn execute<T>(&self, fut: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
        self.runner_context.executor().execute_draining(
            fut,
            self.shutdown_listener.clone(),
            self.runner_context.graceful_stop(),
        )
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
