use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context;
use gale_core::prelude::{ShutdownHandle, ShutdownSignalError, VuBailError};

use crate::context::{RunnerContext, UserValuesConstraint, VuContext};
use crate::definition::VuHookMut;

/// Name of the check that tallies whether iterations completed without an error.
pub const ITERATION_CHECK: &str = "iteration completes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VuState {
    /// Created but not started yet.
    Idle = 0,
    /// Running setup or an iteration.
    Running = 1,
    /// Pausing between iterations. Still counts as active.
    Sleeping = 2,
    /// Finished. A stopped VU never runs again.
    Stopped = 3,
}

impl VuState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => VuState::Idle,
            1 => VuState::Running,
            2 => VuState::Sleeping,
            _ => VuState::Stopped,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, VuState::Running | VuState::Sleeping)
    }
}

/// The current [VuState] of a VU, shared between the VU thread and the scheduler.
#[derive(Debug, Clone)]
pub(crate) struct VuStateCell(Arc<AtomicU8>);

impl VuStateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(VuState::Idle as u8)))
    }

    pub(crate) fn get(&self) -> VuState {
        VuState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: VuState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// The scheduler's handle to a VU.
#[derive(Debug)]
pub(crate) struct VuHandle {
    id: String,
    shutdown: ShutdownHandle,
    state: VuStateCell,
    thread: Option<JoinHandle<()>>,
}

impl VuHandle {
    /// A handle with no thread behind it, used to drive the scheduler without starting VUs.
    #[cfg(test)]
    pub(crate) fn detached(id: String) -> Self {
        let handle = Self {
            id,
            shutdown: ShutdownHandle::new(),
            state: VuStateCell::new(),
            thread: None,
        };
        handle.state.set(VuState::Running);
        handle
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn state(&self) -> VuState {
        self.state.get()
    }

    /// Ask the VU to stop. It finishes its current request, within the graceful stop period, then
    /// runs its teardown.
    pub(crate) fn stop(&self) {
        self.shutdown.shutdown();
        if self.thread.is_none() {
            self.state.set(VuState::Stopped);
        }
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.shutdown.is_shutdown()
    }

    pub(crate) fn is_finished(&self) -> bool {
        match &self.thread {
            Some(thread) => thread.is_finished(),
            None => self.state() == VuState::Stopped,
        }
    }

    pub(crate) fn join(self) -> anyhow::Result<()> {
        match self.thread {
            Some(thread) => thread
                .join()
                .map_err(|e| anyhow::anyhow!("Error joining thread for VU {}: {:?}", self.id, e)),
            None => Ok(()),
        }
    }
}

/// The hooks each VU of a scenario runs.
pub(crate) struct VuHooks<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) setup: Option<VuHookMut<RV, V>>,
    pub(crate) behaviour: VuHookMut<RV, V>,
    pub(crate) teardown: Option<VuHookMut<RV, V>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Clone for VuHooks<RV, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Copy for VuHooks<RV, V> {}

/// Start a VU on its own thread. It keeps running iterations until [VuHandle::stop] is called,
/// its behaviour bails or its setup fails.
pub(crate) fn spawn_vu<RV: UserValuesConstraint, V: UserValuesConstraint>(
    vu_id: String,
    scenario_name: String,
    runner_context: Arc<RunnerContext<RV>>,
    hooks: VuHooks<RV, V>,
    think_time: Option<Duration>,
) -> anyhow::Result<VuHandle> {
    let shutdown = ShutdownHandle::new();
    let state = VuStateCell::new();

    let thread = {
        let thread_vu_id = vu_id.clone();
        let shutdown = shutdown.clone();
        let state = state.clone();
        std::thread::Builder::new()
            .name(vu_id.clone())
            .spawn(move || {
                let mut context = VuContext::new(
                    thread_vu_id,
                    scenario_name,
                    runner_context,
                    shutdown.new_listener(),
                );
                run_vu(&mut context, &shutdown, &state, hooks, think_time);
                state.set(VuState::Stopped);
            })
            .with_context(|| format!("Failed to spawn thread for VU {vu_id}"))?
    };

    Ok(VuHandle {
        id: vu_id,
        shutdown,
        state,
        thread: Some(thread),
    })
}

fn run_vu<RV: UserValuesConstraint, V: UserValuesConstraint>(
    context: &mut VuContext<RV, V>,
    shutdown: &ShutdownHandle,
    state: &VuStateCell,
    hooks: VuHooks<RV, V>,
    think_time: Option<Duration>,
) {
    let vu_id = context.vu_id().to_string();
    let scenario_name = context.scenario_name().to_string();
    let runner_context = context.runner_context().clone();
    let reporter = runner_context.reporter();

    // For us to check if the VU should stop between iterations, separate from the listener that
    // the hooks can wait on.
    let mut cycle_shutdown_listener = shutdown.new_listener();

    state.set(VuState::Running);
    log::debug!("Starting VU {vu_id}");

    if let Some(setup) = hooks.setup {
        if let Err(e) = setup(context) {
            log::error!("VU setup failed for VU {vu_id}: {e:?}");
            return;
        }
    }

    loop {
        if cycle_shutdown_listener.should_shutdown() {
            log::debug!("Stopping VU {vu_id}");
            break;
        }

        state.set(VuState::Running);
        match (hooks.behaviour)(context) {
            Ok(()) => {
                reporter.add_iteration(&scenario_name, true);
                reporter.add_check(&scenario_name, ITERATION_CHECK, true);
            }
            Err(e) if e.is::<ShutdownSignalError>() => {
                // Expected when the VU is stopped mid-iteration, the check at the top of the loop
                // will catch this and break out.
            }
            Err(e) if e.is::<VuBailError>() => {
                log::warn!("VU {vu_id} bailed: {e}");
                break;
            }
            Err(e) => {
                log::error!("VU behaviour failed for VU {vu_id}: {e:?}");
                reporter.add_iteration(&scenario_name, false);
                reporter.add_check(&scenario_name, ITERATION_CHECK, false);
            }
        }

        if let Some(think_time) = think_time {
            state.set(VuState::Sleeping);
            runner_context
                .executor()
                .sleep_or_shutdown(think_time, &mut cycle_shutdown_listener);
        }
    }

    if let Some(teardown) = hooks.teardown {
        if let Err(e) = teardown(context) {
            log::error!("VU teardown failed for VU {vu_id}: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use gale_instruments::ReportConfig;
    use url::Url;

    #[derive(Default, Debug)]
    struct Values {}

    impl UserValuesConstraint for Values {}

    fn runner_context() -> Arc<RunnerContext<Values>> {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let reporter = Arc::new(
            ReportConfig::new("run-1".to_string(), "vu".to_string())
                .init_reporter(runtime.handle())
                .unwrap(),
        );
        let shutdown = ShutdownHandle::new();
        let executor = Arc::new(Executor::new(runtime, shutdown.clone()));

        Arc::new(RunnerContext::new(
            executor,
            reporter,
            shutdown,
            "run-1".to_string(),
            Url::parse("http://localhost:8000").unwrap(),
            Duration::from_secs(1),
            Duration::from_secs(1),
        ))
    }

    #[test]
    fn state_round_trips_through_the_cell() {
        let cell = VuStateCell::new();
        assert_eq!(VuState::Idle, cell.get());

        for state in [VuState::Running, VuState::Sleeping, VuState::Stopped] {
            cell.set(state);
            assert_eq!(state, cell.get());
        }
    }

    #[test]
    fn only_running_and_sleeping_are_active() {
        assert!(!VuState::Idle.is_active());
        assert!(VuState::Running.is_active());
        assert!(VuState::Sleeping.is_active());
        assert!(!VuState::Stopped.is_active());
    }

    #[test]
    fn detached_handle_stops_immediately() {
        let handle = VuHandle::detached("products-vu-0".to_string());
        assert!(handle.state().is_active());
        assert!(!handle.is_finished());

        handle.stop();
        assert!(handle.is_stopping());
        assert!(handle.is_finished());
        assert_eq!(VuState::Stopped, handle.state());
        handle.join().unwrap();
    }

    #[test]
    fn spawned_vu_runs_on_its_own_thread_until_stopped() {
        fn behaviour(ctx: &mut VuContext<Values, Values>) -> anyhow::Result<()> {
            match std::thread::current().name() {
                Some(name) if name == ctx.vu_id() => Ok(()),
                other => Err(anyhow::anyhow!("running on thread {other:?}")),
            }
        }

        let runner_context = runner_context();
        let handle = spawn_vu(
            "products-vu-0".to_string(),
            "products".to_string(),
            runner_context.clone(),
            VuHooks::<Values, Values> {
                setup: None,
                behaviour,
                teardown: None,
            },
            Some(Duration::from_millis(10)),
        )
        .unwrap();
        assert_eq!("products-vu-0", handle.id());

        std::thread::sleep(Duration::from_millis(200));
        handle.stop();
        while !handle.is_finished() {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(VuState::Stopped, handle.state());
        handle.join().unwrap();

        let snapshot = runner_context.live_snapshot("products").unwrap();
        assert!(snapshot.iterations > 0);
        assert_eq!(0, snapshot.failed_iterations);
    }
}
