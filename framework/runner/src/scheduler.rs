use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use crate::config::ScenarioSpec;
use crate::vu::VuHandle;

/// The VUs the scheduler has started for one scenario, oldest first.
#[derive(Debug)]
pub(crate) struct ScenarioPool {
    name: String,
    active: VecDeque<VuHandle>,
    retired: Vec<VuHandle>,
    next_index: usize,
    peak: usize,
}

impl ScenarioPool {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            active: VecDeque::new(),
            retired: Vec::new(),
            next_index: 0,
            peak: 0,
        }
    }

    /// Start or stop VUs until `desired` are assigned to this scenario. The oldest VUs are stopped
    /// first.
    ///
    /// A VU that stopped by itself, because it bailed or its setup failed, keeps its slot until the
    /// scheduler would have stopped it anyway. It is not replaced.
    pub(crate) fn reconcile(
        &mut self,
        desired: usize,
        launch: &mut impl FnMut(String) -> anyhow::Result<VuHandle>,
    ) -> anyhow::Result<()> {
        while self.active.len() > desired {
            let Some(vu) = self.active.pop_front() else {
                break;
            };
            log::debug!("Stopping VU {} of scenario {}", vu.id(), self.name);
            vu.stop();
            self.retired.push(vu);
        }

        while self.active.len() < desired {
            let vu_id = format!("{}-vu-{}", self.name, self.next_index);
            self.next_index += 1;
            self.active.push_back(launch(vu_id)?);
        }

        self.peak = self.peak.max(self.active.len());
        Ok(())
    }

    /// VUs that are running or sleeping and have not been told to stop.
    pub(crate) fn live_count(&self) -> usize {
        self.active
            .iter()
            .filter(|vu| vu.state().is_active() && !vu.is_stopping())
            .count()
    }

    #[cfg(test)]
    fn assigned(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak
    }

    pub(crate) fn stop_all(&mut self) {
        while let Some(vu) = self.active.pop_front() {
            vu.stop();
            self.retired.push(vu);
        }
    }

    fn into_handles(mut self) -> Vec<VuHandle> {
        self.stop_all();
        self.retired
    }
}

/// Drives the number of VUs in every scenario towards what its [ScenarioSpec] asks for.
///
/// The scheduler itself has no clock. The caller passes the time elapsed since the start of the run
/// to [Scheduler::reconcile] on every tick.
#[derive(Debug)]
pub(crate) struct Scheduler {
    scenarios: Vec<(ScenarioSpec, ScenarioPool)>,
    tick_interval: Duration,
    run_duration: Duration,
}

impl Scheduler {
    pub(crate) fn new(scenarios: Vec<ScenarioSpec>, tick_interval: Duration) -> Self {
        let run_duration = scenarios
            .iter()
            .map(ScenarioSpec::duration)
            .max()
            .unwrap_or_default();

        Self {
            scenarios: scenarios
                .into_iter()
                .map(|spec| {
                    let pool = ScenarioPool::new(&spec.name);
                    (spec, pool)
                })
                .collect(),
            tick_interval,
            run_duration,
        }
    }

    pub(crate) fn reconcile(
        &mut self,
        elapsed: Duration,
        launch: &mut impl FnMut(&ScenarioSpec, String) -> anyhow::Result<VuHandle>,
    ) -> anyhow::Result<()> {
        for (spec, pool) in self.scenarios.iter_mut() {
            let spec = &*spec;
            let desired = spec.desired_vus(elapsed);
            pool.reconcile(desired, &mut |vu_id| launch(spec, vu_id))?;
        }
        Ok(())
    }

    /// Whether every scenario has reached the end of its duration.
    pub(crate) fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.run_duration
    }

    /// How long to wait before the next tick. Never sleeps past the end of a scenario, so that
    /// scenarios stop on time even with a long tick interval.
    pub(crate) fn next_tick_in(&self, elapsed: Duration) -> Duration {
        self.scenarios
            .iter()
            .map(|(spec, _)| spec.duration())
            .filter(|end| *end > elapsed)
            .map(|end| end - elapsed)
            .fold(self.tick_interval, Duration::min)
    }

    pub(crate) fn live_vus(&self) -> usize {
        self.scenarios.iter().map(|(_, pool)| pool.live_count()).sum()
    }

    pub(crate) fn peaks(&self) -> BTreeMap<String, usize> {
        self.scenarios
            .iter()
            .map(|(spec, pool)| (spec.name.clone(), pool.peak()))
            .collect()
    }

    pub(crate) fn stop_all(&mut self) {
        for (_, pool) in &mut self.scenarios {
            pool.stop_all();
        }
    }

    pub(crate) fn into_handles(self) -> Vec<VuHandle> {
        self.scenarios
            .into_iter()
            .flat_map(|(_, pool)| pool.into_handles())
            .collect()
    }

    #[cfg(test)]
    fn assigned(&self, scenario: &str) -> usize {
        self.scenarios
            .iter()
            .find(|(spec, _)| spec.name == scenario)
            .map(|(_, pool)| pool.assigned())
            .unwrap_or_default()
    }
}
