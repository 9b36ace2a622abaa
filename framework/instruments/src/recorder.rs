use crate::outcome::RequestOutcome;
use crate::reservoir::{LatencyReservoir, DEFAULT_RESERVOIR_CAPACITY};
use crate::snapshot::{CheckTally, LatencyDistribution, MetricSnapshot};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An aggregate invariant was broken. This is a bug in the recorder, not in the target service.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("scenario [{scenario}] recorded {failures} failures for only {attempts} attempts")]
    FailuresExceedAttempts {
        scenario: String,
        failures: u64,
        attempts: u64,
    },
    #[error("scenario [{scenario}] recorded {failed} failed iterations for only {iterations} iterations")]
    FailedIterationsExceedIterations {
        scenario: String,
        failed: u64,
        iterations: u64,
    },
}

/// Request and failure counts summed over every scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveTotals {
    pub attempts: u64,
    pub failures: u64,
}

#[derive(Debug)]
struct ScenarioAggregate {
    attempts: AtomicU64,
    failures: AtomicU64,
    bytes_received: AtomicU64,
    iterations: AtomicU64,
    failed_iterations: AtomicU64,
    latency: Mutex<LatencyReservoir>,
    checks: Mutex<HashMap<String, CheckTally>>,
}

impl ScenarioAggregate {
    fn new(reservoir_capacity: usize) -> Self {
        Self {
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            failed_iterations: AtomicU64::new(0),
            latency: Mutex::new(LatencyReservoir::new(reservoir_capacity)),
            checks: Mutex::new(HashMap::new()),
        }
    }
}

/// Streaming per-scenario aggregates of request outcomes.
///
/// Recording is safe from any number of threads. Counters are atomics; the latency reservoir and
/// the check tallies each sit behind their own short critical section. Aggregation is associative
/// and commutative, so the counts in a snapshot do not depend on the order outcomes arrived in.
#[derive(Debug)]
pub struct MetricRecorder {
    scenarios: RwLock<HashMap<String, Arc<ScenarioAggregate>>>,
    reservoir_capacity: usize,
}

impl Default for MetricRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRecorder {
    pub fn new() -> Self {
        Self::with_reservoir_capacity(DEFAULT_RESERVOIR_CAPACITY)
    }

    pub fn with_reservoir_capacity(reservoir_capacity: usize) -> Self {
        Self {
            scenarios: RwLock::new(HashMap::new()),
            reservoir_capacity,
        }
    }

    fn aggregate(&self, scenario: &str) -> Arc<ScenarioAggregate> {
        if let Some(aggregate) = self.scenarios.read().get(scenario) {
            return aggregate.clone();
        }

        self.scenarios
            .write()
            .entry(scenario.to_string())
            .or_insert_with(|| Arc::new(ScenarioAggregate::new(self.reservoir_capacity)))
            .clone()
    }

    pub fn record(&self, outcome: &RequestOutcome) {
        let aggregate = self.aggregate(&outcome.scenario);

        // Attempts must be incremented before failures, see `snapshot`.
        aggregate.attempts.fetch_add(1, Ordering::SeqCst);
        if outcome.failed {
            aggregate.failures.fetch_add(1, Ordering::SeqCst);
        }
        aggregate
            .bytes_received
            .fetch_add(outcome.body_bytes, Ordering::Relaxed);

        let latency_ms = outcome.latency_ms();
        aggregate
            .latency
            .lock()
            .insert(latency_ms, &mut rand::thread_rng());
    }

    pub fn record_check(&self, scenario: &str, name: &str, passed: bool) {
        let aggregate = self.aggregate(scenario);
        let mut checks = aggregate.checks.lock();
        match checks.get_mut(name) {
            Some(tally) => tally.record(passed),
            None => {
                let mut tally = CheckTally::default();
                tally.record(passed);
                checks.insert(name.to_string(), tally);
            }
        }
    }

    pub fn record_iteration(&self, scenario: &str, completed: bool) {
        let aggregate = self.aggregate(scenario);
        aggregate.iterations.fetch_add(1, Ordering::SeqCst);
        if !completed {
            aggregate.failed_iterations.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Names of every scenario that has recorded something.
    pub fn scenarios(&self) -> Vec<String> {
        let mut names = self.scenarios.read().keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Cheap totals across all scenarios, for live display.
    pub fn totals(&self) -> LiveTotals {
        self.scenarios
            .read()
            .values()
            .fold(LiveTotals::default(), |mut acc, aggregate| {
                acc.failures += aggregate.failures.load(Ordering::Relaxed);
                acc.attempts += aggregate.attempts.load(Ordering::Relaxed);
                acc
            })
    }

    /// Aggregate view of `scenario` as of now. A scenario that has not recorded anything yields an
    /// empty snapshot.
    pub fn snapshot(&self, scenario: &str) -> Result<MetricSnapshot, AggregationError> {
        let Some(aggregate) = self.scenarios.read().get(scenario).cloned() else {
            return Ok(MetricSnapshot::empty(scenario));
        };

        // Read failures before attempts. `record` increments attempts first, so any failure seen
        // here has its attempt visible too and failures can only exceed attempts through a bug.
        let failures = aggregate.failures.load(Ordering::SeqCst);
        let attempts = aggregate.attempts.load(Ordering::SeqCst);
        if failures > attempts {
            return Err(AggregationError::FailuresExceedAttempts {
                scenario: scenario.to_string(),
                failures,
                attempts,
            });
        }

        let failed_iterations = aggregate.failed_iterations.load(Ordering::SeqCst);
        let iterations = aggregate.iterations.load(Ordering::SeqCst);
        if failed_iterations > iterations {
            return Err(AggregationError::FailedIterationsExceedIterations {
                scenario: scenario.to_string(),
                failed: failed_iterations,
                iterations,
            });
        }

        let (count, sum_ms, min_ms, max_ms, mut samples) = {
            let reservoir = aggregate.latency.lock();
            (
                reservoir.seen(),
                reservoir.sum_ms(),
                reservoir.min_ms(),
                reservoir.max_ms(),
                reservoir.samples().to_vec(),
            )
        };
        // Sort outside of the lock so recorders are not held up.
        samples.sort_by(f64::total_cmp);

        let checks = aggregate
            .checks
            .lock()
            .iter()
            .map(|(name, tally)| (name.clone(), *tally))
            .collect::<BTreeMap<_, _>>();

        Ok(MetricSnapshot {
            scenario: scenario.to_string(),
            attempts,
            failures,
            bytes_received: aggregate.bytes_received.load(Ordering::Relaxed),
            iterations,
            failed_iterations,
            latency: LatencyDistribution {
                count,
                min_ms,
                max_ms,
                mean_ms: (count > 0).then(|| sum_ms / count as f64),
                sorted_samples_ms: samples,
            },
            checks,
        })
    }

    /// Check the invariants of every scenario.
    pub fn verify(&self) -> Result<(), AggregationError> {
        for scenario in self.scenarios() {
            self.snapshot(&scenario)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{Method, OutcomeStatus, RequestRecord};
    use rand::seq::SliceRandom;
    use std::time::Duration;

    fn outcome(scenario: &str, status: u16, latency_ms: u64) -> RequestOutcome {
        let status = OutcomeStatus::Status(status);
        let failed = status.is_default_failure();
        RequestRecord::start(scenario, "vu-0", "/api/products", Method::Get).finish_with_latency(
            status,
            Duration::from_millis(latency_ms),
            10,
            failed,
        )
    }

    #[test]
    fn failure_rate_is_independent_of_recording_order() {
        let mut outcomes = (0..100)
            .map(|i| outcome("products", if i % 5 == 0 { 500 } else { 200 }, i))
            .collect::<Vec<_>>();

        let in_order = MetricRecorder::new();
        outcomes.iter().for_each(|o| in_order.record(o));

        outcomes.shuffle(&mut rand::thread_rng());
        let shuffled = MetricRecorder::new();
        outcomes.iter().for_each(|o| shuffled.record(o));

        let a = in_order.snapshot("products").unwrap();
        let b = shuffled.snapshot("products").unwrap();
        assert_eq!(Some(0.2), a.failure_rate());
        assert_eq!(a.failure_rate(), b.failure_rate());
        assert_eq!(a.attempts, b.attempts);
        assert_eq!(a.latency.sorted_samples_ms, b.latency.sorted_samples_ms);
    }

    #[test]
    fn scenarios_are_aggregated_separately() {
        let recorder = MetricRecorder::new();
        recorder.record(&outcome("products", 200, 5));
        recorder.record(&outcome("products", 200, 7));
        recorder.record(&outcome("inventory", 404, 9));

        let products = recorder.snapshot("products").unwrap();
        let inventory = recorder.snapshot("inventory").unwrap();

        assert_eq!(2, products.attempts);
        assert_eq!(0, products.failures);
        assert_eq!(20, products.bytes_received);
        assert_eq!(Some(6.0), products.latency.mean_ms);
        assert_eq!(1, inventory.attempts);
        assert_eq!(Some(1.0), inventory.failure_rate());
        assert_eq!(vec!["inventory", "products"], recorder.scenarios());
        assert_eq!(
            LiveTotals {
                attempts: 3,
                failures: 1
            },
            recorder.totals()
        );
    }

    #[test]
    fn unknown_scenario_is_empty() {
        let recorder = MetricRecorder::new();
        let snapshot = recorder.snapshot("missing").unwrap();
        assert_eq!(MetricSnapshot::empty("missing"), snapshot);
    }

    #[test]
    fn checks_and_iterations_are_tallied() {
        let recorder = MetricRecorder::new();
        recorder.record_check("products", "status OK", true);
        recorder.record_check("products", "status OK", false);
        recorder.record_check("products", "is array", true);
        recorder.record_iteration("products", true);
        recorder.record_iteration("products", false);

        let snapshot = recorder.snapshot("products").unwrap();
        assert_eq!(
            CheckTally {
                passes: 1,
                fails: 1
            },
            snapshot.checks["status OK"]
        );
        assert_eq!(1, snapshot.checks["is array"].passes);
        assert_eq!(2, snapshot.iterations);
        assert_eq!(1, snapshot.failed_iterations);
        assert!(recorder.verify().is_ok());
    }

    #[test]
    fn concurrent_recording_loses_no_updates() {
        let recorder = Arc::new(MetricRecorder::with_reservoir_capacity(100));
        let threads = (0..8)
            .map(|t| {
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    for i in 0..5_000 {
                        let status = if (t + i) % 10 == 0 { 503 } else { 200 };
                        recorder.record(&outcome("products", status, (i % 50) as u64));
                        recorder.record_iteration("products", status == 200);
                    }
                })
            })
            .collect::<Vec<_>>();

        // Snapshots taken while recording is in progress must always hold the invariants.
        for _ in 0..100 {
            recorder.snapshot("products").unwrap();
        }

        for thread in threads {
            thread.join().unwrap();
        }

        let snapshot = recorder.snapshot("products").unwrap();
        assert_eq!(40_000, snapshot.attempts);
        assert_eq!(4_000, snapshot.failures);
        assert_eq!(40_000, snapshot.latency.count);
        assert_eq!(100, snapshot.latency.sorted_samples_ms.len());
        assert_eq!(40_000, snapshot.iterations);
        assert_eq!(4_000, snapshot.failed_iterations);
    }
}
