use crate::reservoir::percentile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Percentiles included in every summary, in addition to any used by thresholds.
pub const REPORTED_PERCENTILES: [f64; 4] = [50.0, 90.0, 95.0, 99.0];

/// Pass/fail tally for a named check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTally {
    pub passes: u64,
    pub fails: u64,
}

impl CheckTally {
    pub fn record(&mut self, passed: bool) {
        if passed {
            self.passes += 1;
        } else {
            self.fails += 1;
        }
    }
}

/// Latency distribution for one scenario at the time of a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyDistribution {
    /// Number of latencies recorded, including ones evicted from the reservoir.
    pub count: u64,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub mean_ms: Option<f64>,
    /// Reservoir samples in ascending order.
    pub sorted_samples_ms: Vec<f64>,
}

impl LatencyDistribution {
    /// Build an exact distribution from raw samples.
    pub fn from_samples(mut samples_ms: Vec<f64>) -> Self {
        samples_ms.sort_by(f64::total_cmp);
        let count = samples_ms.len() as u64;
        let sum: f64 = samples_ms.iter().sum();

        Self {
            count,
            min_ms: samples_ms.first().copied(),
            max_ms: samples_ms.last().copied(),
            mean_ms: (count > 0).then(|| sum / count as f64),
            sorted_samples_ms: samples_ms,
        }
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        percentile(&self.sorted_samples_ms, p)
    }
}

/// Read-only aggregate view of one scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    pub scenario: String,
    pub attempts: u64,
    pub failures: u64,
    pub bytes_received: u64,
    pub iterations: u64,
    pub failed_iterations: u64,
    pub latency: LatencyDistribution,
    pub checks: BTreeMap<String, CheckTally>,
}

impl MetricSnapshot {
    /// Snapshot of a scenario that has not recorded anything.
    pub fn empty(scenario: &str) -> Self {
        Self {
            scenario: scenario.to_string(),
            attempts: 0,
            failures: 0,
            bytes_received: 0,
            iterations: 0,
            failed_iterations: 0,
            latency: LatencyDistribution::default(),
            checks: BTreeMap::new(),
        }
    }

    /// Failed attempts over all attempts, or `None` if nothing was attempted.
    pub fn failure_rate(&self) -> Option<f64> {
        (self.attempts > 0).then(|| self.failures as f64 / self.attempts as f64)
    }

    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.latency.percentile(p)
    }

    /// The [REPORTED_PERCENTILES], keyed as `p(95)`.
    pub fn percentiles(&self) -> BTreeMap<String, f64> {
        REPORTED_PERCENTILES
            .iter()
            .filter_map(|p| Some((format!("p({p})"), self.percentile(*p)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_no_failure_rate() {
        let snapshot = MetricSnapshot::empty("products");
        assert_eq!(None, snapshot.failure_rate());
        assert_eq!(None, snapshot.percentile(95.0));
        assert!(snapshot.percentiles().is_empty());
    }

    #[test]
    fn distribution_from_unsorted_samples() {
        let distribution = LatencyDistribution::from_samples(vec![30.0, 10.0, 20.0]);

        assert_eq!(3, distribution.count);
        assert_eq!(Some(10.0), distribution.min_ms);
        assert_eq!(Some(30.0), distribution.max_ms);
        assert_eq!(Some(20.0), distribution.mean_ms);
        assert_eq!(Some(20.0), distribution.percentile(50.0));
    }

    #[test]
    fn reported_percentile_keys() {
        let mut snapshot = MetricSnapshot::empty("products");
        snapshot.latency = LatencyDistribution::from_samples((1..=100).map(f64::from).collect());

        let keys = snapshot.percentiles().into_keys().collect::<Vec<_>>();
        assert_eq!(vec!["p(50)", "p(90)", "p(95)", "p(99)"], keys);
    }
}
