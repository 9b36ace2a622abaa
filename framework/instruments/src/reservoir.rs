use rand::Rng;

/// Number of latency samples kept per scenario.
pub const DEFAULT_RESERVOIR_CAPACITY: usize = 10_000;

/// Fixed-size uniform sample of latencies (Algorithm R).
///
/// Until `capacity` samples have been seen every sample is kept, so percentiles are exact. After
/// that each new sample replaces a random slot with probability `capacity / seen`, which keeps the
/// reservoir a uniform sample of everything seen so far. Count, sum, min and max are tracked
/// exactly regardless of eviction.
#[derive(Debug, Clone)]
pub struct LatencyReservoir {
    capacity: usize,
    seen: u64,
    samples: Vec<f64>,
    sum_ms: f64,
    min_ms: f64,
    max_ms: f64,
}

impl Default for LatencyReservoir {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVOIR_CAPACITY)
    }
}

impl LatencyReservoir {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: 0,
            samples: Vec::with_capacity(capacity.min(1024)),
            sum_ms: 0.0,
            min_ms: f64::INFINITY,
            max_ms: f64::NEG_INFINITY,
        }
    }

    pub fn insert<R: Rng + ?Sized>(&mut self, latency_ms: f64, rng: &mut R) {
        self.seen += 1;
        self.sum_ms += latency_ms;
        self.min_ms = self.min_ms.min(latency_ms);
        self.max_ms = self.max_ms.max(latency_ms);

        if self.samples.len() < self.capacity {
            self.samples.push(latency_ms);
        } else {
            let slot = rng.gen_range(0..self.seen);
            if (slot as usize) < self.capacity {
                self.samples[slot as usize] = latency_ms;
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples offered to the reservoir, including evicted ones.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sum_ms(&self) -> f64 {
        self.sum_ms
    }

    pub fn min_ms(&self) -> Option<f64> {
        (self.seen > 0).then_some(self.min_ms)
    }

    pub fn max_ms(&self) -> Option<f64> {
        (self.seen > 0).then_some(self.max_ms)
    }

    /// The kept samples, in no particular order.
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Copy of the kept samples in ascending order.
    pub fn sorted_samples(&self) -> Vec<f64> {
        let mut samples = self.samples.clone();
        samples.sort_by(f64::total_cmp);
        samples
    }
}

/// The `p`th percentile of `sorted`, interpolating linearly between the two closest order
/// statistics. `sorted` must be in ascending order and `p` in `[0, 100]`.
///
/// Returns `None` for an empty input.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (p.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn one_to_hundred() -> Vec<f64> {
        (1..=100).map(|v| v as f64).collect()
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let samples = one_to_hundred();

        assert_eq!(Some(1.0), percentile(&samples, 0.0));
        assert_eq!(Some(100.0), percentile(&samples, 100.0));
        assert!((percentile(&samples, 50.0).unwrap() - 50.5).abs() < 1e-9);
        assert!((percentile(&samples, 95.0).unwrap() - 95.05).abs() < 1e-9);
        assert!((percentile(&samples, 99.0).unwrap() - 99.01).abs() < 1e-9);
    }

    #[test]
    fn percentile_of_single_sample() {
        assert_eq!(Some(42.0), percentile(&[42.0], 95.0));
    }

    #[test]
    fn percentile_of_nothing() {
        assert_eq!(None, percentile(&[], 95.0));
    }

    #[test]
    fn keeps_everything_below_capacity() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut reservoir = LatencyReservoir::new(200);
        for v in one_to_hundred().into_iter().rev() {
            reservoir.insert(v, &mut rng);
        }

        assert_eq!(100, reservoir.seen());
        assert_eq!(one_to_hundred(), reservoir.sorted_samples());
        assert_eq!(Some(1.0), reservoir.min_ms());
        assert_eq!(Some(100.0), reservoir.max_ms());
        assert_eq!(5050.0, reservoir.sum_ms());
    }

    #[test]
    fn memory_stays_bounded_above_capacity() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut reservoir = LatencyReservoir::new(1_000);
        for i in 0..50_000 {
            reservoir.insert((i % 1_000) as f64, &mut rng);
        }

        assert_eq!(1_000, reservoir.len());
        assert_eq!(50_000, reservoir.seen());
        assert_eq!(Some(0.0), reservoir.min_ms());
        assert_eq!(Some(999.0), reservoir.max_ms());
    }

    #[test]
    fn sampled_percentile_stays_close_to_true_value() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut reservoir = LatencyReservoir::new(DEFAULT_RESERVOIR_CAPACITY);
        // Uniform over [0, 1000), so the true p95 is ~950.
        for i in 0..200_000u64 {
            reservoir.insert((i % 1_000) as f64, &mut rng);
        }

        let p95 = percentile(&reservoir.sorted_samples(), 95.0).unwrap();
        assert!(
            (p95 - 949.05).abs() < 949.05 * 0.01,
            "p95 estimate {p95} drifted more than 1% from the true value"
        );
    }
}
