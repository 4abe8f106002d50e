//! Accumulated timings of a kernel

/// One timed kernel pass
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Sample {
    /// Wall time of the pass
    pub seconds: f64,

    /// Timestamp counter ticks spent in the pass
    pub cycles: u64,
}

/// The results of every recorded pass of one kernel
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct KernelStats {
    /// Number of passes recorded
    pub count: u64,

    /// Total time the passes took
    pub total_time: f64,

    /// The longest pass
    pub max_time: f64,

    /// The shortest pass
    pub min_time: f64,

    /// Fewest timestamp counter ticks of any pass
    pub min_cycles: u64,
}

impl Default for KernelStats {
    fn default() -> Self {
        Self {
            count: 0,
            total_time: 0.0,
            max_time: 0.0,
            min_time: f64::MAX,
            min_cycles: u64::MAX,
        }
    }
}

impl KernelStats {
    pub fn record(&mut self, sample: Sample) {
        self.count += 1;
        self.total_time += sample.seconds;

        if sample.seconds < self.min_time {
            self.min_time = sample.seconds;
        }

        if sample.seconds > self.max_time {
            self.max_time = sample.seconds;
        }

        self.min_cycles = self.min_cycles.min(sample.cycles);
    }

    /// Mean time per pass, zero when nothing was recorded
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_time(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }

        self.total_time / self.count as f64
    }

    /// Best observed rate in MB/s (10^6 bytes) for `bytes` moved per pass
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn best_rate_mbs(&self, bytes: u64) -> f64 {
        if self.count == 0 || self.min_time <= 0.0 {
            return 0.0;
        }

        1.0e-6 * bytes as f64 / self.min_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut stats = KernelStats::default();
        assert_eq!(stats.avg_time(), 0.0);
        assert_eq!(stats.best_rate_mbs(1000), 0.0);

        for (seconds, cycles) in [(0.2, 200), (0.1, 120), (0.3, 90)] {
            stats.record(Sample { seconds, cycles });
        }

        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_time, 0.1);
        assert_eq!(stats.max_time, 0.3);
        assert_eq!(stats.min_cycles, 90);
        assert!((stats.avg_time() - 0.2).abs() < 1e-12);
        assert!((stats.best_rate_mbs(24_000_000) - 240.0).abs() < 1e-9);
    }
}
