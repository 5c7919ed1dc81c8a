//! Latency aggregation with warm-up exclusion.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Percentile cut points reported in a [`Summary`].
pub const PERCENTILES: [f64; 4] = [0.10, 0.50, 0.90, 0.99];

/// Latency summary over the retained samples, in nanoseconds.
///
/// A summary with `count == 0` means "no data" and has every field zeroed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Retained sample count.
    pub count: usize,
    /// Minimum latency.
    pub min: i64,
    /// Maximum latency.
    pub max: i64,
    /// Arithmetic mean latency.
    pub mean: f64,
    /// 10th percentile latency.
    pub p10: i64,
    /// Median latency.
    pub p50: i64,
    /// 90th percentile latency.
    pub p90: i64,
    /// 99th percentile latency.
    pub p99: i64,
}

impl Summary {
    /// Returns true if the summary carries no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Nearest-rank percentile over an ascending slice.
///
/// The rank is `ceil(fraction * n)`, converted to an index and clamped to
/// the slice bounds. Returns 0 for an empty slice.
#[must_use]
pub fn nearest_rank(sorted: &[i64], fraction: f64) -> i64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (fraction * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

#[derive(Default)]
struct Inner {
    samples: Vec<i64>,
    processed: u64,
}

/// Accumulates latency samples for one measured quantity of one run.
///
/// The first `warmup` samples offered are counted but not retained. The
/// aggregator is shared between the contexts that deliver samples; every
/// call takes a short lock, so calls are linearizable.
pub struct LatencyAggregator {
    warmup: u64,
    inner: Mutex<Inner>,
}

impl LatencyAggregator {
    /// Creates an aggregator that skips the first `warmup` samples.
    #[must_use]
    pub fn new(warmup: u64) -> Self {
        Self {
            warmup,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Creates an aggregator with pre-allocated room for `capacity` samples.
    #[must_use]
    pub fn with_capacity(warmup: u64, capacity: usize) -> Self {
        Self {
            warmup,
            inner: Mutex::new(Inner {
                samples: Vec::with_capacity(capacity),
                processed: 0,
            }),
        }
    }

    /// Offers a sample. Returns `true` if it was retained, `false` if it fell
    /// inside the warm-up window.
    pub fn add_sample(&self, value: i64) -> bool {
        let mut inner = self.inner.lock();
        inner.processed += 1;
        if inner.processed <= self.warmup {
            return false;
        }
        inner.samples.push(value);
        true
    }

    /// Computes a summary from a sorted copy of the retained samples.
    #[must_use]
    pub fn summarize(&self) -> Summary {
        let mut sorted = self.inner.lock().samples.clone();
        if sorted.is_empty() {
            return Summary::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let total: i128 = sorted.iter().map(|&v| i128::from(v)).sum();
        let [p10, p50, p90, p99] = PERCENTILES.map(|f| nearest_rank(&sorted, f));

        Summary {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            mean: total as f64 / count as f64,
            p10,
            p50,
            p90,
            p99,
        }
    }

    /// Returns the number of retained samples.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.inner.lock().samples.len()
    }

    /// Returns the number of samples dropped as warm-up.
    #[must_use]
    pub fn skipped_count(&self) -> u64 {
        self.inner.lock().processed.min(self.warmup)
    }

    /// Returns the number of samples offered, retained or not.
    #[must_use]
    pub fn total_processed(&self) -> u64 {
        self.inner.lock().processed
    }

    /// Returns the configured warm-up threshold.
    #[must_use]
    pub fn warmup(&self) -> u64 {
        self.warmup
    }

    /// Clears samples and counters. Only meaningful between runs.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.samples.clear();
        inner.processed = 0;
    }
}

impl Default for LatencyAggregator {
    fn default() -> Self {
        Self::new(0)
    }
}
