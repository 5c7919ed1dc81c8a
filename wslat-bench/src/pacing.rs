//! Generator pacing accuracy.
//!
//! Runs a [`Generator`] with a no-op action, records when each tick fired
//! and reports how far the intervals drift from the nominal period.

use parking_lot::Mutex;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use wslat_core::clock;
use wslat_core::generator::period;
use wslat_core::{GenerationError, Generator, LatencyAggregator, Summary};

/// Result of one pacing measurement.
#[derive(Debug, Clone)]
pub struct PacingReport {
    /// Ticks that fired.
    pub ticks: u64,
    /// Ticks a perfect scheduler would have fired.
    pub expected: u64,
    /// Nominal tick period.
    pub period: Duration,
    /// Absolute deviation of each interval from the period, in nanoseconds.
    pub jitter: Summary,
}

impl PacingReport {
    /// Ratio of fired to expected ticks.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.expected == 0 {
            return 0.0;
        }
        self.ticks as f64 / self.expected as f64
    }
}

/// Runs the generator at `rate` for `duration` and measures its pacing.
pub async fn measure(rate: NonZeroU32, duration: Duration) -> PacingReport {
    let stamps = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&stamps);
    let generator = Generator::start(rate, move |_tick: u64| -> Result<(), GenerationError> {
        recorder.lock().push(clock::now_nanos());
        Ok(())
    });

    tokio::time::sleep(duration).await;
    generator.stop(Duration::from_secs(1)).await;

    let nominal = period(rate);
    let period_ns = nominal.as_nanos() as i64;
    let stamps = stamps.lock();
    let jitter = LatencyAggregator::with_capacity(0, stamps.len());
    for pair in stamps.windows(2) {
        jitter.add_sample((pair[1] - pair[0] - period_ns).abs());
    }

    PacingReport {
        ticks: stamps.len() as u64,
        expected: (duration.as_nanos() / nominal.as_nanos()) as u64,
        period: nominal,
        jitter: jitter.summarize(),
    }
}
