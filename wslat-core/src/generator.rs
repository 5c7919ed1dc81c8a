//! Rate-controlled tick generator.
//!
//! A [`Generator`] invokes a [`TickAction`] at a fixed rate on its own task.
//! Ticks are scheduled from the start of the schedule rather than from the
//! end of the previous tick, so the execution time of an action never
//! accumulates as drift. Ticks that fall behind are caught up in a burst.

use crate::error::GenerationError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Work performed on every tick.
///
/// Implementations must not block: they build one unit of work and enqueue
/// it. A returned error is logged and counted, and the schedule continues.
pub trait TickAction: Send + Sync + 'static {
    /// Performs the work for tick number `tick` (starting at 0).
    ///
    /// # Errors
    /// Returns `GenerationError` if the unit of work could not be produced
    /// or handed off.
    fn on_tick(&self, tick: u64) -> Result<(), GenerationError>;
}

impl<F> TickAction for F
where
    F: Fn(u64) -> Result<(), GenerationError> + Send + Sync + 'static,
{
    fn on_tick(&self, tick: u64) -> Result<(), GenerationError> {
        self(tick)
    }
}

/// Generator counters.
#[derive(Debug, Default)]
pub struct GeneratorStats {
    ticks: AtomicU64,
    failures: AtomicU64,
}

impl GeneratorStats {
    /// Takes a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> GeneratorSnapshot {
        GeneratorSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GeneratorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSnapshot {
    /// Actions invoked.
    pub ticks: u64,
    /// Actions that returned an error.
    pub failures: u64,
}

/// Returns the tick period for `rate` ticks per second.
#[must_use]
pub fn period(rate: NonZeroU32) -> Duration {
    Duration::from_nanos((1_000_000_000 / u64::from(rate.get())).max(1))
}

/// A running tick schedule.
///
/// Dropping the generator cancels the schedule without waiting.
pub struct Generator {
    rate: NonZeroU32,
    stats: Arc<GeneratorStats>,
    stopped: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Generator {
    /// Starts invoking `action` at `rate` ticks per second, beginning
    /// immediately.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start<A: TickAction>(rate: NonZeroU32, action: A) -> Self {
        let stats = Arc::new(GeneratorStats::default());
        let stopped = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_schedule(
            period(rate),
            action,
            Arc::clone(&stats),
            Arc::clone(&stopped),
            cancel.clone(),
        ));

        tracing::debug!("Generator started at {} ticks/s", rate);

        Self {
            rate,
            stats,
            stopped,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Returns the configured rate.
    #[must_use]
    pub fn rate(&self) -> NonZeroU32 {
        self.rate
    }

    /// Returns true until [`stop`](Self::stop) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Returns the counters.
    #[must_use]
    pub fn snapshot(&self) -> GeneratorSnapshot {
        self.stats.snapshot()
    }

    /// Stops the schedule.
    ///
    /// No action starts after this returns. Waits at most `grace` for an
    /// in-flight action before aborting the scheduler task. Idempotent;
    /// returns `false` only if this call had to abort.
    pub async fn stop(&self, grace: Duration) -> bool {
        self.stopped.store(true, Ordering::Release);
        self.cancel.cancel();

        let Some(mut task) = self.task.lock().take() else {
            return true;
        };

        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => {
                tracing::debug!("Generator stopped after {} ticks", self.snapshot().ticks);
                true
            }
            Ok(Err(e)) => {
                tracing::warn!("Generator task ended abnormally: {}", e);
                true
            }
            Err(_) => {
                tracing::warn!("Generator did not stop within {:?}, aborting", grace);
                task.abort();
                false
            }
        }
    }
}

impl Drop for Generator {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.cancel.cancel();
    }
}

async fn run_schedule<A: TickAction>(
    period: Duration,
    action: A,
    stats: Arc<GeneratorStats>,
    stopped: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
    let mut tick = 0u64;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            _ = interval.tick() => {
                if stopped.load(Ordering::Acquire) {
                    break;
                }
                stats.ticks.fetch_add(1, Ordering::Relaxed);
                if let Err(e) = action.on_tick(tick) {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("Tick {} failed: {}", tick, e);
                }
                tick += 1;
            }
        }
    }
}
