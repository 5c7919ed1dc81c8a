//! Single-fire completion signal for a measurement run.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

/// Why a run left the `Running` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The configured duration elapsed.
    DurationElapsed,
    /// An external stop was requested.
    Stopped,
    /// The early-stop sample threshold was reached.
    EarlyStop,
    /// The transport closed the connection.
    TransportClosed,
}

impl std::fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DurationElapsed => "duration elapsed",
            Self::Stopped => "stopped",
            Self::EarlyStop => "early stop",
            Self::TransportClosed => "transport closed",
        };
        f.write_str(s)
    }
}

/// A cloneable, single-fire notification.
///
/// The first [`trigger`](Self::trigger) wins and fixes the reason; later
/// triggers are ignored. Waiters observe the signal even if it fired before
/// they started waiting.
#[derive(Debug, Clone)]
pub struct CompletionSignal {
    tx: watch::Sender<Option<CompletionReason>>,
}

impl CompletionSignal {
    /// Creates an unfired signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Fires the signal. Returns `true` if this call was the one that fired it.
    pub fn trigger(&self, reason: CompletionReason) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(reason);
            true
        })
    }

    /// Returns the reason, if fired.
    #[must_use]
    pub fn reason(&self) -> Option<CompletionReason> {
        *self.tx.borrow()
    }

    /// Returns true once fired.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.reason().is_some()
    }

    /// Waits until the signal fires.
    pub async fn wait(&self) -> CompletionReason {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(reason) = *rx.borrow_and_update() {
                return reason;
            }
            // The sender lives in `self`, so the channel cannot close here.
            if rx.changed().await.is_err() {
                return CompletionReason::Stopped;
            }
        }
    }

    /// Waits up to `timeout`. Returns `None` if it elapsed first.
    pub async fn wait_timeout(&self, timeout: Duration) -> Option<CompletionReason> {
        tokio::time::timeout(timeout, self.wait()).await.ok()
    }
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_trigger_wins() {
        let signal = CompletionSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger(CompletionReason::EarlyStop));
        assert!(!signal.trigger(CompletionReason::Stopped));
        assert_eq!(signal.reason(), Some(CompletionReason::EarlyStop));
    }

    #[tokio::test]
    async fn test_wait_after_trigger() {
        let signal = CompletionSignal::new();
        signal.trigger(CompletionReason::TransportClosed);
        assert_eq!(signal.wait().await, CompletionReason::TransportClosed);
    }

    #[tokio::test]
    async fn test_wait_from_other_task() {
        let signal = CompletionSignal::new();
        let remote = signal.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            remote.trigger(CompletionReason::Stopped);
        });
        assert_eq!(signal.wait().await, CompletionReason::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_elapses() {
        let signal = CompletionSignal::new();
        assert_eq!(signal.wait_timeout(Duration::from_millis(50)).await, None);
        assert!(!signal.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_fires() {
        let signal = CompletionSignal::new();
        let remote = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.trigger(CompletionReason::EarlyStop);
        });
        assert_eq!(
            signal.wait_timeout(Duration::from_secs(1)).await,
            Some(CompletionReason::EarlyStop)
        );
    }

    #[test]
    fn test_reason_serializes_snake_case() {
        let json = serde_json::to_string(&CompletionReason::DurationElapsed).unwrap();
        assert_eq!(json, "\"duration_elapsed\"");
    }
}
