//! Server counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters owned by one server instance.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub(crate) accepted: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) received: AtomicU64,
    pub(crate) sent: AtomicU64,
    pub(crate) parse_errors: AtomicU64,
    pub(crate) send_errors: AtomicU64,
    pub(crate) events: AtomicU64,
}

impl ServerStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self, active_peers: usize) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            active_peers,
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServerStatsSnapshot {
    /// Connections upgraded.
    pub accepted: u64,
    /// Connections refused at the connection limit.
    pub rejected: u64,
    /// Currently registered peers.
    pub active_peers: usize,
    /// Frames received.
    pub received: u64,
    /// Frames sent.
    pub sent: u64,
    /// Inbound frames discarded as malformed.
    pub parse_errors: u64,
    /// Outbound frames the transport refused.
    pub send_errors: u64,
    /// Push events generated.
    pub events: u64,
}
