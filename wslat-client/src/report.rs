//! Run counters and the final report.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use wslat_core::{CompletionReason, GeneratorSnapshot, Model, Summary};

/// Message counters owned by one run.
#[derive(Debug, Default)]
pub struct RunCounters {
    pub(crate) sent: AtomicU64,
    pub(crate) received: AtomicU64,
    pub(crate) parse_errors: AtomicU64,
    pub(crate) send_errors: AtomicU64,
    pub(crate) unmatched: AtomicU64,
}

impl RunCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RunCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountersSnapshot {
    /// Requests handed to the transport.
    pub sent: u64,
    /// Frames received.
    pub received: u64,
    /// Frames discarded as malformed.
    pub parse_errors: u64,
    /// Requests the transport refused.
    pub send_errors: u64,
    /// Replies belonging to another run.
    pub unmatched: u64,
}

/// Outcome of a completed run. Latencies are in nanoseconds.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Identifier stamped into this run's message ids.
    pub run_id: String,
    /// Interaction model.
    pub model: Model,
    /// What ended the run.
    pub reason: CompletionReason,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Time from connect to completion.
    #[serde(rename = "elapsed_secs", serialize_with = "secs_f64")]
    pub elapsed: Duration,
    /// Configured warm-up count.
    pub warmup: u64,
    /// Warm-up samples excluded from the primary summary.
    pub skipped: u64,
    /// One-way latency, server send to client receipt.
    pub one_way: Summary,
    /// Round-trip time; request-response runs only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt: Option<Summary>,
    /// Server receipt-to-echo time; request-response runs only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_processing: Option<Summary>,
    /// Message counters.
    pub counters: CountersSnapshot,
    /// Generator counters, if this side generated traffic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorSnapshot>,
}

impl RunReport {
    /// Returns the summary the run is named after: RTT for request-response
    /// runs, one-way latency for push runs.
    #[must_use]
    pub fn primary(&self) -> &Summary {
        self.rtt.as_ref().unwrap_or(&self.one_way)
    }
}

fn secs_f64<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
