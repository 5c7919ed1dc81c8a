//! Request-response echo.

use crate::stats::ServerStats;
use std::sync::Arc;
use wslat_core::clock;
use wslat_core::protocol;
use wslat_core::{ProtocolError, RttMessage};
use wslat_transport::Connection;

/// What the echo carries as payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EchoPayload {
    /// Return the request payload unchanged.
    #[default]
    Verbatim,
    /// Return the request payload, or a generated one of this size when the
    /// request payload is empty.
    FillEmpty(usize),
}

/// Stamps and echoes request-response messages.
pub struct EchoResponder {
    policy: EchoPayload,
    stats: Arc<ServerStats>,
}

impl EchoResponder {
    /// Creates a responder with the given payload policy.
    #[must_use]
    pub fn new(policy: EchoPayload, stats: Arc<ServerStats>) -> Self {
        Self { policy, stats }
    }

    /// Builds the reply text for a request received at `recv_ts`.
    ///
    /// # Errors
    /// Returns `ProtocolError` if the request is malformed or already
    /// carries server timestamps.
    pub fn reply(&self, frame: &[u8], recv_ts: i64) -> Result<String, ProtocolError> {
        let mut msg = RttMessage::decode(frame)?;
        msg.stamp_server_recv(recv_ts)?;

        if let EchoPayload::FillEmpty(size) = self.policy
            && msg.payload().is_empty()
        {
            msg.set_payload(protocol::payload(size));
        }

        msg.stamp_server_send(clock::now_nanos())?;
        msg.encode()
    }

    /// Answers one inbound frame on `conn`.
    pub fn respond(&self, conn: &Connection, frame: &[u8]) {
        let recv_ts = clock::now_nanos();
        let text = match self.reply(frame, recv_ts) {
            Ok(text) => text,
            Err(e) => {
                ServerStats::incr(&self.stats.parse_errors);
                tracing::warn!("Session {} sent an invalid request: {}", conn.id(), e);
                return;
            }
        };
        match conn.send_text(text) {
            Ok(()) => ServerStats::incr(&self.stats.sent),
            Err(e) => {
                ServerStats::incr(&self.stats.send_errors);
                tracing::debug!("Session {} reply dropped: {}", conn.id(), e);
            }
        }
    }
}
