//! Per-connection server callbacks.

use crate::echo::EchoResponder;
use crate::registry::PeerRegistry;
use crate::stats::ServerStats;
use std::sync::Arc;
use wslat_transport::{Connection, FrameHandler};

/// Handles frames and disconnects for every accepted connection.
///
/// In request-response mode frames are echoed; in push mode the server only
/// transmits, so inbound frames are counted and dropped.
pub struct PeerHandler {
    registry: Arc<PeerRegistry>,
    stats: Arc<ServerStats>,
    echo: Option<EchoResponder>,
}

impl PeerHandler {
    /// Creates a handler. `echo` is `None` for push mode.
    #[must_use]
    pub fn new(
        registry: Arc<PeerRegistry>,
        stats: Arc<ServerStats>,
        echo: Option<EchoResponder>,
    ) -> Self {
        Self {
            registry,
            stats,
            echo,
        }
    }
}

impl FrameHandler for PeerHandler {
    fn on_frame(&self, conn: &Connection, frame: &[u8]) {
        ServerStats::incr(&self.stats.received);
        match &self.echo {
            Some(echo) => echo.respond(conn, frame),
            None => tracing::trace!("Session {} sent {} bytes, ignored", conn.id(), frame.len()),
        }
    }

    fn on_close(&self, conn: &Connection) {
        if self.registry.remove(conn.id()).is_some() {
            tracing::info!("Session {} disconnected", conn.id());
        }
    }
}
