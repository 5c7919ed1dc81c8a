//! Push-model event broadcast.

use crate::registry::PeerRegistry;
use crate::stats::ServerStats;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use wslat_core::clock;
use wslat_core::protocol;
use wslat_core::{GenerationError, PushEvent, TickAction};

/// Generator action that sends one event to every registered peer.
///
/// Ticks with no peers are skipped without consuming a sequence number.
/// The event is stamped and serialized once per tick, right before the
/// fan-out.
pub struct Broadcaster {
    registry: Arc<PeerRegistry>,
    stats: Arc<ServerStats>,
    payload: String,
    next_sequence: AtomicU64,
}

impl Broadcaster {
    /// Creates a broadcaster sending payloads of `payload_size` bytes.
    #[must_use]
    pub fn new(registry: Arc<PeerRegistry>, stats: Arc<ServerStats>, payload_size: usize) -> Self {
        Self {
            registry,
            stats,
            payload: protocol::payload(payload_size),
            next_sequence: AtomicU64::new(1),
        }
    }
}

impl TickAction for Broadcaster {
    fn on_tick(&self, _tick: u64) -> Result<(), GenerationError> {
        let peers = self.registry.snapshot();
        if peers.is_empty() {
            return Ok(());
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let text = PushEvent::new(sequence, self.payload.clone(), clock::now_nanos()).encode()?;
        ServerStats::incr(&self.stats.events);

        let mut failed = 0usize;
        for peer in &peers {
            match peer.send_text(text.clone()) {
                Ok(()) => ServerStats::incr(&self.stats.sent),
                Err(e) => {
                    failed += 1;
                    ServerStats::incr(&self.stats.send_errors);
                    tracing::debug!("Event {} not sent to session {}: {}", sequence, peer.id(), e);
                }
            }
        }

        if failed > 0 {
            return Err(GenerationError::send_rejected(format!(
                "event {} rejected by {} of {} peers",
                sequence,
                failed,
                peers.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use wslat_transport::memory;
    use wslat_transport::{Connection, FrameHandler};

    #[derive(Default)]
    struct Collect {
        events: Mutex<Vec<PushEvent>>,
    }

    impl FrameHandler for Collect {
        fn on_frame(&self, _conn: &Connection, frame: &[u8]) {
            self.events.lock().push(PushEvent::decode(frame).unwrap());
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn client(registry: &PeerRegistry, id: u64) -> Arc<Collect> {
        let collect = Arc::new(Collect::default());
        let (server_side, _client_side) = memory::pair(id, Arc::new(Collect::default()), id + 100, collect.clone());
        registry.insert(server_side);
        collect
    }

    #[tokio::test]
    async fn test_skip_without_peers() {
        let registry = Arc::new(PeerRegistry::new());
        let stats = Arc::new(ServerStats::default());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&stats), 10);

        broadcaster.on_tick(0).unwrap();
        assert_eq!(stats.snapshot(0).events, 0);

        let peer = client(&registry, 1);
        broadcaster.on_tick(1).unwrap();
        settle().await;
        assert_eq!(peer.events.lock()[0].sequence(), 1);
    }

    #[tokio::test]
    async fn test_same_event_to_all_peers() {
        let registry = Arc::new(PeerRegistry::new());
        let stats = Arc::new(ServerStats::default());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&stats), 4);
        let a = client(&registry, 1);
        let b = client(&registry, 2);

        broadcaster.on_tick(0).unwrap();
        broadcaster.on_tick(1).unwrap();
        settle().await;

        let a = a.events.lock();
        let b = b.events.lock();
        assert_eq!(a.len(), 2);
        assert_eq!(*a, *b);
        assert_eq!(a[0].payload(), "ABCD");
        assert_eq!(a[1].sequence(), 2);
        assert!(a[1].server_send_ts() >= a[0].server_send_ts());
        assert_eq!(stats.snapshot(2).sent, 4);
    }

    #[tokio::test]
    async fn test_closed_peer_counted_not_fatal() {
        let registry = Arc::new(PeerRegistry::new());
        let stats = Arc::new(ServerStats::default());
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&stats), 0);
        let live = client(&registry, 1);
        let _gone = client(&registry, 2);
        registry.get(2).unwrap().conn.close();

        assert!(broadcaster.on_tick(0).is_err());
        settle().await;
        assert_eq!(live.events.lock().len(), 1);
        let snap = stats.snapshot(2);
        assert_eq!(snap.sent, 1);
        assert_eq!(snap.send_errors, 1);
    }
}
