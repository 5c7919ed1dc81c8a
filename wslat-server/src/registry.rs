//! Registry of connected peers.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use wslat_core::clock;
use wslat_transport::Connection;

/// A connected peer.
#[derive(Debug, Clone)]
pub struct Peer {
    /// Connection handle.
    pub conn: Connection,
    /// Peer address.
    pub peer_addr: Option<SocketAddr>,
    /// Registration timestamp (nanos since epoch).
    pub connected_at: i64,
}

/// Tracks connected peers, keyed by connection id.
///
/// Broadcasts iterate a [`snapshot`](Self::snapshot), so peers added or
/// removed while a broadcast is in progress only affect later broadcasts.
///
/// Capacity covers both registered peers and handshakes still in flight
/// (see [`reserve`](Self::reserve)). Once [`close_all`](Self::close_all) has
/// run the registry refuses new peers.
pub struct PeerRegistry {
    peers: RwLock<HashMap<u64, Peer>>,
    pending: AtomicUsize,
    closed: AtomicBool,
}

impl PeerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            pending: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Claims a slot for a connection that is still upgrading.
    ///
    /// Returns `None` when registered peers plus outstanding reservations
    /// already reach `max`, or the registry is closed. The slot is released
    /// when the reservation is dropped, registered or not.
    #[must_use]
    pub fn reserve(self: &Arc<Self>, max: usize) -> Option<Reservation> {
        let peers = self.peers.write();
        if self.closed.load(Ordering::Acquire)
            || peers.len() + self.pending.load(Ordering::Acquire) >= max
        {
            return None;
        }
        self.pending.fetch_add(1, Ordering::AcqRel);
        Some(Reservation {
            registry: Arc::clone(self),
        })
    }

    /// Registers a connection and returns its id, or `None` if the registry
    /// has been closed.
    pub fn insert(&self, conn: Connection) -> Option<u64> {
        let id = conn.id();
        let peer = Peer {
            peer_addr: conn.peer_addr(),
            conn,
            connected_at: clock::now_nanos(),
        };
        let mut peers = self.peers.write();
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        peers.insert(id, peer);
        Some(id)
    }

    /// Removes a peer.
    pub fn remove(&self, id: u64) -> Option<Peer> {
        self.peers.write().remove(&id)
    }

    /// Gets a peer by id.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Peer> {
        self.peers.read().get(&id).cloned()
    }

    /// Returns the number of connected peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Returns true if no peer is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// Returns the connection handles of every current peer.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Connection> {
        self.peers.read().values().map(|p| p.conn.clone()).collect()
    }

    /// Returns the number of reserved slots not yet registered.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Removes and closes every peer, then refuses further inserts.
    /// Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Peer> = {
            let mut peers = self.peers.write();
            self.closed.store(true, Ordering::Release);
            peers.drain().map(|(_, p)| p).collect()
        };
        for peer in &drained {
            peer.conn.close();
        }
        drained.len()
    }
}

/// A capacity slot held while a connection completes its handshake.
pub struct Reservation {
    registry: Arc<PeerRegistry>,
}

impl Reservation {
    /// Registers the upgraded connection, releasing the slot.
    ///
    /// Returns `None` if the registry was closed meanwhile; the caller owns
    /// the connection and must close it.
    pub fn register(self, conn: Connection) -> Option<u64> {
        self.registry.insert(conn)
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.registry.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
