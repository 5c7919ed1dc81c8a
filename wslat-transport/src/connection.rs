//! Transport-neutral connection handle and callbacks.

use crate::error::TransportError;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// An application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text.
    Text(String),
    /// Opaque bytes.
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns the frame body.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the body length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inbound callbacks, invoked from the connection's own task.
///
/// Frames of one connection are delivered in order, one at a time.
/// Implementations must not block.
pub trait FrameHandler: Send + Sync + 'static {
    /// Called for every inbound application frame.
    fn on_frame(&self, conn: &Connection, frame: &[u8]);

    /// Called once when the connection ends, whichever side closed it.
    fn on_close(&self, _conn: &Connection) {}
}

/// Opens client connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `url`, delivering inbound frames to `handler`.
    ///
    /// # Errors
    /// Returns `TransportError` if the endpoint is unreachable or the
    /// handshake fails.
    async fn connect(
        &self,
        url: &str,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Connection, TransportError>;
}

struct Inner {
    id: u64,
    peer_addr: Option<SocketAddr>,
    tx: mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

/// Cheaply cloneable handle to one live connection.
///
/// Sends are non-blocking: frames are queued to the connection task and
/// written in order.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    pub(crate) fn new(
        id: u64,
        peer_addr: Option<SocketAddr>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            inner: Arc::new(Inner {
                id,
                peer_addr,
                tx,
                cancel,
                closed: AtomicBool::new(false),
            }),
        };
        (conn, rx)
    }

    /// Returns the connection id, unique per listener or connector.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns the remote address, if known.
    #[must_use]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.peer_addr
    }

    /// Queues a frame for sending.
    ///
    /// # Errors
    /// Returns `TransportError::ConnectionClosed` once the connection is
    /// closed.
    pub fn send(&self, frame: Frame) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }
        self.inner
            .tx
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Queues a text frame.
    ///
    /// # Errors
    /// Returns `TransportError::ConnectionClosed` once the connection is
    /// closed.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(Frame::Text(text.into()))
    }

    /// Starts a graceful close. Idempotent.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Connection {} closing", self.inner.id);
        }
        self.inner.cancel.cancel();
    }

    /// Returns true once the connection is closed or closing.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub(crate) fn mark_closed(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
