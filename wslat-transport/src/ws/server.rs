//! WebSocket listener.

use super::driver;
use crate::connection::{Connection, FrameHandler};
use crate::error::TransportError;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_util::sync::CancellationToken;

/// Default upgrade path.
pub const DEFAULT_PATH: &str = "/ws";

/// Configuration for the WebSocket listener.
#[derive(Debug, Clone)]
pub struct WsServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Required request path; `None` accepts any path.
    pub path: Option<String>,
    /// Upper bound on the upgrade handshake.
    pub handshake_timeout: Duration,
    /// Enable TCP_NODELAY.
    pub tcp_nodelay: bool,
    /// Maximum inbound message size in bytes.
    pub max_message_size: Option<usize>,
}

impl Default for WsServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 10443)),
            path: Some(DEFAULT_PATH.to_string()),
            handshake_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
            max_message_size: Some(16 * 1024 * 1024),
        }
    }
}

impl WsServerConfig {
    /// Creates a new server config with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Sets the required upgrade path.
    #[must_use]
    pub fn path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    /// Sets the handshake timeout.
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets TCP_NODELAY option.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

/// Accepts WebSocket connections.
pub struct WsListener {
    listener: TcpListener,
    config: Arc<WsServerConfig>,
    next_id: AtomicU64,
}

impl WsListener {
    /// Binds to the configured address.
    ///
    /// # Errors
    /// Returns IO error if binding fails.
    pub async fn bind(config: WsServerConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        Ok(Self {
            listener,
            config: Arc::new(config),
            next_id: AtomicU64::new(1),
        })
    }

    /// Returns the bound address.
    ///
    /// # Errors
    /// Returns IO error if the address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts the next TCP connection. The upgrade happens separately in
    /// [`Incoming::upgrade`] so a slow handshake never blocks the accept
    /// loop.
    ///
    /// # Errors
    /// Returns IO error if accept fails.
    pub async fn accept(&self) -> Result<Incoming, TransportError> {
        let (stream, peer_addr) = self.listener.accept().await?;
        stream.set_nodelay(self.config.tcp_nodelay)?;
        Ok(Incoming {
            stream,
            peer_addr,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            config: Arc::clone(&self.config),
        })
    }
}

/// An accepted TCP connection awaiting its upgrade.
pub struct Incoming {
    stream: TcpStream,
    peer_addr: SocketAddr,
    id: u64,
    config: Arc<WsServerConfig>,
}

impl Incoming {
    /// Returns the id the connection will carry.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the remote address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Performs the upgrade handshake and starts the connection task.
    ///
    /// # Errors
    /// Returns `TransportError` if the handshake fails, times out, or the
    /// request path does not match.
    pub async fn upgrade(self, handler: Arc<dyn FrameHandler>) -> Result<Connection, TransportError> {
        let required = self.config.path.clone();
        let check_path = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            match required {
                Some(path) if req.uri().path() != path => {
                    let mut err = ErrorResponse::new(Some("not found".to_string()));
                    *err.status_mut() = StatusCode::NOT_FOUND;
                    Err(err)
                }
                _ => Ok(resp),
            }
        };

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = self.config.max_message_size;

        let ws = tokio::time::timeout(
            self.config.handshake_timeout,
            accept_hdr_async_with_config(self.stream, check_path, Some(ws_config)),
        )
        .await
        .map_err(|_| TransportError::HandshakeTimeout)??;

        let (conn, rx) = Connection::new(self.id, Some(self.peer_addr), CancellationToken::new());
        driver::spawn(ws, conn.clone(), rx, handler);

        tracing::debug!("Connection {} upgraded from {}", self.id, self.peer_addr);
        Ok(conn)
    }
}
