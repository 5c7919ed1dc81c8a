//! WebSocket client connector.

use super::driver;
use super::tls;
use crate::connection::{Connection, Connector, FrameHandler};
use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{MaybeTlsStream, connect_async_tls_with_config};
use tokio_util::sync::CancellationToken;

/// Configuration for the WebSocket client.
#[derive(Debug, Clone)]
pub struct WsClientConfig {
    /// Connection timeout, covering TCP, TLS and the upgrade.
    pub connect_timeout: Duration,
    /// Accept any server certificate.
    pub insecure: bool,
    /// Enable TCP_NODELAY.
    pub tcp_nodelay: bool,
    /// Maximum inbound message size in bytes.
    pub max_message_size: Option<usize>,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            insecure: false,
            tcp_nodelay: true,
            max_message_size: Some(16 * 1024 * 1024),
        }
    }
}

impl WsClientConfig {
    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables or disables certificate verification bypass.
    #[must_use]
    pub fn insecure(mut self, enabled: bool) -> Self {
        self.insecure = enabled;
        self
    }

    /// Sets TCP_NODELAY option.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Sets the maximum inbound message size.
    #[must_use]
    pub fn max_message_size(mut self, size: Option<usize>) -> Self {
        self.max_message_size = size;
        self
    }
}

/// Opens `ws://` and `wss://` connections.
pub struct WsConnector {
    config: WsClientConfig,
    tls: Option<Arc<rustls::ClientConfig>>,
    next_id: AtomicU64,
}

impl WsConnector {
    /// Creates a connector with the given configuration.
    #[must_use]
    pub fn new(config: WsClientConfig) -> Self {
        let tls = config
            .insecure
            .then(|| Arc::new(tls::insecure_client_config()));
        Self {
            config,
            tls,
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WsClientConfig {
        &self.config
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(WsClientConfig::default())
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        url: &str,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Connection, TransportError> {
        let request = url
            .into_client_request()
            .map_err(|e| TransportError::invalid_url(format!("{url}: {e}")))?;

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = self.config.max_message_size;

        let connector = self
            .tls
            .as_ref()
            .map(|tls| tokio_tungstenite::Connector::Rustls(Arc::clone(tls)));

        let (ws, _response) = tokio::time::timeout(
            self.config.connect_timeout,
            connect_async_tls_with_config(
                request,
                Some(ws_config),
                self.config.tcp_nodelay,
                connector,
            ),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout)??;

        let peer_addr = match ws.get_ref() {
            MaybeTlsStream::Plain(stream) => stream.peer_addr().ok(),
            MaybeTlsStream::Rustls(stream) => stream.get_ref().0.peer_addr().ok(),
            _ => None,
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (conn, rx) = Connection::new(id, peer_addr, CancellationToken::new());
        driver::spawn(ws, conn.clone(), rx, handler);

        tracing::info!("Connected to {}", url);
        Ok(conn)
    }
}
