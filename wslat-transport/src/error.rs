//! Error types for transport operations.

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// The upgrade handshake did not complete in time.
    #[error("handshake timeout")]
    HandshakeTimeout,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// WebSocket protocol or handshake error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Endpoint URL could not be turned into a request.
    #[error("invalid url: {message}")]
    InvalidUrl {
        /// Error message.
        message: String,
    },
}

impl TransportError {
    /// Creates an invalid url error.
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }

    /// Returns true if the error means the peer is gone.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}
