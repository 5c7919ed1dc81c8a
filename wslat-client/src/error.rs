//! Error types for measurement runs.

use thiserror::Error;
use wslat_core::ConfigError;
use wslat_transport::TransportError;

/// Fatal run error. A run that fails never reaches `Running` and produces
/// no report.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configuration was rejected before connecting.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The connection was not ready within the connect timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// The endpoint was unreachable or the handshake failed.
    #[error("connection failed: {0}")]
    Connection(#[source] TransportError),
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectTimeout => Self::ConnectTimeout,
            other => Self::Connection(other),
        }
    }
}
