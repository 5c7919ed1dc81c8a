//! Error types for server operations.

use thiserror::Error;

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] wslat_transport::TransportError),

    /// Invalid server configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] wslat_core::ConfigError),
}
