//! Error types for the measurement engine.
//!
//! The taxonomy splits along fatality: [`ConfigError`] aborts a run before
//! any connection is attempted, while [`ProtocolError`] and
//! [`GenerationError`] are per-message / per-tick and only ever logged and
//! counted by the caller.

use thiserror::Error;

/// Invalid run configuration, surfaced before a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Target rate must be strictly positive.
    #[error("rate must be greater than zero")]
    ZeroRate,

    /// A fixed-duration run needs a non-zero duration.
    #[error("duration must be greater than zero unless continuous mode is enabled")]
    ZeroDuration,

    /// Connect timeout must be strictly positive.
    #[error("connect timeout must be greater than zero")]
    ZeroConnectTimeout,

    /// Unsupported or malformed endpoint URL.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// URL as given.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid url error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Per-message protocol failure.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not a well-formed message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A write-once timestamp was stamped twice.
    #[error("timestamp {field} already stamped")]
    AlreadyStamped {
        /// Name of the wire field.
        field: &'static str,
    },

    /// A timestamp is so far from its counterpart that the difference does
    /// not fit in an `i64`.
    #[error("timestamp {field} out of range")]
    TimestampOutOfRange {
        /// Name of the wire field subtracted from.
        field: &'static str,
    },
}

/// Per-tick failure raised by a generator action.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The transport refused the outbound message.
    #[error("send rejected: {message}")]
    SendRejected {
        /// Error message.
        message: String,
    },

    /// The message could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}

impl GenerationError {
    /// Creates a send rejected error.
    pub fn send_rejected(message: impl Into<String>) -> Self {
        Self::SendRejected {
            message: message.into(),
        }
    }
}
