//! Timestamp protocol.
//!
//! Two message shapes travel on the wire as JSON objects:
//!
//! - [`PushEvent`]: emitted by the server at a fixed rate, carrying the
//!   server's send time. The receiver stamps its own arrival time locally and
//!   never forwards it.
//! - [`RttMessage`]: issued by the client, stamped on receipt and on echo by
//!   the server, then stamped again by the client when the reply arrives.
//!
//! All timestamps are nanoseconds from [`crate::clock::now_nanos`]. Every
//! timestamp is write-once: stamping a field twice fails with
//! [`ProtocolError::AlreadyStamped`] and leaves the first value in place.
//! Derived intervals use checked arithmetic, so a peer sending an extreme
//! timestamp yields [`ProtocolError::TimestampOutOfRange`] instead of a
//! bogus sample.

use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Wire key of the client send timestamp.
pub const CLIENT_SEND_TS: &str = "client_send_ts";
/// Wire key of the server send timestamp.
pub const SERVER_SEND_TS: &str = "server_send_ts";
/// Wire key of the server receive timestamp.
pub const SERVER_RECV_TS: &str = "server_recv_ts";
/// Wire key of the client receive timestamp.
pub const CLIENT_RECV_TS: &str = "client_recv_ts";

/// Builds a payload of `size` printable bytes cycling through `A..=Z`.
#[must_use]
pub fn payload(size: usize) -> String {
    (0..size).map(|i| char::from(b'A' + (i % 26) as u8)).collect()
}

/// Serializes a message to its wire text.
///
/// # Errors
/// Returns `ProtocolError::Malformed` if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Parses a message from raw wire bytes.
///
/// # Errors
/// Returns `ProtocolError::Malformed` for anything that is not a JSON object
/// carrying the required fields of `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn stamp(slot: &mut Option<i64>, field: &'static str, ts: i64) -> Result<(), ProtocolError> {
    if slot.is_some() {
        return Err(ProtocolError::AlreadyStamped { field });
    }
    *slot = Some(ts);
    Ok(())
}

fn interval(later: i64, earlier: i64, field: &'static str) -> Result<i64, ProtocolError> {
    later
        .checked_sub(earlier)
        .ok_or(ProtocolError::TimestampOutOfRange { field })
}

/// Server-push event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    sequence: u64,
    payload: String,
    server_send_ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(skip)]
    client_recv_ts: Option<i64>,
}

impl PushEvent {
    /// Creates an event sent at `server_send_ts`.
    #[must_use]
    pub fn new(sequence: u64, payload: String, server_send_ts: i64) -> Self {
        Self {
            sequence,
            payload,
            server_send_ts,
            message_id: None,
            client_recv_ts: None,
        }
    }

    /// Attaches a correlation id.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Parses an event from wire bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Malformed` if the bytes are not a valid event.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode(bytes)
    }

    /// Serializes the event. The local receive stamp is never included.
    ///
    /// # Errors
    /// Returns `ProtocolError::Malformed` if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode(self)
    }

    /// Returns the sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Returns the correlation id, if any.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Returns the server send timestamp.
    #[must_use]
    pub fn server_send_ts(&self) -> i64 {
        self.server_send_ts
    }

    /// Returns the local receive timestamp, if stamped.
    #[must_use]
    pub fn client_recv_ts(&self) -> Option<i64> {
        self.client_recv_ts
    }

    /// Stamps the local receive time.
    ///
    /// # Errors
    /// Returns `ProtocolError::AlreadyStamped` on a second call.
    pub fn stamp_client_recv(&mut self, ts: i64) -> Result<(), ProtocolError> {
        stamp(&mut self.client_recv_ts, CLIENT_RECV_TS, ts)
    }

    /// One-way latency from server send to local receipt, `None` until the
    /// receive stamp is set.
    ///
    /// Negative values indicate clock skew between the two hosts and are
    /// returned as-is.
    ///
    /// # Errors
    /// Returns `ProtocolError::TimestampOutOfRange` if the difference
    /// overflows.
    pub fn one_way_latency(&self) -> Result<Option<i64>, ProtocolError> {
        self.client_recv_ts
            .map(|recv| interval(recv, self.server_send_ts, SERVER_SEND_TS))
            .transpose()
    }
}

/// Request-response message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RttMessage {
    sequence: u64,
    payload: String,
    client_send_ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    server_recv_ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    server_send_ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_recv_ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
}

impl RttMessage {
    /// Creates a request sent at `client_send_ts`.
    #[must_use]
    pub fn new(sequence: u64, payload: String, client_send_ts: i64) -> Self {
        Self {
            sequence,
            payload,
            client_send_ts,
            server_recv_ts: None,
            server_send_ts: None,
            client_recv_ts: None,
            message_id: None,
        }
    }

    /// Attaches a correlation id.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Parses a message from wire bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Malformed` if the bytes are not a valid message.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        decode(bytes)
    }

    /// Serializes the message, omitting unset timestamps.
    ///
    /// # Errors
    /// Returns `ProtocolError::Malformed` if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        encode(self)
    }

    /// Returns the sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Replaces the payload. Used by responders that regenerate it.
    pub fn set_payload(&mut self, payload: String) {
        self.payload = payload;
    }

    /// Returns the correlation id, if any.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    /// Returns the client send timestamp.
    #[must_use]
    pub fn client_send_ts(&self) -> i64 {
        self.client_send_ts
    }

    /// Returns the server receive timestamp, if stamped.
    #[must_use]
    pub fn server_recv_ts(&self) -> Option<i64> {
        self.server_recv_ts
    }

    /// Returns the server send timestamp, if stamped.
    #[must_use]
    pub fn server_send_ts(&self) -> Option<i64> {
        self.server_send_ts
    }

    /// Returns the client receive timestamp, if stamped.
    #[must_use]
    pub fn client_recv_ts(&self) -> Option<i64> {
        self.client_recv_ts
    }

    /// Stamps the server receive time.
    ///
    /// # Errors
    /// Returns `ProtocolError::AlreadyStamped` if already set.
    pub fn stamp_server_recv(&mut self, ts: i64) -> Result<(), ProtocolError> {
        stamp(&mut self.server_recv_ts, SERVER_RECV_TS, ts)
    }

    /// Stamps the server send time.
    ///
    /// # Errors
    /// Returns `ProtocolError::AlreadyStamped` if already set.
    pub fn stamp_server_send(&mut self, ts: i64) -> Result<(), ProtocolError> {
        stamp(&mut self.server_send_ts, SERVER_SEND_TS, ts)
    }

    /// Stamps the client receive time.
    ///
    /// # Errors
    /// Returns `ProtocolError::AlreadyStamped` if already set.
    pub fn stamp_client_recv(&mut self, ts: i64) -> Result<(), ProtocolError> {
        stamp(&mut self.client_recv_ts, CLIENT_RECV_TS, ts)
    }

    /// Round-trip time, measured entirely on the client.
    ///
    /// # Errors
    /// Returns `ProtocolError::TimestampOutOfRange` if the difference
    /// overflows.
    pub fn rtt(&self) -> Result<Option<i64>, ProtocolError> {
        self.client_recv_ts
            .map(|recv| interval(recv, self.client_send_ts, CLIENT_SEND_TS))
            .transpose()
    }

    /// One-way latency of the reply leg, server send to client receipt.
    ///
    /// # Errors
    /// Returns `ProtocolError::TimestampOutOfRange` if the difference
    /// overflows.
    pub fn one_way_latency(&self) -> Result<Option<i64>, ProtocolError> {
        match (self.client_recv_ts, self.server_send_ts) {
            (Some(recv), Some(send)) => interval(recv, send, SERVER_SEND_TS).map(Some),
            _ => Ok(None),
        }
    }

    /// Time the server spent between receipt and echo.
    ///
    /// # Errors
    /// Returns `ProtocolError::TimestampOutOfRange` if the difference
    /// overflows.
    pub fn server_processing(&self) -> Result<Option<i64>, ProtocolError> {
        match (self.server_send_ts, self.server_recv_ts) {
            (Some(send), Some(recv)) => interval(send, recv, SERVER_RECV_TS).map(Some),
            _ => Ok(None),
        }
    }
}
