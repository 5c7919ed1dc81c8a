//! # wslat server
//!
//! Server side of the latency measurement engine.
//!
//! This crate provides:
//! - [`ServerBuilder`] / [`Server`] - WebSocket listener and accept loop
//! - [`PeerRegistry`] - connected peers, snapshot for broadcast
//! - [`Broadcaster`] - push-model event fan-out driven by a generator
//! - [`EchoResponder`] - request-response stamping and echo
//! - [`ServerStats`] - counters exposed through [`ServerHandle`]

pub mod broadcast;
pub mod builder;
pub mod echo;
pub mod error;
pub mod handler;
pub mod registry;
pub mod stats;

pub use broadcast::Broadcaster;
pub use builder::{Server, ServerBuilder, ServerHandle};
pub use echo::{EchoPayload, EchoResponder};
pub use error::ServerError;
pub use handler::PeerHandler;
pub use registry::{Peer, PeerRegistry, Reservation};
pub use stats::{ServerStats, ServerStatsSnapshot};
