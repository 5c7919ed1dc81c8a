//! # wslat transport
//!
//! Message transport used by the wslat client and server.
//!
//! The measurement engine only talks to the [`Connector`], [`Connection`]
//! and [`FrameHandler`] seam. This crate provides:
//! - [`ws`] - WebSocket client connector and listener over tokio-tungstenite
//! - [`memory`] - In-process connection pairs

pub mod connection;
pub mod error;
pub mod memory;
pub mod ws;

pub use connection::{Connection, Connector, Frame, FrameHandler};
pub use error::TransportError;
pub use memory::MemoryConnector;
pub use ws::{Incoming, WsClientConfig, WsConnector, WsListener, WsServerConfig};
