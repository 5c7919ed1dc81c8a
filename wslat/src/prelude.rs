//! Prelude module for convenient imports.
//!
//! ```ignore
//! use wslat::prelude::*;
//! ```

// Core types
pub use wslat_core::{
    CompletionReason, ConfigError, LatencyAggregator, Model, PushEvent, RttMessage, RunConfig,
    Summary,
};

// Transport types
pub use wslat_transport::{Connection, Connector, FrameHandler, TransportError, WsConnector};

// Server types
pub use wslat_server::{EchoPayload, Server, ServerBuilder, ServerError, ServerHandle};

// Client types
pub use wslat_client::{ClientError, RunBuilder, RunCoordinator, RunHandle, RunReport, RunState};

pub use crate::report::SummaryTable;
