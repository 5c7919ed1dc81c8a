//! # wslat
//!
//! WebSocket latency measurement.
//!
//! A server either pushes timestamped events at a fixed rate (push model)
//! or echoes timestamped requests (request-response model). A client run
//! connects, stamps arrivals, discards a warm-up prefix and summarizes the
//! remaining latencies with nearest-rank percentiles.
//!
//! ## Quick Start
//!
//! ```ignore
//! use wslat::prelude::*;
//!
//! let (server, handle) = ServerBuilder::new()
//!     .model(Model::RequestResponse)
//!     .build();
//! tokio::spawn(async move { server.run().await });
//!
//! let config = RunConfig::new("ws://localhost:10443/ws")
//!     .model(Model::RequestResponse)
//!     .rate(100);
//! let (run, _stop) = RunBuilder::new(config).build();
//! let report = run.run().await?;
//! println!("{}", SummaryTable(&report));
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Clock, wire protocol, aggregator, generator, configuration
//! - [`transport`] - WebSocket and in-process transports
//! - [`server`] - Push and echo server
//! - [`client`] - Measurement run coordinator
//! - [`report`] - Human-readable report rendering

pub mod prelude;
pub mod report;

/// Clock, protocol, statistics and pacing.
pub mod core {
    pub use wslat_core::*;
}

/// Message transport layer.
pub mod transport {
    pub use wslat_transport::*;
}

/// Push and echo server.
pub mod server {
    pub use wslat_server::*;
}

/// Measurement runs.
pub mod client {
    pub use wslat_client::*;
}

pub use report::SummaryTable;
