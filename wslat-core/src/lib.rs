//! # wslat core
//!
//! Latency measurement engine shared by the wslat client and server.
//!
//! This crate provides:
//! - [`clock`] - Monotonic, epoch-aligned nanosecond timestamps
//! - [`protocol`] - Timestamped wire messages for the push and RTT models
//! - [`stats`] - Latency aggregation with warm-up exclusion and percentiles
//! - [`generator`] - Fixed-rate tick scheduling
//! - [`signal`] - Single-fire run completion signal
//! - [`config`] - Run configuration and validation

pub mod clock;
pub mod config;
pub mod error;
pub mod generator;
pub mod protocol;
pub mod signal;
pub mod stats;

pub use config::{Model, RunConfig};
pub use error::{ConfigError, GenerationError, ProtocolError};
pub use generator::{Generator, GeneratorSnapshot, TickAction};
pub use protocol::{PushEvent, RttMessage};
pub use signal::{CompletionReason, CompletionSignal};
pub use stats::{LatencyAggregator, Summary};
