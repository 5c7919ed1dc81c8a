//! # wslat client
//!
//! Client-side measurement runs.
//!
//! This crate provides:
//! - [`RunBuilder`] / [`RunCoordinator`] - the run lifecycle state machine
//! - [`RunHandle`] - external stop and live progress
//! - Push-model receiver and request-response requester
//! - [`RunReport`] - structured summaries of a finished run

pub mod coordinator;
pub mod error;
pub mod report;
pub mod session;

pub use coordinator::{RunBuilder, RunCoordinator, RunHandle};
pub use error::ClientError;
pub use report::{CountersSnapshot, RunReport};
pub use session::RunState;
