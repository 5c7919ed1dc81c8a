//! # wslat bench
//!
//! Benchmarking utilities for wslat performance testing.

pub mod pacing;
