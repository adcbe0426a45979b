//! `tmm-bench` - Wall-clock benchmark of the tiled matmul kernel.
//!
//! Builds constant-filled square matrices, stages them on an accelerator,
//! launches the tiled kernel and times the round trip.

pub mod config;
pub mod error;
pub mod runner;
pub mod stats;

pub use config::BenchConfig;
pub use error::{BenchError, Result};
pub use runner::{run, BenchmarkRunner};
pub use stats::{BenchReport, BenchSamples, BenchSummary};
