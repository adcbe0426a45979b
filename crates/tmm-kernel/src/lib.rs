//! `tmm-kernel` - Tiled shared-memory matrix multiplication on pluggable accelerators.
//!
//! This crate provides:
//! - A host `Matrix` type (row-major f32)
//! - `LaunchGeometry` and `TileConfig` describing how the kernel is launched
//! - An `Accelerator` trait covering allocation, copies, compilation and launch
//! - A simulated `CpuDevice` that runs thread-groups with lockstep barriers
//! - A Metal backend behind the `metal` feature

pub mod accelerator;
pub mod cpu;
pub mod error;
pub mod geometry;
pub mod matrix;
#[cfg(feature = "metal")]
pub mod metal;
pub mod msl;
pub mod tile;

// Re-export primary types at the crate root for convenience.
pub use accelerator::{tiled_matmul, Accelerator};
pub use cpu::{CpuDevice, LaunchStats};
pub use error::{AcceleratorError, Result};
pub use geometry::{Dim2, LaunchGeometry, MAX_GROUPS_PER_AXIS, MAX_THREADS_PER_GROUP};
pub use matrix::Matrix;
#[cfg(feature = "metal")]
pub use metal::MetalDevice;
pub use tile::{BoundaryPolicy, TileConfig, DEFAULT_TILE};
