use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AcceleratorError, Result};
use crate::geometry::MAX_THREADS_PER_GROUP;

/// Tile edge length used by the reference benchmark configuration.
pub const DEFAULT_TILE: usize = 32;

/// Decides which threads of the launch grid skip their output write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryPolicy {
    /// A thread is skipped only when its row AND its column are out of range.
    ///
    /// Threads out of range on a single axis still load and write, so this
    /// policy is only accepted for extents that are a multiple of the tile.
    #[default]
    BothAxes,
    /// A thread skips its write when its row OR its column is out of range.
    /// Tile loads outside the matrix read as zero, so any extent is accepted.
    EitherAxis,
}

impl BoundaryPolicy {
    /// Whether the thread at global coordinate `(x, y)` is skipped for an
    /// `n x n` output.
    pub fn skips(self, x: usize, y: usize, n: usize) -> bool {
        match self {
            BoundaryPolicy::BothAxes => x >= n && y >= n,
            BoundaryPolicy::EitherAxis => x >= n || y >= n,
        }
    }

    /// Whether global loads outside the matrix are replaced by zero.
    pub fn pads_loads(self) -> bool {
        matches!(self, BoundaryPolicy::EitherAxis)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BoundaryPolicy::BothAxes => "both-axes",
            BoundaryPolicy::EitherAxis => "either-axis",
        }
    }
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundaryPolicy {
    type Err = AcceleratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "both-axes" | "both" => Ok(BoundaryPolicy::BothAxes),
            "either-axis" | "either" => Ok(BoundaryPolicy::EitherAxis),
            other => Err(AcceleratorError::Configuration(format!(
                "unknown boundary policy '{other}', expected 'both-axes' or 'either-axis'"
            ))),
        }
    }
}

/// Compile-time parameters of the tiled kernel.
///
/// A kernel handle is built from one `TileConfig`; the tile edge fixes both
/// the shared-memory tile size and the thread-group shape (`tile x tile`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileConfig {
    tile: usize,
    boundary: BoundaryPolicy,
}

impl TileConfig {
    /// Create a config with the given tile edge and the default boundary policy.
    ///
    /// # Errors
    /// Returns `Configuration` if `tile` is zero or `tile * tile` exceeds
    /// [`MAX_THREADS_PER_GROUP`].
    pub fn new(tile: usize) -> Result<Self> {
        if tile == 0 {
            return Err(AcceleratorError::Configuration(
                "tile size must be > 0".to_string(),
            ));
        }
        let threads = tile.checked_mul(tile).unwrap_or(usize::MAX);
        if threads > MAX_THREADS_PER_GROUP {
            return Err(AcceleratorError::Configuration(format!(
                "tile size {tile} needs {threads} threads per group, limit is {MAX_THREADS_PER_GROUP}"
            )));
        }
        Ok(TileConfig {
            tile,
            boundary: BoundaryPolicy::default(),
        })
    }

    /// Builder-style boundary policy override.
    pub fn with_boundary(mut self, boundary: BoundaryPolicy) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn tile(&self) -> usize {
        self.tile
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    /// Elements in one shared-memory tile.
    pub fn tile_elems(&self) -> usize {
        self.tile * self.tile
    }

    /// Check that an `n x n` problem can be run under this config.
    ///
    /// # Errors
    /// Returns `Configuration` for `n == 0`, or for an `n` that is not a
    /// multiple of the tile under [`BoundaryPolicy::BothAxes`].
    pub fn validate_extent(&self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(AcceleratorError::Configuration(
                "matrix dimension must be > 0".to_string(),
            ));
        }
        if self.boundary == BoundaryPolicy::BothAxes && n % self.tile != 0 {
            return Err(AcceleratorError::Configuration(format!(
                "matrix dimension {n} is not a multiple of tile {} (required by the {} boundary policy)",
                self.tile, self.boundary
            )));
        }
        Ok(())
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        TileConfig {
            tile: DEFAULT_TILE,
            boundary: BoundaryPolicy::default(),
        }
    }
}
