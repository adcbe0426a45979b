use std::fmt;

use crate::error::{AcceleratorError, Result};

/// Upper bound on threads in one thread-group shared by all backends.
pub const MAX_THREADS_PER_GROUP: usize = 1024;

/// Upper bound on thread-groups along one grid axis.
pub const MAX_GROUPS_PER_AXIS: usize = 65_535;

/// A 2-D extent or index (`x` is the row axis, `y` the column axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dim2 {
    pub x: usize,
    pub y: usize,
}

impl Dim2 {
    pub fn new(x: usize, y: usize) -> Self {
        Dim2 { x, y }
    }

    pub fn square(v: usize) -> Self {
        Dim2 { x: v, y: v }
    }

    /// Number of points in the extent.
    pub fn count(&self) -> usize {
        self.x * self.y
    }
}

impl fmt::Display for Dim2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Grid and thread-group shape for one kernel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchGeometry {
    grid: Dim2,
    block: Dim2,
}

impl LaunchGeometry {
    /// Build a geometry from explicit grid and block extents.
    ///
    /// No coverage check is made; backends validate geometry at launch.
    pub fn new(grid: Dim2, block: Dim2) -> Self {
        LaunchGeometry { grid, block }
    }

    /// Minimal geometry covering an `n x n` output with `tile x tile` groups.
    ///
    /// The grid has `ceil(n / tile)` groups per axis.
    ///
    /// # Errors
    /// Returns `Configuration` when `n` or `tile` is zero.
    pub fn covering(n: usize, tile: usize) -> Result<Self> {
        if n == 0 || tile == 0 {
            return Err(AcceleratorError::Configuration(format!(
                "cannot build launch geometry for n={n}, tile={tile}"
            )));
        }
        let groups = n.div_ceil(tile);
        Ok(LaunchGeometry {
            grid: Dim2::square(groups),
            block: Dim2::square(tile),
        })
    }

    /// Thread-groups along each axis.
    pub fn grid(&self) -> Dim2 {
        self.grid
    }

    /// Threads along each axis of one group.
    pub fn block(&self) -> Dim2 {
        self.block
    }

    pub fn threads_per_group(&self) -> usize {
        self.block.count()
    }

    pub fn num_groups(&self) -> usize {
        self.grid.count()
    }

    pub fn total_threads(&self) -> usize {
        self.num_groups() * self.threads_per_group()
    }

    /// Tile chunks each group walks along the shared dimension.
    ///
    /// The kernel uses the grid's row extent as its chunk count.
    pub fn chunks(&self) -> usize {
        self.grid.x
    }

    /// Whether every element of an `n x n` output has a thread.
    pub fn covers(&self, n: usize) -> bool {
        self.grid.x * self.block.x >= n && self.grid.y * self.block.y >= n
    }

    /// Global coordinate of thread `thread` in group `group`.
    pub fn global_index(&self, group: Dim2, thread: Dim2) -> Dim2 {
        Dim2 {
            x: group.x * self.block.x + thread.x,
            y: group.y * self.block.y + thread.y,
        }
    }
}

impl fmt::Display for LaunchGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grid {} / block {}", self.grid, self.block)
    }
}
