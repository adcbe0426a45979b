use std::fmt::Debug;

use crate::error::{AcceleratorError, Result};
use crate::geometry::{Dim2, LaunchGeometry};
use crate::matrix::Matrix;
use crate::tile::TileConfig;

/// Trait for accelerator backends that can run the tiled kernel (CPU
/// simulation, Metal, etc.).
///
/// Buffers hold f32 elements in device memory and are released when dropped.
/// Every method is synchronous from the caller's point of view: when a call
/// returns, the work it issued has completed.
pub trait Accelerator: Debug {
    /// Device-resident f32 buffer.
    type Buffer;
    /// Compiled kernel handle produced by [`Accelerator::compile`].
    type Kernel;

    /// Returns the name of this backend (e.g., "cpu", "metal").
    fn name(&self) -> &str;

    /// Allocate a zero-initialized device buffer of `len` elements.
    fn alloc(&self, len: usize) -> Result<Self::Buffer>;

    /// Copy host data into a newly allocated device buffer.
    fn upload(&self, data: &[f32]) -> Result<Self::Buffer>;

    /// Copy a device buffer back to the host.
    fn download(&self, buffer: &Self::Buffer) -> Result<Vec<f32>>;

    /// Build the tiled matmul kernel for one tile configuration.
    fn compile(&self, config: &TileConfig) -> Result<Self::Kernel>;

    /// Run the kernel: `c = a @ b` for `n x n` row-major buffers.
    ///
    /// Blocks until the kernel has finished.
    fn launch(
        &self,
        kernel: &Self::Kernel,
        geometry: &LaunchGeometry,
        a: &Self::Buffer,
        b: &Self::Buffer,
        c: &mut Self::Buffer,
        n: usize,
    ) -> Result<()>;

    /// Wait for all outstanding device work.
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}

/// Multiply two square host matrices on `device` and return the product.
///
/// Compiles the kernel, stages both operands, launches with the minimal
/// covering geometry and reads the result back.
pub fn tiled_matmul<A: Accelerator>(
    device: &A,
    config: &TileConfig,
    a: &Matrix,
    b: &Matrix,
) -> Result<Matrix> {
    if !a.is_square() || a.dims() != b.dims() {
        return Err(AcceleratorError::ShapeMismatch {
            expected: a.dims().to_vec(),
            got: b.dims().to_vec(),
        });
    }
    let n = a.rows();
    config.validate_extent(n)?;

    let kernel = device.compile(config)?;
    let geometry = LaunchGeometry::covering(n, config.tile())?;

    let a_dev = device.upload(a.data())?;
    let b_dev = device.upload(b.data())?;
    let mut c_dev = device.alloc(n * n)?;

    device.launch(&kernel, &geometry, &a_dev, &b_dev, &mut c_dev, n)?;
    device.synchronize()?;

    Matrix::from_vec(n, n, device.download(&c_dev)?)
}

/// Checks shared by every backend before a launch is issued.
///
/// # Errors
/// `Configuration`/`ShapeMismatch` for an invalid extent or buffer length,
/// `Launch` for a block that does not match the kernel's tile or a grid that
/// leaves part of the output without a thread.
pub(crate) fn validate_launch(
    config: &TileConfig,
    geometry: &LaunchGeometry,
    n: usize,
    buffer_lens: [usize; 3],
) -> Result<()> {
    config.validate_extent(n)?;
    for len in buffer_lens {
        if len != n * n {
            return Err(AcceleratorError::ShapeMismatch {
                expected: vec![n, n],
                got: vec![len],
            });
        }
    }
    let tile = config.tile();
    if geometry.block() != Dim2::square(tile) {
        return Err(AcceleratorError::Launch(format!(
            "block {} does not match kernel tile {tile}x{tile}",
            geometry.block()
        )));
    }
    let grid = geometry.grid();
    if grid.x == 0 || grid.y == 0 {
        return Err(AcceleratorError::Launch(format!("empty grid {grid}")));
    }
    if !geometry.covers(n) {
        return Err(AcceleratorError::Launch(format!(
            "{geometry} does not cover a {n}x{n} output"
        )));
    }
    Ok(())
}
