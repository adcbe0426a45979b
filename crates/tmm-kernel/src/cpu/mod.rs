pub(crate) mod kernel;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use crate::accelerator::{validate_launch, Accelerator};
use crate::error::{AcceleratorError, Result};
use crate::geometry::{Dim2, LaunchGeometry, MAX_GROUPS_PER_AXIS, MAX_THREADS_PER_GROUP};
use crate::tile::TileConfig;
use kernel::{run_group, KernelArgs};

/// Device buffer owned by a [`CpuDevice`].
///
/// Its bytes are charged against the device's memory budget until dropped.
#[derive(Debug)]
pub struct CpuBuffer {
    data: Vec<f32>,
    bytes: usize,
    ledger: Arc<AtomicUsize>,
}

impl CpuBuffer {
    /// Number of f32 elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Drop for CpuBuffer {
    fn drop(&mut self) {
        self.ledger.fetch_sub(self.bytes, Ordering::SeqCst);
    }
}

/// Kernel handle compiled for one tile configuration.
#[derive(Debug, Clone)]
pub struct CpuKernel {
    config: TileConfig,
}

impl CpuKernel {
    pub fn config(&self) -> &TileConfig {
        &self.config
    }
}

/// Counters recorded for the most recent launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchStats {
    pub geometry: LaunchGeometry,
    /// Thread-groups executed.
    pub groups: usize,
    /// Tile chunks walked by each group, as reported by the groups.
    pub chunks_per_group: usize,
    /// Elements of C written.
    pub writes: usize,
}

/// Simulated accelerator running on the host.
///
/// Thread-groups are scheduled across the rayon pool; threads inside a group
/// execute in lockstep with barriers as phase boundaries. Device memory is a
/// byte budget: allocations past `memory_limit` fail with a `Resource` error.
#[derive(Debug)]
pub struct CpuDevice {
    max_threads_per_group: usize,
    max_groups_per_axis: usize,
    memory_limit: Option<usize>,
    allocated: Arc<AtomicUsize>,
    last_launch: Mutex<Option<LaunchStats>>,
}

impl CpuDevice {
    pub fn new() -> Self {
        CpuDevice {
            max_threads_per_group: MAX_THREADS_PER_GROUP,
            max_groups_per_axis: MAX_GROUPS_PER_AXIS,
            memory_limit: None,
            allocated: Arc::new(AtomicUsize::new(0)),
            last_launch: Mutex::new(None),
        }
    }

    /// Cap the bytes of device memory that may be live at once.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Lower the per-group thread limit (clamped to the global maximum).
    pub fn with_max_threads_per_group(mut self, threads: usize) -> Self {
        self.max_threads_per_group = threads.min(MAX_THREADS_PER_GROUP);
        self
    }

    /// Bytes currently held by live buffers.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    /// Counters of the last successful launch, if any.
    pub fn last_launch(&self) -> Option<LaunchStats> {
        self.last_launch.lock().ok().and_then(|guard| *guard)
    }

    fn reserve(&self, len: usize) -> Result<CpuBuffer> {
        let bytes = len.checked_mul(std::mem::size_of::<f32>()).ok_or_else(|| {
            AcceleratorError::Resource(format!("buffer of {len} elements overflows"))
        })?;
        let limit = self.memory_limit.unwrap_or(usize::MAX);
        self.allocated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                used.checked_add(bytes).filter(|&total| total <= limit)
            })
            .map_err(|used| {
                AcceleratorError::Resource(format!(
                    "out of device memory: requested {bytes} bytes with {used} of {limit} in use"
                ))
            })?;

        // From here on the buffer's Drop returns the reservation.
        let mut buffer = CpuBuffer {
            data: Vec::new(),
            bytes,
            ledger: Arc::clone(&self.allocated),
        };
        buffer.data.try_reserve_exact(len).map_err(|e| {
            AcceleratorError::Resource(format!("host allocation of {bytes} bytes failed: {e}"))
        })?;
        Ok(buffer)
    }

    fn check_limits(&self, geometry: &LaunchGeometry) -> Result<()> {
        if geometry.threads_per_group() > self.max_threads_per_group {
            return Err(AcceleratorError::Launch(format!(
                "{} threads per group exceeds device limit {}",
                geometry.threads_per_group(),
                self.max_threads_per_group
            )));
        }
        let grid = geometry.grid();
        if grid.x > self.max_groups_per_axis || grid.y > self.max_groups_per_axis {
            return Err(AcceleratorError::Launch(format!(
                "grid {grid} exceeds device limit of {} groups per axis",
                self.max_groups_per_axis
            )));
        }
        Ok(())
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Accelerator for CpuDevice {
    type Buffer = CpuBuffer;
    type Kernel = CpuKernel;

    fn name(&self) -> &str {
        "cpu"
    }

    fn alloc(&self, len: usize) -> Result<CpuBuffer> {
        let mut buffer = self.reserve(len)?;
        buffer.data.resize(len, 0.0);
        Ok(buffer)
    }

    fn upload(&self, data: &[f32]) -> Result<CpuBuffer> {
        let mut buffer = self.reserve(data.len())?;
        buffer.data.extend_from_slice(data);
        log::trace!("uploaded {} bytes", buffer.bytes);
        Ok(buffer)
    }

    fn download(&self, buffer: &CpuBuffer) -> Result<Vec<f32>> {
        log::trace!("downloaded {} bytes", buffer.bytes);
        Ok(buffer.data.clone())
    }

    fn compile(&self, config: &TileConfig) -> Result<CpuKernel> {
        if config.tile_elems() > self.max_threads_per_group {
            return Err(AcceleratorError::Compilation(format!(
                "tile {} needs {} threads per group, device supports {}",
                config.tile(),
                config.tile_elems(),
                self.max_threads_per_group
            )));
        }
        log::debug!(
            "compiled tiled matmul kernel: tile={}, boundary={}",
            config.tile(),
            config.boundary()
        );
        Ok(CpuKernel { config: *config })
    }

    fn launch(
        &self,
        kernel: &CpuKernel,
        geometry: &LaunchGeometry,
        a: &CpuBuffer,
        b: &CpuBuffer,
        c: &mut CpuBuffer,
        n: usize,
    ) -> Result<()> {
        validate_launch(&kernel.config, geometry, n, [a.len(), b.len(), c.len()])?;
        self.check_limits(geometry)?;

        let grid = geometry.grid();
        let groups: Vec<Dim2> = (0..grid.x)
            .flat_map(|gx| (0..grid.y).map(move |gy| Dim2::new(gx, gy)))
            .collect();
        let args = KernelArgs {
            a: &a.data,
            b: &b.data,
            n,
            config: kernel.config,
            geometry: *geometry,
        };

        log::debug!("launching {} groups ({geometry}) for n={n}", groups.len());
        let outputs = groups
            .par_iter()
            .map(|&group| run_group(&args, group))
            .collect::<Result<Vec<_>>>()?;

        let mut writes = 0;
        let mut chunks_per_group = 0;
        for output in &outputs {
            chunks_per_group = chunks_per_group.max(output.chunks);
            for &(idx, value) in &output.writes {
                c.data[idx] = value;
            }
            writes += output.writes.len();
        }

        let stats = LaunchStats {
            geometry: *geometry,
            groups: outputs.len(),
            chunks_per_group,
            writes,
        };
        if let Ok(mut guard) = self.last_launch.lock() {
            *guard = Some(stats);
        }
        Ok(())
    }
}
