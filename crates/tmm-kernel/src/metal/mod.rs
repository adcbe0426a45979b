// Metal GPU compute backend (macOS only).
//
// Buffers live in shared storage so host copies are plain memcpys through
// `contents()`. Every launch is committed on its own command buffer and
// waited on before returning.

use std::ffi::c_void;
use std::ptr::NonNull;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_foundation::NSString;
use objc2_metal::{
    MTLBuffer, MTLCommandBuffer, MTLCommandBufferStatus, MTLCommandEncoder, MTLCommandQueue,
    MTLComputeCommandEncoder, MTLComputePipelineState, MTLCreateSystemDefaultDevice, MTLDevice,
    MTLLibrary, MTLResourceOptions, MTLSize,
};

use crate::accelerator::{validate_launch, Accelerator};
use crate::error::{AcceleratorError, Result};
use crate::geometry::LaunchGeometry;
use crate::msl;
use crate::tile::TileConfig;

// MTLCreateSystemDefaultDevice returns no device on macOS unless CoreGraphics
// is linked.
#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {}

/// Shared-storage Metal buffer of f32 elements.
#[derive(Debug)]
pub struct MetalBuffer {
    buffer: Retained<ProtocolObject<dyn MTLBuffer>>,
    len: usize,
}

impl MetalBuffer {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Compiled compute pipeline for one tile configuration.
#[derive(Debug)]
pub struct MetalKernel {
    pipeline: Retained<ProtocolObject<dyn MTLComputePipelineState>>,
    config: TileConfig,
}

impl MetalKernel {
    pub fn config(&self) -> &TileConfig {
        &self.config
    }
}

/// Metal backend bound to the system default device.
#[derive(Debug)]
pub struct MetalDevice {
    device: Retained<ProtocolObject<dyn MTLDevice>>,
    queue: Retained<ProtocolObject<dyn MTLCommandQueue>>,
    name: String,
}

impl MetalDevice {
    /// Open the system default Metal device and create a command queue.
    ///
    /// # Errors
    /// Returns `DeviceUnavailable` when no Metal device exists.
    pub fn new() -> Result<Self> {
        let device = MTLCreateSystemDefaultDevice().ok_or_else(|| {
            AcceleratorError::DeviceUnavailable("no Metal device found".to_string())
        })?;
        let queue = device.newCommandQueue().ok_or_else(|| {
            AcceleratorError::Resource("failed to create Metal command queue".to_string())
        })?;
        let name = device.name().to_string();
        log::info!("using Metal device '{name}'");
        Ok(MetalDevice {
            device,
            queue,
            name,
        })
    }

    /// Name reported by the Metal driver.
    pub fn device_name(&self) -> &str {
        &self.name
    }

    fn new_buffer(&self, len: usize) -> Result<Retained<ProtocolObject<dyn MTLBuffer>>> {
        if len == 0 {
            return Err(AcceleratorError::Resource(
                "cannot allocate an empty Metal buffer".to_string(),
            ));
        }
        let bytes = len * std::mem::size_of::<f32>();
        self.device
            .newBufferWithLength_options(bytes, MTLResourceOptions::StorageModeShared)
            .ok_or_else(|| {
                AcceleratorError::Resource(format!("failed to allocate {bytes} bytes on device"))
            })
    }
}

impl Accelerator for MetalDevice {
    type Buffer = MetalBuffer;
    type Kernel = MetalKernel;

    fn name(&self) -> &str {
        "metal"
    }

    fn alloc(&self, len: usize) -> Result<MetalBuffer> {
        let buffer = self.new_buffer(len)?;
        // SAFETY: shared storage is host visible and holds `len` f32 values.
        unsafe {
            std::ptr::write_bytes(buffer.contents().as_ptr() as *mut f32, 0, len);
        }
        Ok(MetalBuffer { buffer, len })
    }

    fn upload(&self, data: &[f32]) -> Result<MetalBuffer> {
        let buffer = self.new_buffer(data.len())?;
        // SAFETY: the buffer was sized for `data.len()` f32 values and does not
        // alias `data`.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                buffer.contents().as_ptr() as *mut f32,
                data.len(),
            );
        }
        Ok(MetalBuffer {
            buffer,
            len: data.len(),
        })
    }

    fn download(&self, buffer: &MetalBuffer) -> Result<Vec<f32>> {
        // SAFETY: every launch waits for completion, so no GPU work is writing
        // the buffer while it is read.
        let data = unsafe {
            let ptr = buffer.buffer.contents().as_ptr() as *const f32;
            std::slice::from_raw_parts(ptr, buffer.len).to_vec()
        };
        Ok(data)
    }

    fn compile(&self, config: &TileConfig) -> Result<MetalKernel> {
        let source = msl::tiled_matmul_source(config);
        log::trace!("compiling MSL:\n{source}");

        let library = self
            .device
            .newLibraryWithSource_options_error(&NSString::from_str(&source), None)
            .map_err(|err| {
                AcceleratorError::Compilation(format!(
                    "failed to compile MSL: {}",
                    err.localizedDescription()
                ))
            })?;
        let function = library
            .newFunctionWithName(&NSString::from_str(msl::ENTRY_POINT))
            .ok_or_else(|| {
                AcceleratorError::Compilation(format!(
                    "function '{}' not found in library",
                    msl::ENTRY_POINT
                ))
            })?;
        let pipeline = self
            .device
            .newComputePipelineStateWithFunction_error(&function)
            .map_err(|err| {
                AcceleratorError::Compilation(format!(
                    "failed to create compute pipeline: {}",
                    err.localizedDescription()
                ))
            })?;

        let max_threads = pipeline.maxTotalThreadsPerThreadgroup();
        if config.tile_elems() > max_threads {
            return Err(AcceleratorError::Compilation(format!(
                "tile {} needs {} threads per group, pipeline supports {max_threads}",
                config.tile(),
                config.tile_elems()
            )));
        }
        log::debug!(
            "compiled Metal pipeline: tile={}, boundary={}",
            config.tile(),
            config.boundary()
        );
        Ok(MetalKernel {
            pipeline,
            config: *config,
        })
    }

    fn launch(
        &self,
        kernel: &MetalKernel,
        geometry: &LaunchGeometry,
        a: &MetalBuffer,
        b: &MetalBuffer,
        c: &mut MetalBuffer,
        n: usize,
    ) -> Result<()> {
        validate_launch(&kernel.config, geometry, n, [a.len, b.len, c.len])?;
        let n_param = u32::try_from(n).map_err(|_| {
            AcceleratorError::Configuration(format!("matrix dimension {n} exceeds u32"))
        })?;
        let n_ptr = NonNull::from(&n_param).cast::<c_void>();
        // SAFETY: the pointer is valid for 4 bytes and Metal copies them.
        let params = unsafe {
            self.device.newBufferWithBytes_length_options(
                n_ptr,
                std::mem::size_of::<u32>(),
                MTLResourceOptions::StorageModeShared,
            )
        }
        .ok_or_else(|| AcceleratorError::Resource("failed to create parameter buffer".to_string()))?;

        let command_buffer = self.queue.commandBuffer().ok_or_else(|| {
            AcceleratorError::Launch("failed to create command buffer".to_string())
        })?;
        let encoder = command_buffer.computeCommandEncoder().ok_or_else(|| {
            AcceleratorError::Launch("failed to create compute encoder".to_string())
        })?;

        encoder.setComputePipelineState(&kernel.pipeline);
        let bindings: [&ProtocolObject<dyn MTLBuffer>; msl::BUFFER_SLOTS] =
            [&a.buffer, &b.buffer, &c.buffer, &params];
        for (index, buffer) in bindings.into_iter().enumerate() {
            // SAFETY: every buffer outlives the command buffer, which is
            // waited on below.
            unsafe { encoder.setBuffer_offset_atIndex(Some(buffer), 0, index) };
        }

        let grid = geometry.grid();
        let block = geometry.block();
        encoder.dispatchThreadgroups_threadsPerThreadgroup(
            MTLSize {
                width: grid.x,
                height: grid.y,
                depth: 1,
            },
            MTLSize {
                width: block.x,
                height: block.y,
                depth: 1,
            },
        );
        encoder.endEncoding();

        log::debug!("dispatching {geometry} for n={n}");
        command_buffer.commit();
        command_buffer.waitUntilCompleted();

        if command_buffer.status() == MTLCommandBufferStatus::Error {
            let detail = command_buffer
                .error()
                .map(|err| err.localizedDescription().to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(AcceleratorError::Launch(format!(
                "command buffer failed: {detail}"
            )));
        }
        Ok(())
    }
}
