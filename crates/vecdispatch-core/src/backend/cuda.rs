//! CUDA platform implementation over cudarc.
//!
//! Compute units map to the multiprocessor count and the clock is the
//! driver-reported `CLOCK_RATE` in MHz. The driver exposes no per-kernel
//! work-group query through the safe API, so the device's maximum threads
//! per block is used as the granularity.

use crate::device::{ComputeDevice, DeviceClass, QueryError};
use crate::dispatch::DispatchPlan;
use crate::error::{DispatchError, Result};
use crate::platform::{DeviceBuffer, DeviceContext, Kernel, KernelArgs, KernelOp, Platform};
use cudarc::driver::sys::CUdevice_attribute;
use cudarc::driver::{CudaDevice, CudaFunction, CudaSlice, LaunchAsync, LaunchConfig};
use cudarc::nvrtc::compile_ptx;
use std::sync::Arc;
use tracing::debug;

const MODULE_NAME: &str = "vecdispatch";

const VECTOR_ADD_SOURCE: &str = r#"
extern "C" __global__ void vectorAddition(
    const float *vectorA,
    const float *vectorB,
    float *vectorC,
    const unsigned int count)
{
    unsigned int i = blockIdx.x * blockDim.x + threadIdx.x;
    if (i < count) {
        vectorC[i] = vectorA[i] + vectorB[i];
    }
}
"#;

/// The CUDA driver as a platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaPlatform;

impl CudaPlatform {
    /// Whether at least one CUDA device is present.
    pub fn is_available() -> bool {
        CudaDevice::count().map_or(false, |n| n > 0)
    }
}

/// Handle to one CUDA device.
#[derive(Clone)]
pub struct CudaComputeDevice {
    device: Arc<CudaDevice>,
    name: String,
}

impl CudaComputeDevice {
    fn attribute(&self, attribute: CUdevice_attribute) -> std::result::Result<u32, QueryError> {
        let value = self
            .device
            .attribute(attribute)
            .map_err(|e| QueryError::new(format!("{attribute:?}: {e}")))?;
        u32::try_from(value)
            .map_err(|_| QueryError::new(format!("{attribute:?} reported negative value {value}")))
    }
}

impl ComputeDevice for CudaComputeDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn class(&self) -> DeviceClass {
        DeviceClass::Accelerator
    }

    fn compute_units(&self) -> std::result::Result<u32, QueryError> {
        self.attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MULTIPROCESSOR_COUNT)
    }

    fn clock_frequency_mhz(&self) -> std::result::Result<u32, QueryError> {
        // Reported in kHz.
        self.attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_CLOCK_RATE)
            .map(|khz| khz / 1000)
    }
}

impl Platform for CudaPlatform {
    type Device = CudaComputeDevice;
    type Context = CudaContext;

    fn name(&self) -> &str {
        "cuda"
    }

    fn enumerate(&self, class: DeviceClass) -> Result<Vec<CudaComputeDevice>> {
        if !class.admits(DeviceClass::Accelerator) {
            return Err(DispatchError::no_devices(class));
        }
        let count = CudaDevice::count()
            .map_err(|e| DispatchError::platform(format!("failed to count devices: {e}")))?;
        if count <= 0 {
            return Err(DispatchError::no_devices(class));
        }

        (0..count as usize)
            .map(|ordinal| {
                let device = CudaDevice::new(ordinal).map_err(|e| {
                    DispatchError::platform(format!("failed to open device {ordinal}: {e}"))
                })?;
                let name = device
                    .name()
                    .unwrap_or_else(|_| format!("CUDA device {ordinal}"));
                Ok(CudaComputeDevice { device, name })
            })
            .collect()
    }

    fn create_context(&self, device: &CudaComputeDevice) -> Result<CudaContext> {
        // The primary context and default stream were retained when the
        // device was opened; they are released with the last Arc.
        Ok(CudaContext {
            device: device.device.clone(),
        })
    }
}

/// Context and default stream on the selected CUDA device.
pub struct CudaContext {
    device: Arc<CudaDevice>,
}

/// A kernel loaded from NVRTC-compiled PTX.
pub struct CudaKernel {
    op: KernelOp,
    function: CudaFunction,
}

impl Kernel for CudaKernel {
    fn op(&self) -> KernelOp {
        self.op
    }
}

/// Device memory holding `f32` values.
pub struct CudaBuffer {
    slice: CudaSlice<f32>,
}

impl DeviceBuffer for CudaBuffer {
    fn len(&self) -> usize {
        self.slice.len()
    }
}

fn source_for(op: KernelOp) -> &'static str {
    match op {
        KernelOp::VectorAdd => VECTOR_ADD_SOURCE,
    }
}

impl DeviceContext for CudaContext {
    type Buffer = CudaBuffer;
    type Kernel = CudaKernel;

    fn build_kernel(&mut self, op: KernelOp) -> Result<CudaKernel> {
        let entry = op.entry_point();
        let ptx = compile_ptx(source_for(op))
            .map_err(|e| DispatchError::kernel_build(entry, e.to_string()))?;
        self.device
            .load_ptx(ptx, MODULE_NAME, &[entry])
            .map_err(|e| DispatchError::kernel_build(entry, e.to_string()))?;
        let function = self
            .device
            .get_func(MODULE_NAME, entry)
            .ok_or_else(|| DispatchError::kernel_build(entry, "entry point not found in module"))?;
        Ok(CudaKernel { op, function })
    }

    fn work_group_size(&self, _kernel: &CudaKernel) -> std::result::Result<usize, QueryError> {
        let size = self
            .device
            .attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK)
            .map_err(|e| QueryError::new(e.to_string()))?;
        usize::try_from(size)
            .map_err(|_| QueryError::new(format!("driver reported {size} threads per block")))
    }

    fn upload(&self, data: &[f32]) -> Result<CudaBuffer> {
        let slice = self
            .device
            .htod_sync_copy(data)
            .map_err(|e| DispatchError::transfer(format!("host to device copy failed: {e}")))?;
        Ok(CudaBuffer { slice })
    }

    fn allocate(&self, len: usize) -> Result<CudaBuffer> {
        let slice = self
            .device
            .alloc_zeros::<f32>(len)
            .map_err(|e| {
                DispatchError::transfer(format!("allocation of {len} floats failed: {e}"))
            })?;
        Ok(CudaBuffer { slice })
    }

    fn launch(
        &self,
        kernel: &CudaKernel,
        plan: &DispatchPlan,
        args: &KernelArgs<'_, CudaBuffer>,
    ) -> Result<()> {
        args.complete()?;
        let grid = u32::try_from(plan.work_groups())
            .map_err(|_| DispatchError::launch("grid dimension exceeds u32"))?;
        let block = u32::try_from(plan.local_size())
            .map_err(|_| DispatchError::launch("block dimension exceeds u32"))?;
        let cfg = LaunchConfig {
            grid_dim: (grid, 1, 1),
            block_dim: (block, 1, 1),
            shared_mem_bytes: 0,
        };

        match kernel.op {
            KernelOp::VectorAdd => {
                let (a, b, c) = match (args.buffer(0), args.buffer(1), args.buffer(2)) {
                    (Some(a), Some(b), Some(c)) => (a, b, c),
                    _ => return Err(DispatchError::launch("vector addition expects three buffers")),
                };
                let count = args
                    .uint(3)
                    .ok_or_else(|| DispatchError::launch("missing element count"))?;
                if (count as usize) > a.len().min(b.len()).min(c.len()) {
                    return Err(DispatchError::launch("element count exceeds buffer length"));
                }
                // SAFETY: argument types match the kernel signature and every
                // buffer holds at least `count` elements, which the kernel's
                // bounds guard never exceeds.
                unsafe {
                    kernel
                        .function
                        .clone()
                        .launch(cfg, (&a.slice, &b.slice, &c.slice, count))
                }
                .map_err(|e| DispatchError::launch(e.to_string()))?;
            }
        }

        debug!(grid, block, "enqueued CUDA launch");
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.device
            .synchronize()
            .map_err(|e| DispatchError::launch(format!("synchronize failed: {e}")))
    }

    fn read_back(&self, buffer: &CudaBuffer, out: &mut [f32]) -> Result<()> {
        if out.len() > buffer.len() {
            return Err(DispatchError::transfer("readback larger than device buffer"));
        }
        let host = self
            .device
            .dtoh_sync_copy(&buffer.slice)
            .map_err(|e| DispatchError::transfer(format!("device to host copy failed: {e}")))?;
        out.copy_from_slice(&host[..out.len()]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::select_best;

    #[test]
    fn test_cuda_enumeration() {
        if !CudaPlatform::is_available() {
            return;
        }
        let devices = CudaPlatform.enumerate(DeviceClass::Accelerator).unwrap();
        let selected = select_best(&devices).unwrap();
        assert!(selected.index < devices.len());
        println!("Selected: {} (score {})", selected.device.name(), selected.score());
    }

    #[test]
    fn test_cpu_class_has_no_cuda_devices() {
        assert!(matches!(
            CudaPlatform.enumerate(DeviceClass::Cpu),
            Err(DispatchError::NoDevicesFound { .. })
        ));
    }
}
