//! In-process simulated accelerator platform.
//!
//! Devices are described by [`SimDeviceSpec`]s. Kernels run on the host:
//! launched work-groups that overlap the output buffer are executed in
//! parallel via rayon, and each work-item applies the kernel's `i < count`
//! guard. Padding items never write, whether they fall inside the buffer or
//! past its end. Faults can be injected at any stage, and live contexts,
//! kernels and buffers are counted so resource release can be checked.

use crate::device::{ComputeDevice, DeviceClass, QueryError};
use crate::dispatch::DispatchPlan;
use crate::error::{DispatchError, Result};
use crate::platform::{DeviceBuffer, DeviceContext, Kernel, KernelArgs, KernelOp, Platform};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Points at which a simulated device can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Compute unit query
    ComputeUnits,
    /// Clock frequency query
    ClockFrequency,
    /// Context / queue creation
    Context,
    /// Kernel build
    KernelBuild,
    /// Work-group size query
    WorkGroupSize,
    /// Host-to-device upload
    Upload,
    /// Output buffer allocation
    Allocate,
    /// Kernel enqueue
    Launch,
    /// Queue completion
    Finish,
    /// Device-to-host readback
    ReadBack,
}

/// Description of one simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimDeviceSpec {
    /// Device name
    pub name: String,
    /// Device class
    pub class: DeviceClass,
    /// Reported compute units
    pub compute_units: u32,
    /// Reported clock frequency in MHz
    pub clock_mhz: u32,
    /// Reported kernel work-group size (may be 0 to model a broken driver)
    pub work_group_size: usize,
    /// Injected failures
    pub faults: Vec<FaultPoint>,
}

impl SimDeviceSpec {
    /// An accelerator with the given metrics and a work-group size of 256.
    pub fn accelerator<S: Into<String>>(name: S, compute_units: u32, clock_mhz: u32) -> Self {
        Self {
            name: name.into(),
            class: DeviceClass::Accelerator,
            compute_units,
            clock_mhz,
            work_group_size: 256,
            faults: Vec::new(),
        }
    }

    /// A host CPU device with a work-group size of 1024.
    pub fn cpu<S: Into<String>>(name: S, compute_units: u32, clock_mhz: u32) -> Self {
        Self {
            class: DeviceClass::Cpu,
            work_group_size: 1024,
            ..Self::accelerator(name, compute_units, clock_mhz)
        }
    }

    /// Sets the reported work-group size.
    pub fn with_work_group_size(mut self, size: usize) -> Self {
        self.work_group_size = size;
        self
    }

    /// Makes the device fail at `point`.
    pub fn failing_at(mut self, point: FaultPoint) -> Self {
        self.faults.push(point);
        self
    }

    fn fails(&self, point: FaultPoint) -> bool {
        self.faults.contains(&point)
    }

    fn fault(&self, point: FaultPoint) -> String {
        format!("injected {point:?} fault on '{}'", self.name)
    }
}

/// Counts of platform resources currently alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveResources {
    /// Open contexts (each with its command queue)
    pub contexts: usize,
    /// Built kernels
    pub kernels: usize,
    /// Allocated buffers
    pub buffers: usize,
}

impl LiveResources {
    /// Whether every resource has been released.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
enum Resource {
    Context,
    Kernel,
    Buffer,
}

#[derive(Debug, Clone, Default)]
struct ResourceTracker {
    live: Arc<Mutex<LiveResources>>,
}

impl ResourceTracker {
    fn acquire(&self, resource: Resource) -> Lease {
        self.adjust(resource, |n| *n += 1);
        Lease {
            tracker: self.clone(),
            resource,
        }
    }

    fn adjust(&self, resource: Resource, f: impl FnOnce(&mut usize)) {
        let mut live = self.live.lock();
        match resource {
            Resource::Context => f(&mut live.contexts),
            Resource::Kernel => f(&mut live.kernels),
            Resource::Buffer => f(&mut live.buffers),
        }
    }

    fn snapshot(&self) -> LiveResources {
        *self.live.lock()
    }
}

/// Releases its resource when dropped.
#[derive(Debug)]
struct Lease {
    tracker: ResourceTracker,
    resource: Resource,
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.tracker.adjust(self.resource, |n| *n = n.saturating_sub(1));
    }
}

/// Simulated platform holding a fixed list of devices.
#[derive(Debug, Clone)]
pub struct SimPlatform {
    devices: Vec<Arc<SimDeviceSpec>>,
    tracker: ResourceTracker,
}

impl SimPlatform {
    /// Creates a platform exposing `devices` in the given order.
    pub fn new(devices: Vec<SimDeviceSpec>) -> Self {
        Self {
            devices: devices.into_iter().map(Arc::new).collect(),
            tracker: ResourceTracker::default(),
        }
    }

    /// A small heterogeneous machine: two GPUs and a host CPU.
    pub fn workstation() -> Self {
        Self::new(vec![
            SimDeviceSpec::accelerator("Simulated Integrated GPU", 24, 1150),
            SimDeviceSpec::accelerator("Simulated Discrete GPU", 40, 1800),
            SimDeviceSpec::cpu("Simulated Host CPU", 8, 3200),
        ])
    }

    /// Resources currently held by contexts created from this platform.
    pub fn live_resources(&self) -> LiveResources {
        self.tracker.snapshot()
    }
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self::workstation()
    }
}

/// Handle to a simulated device.
#[derive(Debug, Clone)]
pub struct SimDevice {
    spec: Arc<SimDeviceSpec>,
}

impl ComputeDevice for SimDevice {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn class(&self) -> DeviceClass {
        self.spec.class
    }

    fn compute_units(&self) -> std::result::Result<u32, QueryError> {
        if self.spec.fails(FaultPoint::ComputeUnits) {
            return Err(QueryError::new(self.spec.fault(FaultPoint::ComputeUnits)));
        }
        Ok(self.spec.compute_units)
    }

    fn clock_frequency_mhz(&self) -> std::result::Result<u32, QueryError> {
        if self.spec.fails(FaultPoint::ClockFrequency) {
            return Err(QueryError::new(self.spec.fault(FaultPoint::ClockFrequency)));
        }
        Ok(self.spec.clock_mhz)
    }
}

impl Platform for SimPlatform {
    type Device = SimDevice;
    type Context = SimContext;

    fn name(&self) -> &str {
        "simulated"
    }

    fn enumerate(&self, class: DeviceClass) -> Result<Vec<SimDevice>> {
        let devices: Vec<_> = self
            .devices
            .iter()
            .filter(|spec| class.admits(spec.class))
            .map(|spec| SimDevice { spec: spec.clone() })
            .collect();
        if devices.is_empty() {
            return Err(DispatchError::no_devices(class));
        }
        Ok(devices)
    }

    fn create_context(&self, device: &SimDevice) -> Result<SimContext> {
        if device.spec.fails(FaultPoint::Context) {
            return Err(DispatchError::platform(device.spec.fault(FaultPoint::Context)));
        }
        Ok(SimContext {
            spec: device.spec.clone(),
            tracker: self.tracker.clone(),
            _lease: self.tracker.acquire(Resource::Context),
        })
    }
}

/// Context and in-order queue on a simulated device.
#[derive(Debug)]
pub struct SimContext {
    spec: Arc<SimDeviceSpec>,
    tracker: ResourceTracker,
    _lease: Lease,
}

/// Kernel built on a simulated device.
#[derive(Debug)]
pub struct SimKernel {
    op: KernelOp,
    _lease: Lease,
}

impl Kernel for SimKernel {
    fn op(&self) -> KernelOp {
        self.op
    }
}

/// Host-backed device buffer.
#[derive(Debug)]
pub struct SimBuffer {
    data: RwLock<Vec<f32>>,
    _lease: Lease,
}

impl DeviceBuffer for SimBuffer {
    fn len(&self) -> usize {
        self.data.read().len()
    }
}

impl SimContext {
    fn check(&self, point: FaultPoint) -> std::result::Result<(), String> {
        if self.spec.fails(point) {
            Err(self.spec.fault(point))
        } else {
            Ok(())
        }
    }

    fn buffer(&self, data: Vec<f32>) -> SimBuffer {
        SimBuffer {
            data: RwLock::new(data),
            _lease: self.tracker.acquire(Resource::Buffer),
        }
    }
}

impl DeviceContext for SimContext {
    type Buffer = SimBuffer;
    type Kernel = SimKernel;

    fn build_kernel(&mut self, op: KernelOp) -> Result<SimKernel> {
        self.check(FaultPoint::KernelBuild)
            .map_err(|reason| DispatchError::kernel_build(op.entry_point(), reason))?;
        Ok(SimKernel {
            op,
            _lease: self.tracker.acquire(Resource::Kernel),
        })
    }

    fn work_group_size(&self, _kernel: &SimKernel) -> std::result::Result<usize, QueryError> {
        self.check(FaultPoint::WorkGroupSize).map_err(QueryError::new)?;
        Ok(self.spec.work_group_size)
    }

    fn upload(&self, data: &[f32]) -> Result<SimBuffer> {
        self.check(FaultPoint::Upload).map_err(DispatchError::transfer)?;
        Ok(self.buffer(data.to_vec()))
    }

    fn allocate(&self, len: usize) -> Result<SimBuffer> {
        self.check(FaultPoint::Allocate).map_err(DispatchError::transfer)?;
        Ok(self.buffer(vec![0.0; len]))
    }

    fn launch(
        &self,
        kernel: &SimKernel,
        plan: &DispatchPlan,
        args: &KernelArgs<'_, SimBuffer>,
    ) -> Result<()> {
        self.check(FaultPoint::Launch).map_err(DispatchError::launch)?;
        if args.op() != kernel.op {
            return Err(DispatchError::launch(format!(
                "arguments bound for '{}' but kernel is '{}'",
                args.op(),
                kernel.op
            )));
        }
        args.complete()?;
        if plan.global_size() % plan.local_size() != 0 {
            return Err(DispatchError::launch(
                "global work size is not a multiple of the local work size",
            ));
        }
        if plan.local_size() > self.spec.work_group_size {
            return Err(DispatchError::launch(format!(
                "local work size {} exceeds device limit {}",
                plan.local_size(),
                self.spec.work_group_size
            )));
        }

        match kernel.op {
            KernelOp::VectorAdd => vector_add(plan, args)?,
        }

        debug!(
            device = self.spec.name.as_str(),
            kernel = %kernel.op,
            global_size = plan.global_size(),
            local_size = plan.local_size(),
            work_groups = plan.work_groups(),
            "executed simulated launch"
        );
        Ok(())
    }

    fn finish(&self) -> Result<()> {
        self.check(FaultPoint::Finish).map_err(DispatchError::launch)
    }

    fn read_back(&self, buffer: &SimBuffer, out: &mut [f32]) -> Result<()> {
        self.check(FaultPoint::ReadBack).map_err(DispatchError::transfer)?;
        let data = buffer.data.read();
        if out.len() > data.len() {
            return Err(DispatchError::transfer(format!(
                "read of {} elements from a buffer of {}",
                out.len(),
                data.len()
            )));
        }
        out.copy_from_slice(&data[..out.len()]);
        Ok(())
    }
}

fn vector_add(plan: &DispatchPlan, args: &KernelArgs<'_, SimBuffer>) -> Result<()> {
    let (a, b, c) = match (args.buffer(0), args.buffer(1), args.buffer(2)) {
        (Some(a), Some(b), Some(c)) => (a, b, c),
        _ => return Err(DispatchError::launch("vector addition expects three buffers")),
    };
    let count = args
        .uint(3)
        .ok_or_else(|| DispatchError::launch("vector addition expects an element count"))?
        as usize;
    if std::ptr::eq(c, a) || std::ptr::eq(c, b) {
        return Err(DispatchError::launch("output buffer aliases an input buffer"));
    }

    let a = a.data.read();
    let b = b.data.read();
    let mut c = c.data.write();
    let guarded = count.min(a.len()).min(b.len()).min(c.len());
    if guarded < count {
        return Err(DispatchError::launch(format!(
            "element count {count} exceeds bound buffer length {guarded}"
        )));
    }

    let local = plan.local_size();
    let (a, b) = (a.as_slice(), b.as_slice());
    c.as_mut_slice()
        .par_chunks_mut(local)
        .enumerate()
        .take(plan.work_groups())
        .for_each(|(group, out)| {
            let base = group * local;
            for (lid, slot) in out.iter_mut().enumerate() {
                let gid = base + lid;
                if gid < count {
                    *slot = a[gid] + b[gid];
                }
            }
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::plan;
    use crate::platform::KernelArg;

    fn context() -> (SimPlatform, SimContext) {
        let platform = SimPlatform::new(vec![SimDeviceSpec::accelerator("gpu", 4, 1000)
            .with_work_group_size(4)]);
        let device = platform.enumerate(DeviceClass::Accelerator).unwrap().remove(0);
        let ctx = platform.create_context(&device).unwrap();
        (platform, ctx)
    }

    #[test]
    fn test_enumerate_filters_by_class() {
        let platform = SimPlatform::workstation();
        assert_eq!(platform.enumerate(DeviceClass::Accelerator).unwrap().len(), 2);
        assert_eq!(platform.enumerate(DeviceClass::Cpu).unwrap().len(), 1);
        assert_eq!(platform.enumerate(DeviceClass::All).unwrap().len(), 3);

        let gpus_only = SimPlatform::new(vec![SimDeviceSpec::accelerator("gpu", 1, 1)]);
        assert!(matches!(
            gpus_only.enumerate(DeviceClass::Cpu),
            Err(DispatchError::NoDevicesFound { .. })
        ));
    }

    #[test]
    fn test_vector_add_with_padding() {
        let (_platform, mut ctx) = context();
        let kernel = ctx.build_kernel(KernelOp::VectorAdd).unwrap();
        let a = ctx.upload(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let b = ctx.upload(&[10.0, 20.0, 30.0, 40.0, 50.0]).unwrap();
        let c = ctx.allocate(5).unwrap();

        let mut args = KernelArgs::new(KernelOp::VectorAdd);
        args.set(KernelArg::Buffer(&a)).unwrap();
        args.set(KernelArg::Buffer(&b)).unwrap();
        args.set(KernelArg::Buffer(&c)).unwrap();
        args.set(KernelArg::Uint(5)).unwrap();

        let p = plan(5, 4).unwrap();
        assert_eq!(p.global_size(), 8);
        ctx.launch(&kernel, &p, &args).unwrap();
        ctx.finish().unwrap();

        let mut out = vec![0.0; 5];
        ctx.read_back(&c, &mut out).unwrap();
        assert_eq!(out, vec![11.0, 22.0, 33.0, 44.0, 55.0]);
    }

    #[test]
    fn test_padding_items_leave_output_untouched() {
        let (_platform, mut ctx) = context();
        let kernel = ctx.build_kernel(KernelOp::VectorAdd).unwrap();
        let a = ctx.upload(&[1.0; 5]).unwrap();
        let b = ctx.upload(&[2.0; 5]).unwrap();
        let c = ctx.upload(&[-1.0; 12]).unwrap();

        let mut args = KernelArgs::new(KernelOp::VectorAdd);
        args.set(KernelArg::Buffer(&a)).unwrap();
        args.set(KernelArg::Buffer(&b)).unwrap();
        args.set(KernelArg::Buffer(&c)).unwrap();
        args.set(KernelArg::Uint(5)).unwrap();

        // 5 elements in groups of 4: work-items 5..8 are padding.
        let p = plan(5, 4).unwrap();
        assert_eq!(p.global_size(), 8);
        ctx.launch(&kernel, &p, &args).unwrap();

        let mut out = vec![0.0; 12];
        ctx.read_back(&c, &mut out).unwrap();
        assert_eq!(&out[..5], &[3.0; 5]);
        assert!(out[5..].iter().all(|&v| v == -1.0), "{out:?}");
    }

    #[test]
    fn test_local_size_above_device_limit() {
        let (_platform, mut ctx) = context();
        let kernel = ctx.build_kernel(KernelOp::VectorAdd).unwrap();
        let a = ctx.upload(&[1.0; 8]).unwrap();
        let b = ctx.upload(&[1.0; 8]).unwrap();
        let c = ctx.allocate(8).unwrap();
        let mut args = KernelArgs::new(KernelOp::VectorAdd);
        args.set(KernelArg::Buffer(&a)).unwrap();
        args.set(KernelArg::Buffer(&b)).unwrap();
        args.set(KernelArg::Buffer(&c)).unwrap();
        args.set(KernelArg::Uint(8)).unwrap();

        let err = ctx.launch(&kernel, &plan(8, 8).unwrap(), &args).unwrap_err();
        assert!(matches!(err, DispatchError::Launch { .. }));
    }

    #[test]
    fn test_count_beyond_buffer_is_rejected() {
        let (_platform, mut ctx) = context();
        let kernel = ctx.build_kernel(KernelOp::VectorAdd).unwrap();
        let a = ctx.upload(&[1.0; 3]).unwrap();
        let b = ctx.upload(&[1.0; 3]).unwrap();
        let c = ctx.allocate(3).unwrap();
        let mut args = KernelArgs::new(KernelOp::VectorAdd);
        args.set(KernelArg::Buffer(&a)).unwrap();
        args.set(KernelArg::Buffer(&b)).unwrap();
        args.set(KernelArg::Buffer(&c)).unwrap();
        args.set(KernelArg::Uint(4)).unwrap();

        let err = ctx.launch(&kernel, &plan(4, 4).unwrap(), &args).unwrap_err();
        assert!(matches!(err, DispatchError::Launch { .. }));
    }

    #[test]
    fn test_resources_released_on_drop() {
        let (platform, mut ctx) = context();
        let kernel = ctx.build_kernel(KernelOp::VectorAdd).unwrap();
        let a = ctx.upload(&[1.0]).unwrap();
        let c = ctx.allocate(1).unwrap();
        assert_eq!(
            platform.live_resources(),
            LiveResources {
                contexts: 1,
                kernels: 1,
                buffers: 2
            }
        );
        drop((a, c, kernel, ctx));
        assert!(platform.live_resources().is_empty());
    }

    #[test]
    fn test_injected_faults_map_to_stages() {
        let platform = SimPlatform::new(vec![SimDeviceSpec::accelerator("gpu", 1, 1)
            .failing_at(FaultPoint::Upload)
            .failing_at(FaultPoint::WorkGroupSize)]);
        let device = platform.enumerate(DeviceClass::All).unwrap().remove(0);
        let mut ctx = platform.create_context(&device).unwrap();
        let kernel = ctx.build_kernel(KernelOp::VectorAdd).unwrap();
        assert!(matches!(ctx.upload(&[1.0]), Err(DispatchError::Transfer { .. })));
        assert!(ctx
            .work_group_size(&kernel)
            .unwrap_err()
            .to_string()
            .contains("WorkGroupSize"));
    }
}
