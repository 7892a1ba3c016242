//! Collaborator interfaces to an accelerator runtime.
//!
//! A [`Platform`] enumerates devices and opens a [`DeviceContext`] on the
//! selected one. The context owns the command queue and hands out kernel
//! and buffer handles. Every handle releases its platform resources when
//! dropped, so an early `?` return never leaks a context, queue or buffer.

use crate::device::{ComputeDevice, DeviceClass, QueryError};
use crate::dispatch::DispatchPlan;
use crate::error::{DispatchError, Result};
use std::fmt;

/// Data-parallel operations a context can build kernels for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelOp {
    /// `c[i] = a[i] + b[i]` for `i < count`.
    VectorAdd,
}

/// Kind of a kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// Device buffer of `f32`
    Buffer,
    /// 32-bit unsigned scalar
    Uint,
}

impl KernelOp {
    /// Kernel entry point name.
    pub fn entry_point(self) -> &'static str {
        match self {
            Self::VectorAdd => "vectorAddition",
        }
    }

    /// Parameter kinds in declaration order.
    pub fn signature(self) -> &'static [ArgKind] {
        match self {
            // (a, b, c, count)
            Self::VectorAdd => &[ArgKind::Buffer, ArgKind::Buffer, ArgKind::Buffer, ArgKind::Uint],
        }
    }
}

impl fmt::Display for KernelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point())
    }
}

/// A single kernel argument.
#[derive(Debug)]
pub enum KernelArg<'a, B> {
    /// Device buffer
    Buffer(&'a B),
    /// Unsigned scalar
    Uint(u32),
}

impl<B> KernelArg<'_, B> {
    /// Kind of this argument.
    pub fn kind(&self) -> ArgKind {
        match self {
            Self::Buffer(_) => ArgKind::Buffer,
            Self::Uint(_) => ArgKind::Uint,
        }
    }
}

impl<B> Clone for KernelArg<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B> Copy for KernelArg<'_, B> {}

/// Arguments checked one by one against a kernel's signature.
#[derive(Debug)]
pub struct KernelArgs<'a, B> {
    op: KernelOp,
    args: Vec<KernelArg<'a, B>>,
}

impl<'a, B> KernelArgs<'a, B> {
    /// Starts binding arguments for `op`.
    pub fn new(op: KernelOp) -> Self {
        Self {
            op,
            args: Vec::with_capacity(op.signature().len()),
        }
    }

    /// Binds the next argument.
    ///
    /// Each call reports its own failure; a mismatch at one position is
    /// never folded into another's.
    pub fn set(&mut self, arg: KernelArg<'a, B>) -> Result<&mut Self> {
        let index = self.args.len();
        let expected = self.op.signature().get(index).copied().ok_or_else(|| {
            DispatchError::kernel_argument(
                index,
                format!("kernel '{}' takes {} arguments", self.op, self.op.signature().len()),
            )
        })?;
        if arg.kind() != expected {
            return Err(DispatchError::kernel_argument(
                index,
                format!("expected {expected:?}, got {:?}", arg.kind()),
            ));
        }
        self.args.push(arg);
        Ok(self)
    }

    /// Checks that every parameter has been bound.
    pub fn complete(&self) -> Result<()> {
        let expected = self.op.signature().len();
        if self.args.len() < expected {
            return Err(DispatchError::kernel_argument(
                self.args.len(),
                format!("argument not set ({} of {expected} bound)", self.args.len()),
            ));
        }
        Ok(())
    }

    /// Kernel these arguments belong to.
    pub fn op(&self) -> KernelOp {
        self.op
    }

    /// Buffer bound at `index`, if any.
    pub fn buffer(&self, index: usize) -> Option<&'a B> {
        match self.args.get(index) {
            Some(KernelArg::Buffer(b)) => Some(*b),
            _ => None,
        }
    }

    /// Scalar bound at `index`, if any.
    pub fn uint(&self, index: usize) -> Option<u32> {
        match self.args.get(index) {
            Some(KernelArg::Uint(v)) => Some(*v),
            _ => None,
        }
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether no argument has been bound yet.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// A compiled kernel handle.
pub trait Kernel {
    /// Operation this kernel implements.
    fn op(&self) -> KernelOp;
}

/// A device-resident `f32` buffer.
pub trait DeviceBuffer {
    /// Length in elements.
    fn len(&self) -> usize;

    /// Whether the buffer holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Context and command queue bound to one selected device.
pub trait DeviceContext {
    /// Buffer handle type.
    type Buffer: DeviceBuffer;
    /// Kernel handle type.
    type Kernel: Kernel;

    /// Compiles and creates the kernel for `op`.
    fn build_kernel(&mut self, op: KernelOp) -> Result<Self::Kernel>;

    /// Work-group size the device uses for `kernel`.
    ///
    /// The raw query result is returned; the planner decides whether the
    /// size is usable.
    fn work_group_size(&self, kernel: &Self::Kernel) -> std::result::Result<usize, QueryError>;

    /// Allocates a read-only buffer initialised from host memory.
    fn upload(&self, data: &[f32]) -> Result<Self::Buffer>;

    /// Allocates an uninitialised write-only buffer of `len` elements.
    fn allocate(&self, len: usize) -> Result<Self::Buffer>;

    /// Enqueues `kernel` with the given geometry and arguments.
    fn launch(
        &self,
        kernel: &Self::Kernel,
        plan: &DispatchPlan,
        args: &KernelArgs<'_, Self::Buffer>,
    ) -> Result<()>;

    /// Blocks until all enqueued work has completed.
    fn finish(&self) -> Result<()>;

    /// Blocking copy of `buffer` into `out`.
    fn read_back(&self, buffer: &Self::Buffer, out: &mut [f32]) -> Result<()>;
}

/// An accelerator runtime.
pub trait Platform {
    /// Device handle type.
    type Device: ComputeDevice;
    /// Context type opened on a device.
    type Context: DeviceContext;

    /// Platform name for diagnostics.
    fn name(&self) -> &str;

    /// Lists devices of `class` in a stable order.
    fn enumerate(&self, class: DeviceClass) -> Result<Vec<Self::Device>>;

    /// Opens a context and command queue on `device`.
    fn create_context(&self, device: &Self::Device) -> Result<Self::Context>;
}
