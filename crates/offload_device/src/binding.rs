//! Positional binding of host resources to kernel parameters.
//!
//! Slots are matched by position only. The list checks arity and that every
//! slot is declared by the kernel, but it cannot tell two same-typed buffers
//! apart: binding `x` and `y` in swapped slots produces wrong numbers, not an
//! error. Keeping slots in the kernel's declared order is the caller's job.

use offload_core::{Element, WorkPartition};
use wgpu::util::DeviceExt;
use wgpu::BindGroupEntry;

use crate::catalog::DeviceHandle;
use crate::error::{DeviceError, Result};
use crate::program::{KernelSignature, ParamKind};
use crate::region::{AccessMode, MemoryRegion};

/// Uniform block layout shared by the reference kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LaunchParams {
    pub coeff_bits: u32,
    pub len: u32,
    pub row_pitch: u32,
    pub _pad: u32,
}

impl LaunchParams {
    pub fn new<T: Element>(coeff: T, partition: &WorkPartition) -> Self {
        Self {
            coeff_bits: coeff.to_bits(),
            len: partition.len() as u32,
            row_pitch: partition.row_pitch(),
            _pad: 0,
        }
    }
}

/// The scalar coefficient and launch geometry, uploaded once and read by every work-item.
#[derive(Debug)]
pub struct ScalarBlock {
    params: LaunchParams,
    buffer: wgpu::Buffer,
}

impl ScalarBlock {
    pub fn new(device: &DeviceHandle, params: LaunchParams) -> Self {
        let buffer = device
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("launch params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        Self { params, buffer }
    }

    pub fn params(&self) -> &LaunchParams {
        &self.params
    }

    pub fn release(self) {
        self.buffer.destroy();
    }
}

#[derive(Debug)]
struct BoundArg<'a> {
    slot: u32,
    buffer: &'a wgpu::Buffer,
    kind: ParamKind,
    label: &'a str,
    len: Option<usize>,
    mode: Option<AccessMode>,
}

/// Ordered `(slot, argument)` pairs for one launch.
///
/// Output regions are borrowed mutably for `'a`, so nothing else can reach
/// them until the launch that consumes this list has been waited on.
#[derive(Debug, Default)]
pub struct ArgumentList<'a> {
    args: Vec<BoundArg<'a>>,
}

impl<'a> ArgumentList<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scalar(mut self, slot: u32, block: &'a ScalarBlock) -> Self {
        self.args.push(BoundArg {
            slot,
            buffer: &block.buffer,
            kind: ParamKind::Uniform,
            label: "launch params",
            len: None,
            mode: None,
        });
        self
    }

    pub fn input<T: Element>(mut self, slot: u32, region: &'a MemoryRegion<'_, T>) -> Self {
        self.args.push(BoundArg {
            slot,
            buffer: region.buffer(),
            kind: ParamKind::StorageRead,
            label: region.label(),
            len: Some(region.len()),
            mode: Some(region.mode()),
        });
        self
    }

    pub fn output<T: Element>(mut self, slot: u32, region: &'a mut MemoryRegion<'_, T>) -> Self {
        let region: &'a MemoryRegion<'_, T> = region;
        self.args.push(BoundArg {
            slot,
            buffer: region.buffer(),
            kind: ParamKind::StorageReadWrite,
            label: region.label(),
            len: Some(region.len()),
            mode: Some(region.mode()),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Checks the list against the kernel's declared parameters and the
    /// partition it will be launched over.
    pub(crate) fn validate(&self, signature: &KernelSignature, partition_len: usize) -> Result<()> {
        let mut slots: Vec<u32> = self.args.iter().map(|arg| arg.slot).collect();
        slots.sort_unstable();
        slots.dedup();
        if slots.len() != self.args.len() || slots.len() != signature.arity() {
            return Err(DeviceError::ArityMismatch {
                entry_point: signature.name.clone(),
                declared: signature.arity(),
                bound: slots.len(),
            });
        }

        for arg in &self.args {
            if signature.param(arg.slot).is_none() {
                return Err(DeviceError::UnknownSlot {
                    entry_point: signature.name.clone(),
                    slot: arg.slot,
                });
            }
            if arg.kind == ParamKind::StorageReadWrite && arg.mode == Some(AccessMode::HostBacked) {
                return Err(DeviceError::region(
                    arg.label,
                    "host-backed regions cannot be bound as outputs",
                ));
            }
            if let Some(len) = arg.len {
                if len != partition_len {
                    return Err(DeviceError::RangeBoundsMismatch {
                        reason: format!(
                            "region `{}` holds {len} elements but the range covers {partition_len}",
                            arg.label
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn entries(&self) -> Vec<BindGroupEntry<'a>> {
        self.args
            .iter()
            .map(|arg| {
                let buffer: &'a wgpu::Buffer = arg.buffer;
                BindGroupEntry {
                    binding: arg.slot,
                    resource: buffer.as_entire_binding(),
                }
            })
            .collect()
    }
}
