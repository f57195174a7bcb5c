//! Device memory regions with explicit ownership.
//!
//! A [`MemoryRegion`] is handed out by exactly one [`RegionManager::allocate`]
//! call and consumed by exactly one [`RegionManager::release`] call, so double
//! release and use-after-release do not compile. Host-backed regions borrow
//! their host slice for `'h`, which keeps the host from mutating it while the
//! region (and any dispatch bound to it) is alive.

use std::cell::Cell;
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::mpsc;

use offload_core::Element;
use serde::Serialize;
use wgpu::util::DeviceExt;
use wgpu::BufferUsages;

use crate::catalog::DeviceHandle;
use crate::error::{DeviceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Filled from host memory at allocation; the device only reads it.
    HostBacked,
    /// Device-private storage the device writes and the host reads back.
    WriteOnly,
    /// Readable and writable from both sides.
    Shared,
}

impl AccessMode {
    fn usages(self) -> BufferUsages {
        match self {
            AccessMode::HostBacked => BufferUsages::STORAGE,
            AccessMode::WriteOnly => BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            AccessMode::Shared => {
                BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST
            }
        }
    }

    pub fn host_readable(self) -> bool {
        !matches!(self, AccessMode::HostBacked)
    }
}

/// A typed device buffer. `'h` is the lifetime of the host backing, if any.
#[derive(Debug)]
pub struct MemoryRegion<'h, T> {
    label: String,
    buffer: wgpu::Buffer,
    len: usize,
    mode: AccessMode,
    _host: PhantomData<&'h [T]>,
}

impl<T: Element> MemoryRegion<'_, T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn size_bytes(&self) -> u64 {
        (self.len * size_of::<T>()) as u64
    }

    pub(crate) fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// Allocates, reads back and releases regions on one device.
#[derive(Debug)]
pub struct RegionManager<'d> {
    device: &'d DeviceHandle,
    live: Cell<usize>,
}

impl<'d> RegionManager<'d> {
    pub fn new(device: &'d DeviceHandle) -> Self {
        Self {
            device,
            live: Cell::new(0),
        }
    }

    /// Regions allocated and not yet released.
    pub fn live(&self) -> usize {
        self.live.get()
    }

    pub fn allocate<'h, T: Element>(
        &self,
        label: &str,
        len: usize,
        mode: AccessMode,
        host: Option<&'h [T]>,
    ) -> Result<MemoryRegion<'h, T>> {
        if len == 0 {
            return Err(DeviceError::region(label, "zero-length region"));
        }
        let size = (len as u64) * size_of::<T>() as u64;
        let limits = self.device.limits();
        let max = limits
            .max_buffer_size
            .min(u64::from(limits.max_storage_buffer_binding_size));
        if size > max {
            return Err(DeviceError::region(
                label,
                format!("{size} bytes exceed the device limit of {max} bytes"),
            ));
        }

        let device = self.device.device();
        let buffer = match (mode, host) {
            (AccessMode::WriteOnly, Some(_)) => {
                return Err(DeviceError::region(
                    label,
                    "write-only regions cannot alias host memory",
                ));
            }
            (AccessMode::HostBacked, None) => {
                return Err(DeviceError::region(
                    label,
                    "host-backed regions need host memory",
                ));
            }
            (_, Some(host)) if host.len() != len => {
                return Err(DeviceError::region(
                    label,
                    format!("host backing has {} elements, expected {len}", host.len()),
                ));
            }
            (_, Some(host)) => device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(host),
                usage: mode.usages(),
            }),
            (_, None) => device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: mode.usages(),
                mapped_at_creation: false,
            }),
        };

        self.live.set(self.live.get() + 1);
        tracing::debug!(region = label, len, ?mode, bytes = size, "region allocated");
        Ok(MemoryRegion {
            label: label.to_owned(),
            buffer,
            len,
            mode,
            _host: PhantomData,
        })
    }

    /// Copies the region into host memory, blocking until the device has
    /// finished every submission that precedes the copy.
    pub fn read_back<T: Element>(&self, region: &MemoryRegion<'_, T>) -> Result<Vec<T>> {
        if !region.mode.host_readable() {
            return Err(DeviceError::region(
                &region.label,
                "host-backed regions are not readable by the host",
            ));
        }
        let device = self.device.device();
        let size = region.size_bytes();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("read-back staging"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("read-back encoder"),
        });
        encoder.copy_buffer_to_buffer(&region.buffer, 0, &staging, 0, size);
        self.device.queue().submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| DeviceError::execution("read-back", "map callback never ran"))?
            .map_err(|err| DeviceError::execution("read-back", err))?;

        let data = slice.get_mapped_range();
        let values: Vec<T> = bytemuck::pod_collect_to_vec::<u8, T>(&data);
        drop(data);
        staging.unmap();
        Ok(values)
    }

    /// Ends the region's lifetime and frees its device memory.
    pub fn release<T: Element>(&self, region: MemoryRegion<'_, T>) {
        region.buffer.destroy();
        self.live.set(self.live.get().saturating_sub(1));
        tracing::debug!(region = %region.label, "region released");
    }
}
