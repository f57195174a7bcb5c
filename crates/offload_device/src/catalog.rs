//! Platform and device discovery.
//!
//! A platform is a wgpu backend that exposes at least one adapter. Backends
//! are tried in a fixed order and the first platform wins; within it the
//! first adapter of the requested class is selected. There is no ranking.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wgpu::{Adapter, Backends, DeviceType, Instance, InstanceDescriptor};

use crate::error::{DeviceError, Result};

const PLATFORM_ORDER: [(Backends, &str); 4] = [
    (Backends::VULKAN, "Vulkan"),
    (Backends::METAL, "Metal"),
    (Backends::DX12, "DX12"),
    (Backends::GL, "GL"),
];

/// Which adapters count as candidate devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    #[default]
    All,
    Gpu,
    Cpu,
}

impl DeviceClass {
    pub fn admits(self, device_type: DeviceType) -> bool {
        match self {
            DeviceClass::All => true,
            DeviceClass::Gpu => matches!(
                device_type,
                DeviceType::DiscreteGpu | DeviceType::IntegratedGpu | DeviceType::VirtualGpu
            ),
            DeviceClass::Cpu => device_type == DeviceType::Cpu,
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::All => f.write_str("all"),
            DeviceClass::Gpu => f.write_str("gpu"),
            DeviceClass::Cpu => f.write_str("cpu"),
        }
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(DeviceClass::All),
            "gpu" => Ok(DeviceClass::Gpu),
            "cpu" => Ok(DeviceClass::Cpu),
            other => Err(format!("unknown device class `{other}` (expected all, gpu or cpu)")),
        }
    }
}

/// Capabilities reported for diagnostics. None of these drive dispatch decisions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub driver: String,
    pub driver_info: String,
    pub backend: String,
    pub device_type: String,
    pub max_work_item_sizes: [u32; 3],
    pub max_work_group_size: u32,
    pub max_work_groups_per_dimension: u32,
    /// wgpu does not expose compute unit counts.
    pub compute_units: Option<u32>,
    pub max_buffer_size: u64,
    pub max_storage_binding_size: u32,
    pub workgroup_storage_size: u32,
}

impl DeviceInfo {
    fn from_adapter(adapter: &Adapter) -> Self {
        let info = adapter.get_info();
        let limits = adapter.limits();
        Self {
            name: info.name,
            vendor: format!("0x{:04X}", info.vendor),
            driver: info.driver,
            driver_info: info.driver_info,
            backend: format!("{:?}", info.backend),
            device_type: format!("{:?}", info.device_type),
            max_work_item_sizes: [
                limits.max_compute_workgroup_size_x,
                limits.max_compute_workgroup_size_y,
                limits.max_compute_workgroup_size_z,
            ],
            max_work_group_size: limits.max_compute_invocations_per_workgroup,
            max_work_groups_per_dimension: limits.max_compute_workgroups_per_dimension,
            compute_units: None,
            max_buffer_size: limits.max_buffer_size,
            max_storage_binding_size: limits.max_storage_buffer_binding_size,
            workgroup_storage_size: limits.max_compute_workgroup_storage_size,
        }
    }
}

/// A backend together with the adapters it exposes.
#[derive(Debug)]
pub struct Platform {
    pub name: &'static str,
    adapters: Vec<Adapter>,
}

impl Platform {
    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }
}

/// Snapshot of the platforms visible to this process.
#[derive(Debug)]
pub struct DeviceCatalog {
    platforms: Vec<Platform>,
}

impl DeviceCatalog {
    /// Queries driver state for every known backend. Never fails; an empty
    /// catalog surfaces as [`DeviceError::NoPlatformFound`] on lookup.
    pub fn discover() -> Self {
        let instance = Instance::new(&InstanceDescriptor {
            backends: Backends::all(),
            ..Default::default()
        });
        let platforms: Vec<Platform> = PLATFORM_ORDER
            .iter()
            .filter_map(|&(backend, name)| {
                let adapters = instance.enumerate_adapters(backend);
                (!adapters.is_empty()).then_some(Platform { name, adapters })
            })
            .collect();
        tracing::info!(platforms = platforms.len(), "platforms found");
        Self { platforms }
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    /// Devices of `class` on the first platform, in driver order.
    pub fn list_devices(&self, class: DeviceClass) -> Result<Vec<DeviceEntry<'_>>> {
        let platform = self.platforms.first().ok_or(DeviceError::NoPlatformFound)?;
        let devices: Vec<DeviceEntry<'_>> = platform
            .adapters
            .iter()
            .filter(|adapter| class.admits(adapter.get_info().device_type))
            .map(|adapter| DeviceEntry {
                platform: platform.name,
                adapter,
                info: DeviceInfo::from_adapter(adapter),
            })
            .collect();
        if devices.is_empty() {
            return Err(DeviceError::NoDeviceFound {
                platform: platform.name.to_owned(),
                class,
            });
        }
        tracing::info!(platform = platform.name, devices = devices.len(), "devices found");
        Ok(devices)
    }

    /// Opens the first device of `class` on the first platform.
    pub fn select(&self, class: DeviceClass) -> Result<DeviceHandle> {
        let devices = self.list_devices(class)?;
        devices[0].open()
    }
}

/// An adapter that has not been opened yet.
#[derive(Debug)]
pub struct DeviceEntry<'c> {
    pub platform: &'static str,
    adapter: &'c Adapter,
    info: DeviceInfo,
}

impl DeviceEntry<'_> {
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Requests a logical device with the adapter's full limits so large
    /// vectors are not capped by WebGPU defaults.
    pub fn open(&self) -> Result<DeviceHandle> {
        let limits = self.adapter.limits();
        let descriptor = wgpu::DeviceDescriptor {
            label: Some("offload_device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            ..Default::default()
        };
        let (device, queue) = pollster::block_on(self.adapter.request_device(&descriptor, None))
            .map_err(|err| DeviceError::DeviceRequest {
                name: self.info.name.clone(),
                reason: err.to_string(),
            })?;
        device.on_uncaptured_error(Box::new(|err: wgpu::Error| {
            tracing::error!(error = %err, "uncaptured device error");
        }));
        tracing::info!(device = %self.info.name, platform = self.platform, "device opened");
        Ok(DeviceHandle {
            device,
            queue,
            limits,
            info: self.info.clone(),
        })
    }
}

/// The one device a run executes on.
#[derive(Debug)]
pub struct DeviceHandle {
    device: wgpu::Device,
    queue: wgpu::Queue,
    limits: wgpu::Limits,
    info: DeviceInfo,
}

impl DeviceHandle {
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Pushes a validation error scope, runs `f`, and turns any captured
    /// error into `on_error(message)`.
    pub(crate) fn scoped<T>(
        &self,
        f: impl FnOnce(&wgpu::Device) -> T,
        on_error: impl FnOnce(String) -> DeviceError,
    ) -> Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(on_error(err.to_string())),
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_filter_device_types() {
        assert!(DeviceClass::All.admits(DeviceType::Other));
        assert!(DeviceClass::Gpu.admits(DeviceType::DiscreteGpu));
        assert!(DeviceClass::Gpu.admits(DeviceType::IntegratedGpu));
        assert!(!DeviceClass::Gpu.admits(DeviceType::Cpu));
        assert!(DeviceClass::Cpu.admits(DeviceType::Cpu));
        assert!(!DeviceClass::Cpu.admits(DeviceType::VirtualGpu));
    }

    #[test]
    fn classes_parse_from_cli_names() {
        assert_eq!("gpu".parse::<DeviceClass>(), Ok(DeviceClass::Gpu));
        assert_eq!(DeviceClass::default(), DeviceClass::All);
        assert!("fpga".parse::<DeviceClass>().is_err());
    }

    #[test]
    fn empty_catalog_reports_missing_platform() {
        let catalog = DeviceCatalog {
            platforms: Vec::new(),
        };
        assert!(matches!(
            catalog.list_devices(DeviceClass::All),
            Err(DeviceError::NoPlatformFound)
        ));
        assert!(matches!(
            catalog.select(DeviceClass::Gpu),
            Err(DeviceError::NoPlatformFound)
        ));
    }
}
