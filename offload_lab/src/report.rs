//! Console and JSON rendering of a run.

use std::fmt;

use anyhow::{Context, Result};
use offload_core::{TimingReport, WorkPartition};
use offload_device::DeviceInfo;
use serde::Serialize;

use crate::config::{HarnessConfig, ReportFormat};

/// Devices of the chosen platform, in catalog order.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListing {
    pub platform: String,
    pub devices: Vec<DeviceInfo>,
    /// Index into `devices` of the device the run executes on, if any.
    pub selected: Option<usize>,
}

impl fmt::Display for DeviceListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Platform: {}", self.platform)?;
        for (index, device) in self.devices.iter().enumerate() {
            let marker = if self.selected == Some(index) {
                " (selected)"
            } else {
                ""
            };
            writeln!(f, "Device [{index}]{marker}: {}", device.name)?;
            writeln!(f, "  vendor              : {}", device.vendor)?;
            writeln!(f, "  driver              : {} {}", device.driver, device.driver_info)?;
            writeln!(f, "  backend / type      : {} / {}", device.backend, device.device_type)?;
            writeln!(f, "  max work-item sizes : {:?}", device.max_work_item_sizes)?;
            writeln!(f, "  max work-group size : {}", device.max_work_group_size)?;
            writeln!(
                f,
                "  max groups per dim  : {}",
                device.max_work_groups_per_dimension
            )?;
            match device.compute_units {
                Some(units) => writeln!(f, "  compute units       : {units}")?,
                None => writeln!(f, "  compute units       : unavailable")?,
            }
            writeln!(f, "  max buffer size     : {} bytes", device.max_buffer_size)?;
            writeln!(
                f,
                "  max storage binding : {} bytes",
                device.max_storage_binding_size
            )?;
            writeln!(
                f,
                "  workgroup storage   : {} bytes",
                device.workgroup_storage_size
            )?;
        }
        Ok(())
    }
}

/// Outcome of a successful run. Failed runs never produce a report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub config: HarnessConfig,
    pub kernel: String,
    pub devices: DeviceListing,
    pub partition: WorkPartition,
    pub timings: TimingReport,
}

impl RunReport {
    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(self.to_string()),
            ReportFormat::Json => {
                serde_json::to_string_pretty(self).context("failed to serialize run report")
            }
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.devices)?;
        writeln!(
            f,
            "Workload '{}' over {} elements (kernel {}, local size {}, groups {:?})",
            self.config.workload,
            self.config.size,
            self.kernel,
            self.config.local_size,
            self.partition.groups()
        )?;
        for entry in self.timings.entries() {
            writeln!(f, "  {:<10} : {} ms", entry.label, entry.elapsed_ms)?;
        }
        writeln!(f, "Verification passed (tolerance {})", self.config.tolerance)
    }
}
