use std::path::PathBuf;

use offload_core::PartitionError;

use crate::catalog::DeviceClass;

pub type Result<T> = std::result::Result<T, DeviceError>;

/// Failures raised while discovering, programming or driving a device.
///
/// Every variant is terminal for a run; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no compute platform found")]
    NoPlatformFound,

    #[error("platform {platform} has no {class} device")]
    NoDeviceFound { platform: String, class: DeviceClass },

    #[error("failed to open device {name}: {reason}")]
    DeviceRequest { name: String, reason: String },

    #[error("kernel source {origin} is empty")]
    EmptySource { origin: String },

    #[error("failed to read kernel source {}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("program build failed:\n{diagnostics}")]
    BuildFailure { diagnostics: String },

    #[error("entry point `{name}` not found (available: {})", .available.join(", "))]
    EntryPointNotFound { name: String, available: Vec<String> },

    #[error("invalid kernel name `{name}`")]
    InvalidKernelName { name: String },

    #[error("kernel `{entry_point}` declares {declared} parameters but {bound} were bound")]
    ArityMismatch {
        entry_point: String,
        declared: usize,
        bound: usize,
    },

    #[error("argument slot {slot} of kernel `{entry_point}` is not a declared parameter")]
    UnknownSlot { entry_point: String, slot: u32 },

    #[error("local size {configured} does not match kernel workgroup size {declared:?}")]
    LocalSizeMismatch { configured: u32, declared: [u32; 3] },

    #[error("range bounds mismatch: {reason}")]
    RangeBoundsMismatch { reason: String },

    #[error("invalid memory region `{label}`: {reason}")]
    InvalidRegion { label: String, reason: String },

    #[error("device execution failed during {stage}: {diagnostics}")]
    DeviceExecutionFailure {
        stage: &'static str,
        diagnostics: String,
    },
}

impl DeviceError {
    pub(crate) fn execution(stage: &'static str, diagnostics: impl ToString) -> Self {
        DeviceError::DeviceExecutionFailure {
            stage,
            diagnostics: diagnostics.to_string(),
        }
    }

    pub(crate) fn region(label: &str, reason: impl Into<String>) -> Self {
        DeviceError::InvalidRegion {
            label: label.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<PartitionError> for DeviceError {
    fn from(err: PartitionError) -> Self {
        DeviceError::RangeBoundsMismatch {
            reason: err.to_string(),
        }
    }
}
