//! wgpu side of the offload harness: device discovery, kernel programs,
//! memory regions and dispatch.
//!
//! The usual flow is
//! [`DeviceCatalog::discover`] → [`DeviceCatalog::select`] → [`compile`] →
//! [`run_parallel`]. The lower-level pieces ([`RegionManager`],
//! [`ArgumentList`], [`Dispatcher`]) are public for callers that drive their
//! own kernels.

pub mod binding;
pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod program;
pub mod region;

pub use binding::{ArgumentList, LaunchParams, ScalarBlock};
pub use catalog::{DeviceCatalog, DeviceClass, DeviceEntry, DeviceHandle, DeviceInfo, Platform};
pub use dispatch::{run_parallel, Dispatcher, PendingDispatch};
pub use error::{DeviceError, Result};
pub use program::{
    compile, CompiledProgram, Kernel, KernelParam, KernelSignature, ParamKind, ParsedProgram,
    ProgramSource,
};
pub use region::{AccessMode, MemoryRegion, RegionManager};
