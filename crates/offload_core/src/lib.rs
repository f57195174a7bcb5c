//! Host-side domain logic for the compute offload harness.
//!
//! Everything here is independent of any GPU backend:
//! - element types and the per-element transforms
//! - deterministic input generation
//! - the work partition shared with the device dispatcher
//! - the sequential oracle, the verifier and strategy timing

pub mod element;
pub mod partition;
pub mod sequential;
pub mod timing;
pub mod transform;
pub mod vectors;
pub mod verify;

pub use element::{Element, ElementKind, Tolerance};
pub use partition::{PartitionError, WorkPartition};
pub use sequential::run_sequential;
pub use timing::{measure, Timed, TimingEntry, TimingReport};
pub use transform::{Transform, Workload};
pub use vectors::{
    ramp_inputs, seeded_float_inputs, InputPair, InputVector, OutputVector, RampTooLong,
    UnequalInputs,
};
pub use verify::{verify, verify_against, verify_constant, VerifyError};
