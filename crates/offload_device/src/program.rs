//! Loading WGSL programs and resolving their compute entry points.
//!
//! Loading happens in three steps so the host-side checks run before any
//! device is touched:
//! 1. [`ProgramSource`] rejects empty or unreadable text.
//! 2. [`ProgramSource::parse`] runs the naga front end and validator and
//!    extracts each compute entry point's declared parameters.
//! 3. [`ParsedProgram::build`] creates the shader module on a device.

use std::borrow::Cow;
use std::path::Path;

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, ShaderStage, StorageAccess};
use serde::Serialize;
use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BufferBindingType, ComputePipeline, ComputePipelineDescriptor, PipelineLayoutDescriptor,
    ShaderModule, ShaderStages,
};

use crate::catalog::DeviceHandle;
use crate::error::{DeviceError, Result};

/// How a kernel parameter is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Uniform,
    StorageRead,
    StorageReadWrite,
}

impl ParamKind {
    fn binding_type(self) -> BufferBindingType {
        match self {
            ParamKind::Uniform => BufferBindingType::Uniform,
            ParamKind::StorageRead => BufferBindingType::Storage { read_only: true },
            ParamKind::StorageReadWrite => BufferBindingType::Storage { read_only: false },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelParam {
    pub slot: u32,
    pub name: String,
    pub kind: ParamKind,
}

/// Declared interface of one compute entry point. Parameters are sorted by slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelSignature {
    pub name: String,
    pub workgroup_size: [u32; 3],
    pub params: Vec<KernelParam>,
}

impl KernelSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn param(&self, slot: u32) -> Option<&KernelParam> {
        self.params.iter().find(|param| param.slot == slot)
    }

    /// WGSL fixes the workgroup size at compile time, so a launch must use it as is.
    pub fn check_local_size(&self, local_size: u32) -> Result<()> {
        if self.workgroup_size == [local_size, 1, 1] {
            Ok(())
        } else {
            Err(DeviceError::LocalSizeMismatch {
                configured: local_size,
                declared: self.workgroup_size,
            })
        }
    }
}

/// Non-empty program text plus where it came from.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    origin: String,
    text: String,
}

impl ProgramSource {
    pub fn new(origin: impl Into<String>, text: impl Into<String>) -> Result<Self> {
        let origin = origin.into();
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DeviceError::EmptySource { origin });
        }
        Ok(Self { origin, text })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|source| DeviceError::SourceUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Self::new(path.display().to_string(), text)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parses and validates the program on the host.
    pub fn parse(self) -> Result<ParsedProgram> {
        let module = naga::front::wgsl::parse_str(&self.text).map_err(|err| {
            DeviceError::BuildFailure {
                diagnostics: err.emit_to_string_with_path(&self.text, &self.origin),
            }
        })?;
        let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
        let info = validator
            .validate(&module)
            .map_err(|err| DeviceError::BuildFailure {
                diagnostics: error_chain(&err),
            })?;

        let mut kernels = Vec::new();
        for (index, entry) in module.entry_points.iter().enumerate() {
            if entry.stage != ShaderStage::Compute {
                continue;
            }
            let uses = info.get_entry_point(index);
            let mut params = Vec::new();
            for (handle, global) in module.global_variables.iter() {
                if uses[handle].is_empty() {
                    continue;
                }
                let Some(binding) = &global.binding else {
                    continue;
                };
                if binding.group != 0 {
                    return Err(DeviceError::BuildFailure {
                        diagnostics: format!(
                            "{}: entry point `{}` uses bind group {}; only group 0 is supported",
                            self.origin, entry.name, binding.group
                        ),
                    });
                }
                let kind = match global.space {
                    AddressSpace::Uniform => ParamKind::Uniform,
                    AddressSpace::Storage { access } if access.contains(StorageAccess::STORE) => {
                        ParamKind::StorageReadWrite
                    }
                    AddressSpace::Storage { .. } => ParamKind::StorageRead,
                    other => {
                        return Err(DeviceError::BuildFailure {
                            diagnostics: format!(
                                "{}: binding {} of `{}` uses unsupported address space {other:?}",
                                self.origin, binding.binding, entry.name
                            ),
                        })
                    }
                };
                params.push(KernelParam {
                    slot: binding.binding,
                    name: global.name.clone().unwrap_or_default(),
                    kind,
                });
            }
            params.sort_by_key(|param| param.slot);
            kernels.push(KernelSignature {
                name: entry.name.clone(),
                workgroup_size: entry.workgroup_size,
                params,
            });
        }

        tracing::debug!(origin = %self.origin, kernels = kernels.len(), "program parsed");
        Ok(ParsedProgram {
            source: self,
            kernels,
        })
    }
}

/// A program that passed host-side validation.
#[derive(Debug, Clone)]
pub struct ParsedProgram {
    source: ProgramSource,
    kernels: Vec<KernelSignature>,
}

impl ParsedProgram {
    pub fn kernels(&self) -> &[KernelSignature] {
        &self.kernels
    }

    pub fn signature(&self, name: &str) -> Result<&KernelSignature> {
        self.kernels
            .iter()
            .find(|kernel| kernel.name == name)
            .ok_or_else(|| DeviceError::EntryPointNotFound {
                name: name.to_owned(),
                available: self.kernels.iter().map(|k| k.name.clone()).collect(),
            })
    }

    /// Creates the shader module on `device`. Blocks until the driver has
    /// accepted or rejected it.
    pub fn build(self, device: &DeviceHandle) -> Result<CompiledProgram<'_>> {
        let label = self.source.origin.clone();
        let module = device.scoped(
            |dev| {
                dev.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label.as_str()),
                    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(self.source.text())),
                })
            },
            |diagnostics| DeviceError::BuildFailure { diagnostics },
        )?;
        tracing::info!(program = %label, "program build success");
        Ok(CompiledProgram {
            device,
            module,
            parsed: self,
        })
    }
}

/// Reads, validates and builds `source` for `device` in one call.
pub fn compile<'d>(
    source: &str,
    origin: &str,
    device: &'d DeviceHandle,
) -> Result<CompiledProgram<'d>> {
    ProgramSource::new(origin, source)?.parse()?.build(device)
}

/// A program built for exactly one device.
#[derive(Debug)]
pub struct CompiledProgram<'d> {
    device: &'d DeviceHandle,
    module: ShaderModule,
    parsed: ParsedProgram,
}

impl<'d> CompiledProgram<'d> {
    pub fn device(&self) -> &'d DeviceHandle {
        self.device
    }

    pub fn origin(&self) -> &str {
        self.parsed.source.origin()
    }

    pub fn kernels(&self) -> &[KernelSignature] {
        self.parsed.kernels()
    }

    /// Resolves `name` to a pipeline whose bind group layout mirrors the
    /// entry point's declared parameters.
    pub fn kernel(&self, name: &str) -> Result<Kernel> {
        let signature = self.parsed.signature(name)?.clone();
        let entries: Vec<BindGroupLayoutEntry> = signature
            .params
            .iter()
            .map(|param| BindGroupLayoutEntry {
                binding: param.slot,
                visibility: ShaderStages::COMPUTE,
                ty: BindingType::Buffer {
                    ty: param.kind.binding_type(),
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();

        let (layout, pipeline) = self.device.scoped(
            |dev| {
                let layout = dev.create_bind_group_layout(&BindGroupLayoutDescriptor {
                    label: Some(signature.name.as_str()),
                    entries: &entries,
                });
                let pipeline_layout = dev.create_pipeline_layout(&PipelineLayoutDescriptor {
                    label: Some(signature.name.as_str()),
                    bind_group_layouts: &[&layout],
                    push_constant_ranges: &[],
                });
                let pipeline = dev.create_compute_pipeline(&ComputePipelineDescriptor {
                    label: Some(signature.name.as_str()),
                    layout: Some(&pipeline_layout),
                    module: &self.module,
                    entry_point: Some(signature.name.as_str()),
                    compilation_options: Default::default(),
                    cache: None,
                });
                (layout, pipeline)
            },
            |diagnostics| DeviceError::BuildFailure { diagnostics },
        )?;

        Ok(Kernel {
            signature,
            layout,
            pipeline,
        })
    }
}

/// A resolved entry point ready to launch.
#[derive(Debug)]
pub struct Kernel {
    signature: KernelSignature,
    layout: BindGroupLayout,
    pipeline: ComputePipeline,
}

impl Kernel {
    pub fn signature(&self) -> &KernelSignature {
        &self.signature
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub(crate) fn layout(&self) -> &BindGroupLayout {
        &self.layout
    }

    pub(crate) fn pipeline(&self) -> &ComputePipeline {
        &self.pipeline
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_kernels::source;

    #[test]
    fn empty_source_fails_before_parsing() {
        let err = ProgramSource::new("inline", "").unwrap_err();
        assert!(matches!(err, DeviceError::EmptySource { ref origin } if origin == "inline"));
        assert!(matches!(
            ProgramSource::new("inline", "  \n\t"),
            Err(DeviceError::EmptySource { .. })
        ));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = ProgramSource::from_file("/nonexistent/kernel.wgsl").unwrap_err();
        assert!(matches!(err, DeviceError::SourceUnreadable { .. }));
    }

    #[test]
    fn reference_kernel_declares_ordered_parameters() {
        let parsed = ProgramSource::new("affine.wgsl", source::AFFINE)
            .unwrap()
            .parse()
            .unwrap();
        let signature = parsed.signature("affine").unwrap();
        assert_eq!(signature.workgroup_size, [8, 1, 1]);
        let layout: Vec<_> = signature
            .params
            .iter()
            .map(|p| (p.slot, p.name.as_str(), p.kind))
            .collect();
        assert_eq!(
            layout,
            [
                (0, "params", ParamKind::Uniform),
                (1, "x", ParamKind::StorageRead),
                (2, "y", ParamKind::StorageRead),
                (3, "result", ParamKind::StorageReadWrite),
            ]
        );
        assert_eq!(signature.arity(), 4);
    }

    #[test]
    fn local_size_must_equal_declared_workgroup_size() {
        let parsed = ProgramSource::new("vadd.wgsl", source::VADD)
            .unwrap()
            .parse()
            .unwrap();
        let signature = parsed.signature("vadd").unwrap();
        assert!(signature.check_local_size(8).is_ok());
        assert!(matches!(
            signature.check_local_size(16),
            Err(DeviceError::LocalSizeMismatch {
                configured: 16,
                declared: [8, 1, 1]
            })
        ));
    }

    #[test]
    fn unknown_entry_point_lists_available_ones() {
        let parsed = ProgramSource::new("vadd.wgsl", source::VADD)
            .unwrap()
            .parse()
            .unwrap();
        match parsed.signature("saxpy").unwrap_err() {
            DeviceError::EntryPointNotFound { name, available } => {
                assert_eq!(name, "saxpy");
                assert_eq!(available, ["vadd"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn syntax_errors_surface_diagnostics() {
        let broken = "@compute @workgroup_size(8)\nfn vadd( {\n}\n";
        let err = ProgramSource::new("broken.wgsl", broken)
            .unwrap()
            .parse()
            .unwrap_err();
        match err {
            DeviceError::BuildFailure { diagnostics } => {
                assert!(diagnostics.contains("broken.wgsl"), "{diagnostics}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validation_errors_surface_diagnostics() {
        let mistyped = r#"
            @group(0) @binding(0) var<storage, read_write> out: array<f32>;
            @compute @workgroup_size(8)
            fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
                out[gid.x] = gid.x;
            }
        "#;
        let err = ProgramSource::new("mistyped.wgsl", mistyped)
            .unwrap()
            .parse()
            .unwrap_err();
        assert!(matches!(err, DeviceError::BuildFailure { .. }));
    }

    #[test]
    fn non_zero_bind_groups_are_rejected() {
        let grouped = r#"
            @group(1) @binding(0) var<storage, read_write> out: array<u32>;
            @compute @workgroup_size(8)
            fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
                out[gid.x] = gid.x;
            }
        "#;
        let err = ProgramSource::new("grouped.wgsl", grouped)
            .unwrap()
            .parse()
            .unwrap_err();
        match err {
            DeviceError::BuildFailure { diagnostics } => {
                assert!(diagnostics.contains("only group 0"), "{diagnostics}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
