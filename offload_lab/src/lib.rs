//! Offload Lab: runs one vector workload sequentially and on a wgpu device,
//! verifies the device output against the sequential oracle and reports
//! per-strategy timings.

pub mod config;
pub mod report;

use anyhow::{Context, Result};
use offload_core::{
    measure, ramp_inputs, run_sequential, seeded_float_inputs, verify_against, verify_constant,
    Element, ElementKind, InputPair, OutputVector, TimingReport, VerifyError, WorkPartition,
};
use offload_device::{
    run_parallel, CompiledProgram, DeviceCatalog, DeviceClass, DeviceEntry, ProgramSource,
};

pub use config::{parse_args, HarnessConfig, ReportFormat};
pub use report::{DeviceListing, RunReport};

/// Describes every device of `class` on the first platform without opening any.
pub fn list_devices(class: DeviceClass) -> Result<DeviceListing> {
    let catalog = DeviceCatalog::discover();
    let entries = catalog.list_devices(class).context("device discovery")?;
    Ok(listing(&entries, None))
}

/// Executes the full pipeline for `config`. Any failure is terminal and
/// carries the name of the stage it happened in.
pub fn run(config: &HarnessConfig) -> Result<RunReport> {
    let kernel_path = config.kernel_path();
    let parsed = ProgramSource::from_file(&kernel_path)
        .and_then(ProgramSource::parse)
        .context("program load")?;

    let operands = match config.workload.element() {
        ElementKind::I32 => Operands::Int(ramp_inputs(config.size).context("input generation")?),
        ElementKind::F32 => Operands::Float(seeded_float_inputs(config.size, config.seed)),
    };

    let catalog = DeviceCatalog::discover();
    let entries = catalog.list_devices(config.device).context("device discovery")?;
    let devices = listing(&entries, Some(0));
    let device = entries[0].open().context("device discovery")?;
    let program = parsed.build(&device).context("program build")?;

    let partition = WorkPartition::new(
        config.size,
        config.local_size,
        device.limits().max_compute_workgroups_per_dimension,
    )
    .context("work partition")?;
    tracing::debug!(?partition, "work partition");

    let tolerance = config.tolerance();
    let timings = match &operands {
        Operands::Int(inputs) => {
            // Every ramp sum equals the ramp length.
            let sum = i32::try_from(inputs.len()).context("input generation")?;
            run_strategies(
                config,
                &program,
                inputs,
                config.coeff.round() as i32,
                |sequential| verify_constant(sequential, inputs.len(), sum, tolerance),
            )?
        }
        // Seeded floats have no closed form; the sequential output is the oracle.
        Operands::Float(inputs) => {
            run_strategies(config, &program, inputs, config.coeff, |_| Ok(()))?
        }
    };

    Ok(RunReport {
        config: config.clone(),
        kernel: format!("{}:{}", kernel_path.display(), config.entry_point()),
        devices,
        partition,
        timings,
    })
}

enum Operands {
    Int(InputPair<i32>),
    Float(InputPair<f32>),
}

fn run_strategies<T: Element>(
    config: &HarnessConfig,
    program: &CompiledProgram<'_>,
    inputs: &InputPair<T>,
    coeff: T,
    check_sequential: impl FnOnce(&OutputVector<T>) -> Result<(), VerifyError<T>>,
) -> Result<TimingReport> {
    let transform = config.workload.transform();
    let tolerance = config.tolerance();
    let mut timings = TimingReport::default();
    tracing::info!(
        workload = %config.workload,
        elements = inputs.len(),
        %coeff,
        "inputs ready"
    );

    let timed = measure("sequential", || run_sequential(inputs, coeff, transform));
    let sequential_ms = timed.millis();
    let sequential = timed.record(&mut timings);
    check_sequential(&sequential)
        .with_context(|| format!("verification (sequential, {sequential_ms} ms)"))?;

    let timed = measure("parallel", || {
        run_parallel(
            program,
            config.entry_point(),
            inputs,
            coeff,
            config.local_size,
        )
    });
    let parallel_ms = timed.millis();
    let parallel = timed
        .record(&mut timings)
        .with_context(|| format!("parallel dispatch ({parallel_ms} ms)"))?;
    verify_against(&parallel, &sequential, tolerance)
        .with_context(|| format!("verification (parallel, {parallel_ms} ms)"))?;
    tracing::info!(elements = parallel.len(), "verification passed");

    Ok(timings)
}

fn listing(entries: &[DeviceEntry<'_>], selected: Option<usize>) -> DeviceListing {
    DeviceListing {
        platform: entries
            .first()
            .map(|entry| entry.platform.to_owned())
            .unwrap_or_default(),
        devices: entries.iter().map(|entry| entry.info().clone()).collect(),
        selected,
    }
}
