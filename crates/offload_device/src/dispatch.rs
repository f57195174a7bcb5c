//! Launching kernels over a work partition and waiting on them.

use offload_core::{Element, InputPair, OutputVector, WorkPartition};

use crate::binding::{ArgumentList, LaunchParams, ScalarBlock};
use crate::catalog::DeviceHandle;
use crate::error::{DeviceError, Result};
use crate::program::{CompiledProgram, Kernel};
use crate::region::{AccessMode, MemoryRegion, RegionManager};

/// Submits kernels to one device's queue.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'d> {
    device: &'d DeviceHandle,
}

impl<'d> Dispatcher<'d> {
    pub fn new(device: &'d DeviceHandle) -> Self {
        Self { device }
    }

    /// Binds `args`, records one compute pass over `partition` and submits it.
    ///
    /// The returned token owns the argument borrows, so output regions stay
    /// out of reach until [`PendingDispatch::wait`] has returned.
    pub fn launch<'a>(
        &self,
        kernel: &Kernel,
        args: ArgumentList<'a>,
        partition: &WorkPartition,
    ) -> Result<PendingDispatch<'d, 'a>> {
        kernel.signature().check_local_size(partition.local_size())?;
        args.validate(kernel.signature(), partition.len())?;

        let (groups_x, groups_y, groups_z) = partition.groups();
        let entries = args.entries();
        let queue = self.device.queue();

        self.device
            .device()
            .push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let submitted = self.device.scoped(
            |dev| {
                let bind_group = dev.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(kernel.name()),
                    layout: kernel.layout(),
                    entries: &entries,
                });
                let mut encoder = dev.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some(kernel.name()),
                });
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some(kernel.name()),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(kernel.pipeline());
                    pass.set_bind_group(0, &bind_group, &[]);
                    pass.dispatch_workgroups(groups_x, groups_y, groups_z);
                }
                queue.submit(Some(encoder.finish()))
            },
            |diagnostics| DeviceError::execution("launch", diagnostics),
        );

        let mut pending = PendingDispatch {
            device: self.device,
            kernel: kernel.name().to_owned(),
            submission: None,
            _args: args,
            finished: false,
        };
        match submitted {
            Ok(index) => {
                tracing::debug!(
                    kernel = kernel.name(),
                    groups_x,
                    groups_y,
                    items = partition.launched_items(),
                    "dispatch submitted"
                );
                pending.submission = Some(index);
                Ok(pending)
            }
            // Dropping the token pops the out-of-memory scope.
            Err(err) => Err(err),
        }
    }
}

/// Completion token for one submitted launch.
#[must_use = "a dispatch must be waited on before its outputs are read"]
#[derive(Debug)]
pub struct PendingDispatch<'d, 'a> {
    device: &'d DeviceHandle,
    kernel: String,
    submission: Option<wgpu::SubmissionIndex>,
    _args: ArgumentList<'a>,
    finished: bool,
}

impl PendingDispatch<'_, '_> {
    pub fn kernel(&self) -> &str {
        &self.kernel
    }

    /// Blocks until every work-item of the launch has completed and reports
    /// any error the device raised while running it.
    pub fn wait(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let device = self.device.device();
        let _ = match self.submission.take() {
            Some(index) => device.poll(wgpu::Maintain::wait_for(index)),
            None => device.poll(wgpu::Maintain::Wait),
        };
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => Err(DeviceError::execution("dispatch", err)),
            None => {
                tracing::debug!(kernel = %self.kernel, "dispatch complete");
                Ok(())
            }
        }
    }
}

impl Drop for PendingDispatch<'_, '_> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            tracing::error!(kernel = %self.kernel, error = %err, "dispatch dropped with error");
        }
    }
}

/// Runs `kernel_name` from `program` over `inputs` and returns the output vector.
///
/// The kernel must bind the launch parameters at slot 0, the two inputs at
/// slots 1 and 2 and the output at slot 3. Every region allocated here is
/// released before returning, on success and on failure.
pub fn run_parallel<T: Element>(
    program: &CompiledProgram<'_>,
    kernel_name: &str,
    inputs: &InputPair<T>,
    coeff: T,
    local_size: u32,
) -> Result<OutputVector<T>> {
    let kernel = program.kernel(kernel_name).map_err(|err| match err {
        DeviceError::EntryPointNotFound { name, .. } => DeviceError::InvalidKernelName { name },
        other => other,
    })?;
    if inputs.is_empty() {
        return Ok(OutputVector::empty());
    }

    let device = program.device();
    let partition = WorkPartition::new(
        inputs.len(),
        local_size,
        device.limits().max_compute_workgroups_per_dimension,
    )?;
    let n = partition.len();

    let regions = RegionManager::new(device);
    let x = regions.allocate("x", n, AccessMode::HostBacked, Some(inputs.x()))?;
    let y = match regions.allocate("y", n, AccessMode::HostBacked, Some(inputs.y())) {
        Ok(y) => y,
        Err(err) => {
            regions.release(x);
            return Err(err);
        }
    };
    let mut result = match regions.allocate::<T>("result", n, AccessMode::WriteOnly, None) {
        Ok(result) => result,
        Err(err) => {
            regions.release(x);
            regions.release(y);
            return Err(err);
        }
    };

    let scalars = ScalarBlock::new(device, LaunchParams::new(coeff, &partition));
    let outcome = execute(
        Dispatcher::new(device),
        &kernel,
        &scalars,
        (&x, &y, &mut result),
        &partition,
    )
    .and_then(|()| regions.read_back(&result));

    scalars.release();
    regions.release(x);
    regions.release(y);
    regions.release(result);
    debug_assert_eq!(regions.live(), 0);

    outcome.map(OutputVector::from)
}

type Operands<'r, 'h, T> = (
    &'r MemoryRegion<'h, T>,
    &'r MemoryRegion<'h, T>,
    &'r mut MemoryRegion<'h, T>,
);

fn execute<T: Element>(
    dispatcher: Dispatcher<'_>,
    kernel: &Kernel,
    scalars: &ScalarBlock,
    (x, y, result): Operands<'_, '_, T>,
    partition: &WorkPartition,
) -> Result<()> {
    let args = ArgumentList::new()
        .scalar(0, scalars)
        .input(1, x)
        .input(2, y)
        .output(3, result);
    dispatcher.launch(kernel, args, partition)?.wait()
}
