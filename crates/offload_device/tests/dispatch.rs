//! Device-backed checks. Each test skips when the machine exposes no adapter.

use offload_core::{
    ramp_inputs, run_sequential, seeded_float_inputs, verify, verify_against, InputPair,
    Tolerance, Transform, WorkPartition,
};
use offload_device::{
    compile, run_parallel, AccessMode, ArgumentList, DeviceCatalog, DeviceClass, DeviceError,
    DeviceHandle, Dispatcher, LaunchParams, RegionManager, ScalarBlock,
};
use offload_kernels::source;

fn open_device() -> Option<DeviceHandle> {
    match DeviceCatalog::discover().select(DeviceClass::All) {
        Ok(device) => Some(device),
        Err(err) => {
            eprintln!("skipping: {err}");
            None
        }
    }
}

#[test]
fn vadd_matches_worked_example() {
    let Some(device) = open_device() else { return };
    let program = compile(source::VADD, "vadd.wgsl", &device).unwrap();
    let inputs = InputPair::<i32>::new(vec![1, 2, 3, 4, 5], vec![5, 4, 3, 2, 1]).unwrap();

    let output = run_parallel(&program, "vadd", &inputs, 0, 8).unwrap();
    assert_eq!(output.as_slice(), &[6, 6, 6, 6, 6]);
}

#[test]
fn affine_matches_worked_example() {
    let Some(device) = open_device() else { return };
    let program = compile(source::AFFINE, "affine.wgsl", &device).unwrap();
    let inputs = InputPair::<f32>::new(vec![2.0], vec![5.0]).unwrap();

    let output = run_parallel(&program, "affine", &inputs, 3.14159f32, 8).unwrap();
    assert_eq!(output.len(), 1);
    assert!((output[0] - 16.28318).abs() < 1e-2);
}

#[test]
fn ragged_lengths_agree_with_sequential_oracle() {
    let Some(device) = open_device() else { return };
    let program = compile(source::VADD, "vadd.wgsl", &device).unwrap();
    for len in [1usize, 7, 8, 9, 1000, 4099] {
        let inputs = ramp_inputs(len).unwrap();
        let output = run_parallel(&program, "vadd", &inputs, 0, 8).unwrap();
        assert_eq!(output.len(), len);
        verify(&output, &inputs, 0, Transform::Sum, Tolerance::default()).unwrap();
        assert!(output.iter().all(|&value| value == len as i32));
    }
}

#[test]
fn seeded_affine_run_passes_verification() {
    let Some(device) = open_device() else { return };
    let program = compile(source::AFFINE, "affine.wgsl", &device).unwrap();
    let inputs = seeded_float_inputs(10_000, 0xA11CE);
    let coeff = 3.14159f32;

    let output = run_parallel(&program, "affine", &inputs, coeff, 8).unwrap();
    let oracle = run_sequential(&inputs, coeff, Transform::Affine);
    verify_against(&output, &oracle, Tolerance::default()).unwrap();
}

#[test]
fn empty_inputs_skip_the_device() {
    let Some(device) = open_device() else { return };
    let program = compile(source::VADD, "vadd.wgsl", &device).unwrap();
    let inputs = ramp_inputs(0).unwrap();

    let output = run_parallel(&program, "vadd", &inputs, 0, 8).unwrap();
    assert!(output.is_empty());
}

#[test]
fn empty_source_is_rejected() {
    let Some(device) = open_device() else { return };
    let err = compile("", "inline", &device).unwrap_err();
    assert!(matches!(err, DeviceError::EmptySource { .. }));
}

#[test]
fn unknown_kernel_name_is_invalid() {
    let Some(device) = open_device() else { return };
    let program = compile(source::VADD, "vadd.wgsl", &device).unwrap();
    let err = run_parallel(&program, "vsub", &ramp_inputs(4).unwrap(), 0, 8).unwrap_err();
    assert!(matches!(err, DeviceError::InvalidKernelName { ref name } if name == "vsub"));
}

#[test]
fn local_size_must_match_workgroup_size() {
    let Some(device) = open_device() else { return };
    let program = compile(source::VADD, "vadd.wgsl", &device).unwrap();
    let err = run_parallel(&program, "vadd", &ramp_inputs(4).unwrap(), 0, 16).unwrap_err();
    assert!(matches!(
        err,
        DeviceError::LocalSizeMismatch {
            configured: 16,
            declared: [8, 1, 1]
        }
    ));
}

#[test]
fn argument_lists_are_checked_before_launch() {
    let Some(device) = open_device() else { return };
    let program = compile(source::VADD, "vadd.wgsl", &device).unwrap();
    let kernel = program.kernel("vadd").unwrap();
    let inputs = ramp_inputs(5).unwrap();
    let partition =
        WorkPartition::new(5, 8, device.limits().max_compute_workgroups_per_dimension).unwrap();
    let regions = RegionManager::new(&device);
    let dispatcher = Dispatcher::new(&device);
    let scalars = ScalarBlock::new(&device, LaunchParams::new(0i32, &partition));
    assert_eq!(scalars.params().len, 5);
    assert_eq!(scalars.params().row_pitch, 8);

    let x = regions
        .allocate("x", 5, AccessMode::HostBacked, Some(inputs.x()))
        .unwrap();
    let y = regions
        .allocate("y", 5, AccessMode::HostBacked, Some(inputs.y()))
        .unwrap();
    let mut result = regions
        .allocate::<i32>("result", 5, AccessMode::WriteOnly, None)
        .unwrap();
    let mut short = regions
        .allocate::<i32>("short", 4, AccessMode::WriteOnly, None)
        .unwrap();

    let missing = ArgumentList::new().scalar(0, &scalars).input(1, &x).input(2, &y);
    let err = dispatcher.launch(&kernel, missing, &partition).unwrap_err();
    assert!(matches!(
        err,
        DeviceError::ArityMismatch {
            declared: 4,
            bound: 3,
            ..
        }
    ));

    let stray = ArgumentList::new()
        .scalar(0, &scalars)
        .input(1, &x)
        .input(2, &y)
        .output(7, &mut result);
    let err = dispatcher.launch(&kernel, stray, &partition).unwrap_err();
    assert!(matches!(err, DeviceError::UnknownSlot { slot: 7, .. }));

    let ragged = ArgumentList::new()
        .scalar(0, &scalars)
        .input(1, &x)
        .input(2, &y)
        .output(3, &mut short);
    let err = dispatcher.launch(&kernel, ragged, &partition).unwrap_err();
    assert!(matches!(err, DeviceError::RangeBoundsMismatch { .. }));

    let args = ArgumentList::new()
        .scalar(0, &scalars)
        .input(1, &x)
        .input(2, &y)
        .output(3, &mut result);
    dispatcher
        .launch(&kernel, args, &partition)
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(regions.read_back(&result).unwrap(), vec![5; 5]);

    scalars.release();
    regions.release(x);
    regions.release(y);
    regions.release(result);
    regions.release(short);
    assert_eq!(regions.live(), 0);
}

#[test]
fn region_misuse_is_reported() {
    let Some(device) = open_device() else { return };
    let regions = RegionManager::new(&device);
    let host = [1i32, 2, 3];

    let err = regions
        .allocate::<i32>("empty", 0, AccessMode::WriteOnly, None)
        .unwrap_err();
    assert!(matches!(err, DeviceError::InvalidRegion { .. }));

    let err = regions
        .allocate("aliased", 3, AccessMode::WriteOnly, Some(&host[..]))
        .unwrap_err();
    assert!(matches!(err, DeviceError::InvalidRegion { .. }));

    let err = regions
        .allocate::<i32>("unbacked", 3, AccessMode::HostBacked, None)
        .unwrap_err();
    assert!(matches!(err, DeviceError::InvalidRegion { .. }));

    let err = regions
        .allocate("short", 4, AccessMode::HostBacked, Some(&host[..]))
        .unwrap_err();
    assert!(matches!(err, DeviceError::InvalidRegion { .. }));
    assert_eq!(regions.live(), 0);

    let backed = regions
        .allocate("backed", 3, AccessMode::HostBacked, Some(&host[..]))
        .unwrap();
    assert_eq!(regions.live(), 1);
    let err = regions.read_back(&backed).unwrap_err();
    assert!(matches!(err, DeviceError::InvalidRegion { .. }));

    let shared = regions
        .allocate("shared", 3, AccessMode::Shared, Some(&host[..]))
        .unwrap();
    assert_eq!(regions.read_back(&shared).unwrap(), host.to_vec());

    regions.release(backed);
    regions.release(shared);
    assert_eq!(regions.live(), 0);
}
