//! Reference WGSL kernels and helpers for locating them on disk.
//!
//! The harness reads kernel source from a file at run time; the embedded
//! copies below exist so tests can exercise the same text without touching
//! the filesystem.

use std::path::{Path, PathBuf};

pub const VADD_FILE: &str = "vadd.wgsl";
pub const AFFINE_FILE: &str = "affine.wgsl";

pub mod source {
    pub const VADD: &str = include_str!("../kernels/vadd.wgsl");
    pub const AFFINE: &str = include_str!("../kernels/affine.wgsl");
}

/// Directory holding the shipped `.wgsl` files in the source tree.
pub fn kernels_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("kernels")
}

/// Path of a kernel file: `kernels/<file>` under the working directory when
/// it exists there, otherwise the copy shipped with this crate.
pub fn kernel_path(file: &str) -> PathBuf {
    first_existing(file, &[PathBuf::from("kernels"), kernels_dir()])
}

/// The first `dir/file` that exists, or the last candidate when none does.
fn first_existing(file: &str, dirs: &[PathBuf]) -> PathBuf {
    dirs.iter()
        .map(|dir| dir.join(file))
        .find(|path| path.is_file())
        .or_else(|| dirs.last().map(|dir| dir.join(file)))
        .unwrap_or_else(|| PathBuf::from(file))
}
