//! Numeric element types that can travel between host and device buffers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element kinds understood by the reference kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    I32,
    F32,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::I32 => f.write_str("i32"),
            ElementKind::F32 => f.write_str("f32"),
        }
    }
}

/// Absolute tolerance used when comparing floating-point results.
///
/// Integer elements ignore it and compare exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub absolute: f32,
}

impl Tolerance {
    pub const DEFAULT_ABSOLUTE: f32 = 1e-2;

    pub fn absolute(absolute: f32) -> Self {
        Self { absolute }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::absolute(Self::DEFAULT_ABSOLUTE)
    }
}

/// A 32-bit plain-old-data scalar that the transforms operate on.
///
/// The arithmetic helpers pin down overflow behaviour so that the host
/// oracle agrees with WGSL, where `i32` arithmetic wraps.
pub trait Element:
    bytemuck::Pod + PartialEq + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    const KIND: ElementKind;

    fn add(self, rhs: Self) -> Self;

    fn mul(self, rhs: Self) -> Self;

    /// Raw bits as stored in a 32-bit uniform slot.
    fn to_bits(self) -> u32;

    /// `true` when `actual` is acceptably close to `expected`.
    fn matches(actual: Self, expected: Self, tolerance: Tolerance) -> bool;
}

impl Element for i32 {
    const KIND: ElementKind = ElementKind::I32;

    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }

    fn mul(self, rhs: Self) -> Self {
        self.wrapping_mul(rhs)
    }

    fn to_bits(self) -> u32 {
        self as u32
    }

    fn matches(actual: Self, expected: Self, _tolerance: Tolerance) -> bool {
        actual == expected
    }
}

impl Element for f32 {
    const KIND: ElementKind = ElementKind::F32;

    fn add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }

    fn to_bits(self) -> u32 {
        f32::to_bits(self)
    }

    fn matches(actual: Self, expected: Self, tolerance: Tolerance) -> bool {
        (actual - expected).abs() < tolerance.absolute
    }
}
