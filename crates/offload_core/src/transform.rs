//! The per-element computation shared by the sequential and parallel paths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementKind};

/// Element-wise transform applied at every index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// `x + y`; the coefficient is ignored.
    Sum,
    /// `coeff * x + y * x`.
    Affine,
}

impl Transform {
    #[inline]
    pub fn apply<T: Element>(self, coeff: T, x: T, y: T) -> T {
        match self {
            Transform::Sum => x.add(y),
            Transform::Affine => coeff.mul(x).add(y.mul(x)),
        }
    }
}

/// A transform paired with the element type and the reference kernel that implements it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Workload {
    /// `i32` ramp inputs summed element-wise.
    IntSum,
    /// Seeded `f32` inputs through the affine transform.
    FloatAffine,
}

impl Workload {
    pub fn transform(self) -> Transform {
        match self {
            Workload::IntSum => Transform::Sum,
            Workload::FloatAffine => Transform::Affine,
        }
    }

    pub fn element(self) -> ElementKind {
        match self {
            Workload::IntSum => ElementKind::I32,
            Workload::FloatAffine => ElementKind::F32,
        }
    }

    /// File name of the reference kernel shipped for this workload.
    pub fn kernel_file(self) -> &'static str {
        match self {
            Workload::IntSum => "vadd.wgsl",
            Workload::FloatAffine => "affine.wgsl",
        }
    }

    /// Compute entry point of the reference kernel.
    pub fn entry_point(self) -> &'static str {
        match self {
            Workload::IntSum => "vadd",
            Workload::FloatAffine => "affine",
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workload::IntSum => f.write_str("int-sum"),
            Workload::FloatAffine => f.write_str("float-affine"),
        }
    }
}

impl FromStr for Workload {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int-sum" => Ok(Workload::IntSum),
            "float-affine" => Ok(Workload::FloatAffine),
            other => Err(format!(
                "unknown workload `{other}` (expected int-sum or float-affine)"
            )),
        }
    }
}
