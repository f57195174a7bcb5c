//! Input and output vectors plus the deterministic generators that fill them.

use std::ops::Deref;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::element::Element;

/// Fixed-length input sequence; read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct InputVector<T> {
    values: Box<[T]>,
}

impl<T: Element> InputVector<T> {
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}

impl<T: Element> From<Vec<T>> for InputVector<T> {
    fn from(values: Vec<T>) -> Self {
        Self {
            values: values.into_boxed_slice(),
        }
    }
}

impl<T: Element> Deref for InputVector<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.values
    }
}

/// Two input vectors of identical length, the operands of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct InputPair<T> {
    x: InputVector<T>,
    y: InputVector<T>,
}

/// Returned when the two operands of an [`InputPair`] disagree on length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("input vectors differ in length: x has {x_len} elements, y has {y_len}")]
pub struct UnequalInputs {
    pub x_len: usize,
    pub y_len: usize,
}

impl<T: Element> InputPair<T> {
    pub fn new(
        x: impl Into<InputVector<T>>,
        y: impl Into<InputVector<T>>,
    ) -> Result<Self, UnequalInputs> {
        let x = x.into();
        let y = y.into();
        if x.len() != y.len() {
            return Err(UnequalInputs {
                x_len: x.len(),
                y_len: y.len(),
            });
        }
        Ok(Self { x, y })
    }

    pub fn x(&self) -> &[T] {
        &self.x
    }

    pub fn y(&self) -> &[T] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Result sequence produced by exactly one execution strategy.
///
/// Only constructible from a fully populated `Vec`, so a reader never sees a
/// partially written output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputVector<T> {
    values: Vec<T>,
}

impl<T: Element> OutputVector<T> {
    pub fn empty() -> Self {
        Self { values: Vec::new() }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn into_inner(self) -> Vec<T> {
        self.values
    }
}

impl<T: Element> From<Vec<T>> for OutputVector<T> {
    fn from(values: Vec<T>) -> Self {
        Self { values }
    }
}

impl<T: Element> Deref for OutputVector<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.values
    }
}

/// Returned when a ramp is too long for its values to be `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("a ramp of {len} elements overflows i32 values")]
pub struct RampTooLong {
    pub len: usize,
}

/// Integer ramp: `x[i] = i`, `y[i] = len - i`, so every sum equals `len`.
///
/// Fails before allocating when `len` exceeds `i32::MAX`.
pub fn ramp_inputs(len: usize) -> Result<InputPair<i32>, RampTooLong> {
    let n = i32::try_from(len).map_err(|_| RampTooLong { len })?;
    let x: Vec<i32> = (0..n).collect();
    let y: Vec<i32> = (0..n).map(|i| n - i).collect();
    Ok(InputPair {
        x: x.into(),
        y: y.into(),
    })
}

/// Deterministic floats in `[-2, 2]` drawn from a seeded ChaCha8 stream.
pub fn seeded_float_inputs(len: usize, seed: u64) -> InputPair<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x: Vec<f32> = Vec::with_capacity(len);
    let mut y: Vec<f32> = Vec::with_capacity(len);
    for _ in 0..len {
        x.push(rng.gen_range(-2.0..=2.0));
        y.push(rng.gen_range(-2.0..=2.0));
    }
    InputPair {
        x: x.into(),
        y: y.into(),
    }
}
