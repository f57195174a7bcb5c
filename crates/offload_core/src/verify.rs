//! Oracle comparison for device results.

use crate::element::{Element, Tolerance};
use crate::transform::Transform;
use crate::vectors::{InputPair, OutputVector};

/// First discrepancy between a result and its oracle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError<T: Element> {
    #[error("result has {actual} elements, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("value mismatch at index {index}: expected {expected}, got {actual}")]
    ValueMismatch { index: usize, expected: T, actual: T },
}

/// Recomputes the oracle value at every index and compares it with `result`.
///
/// Stops at the first index that falls outside `tolerance` (exact equality
/// for integer elements).
pub fn verify<T: Element>(
    result: &OutputVector<T>,
    inputs: &InputPair<T>,
    coeff: T,
    transform: Transform,
    tolerance: Tolerance,
) -> Result<(), VerifyError<T>> {
    check_len(result.len(), inputs.len())?;
    let oracle = inputs
        .x()
        .iter()
        .zip(inputs.y())
        .map(|(&x, &y)| transform.apply(coeff, x, y));
    compare(result.iter().copied(), oracle, tolerance)
}

/// Compares `result` against an oracle that was already computed.
pub fn verify_against<T: Element>(
    result: &OutputVector<T>,
    oracle: &OutputVector<T>,
    tolerance: Tolerance,
) -> Result<(), VerifyError<T>> {
    check_len(result.len(), oracle.len())?;
    compare(result.iter().copied(), oracle.iter().copied(), tolerance)
}

/// Checks `result` against a closed form where every element equals `value`.
///
/// Independent of [`Transform::apply`], so it also catches a wrong oracle.
pub fn verify_constant<T: Element>(
    result: &OutputVector<T>,
    expected_len: usize,
    value: T,
    tolerance: Tolerance,
) -> Result<(), VerifyError<T>> {
    check_len(result.len(), expected_len)?;
    compare(result.iter().copied(), std::iter::repeat(value), tolerance)
}

fn check_len<T: Element>(actual: usize, expected: usize) -> Result<(), VerifyError<T>> {
    if actual == expected {
        Ok(())
    } else {
        Err(VerifyError::LengthMismatch { expected, actual })
    }
}

fn compare<T: Element>(
    actual: impl Iterator<Item = T>,
    expected: impl Iterator<Item = T>,
    tolerance: Tolerance,
) -> Result<(), VerifyError<T>> {
    for (index, (actual, expected)) in actual.zip(expected).enumerate() {
        if !T::matches(actual, expected, tolerance) {
            return Err(VerifyError::ValueMismatch {
                index,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequential::run_sequential;
    use crate::vectors::{ramp_inputs, seeded_float_inputs};

    #[test]
    fn accepts_exact_integer_result() {
        let inputs = ramp_inputs(257).unwrap();
        let result = OutputVector::from(vec![257; 257]);
        assert_eq!(
            verify(&result, &inputs, 0, Transform::Sum, Tolerance::default()),
            Ok(())
        );
    }

    #[test]
    fn reports_length_before_values() {
        let inputs = ramp_inputs(4).unwrap();
        let result = OutputVector::from(vec![0; 3]);
        assert_eq!(
            verify(&result, &inputs, 0, Transform::Sum, Tolerance::default()),
            Err(VerifyError::LengthMismatch {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn detects_single_corrupted_element() {
        let inputs = seeded_float_inputs(1_000, 0xC0FFEE);
        let mut values = run_sequential(&inputs, 2.5, Transform::Affine).into_inner();
        let original = values[613];
        values[613] = original + 1.0;
        let corrupted = OutputVector::from(values);

        let err = verify(
            &corrupted,
            &inputs,
            2.5,
            Transform::Affine,
            Tolerance::default(),
        )
        .unwrap_err();
        match err {
            VerifyError::ValueMismatch {
                index,
                expected,
                actual,
            } => {
                assert_eq!(index, 613);
                assert_eq!(expected, original);
                assert_eq!(actual, original + 1.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn closed_form_accepts_ramp_sums() {
        let inputs = ramp_inputs(100).unwrap();
        let sums = run_sequential(&inputs, 0, Transform::Sum);
        assert_eq!(verify_constant(&sums, 100, 100, Tolerance::default()), Ok(()));
    }

    #[test]
    fn closed_form_rejects_corrupted_sequential_output() {
        let inputs = ramp_inputs(100).unwrap();
        let mut values = run_sequential(&inputs, 0, Transform::Sum).into_inner();
        values[42] += 1;
        let corrupted = OutputVector::from(values);
        assert_eq!(
            verify_constant(&corrupted, 100, 100, Tolerance::default()),
            Err(VerifyError::ValueMismatch {
                index: 42,
                expected: 100,
                actual: 101
            })
        );

        let truncated = OutputVector::from(vec![100; 99]);
        assert_eq!(
            verify_constant(&truncated, 100, 100, Tolerance::default()),
            Err(VerifyError::LengthMismatch {
                expected: 100,
                actual: 99
            })
        );
    }

    #[test]
    fn stops_at_first_mismatch() {
        let result = OutputVector::from(vec![1, 9, 9]);
        let oracle = OutputVector::from(vec![1, 2, 3]);
        let err = verify_against(&result, &oracle, Tolerance::default()).unwrap_err();
        assert_eq!(
            err,
            VerifyError::ValueMismatch {
                index: 1,
                expected: 2,
                actual: 9
            }
        );
    }

    #[test]
    fn float_drift_inside_tolerance_passes() {
        let result = OutputVector::from(vec![16.285f32]);
        let oracle = OutputVector::from(vec![16.28318f32]);
        assert!(verify_against(&result, &oracle, Tolerance::default()).is_ok());
        assert!(verify_against(&result, &oracle, Tolerance::absolute(1e-4)).is_err());
    }
}
