use crate::element::Element;
use crate::transform::Transform;
use crate::vectors::{InputPair, OutputVector};

/// Applies `transform` at every index on the calling thread.
///
/// This is the oracle the parallel path is verified against, so it stays a
/// plain loop with no hidden state.
pub fn run_sequential<T: Element>(
    inputs: &InputPair<T>,
    coeff: T,
    transform: Transform,
) -> OutputVector<T> {
    let mut result = Vec::with_capacity(inputs.len());
    for (&x, &y) in inputs.x().iter().zip(inputs.y()) {
        result.push(transform.apply(coeff, x, y));
    }
    OutputVector::from(result)
}
