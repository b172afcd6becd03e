//! Canonical adjacent database pair generation.
//!
//! The detector searches over a fixed family of adjacent pairs built around
//! an all-ones baseline, covering the directions in which one record's
//! change can shift a mechanism's output distribution: single elements moved
//! up or down, the rest of the database pushed the opposite way, both halves
//! split, and a crossed pair for mechanisms sensitive to record order.

use crate::{Result, arguments::Arguments, error::DetectorError};

/// One candidate adjacent pair together with the arguments to run it under.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateInput {
    d1: Vec<f64>,
    d2: Vec<f64>,
    args: Arguments,
}

impl CandidateInput {
    /// Builds a candidate from an explicit pair and argument bundle.
    #[must_use]
    pub fn new(d1: Vec<f64>, d2: Vec<f64>, args: Arguments) -> Self {
        Self { d1, d2, args }
    }

    /// Returns the first database.
    #[must_use]
    pub fn d1(&self) -> &[f64] {
        &self.d1
    }

    /// Returns the second database.
    #[must_use]
    pub fn d2(&self) -> &[f64] {
        &self.d2
    }

    /// Returns the argument bundle for this candidate.
    #[must_use]
    pub fn args(&self) -> &Arguments {
        &self.args
    }
}

/// Generates the canonical adjacent pairs for every requested size, all
/// sharing the given argument bundle.
///
/// # Errors
/// Returns [`DetectorError::MissingEpsilon`] when the arguments lack the
/// privacy budget, [`DetectorError::NoInputSizes`] for an empty size list,
/// and [`DetectorError::InvalidInputSize`] for a zero size; all three are
/// configuration errors raised before any mechanism runs.
pub fn generate_inputs(sizes: &[usize], args: &Arguments) -> Result<Vec<CandidateInput>> {
    if !args.has_epsilon() {
        return Err(DetectorError::MissingEpsilon);
    }
    if sizes.is_empty() {
        return Err(DetectorError::NoInputSizes);
    }
    if sizes.contains(&0) {
        return Err(DetectorError::InvalidInputSize);
    }

    let mut inputs = Vec::with_capacity(sizes.len() * 8);
    for &size in sizes {
        inputs.extend(
            adjacent_pairs(size)
                .into_iter()
                .map(|(d1, d2)| CandidateInput::new(d1, d2, args.clone())),
        );
    }
    Ok(inputs)
}

/// The eight canonical adjacent shapes for databases of length `size`,
/// assuming unit sensitivity.
fn adjacent_pairs(size: usize) -> Vec<(Vec<f64>, Vec<f64>)> {
    let ones = vec![1.0; size];
    let half = size / 2;
    vec![
        // one record below the baseline
        (ones.clone(), one_then(0.0, 1.0, size)),
        // one record above
        (ones.clone(), one_then(2.0, 1.0, size)),
        // one above, the rest below
        (ones.clone(), one_then(2.0, 0.0, size)),
        // one below, the rest above
        (ones.clone(), one_then(0.0, 2.0, size)),
        // first half above, second half below
        (ones.clone(), split(2.0, 0.0, half, size)),
        // everything above
        (ones.clone(), vec![2.0; size]),
        // everything below
        (ones, vec![0.0; size]),
        // crossed halves
        (split(1.0, 0.0, half, size), split(0.0, 1.0, half, size)),
    ]
}

fn one_then(first: f64, rest: f64, size: usize) -> Vec<f64> {
    let mut database = vec![rest; size];
    if let Some(slot) = database.first_mut() {
        *slot = first;
    }
    database
}

fn split(head: f64, tail: f64, head_len: usize, size: usize) -> Vec<f64> {
    let mut database = vec![head; head_len];
    database.resize(size, tail);
    database
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn args() -> Arguments {
        Arguments::new().with_epsilon(0.5)
    }

    #[rstest]
    #[case(5)]
    #[case(10)]
    fn produces_eight_size_preserving_pairs(#[case] size: usize) {
        let inputs = generate_inputs(&[size], &args()).expect("generation must succeed");
        assert_eq!(inputs.len(), 8);
        for input in &inputs {
            assert_eq!(input.d1().len(), size);
            assert_eq!(input.d2().len(), size);
            assert!(input.args().has_epsilon());
        }
    }

    #[test]
    fn unions_the_requested_sizes() {
        let inputs = generate_inputs(&[5, 10], &args()).expect("generation must succeed");
        assert_eq!(inputs.len(), 16);
        assert_eq!(inputs.iter().filter(|input| input.d1().len() == 10).count(), 8);
    }

    #[test]
    fn shapes_match_the_canonical_family() {
        let inputs = generate_inputs(&[5], &args()).expect("generation must succeed");
        assert_eq!(inputs[0].d2(), [0.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(inputs[1].d2(), [2.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(inputs[2].d2(), [2.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(inputs[3].d2(), [0.0, 2.0, 2.0, 2.0, 2.0]);
        assert_eq!(inputs[4].d2(), [2.0, 2.0, 0.0, 0.0, 0.0]);
        assert_eq!(inputs[5].d2(), [2.0, 2.0, 2.0, 2.0, 2.0]);
        assert_eq!(inputs[6].d2(), [0.0, 0.0, 0.0, 0.0, 0.0]);
        // The crossed pair replaces the all-ones baseline on both sides.
        assert_eq!(inputs[7].d1(), [1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(inputs[7].d2(), [0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn missing_epsilon_is_a_configuration_error() {
        let err = generate_inputs(&[5], &Arguments::new()).expect_err("epsilon is required");
        assert_eq!(err, DetectorError::MissingEpsilon);
    }

    #[rstest]
    #[case::empty(&[], DetectorError::NoInputSizes)]
    #[case::zero(&[5, 0], DetectorError::InvalidInputSize)]
    fn rejects_unusable_sizes(#[case] sizes: &[usize], #[case] expected: DetectorError) {
        let err = generate_inputs(sizes, &args()).expect_err("sizes must be validated");
        assert_eq!(err, expected);
    }
}
