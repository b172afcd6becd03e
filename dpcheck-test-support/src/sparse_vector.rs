//! Sparse-vector-technique mechanisms, correct and deliberately broken.
//!
//! The correct variant answers above-threshold queries with properly scaled
//! noise and stops after a fixed number of positive answers. The broken
//! variants reproduce published counterexamples: missing query noise, never
//! stopping, a misallocated noise budget, and releasing the noisy values
//! themselves. All of them summarise their answer sequence as a single
//! number so the detector can treat them as ordinary scalar mechanisms; the
//! value-release variant returns a pair instead.

use std::sync::Arc;

use rand::RngCore;

use dpcheck_core::{Arguments, Mechanism, MechanismError, Output};

use crate::{noise::laplace, positive_epsilon};

/// Argument key for the number of above-threshold answers allowed.
pub const ANSWER_COUNT_KEY: &str = "N";

/// Argument key for the query threshold.
pub const THRESHOLD_KEY: &str = "T";

fn answer_budget(args: &Arguments) -> Result<(usize, f64), MechanismError> {
    let count = args.require(ANSWER_COUNT_KEY)?;
    if count.is_nan() || count < 1.0 {
        return Err(MechanismError::InvalidArgument {
            name: Arc::from(ANSWER_COUNT_KEY),
            value: count,
        });
    }
    Ok((count as usize, count))
}

/// Counts mismatches between the answer sequence and the fixed half-true
/// reference pattern; queries left unanswered count as mismatches.
fn pattern_mismatches(responses: &[bool], total: usize) -> f64 {
    let expected_true = total / 2;
    let mut mismatches = total - responses.len();
    for (index, &response) in responses.iter().enumerate() {
        if response != (index < expected_true) {
            mismatches += 1;
        }
    }
    mismatches as f64
}

/// The textbook sparse vector technique: noisy threshold at scale
/// `2/epsilon`, per-query noise at scale `4N/epsilon`, stop after `N`
/// positive answers, release the number of negative answers.
#[derive(Clone, Copy, Debug)]
pub struct SparseVector;

impl Mechanism for SparseVector {
    fn name(&self) -> &str {
        "sparse-vector"
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        let epsilon = positive_epsilon(args)?;
        let (allowed, count) = answer_budget(args)?;
        let threshold = args.require(THRESHOLD_KEY)?;

        let noisy_threshold = threshold + laplace(2.0 / epsilon, rng);
        let mut positives = 0_usize;
        let mut negatives = 0_u64;
        for &query in queries {
            if query + laplace(4.0 * count / epsilon, rng) >= noisy_threshold {
                positives += 1;
                if positives >= allowed {
                    break;
                }
            } else {
                negatives += 1;
            }
        }
        Ok(Output::Scalar(negatives as f64))
    }
}

/// Broken SVT that compares the raw queries against the noisy threshold.
#[derive(Clone, Copy, Debug)]
pub struct SparseVectorNoQueryNoise;

impl Mechanism for SparseVectorNoQueryNoise {
    fn name(&self) -> &str {
        "sparse-vector-no-query-noise"
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        let epsilon = positive_epsilon(args)?;
        let threshold = args.require(THRESHOLD_KEY)?;

        let noisy_threshold = threshold + laplace(2.0 / epsilon, rng);
        let responses: Vec<bool> = queries
            .iter()
            .map(|&query| query >= noisy_threshold)
            .collect();
        Ok(Output::Scalar(pattern_mismatches(&responses, queries.len())))
    }
}

/// Broken SVT that answers every query: the per-query noise is not scaled to
/// an answer budget and nothing ever stops the loop.
#[derive(Clone, Copy, Debug)]
pub struct SparseVectorNoStopping;

impl Mechanism for SparseVectorNoStopping {
    fn name(&self) -> &str {
        "sparse-vector-no-stopping"
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        let epsilon = positive_epsilon(args)?;
        let threshold = args.require(THRESHOLD_KEY)?;

        let noisy_threshold = threshold + laplace(2.0 / epsilon, rng);
        let responses: Vec<bool> = queries
            .iter()
            .map(|&query| query + laplace(2.0 / epsilon, rng) >= noisy_threshold)
            .collect();
        Ok(Output::Scalar(pattern_mismatches(&responses, queries.len())))
    }
}

/// Broken SVT whose noise scales ignore the answer budget: threshold noise
/// at `4/epsilon` and query noise at `4/(3 epsilon)` regardless of `N`.
#[derive(Clone, Copy, Debug)]
pub struct SparseVectorMisallocatedBudget;

impl Mechanism for SparseVectorMisallocatedBudget {
    fn name(&self) -> &str {
        "sparse-vector-misallocated-budget"
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        let epsilon = positive_epsilon(args)?;
        let (allowed, _) = answer_budget(args)?;
        let threshold = args.require(THRESHOLD_KEY)?;

        let noisy_threshold = threshold + laplace(4.0 / epsilon, rng);
        let mut responses = Vec::with_capacity(queries.len());
        let mut positives = 0_usize;
        for &query in queries {
            if query + laplace(4.0 / (3.0 * epsilon), rng) > noisy_threshold {
                responses.push(true);
                positives += 1;
                if positives >= allowed {
                    break;
                }
            } else {
                responses.push(false);
            }
        }
        Ok(Output::Scalar(pattern_mismatches(&responses, queries.len())))
    }
}

/// Broken SVT that releases the noisy query values of its positive answers.
/// Releases a pair: the number of negative answers and the last noisy value
/// that crossed the threshold (zero when none did).
#[derive(Clone, Copy, Debug)]
pub struct SparseVectorValueRelease;

impl Mechanism for SparseVectorValueRelease {
    fn name(&self) -> &str {
        "sparse-vector-value-release"
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        let epsilon = positive_epsilon(args)?;
        let (allowed, count) = answer_budget(args)?;
        let threshold = args.require(THRESHOLD_KEY)?;

        let noisy_threshold = threshold + laplace(2.0 / epsilon, rng);
        let mut positives = 0_usize;
        let mut negatives = 0_u64;
        let mut last_released = 0.0_f64;
        for &query in queries {
            let noisy = query + laplace(2.0 * count / epsilon, rng);
            if noisy > noisy_threshold {
                last_released = noisy;
                positives += 1;
                if positives >= allowed {
                    break;
                }
            } else {
                negatives += 1;
            }
        }
        Ok(Output::Tuple(vec![negatives as f64, last_released]))
    }
}
