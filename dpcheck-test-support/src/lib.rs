//! Reference mechanisms used by the dpcheck test suites.
//!
//! These implementations of classic differentially-private releases — and of
//! their well-known broken variants — exist purely as fixtures for the core
//! crate's statistical tests. All of them accept an infinite privacy budget,
//! in which case they add no noise and behave deterministically; the unit
//! tests in this crate pin that noiseless behaviour down.

use std::sync::Arc;

use dpcheck_core::{Arguments, EPSILON_KEY, MechanismError};

mod histogram;
mod noise;
mod noisy_max;
mod sparse_vector;

pub use crate::{
    histogram::{FirstBinHistogram, LaplaceIntervalCount},
    noisy_max::NoisyMax,
    sparse_vector::{
        SparseVector, SparseVectorMisallocatedBudget, SparseVectorNoQueryNoise,
        SparseVectorNoStopping, SparseVectorValueRelease,
    },
};

/// Fetches the privacy budget, rejecting non-positive or NaN values.
/// An infinite budget is allowed and means "no noise".
pub(crate) fn positive_epsilon(args: &Arguments) -> Result<f64, MechanismError> {
    let epsilon = args.require(EPSILON_KEY)?;
    if epsilon.is_nan() || epsilon <= 0.0 {
        return Err(MechanismError::InvalidArgument {
            name: Arc::from(EPSILON_KEY),
            value: epsilon,
        });
    }
    Ok(epsilon)
}
