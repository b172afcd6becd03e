//! Repeated mechanism execution into dense sample matrices.

use std::sync::Arc;

use rand::{SeedableRng, rngs::SmallRng};
use tracing::trace;

use crate::{
    Result,
    arguments::Arguments,
    error::DetectorError,
    mechanism::Mechanism,
    output::{Output, OutputMatrix},
};

/// Runs a mechanism `iterations` times on one dataset and collects the
/// releases into an [`OutputMatrix`].
///
/// The mechanism is probed once to learn its output shape, then invoked
/// `iterations` further times; the probe release is discarded. A fresh
/// generator is seeded from OS entropy on every call so that parallel shards
/// draw independent randomness without sharing state.
///
/// # Errors
/// Returns [`DetectorError::Mechanism`] when an invocation fails and
/// [`DetectorError::SchemaMismatch`] when a release's shape differs from the
/// probe's.
pub fn run_mechanism<M: Mechanism + ?Sized>(
    mechanism: &M,
    queries: &[f64],
    args: &Arguments,
    iterations: usize,
) -> Result<OutputMatrix> {
    let mut rng = SmallRng::from_entropy();
    let probe = invoke(mechanism, queries, args, &mut rng)?;
    let shape = probe.shape();
    trace!(mechanism = mechanism.name(), ?shape, iterations, "probed mechanism");

    let mut matrix = OutputMatrix::with_capacity(shape, iterations);
    for _ in 0..iterations {
        let output = invoke(mechanism, queries, args, &mut rng)?;
        if output.shape() != shape {
            return Err(DetectorError::SchemaMismatch {
                mechanism: Arc::from(mechanism.name()),
                expected: shape,
                got: output.shape(),
            });
        }
        matrix.push(&output);
    }
    Ok(matrix)
}

fn invoke<M: Mechanism + ?Sized>(
    mechanism: &M,
    queries: &[f64],
    args: &Arguments,
    rng: &mut SmallRng,
) -> Result<Output> {
    mechanism
        .invoke(queries, args, rng)
        .map_err(|error| DetectorError::Mechanism {
            mechanism: Arc::from(mechanism.name()),
            error,
        })
}
