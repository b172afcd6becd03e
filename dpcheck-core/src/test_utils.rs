//! Deterministic and near-deterministic mechanisms shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::RngCore;
use rand::distributions::{Distribution, Standard};

use crate::{
    arguments::Arguments,
    error::MechanismError,
    mechanism::Mechanism,
    output::Output,
};

/// Releases the first query verbatim; requires `epsilon` like any real
/// mechanism but adds no noise, so adjacent pairs differing in the first
/// record separate completely.
pub(crate) struct FirstQuery;

impl Mechanism for FirstQuery {
    fn name(&self) -> &str {
        "first-query"
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        _rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        args.require(crate::arguments::EPSILON_KEY)?;
        Ok(Output::Scalar(queries.first().copied().unwrap_or(0.0)))
    }
}

/// Flips a coin whose success probability is half the query mean, releasing
/// 1.0 on success and 0.0 otherwise.
pub(crate) struct SplitCoin;

impl Mechanism for SplitCoin {
    fn name(&self) -> &str {
        "split-coin"
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        args.require(crate::arguments::EPSILON_KEY)?;
        let mean = if queries.is_empty() {
            0.0
        } else {
            queries.iter().sum::<f64>() / queries.len() as f64
        };
        let draw: f64 = Standard.sample(rng);
        Ok(Output::Scalar(if draw < mean / 2.0 { 1.0 } else { 0.0 }))
    }
}

/// Alternates between scalar and tuple releases to trip the schema check.
#[derive(Default)]
pub(crate) struct AlternatingShape {
    calls: AtomicUsize,
}

impl Mechanism for AlternatingShape {
    fn name(&self) -> &str {
        "alternating-shape"
    }

    fn invoke(
        &self,
        _queries: &[f64],
        _args: &Arguments,
        _rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        if self.calls.fetch_add(1, Ordering::Relaxed) % 2 == 0 {
            Ok(Output::Scalar(0.0))
        } else {
            Ok(Output::Tuple(vec![0.0, 0.0]))
        }
    }
}

/// Wraps another mechanism and counts its invocations.
pub(crate) struct CountingMechanism<M> {
    inner: M,
    calls: AtomicUsize,
}

impl<M> CountingMechanism<M> {
    pub(crate) fn new(inner: M) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn invocations(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl<M: Mechanism> Mechanism for CountingMechanism<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.invoke(queries, args, rng)
    }
}
