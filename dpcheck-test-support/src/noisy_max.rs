//! Noisy-max releases over a query vector.
//!
//! The index-releasing variants (report-noisy-max) are differentially
//! private at their claimed budget; releasing the noisy maximum *value*
//! instead is a classic unbounded violation.

use rand::RngCore;

use dpcheck_core::{Arguments, Mechanism, MechanismError, Output};

use crate::{
    noise::{exponential, laplace},
    positive_epsilon,
};

#[derive(Clone, Copy, Debug)]
enum Noise {
    Laplace,
    Exponential,
}

#[derive(Clone, Copy, Debug)]
enum Release {
    Index,
    Value,
}

/// Adds per-query noise at scale `2/epsilon` and releases either the argmax
/// index or the maximum noisy value.
#[derive(Clone, Copy, Debug)]
pub struct NoisyMax {
    noise: Noise,
    release: Release,
}

impl NoisyMax {
    /// Report-noisy-max with Laplace noise (private).
    #[must_use]
    pub fn laplace_argmax() -> Self {
        Self {
            noise: Noise::Laplace,
            release: Release::Index,
        }
    }

    /// Noisy maximum value with Laplace noise (not private).
    #[must_use]
    pub fn laplace_value() -> Self {
        Self {
            noise: Noise::Laplace,
            release: Release::Value,
        }
    }

    /// Report-noisy-max with one-sided exponential noise (private).
    #[must_use]
    pub fn exponential_argmax() -> Self {
        Self {
            noise: Noise::Exponential,
            release: Release::Index,
        }
    }

    /// Noisy maximum value with exponential noise (not private).
    #[must_use]
    pub fn exponential_value() -> Self {
        Self {
            noise: Noise::Exponential,
            release: Release::Value,
        }
    }
}

impl Mechanism for NoisyMax {
    fn name(&self) -> &str {
        match (self.noise, self.release) {
            (Noise::Laplace, Release::Index) => "noisy-argmax-laplace",
            (Noise::Laplace, Release::Value) => "noisy-max-laplace",
            (Noise::Exponential, Release::Index) => "noisy-argmax-exponential",
            (Noise::Exponential, Release::Value) => "noisy-max-exponential",
        }
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        let epsilon = positive_epsilon(args)?;
        let scale = 2.0 / epsilon;

        let mut best_index = 0_usize;
        let mut best_value = f64::NEG_INFINITY;
        for (index, &query) in queries.iter().enumerate() {
            let noisy = query
                + match self.noise {
                    Noise::Laplace => laplace(scale, rng),
                    Noise::Exponential => exponential(scale, rng),
                };
            if noisy > best_value {
                best_value = noisy;
                best_index = index;
            }
        }

        Ok(Output::Scalar(match self.release {
            Release::Index => best_index as f64,
            Release::Value => best_value,
        }))
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::SmallRng};
    use rstest::rstest;

    use super::*;

    fn noiseless(mechanism: &NoisyMax, queries: &[f64]) -> f64 {
        let args = Arguments::new().with_epsilon(f64::INFINITY);
        let mut rng = SmallRng::seed_from_u64(0);
        match mechanism.invoke(queries, &args, &mut rng) {
            Ok(Output::Scalar(value)) => value,
            other => panic!("expected a scalar, got {other:?}"),
        }
    }

    #[rstest]
    #[case(NoisyMax::laplace_argmax(), &[1.0, 2.0, 1.0], 1.0)]
    #[case(NoisyMax::laplace_value(), &[1.0, 3.0, 1.0], 3.0)]
    #[case(NoisyMax::exponential_argmax(), &[1.0, 3.0, 1.0], 1.0)]
    #[case(NoisyMax::exponential_value(), &[1.0, 3.0, 1.0], 3.0)]
    fn infinite_budget_releases_the_true_statistic(
        #[case] mechanism: NoisyMax,
        #[case] queries: &[f64],
        #[case] expected: f64,
    ) {
        assert_eq!(noiseless(&mechanism, queries), expected);
    }

    #[test]
    fn ties_resolve_to_the_first_maximum() {
        assert_eq!(noiseless(&NoisyMax::laplace_argmax(), &[2.0, 2.0, 2.0]), 0.0);
    }
}
