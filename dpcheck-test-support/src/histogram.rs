//! Histogram-style Laplace releases.

use rand::RngCore;

use dpcheck_core::{Arguments, Mechanism, MechanismError, Output};

use crate::{noise::laplace, positive_epsilon};

#[derive(Clone, Copy, Debug)]
enum BudgetScale {
    /// Noise at scale `1/epsilon`, the correct calibration for unit
    /// sensitivity.
    InverseEpsilon,
    /// Noise at scale `epsilon`, a classic miscalibration: the release gets
    /// *less* private as the claimed budget shrinks.
    Epsilon,
}

/// Releases the first histogram bin with Laplace noise.
#[derive(Clone, Copy, Debug)]
pub struct FirstBinHistogram {
    scale: BudgetScale,
}

impl FirstBinHistogram {
    /// Correctly calibrated noise (`1/epsilon`).
    #[must_use]
    pub fn calibrated() -> Self {
        Self {
            scale: BudgetScale::InverseEpsilon,
        }
    }

    /// Miscalibrated noise (`epsilon`).
    #[must_use]
    pub fn miscalibrated() -> Self {
        Self {
            scale: BudgetScale::Epsilon,
        }
    }
}

impl Mechanism for FirstBinHistogram {
    fn name(&self) -> &str {
        match self.scale {
            BudgetScale::InverseEpsilon => "histogram",
            BudgetScale::Epsilon => "histogram-eps",
        }
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        let epsilon = positive_epsilon(args)?;
        let scale = match self.scale {
            BudgetScale::InverseEpsilon => 1.0 / epsilon,
            BudgetScale::Epsilon => {
                if epsilon.is_finite() {
                    epsilon
                } else {
                    0.0
                }
            }
        };
        let first_bin = queries.first().copied().unwrap_or(0.0);
        Ok(Output::Scalar(first_bin + laplace(scale, rng)))
    }
}

/// Adds Laplace noise at scale `len/epsilon` to every query and counts how
/// many noisy values land in a fixed interval around one.
#[derive(Clone, Copy, Debug)]
pub struct LaplaceIntervalCount;

impl LaplaceIntervalCount {
    const LOWER: f64 = 1.0 - 0.27;
    const UPPER: f64 = 1.0 + 0.75;
}

impl Mechanism for LaplaceIntervalCount {
    fn name(&self) -> &str {
        "laplace-interval-count"
    }

    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError> {
        let epsilon = positive_epsilon(args)?;
        let scale = queries.len() as f64 / epsilon;
        let inside = queries
            .iter()
            .map(|&query| query + laplace(scale, rng))
            .filter(|&noisy| (Self::LOWER..=Self::UPPER).contains(&noisy))
            .count();
        Ok(Output::Scalar(inside as f64))
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::SmallRng};

    use super::*;

    fn noiseless<M: Mechanism>(mechanism: &M, queries: &[f64]) -> f64 {
        let args = Arguments::new().with_epsilon(f64::INFINITY);
        let mut rng = SmallRng::seed_from_u64(0);
        match mechanism.invoke(queries, &args, &mut rng) {
            Ok(Output::Scalar(value)) => value,
            other => panic!("expected a scalar, got {other:?}"),
        }
    }

    #[test]
    fn infinite_budget_releases_the_first_bin() {
        assert_eq!(noiseless(&FirstBinHistogram::calibrated(), &[1.0, 2.0]), 1.0);
        assert_eq!(noiseless(&FirstBinHistogram::miscalibrated(), &[1.0, 2.0]), 1.0);
    }

    #[test]
    fn interval_count_matches_the_noiseless_membership() {
        assert_eq!(noiseless(&LaplaceIntervalCount, &[1.0, 2.0, 3.0]), 1.0);
        assert_eq!(noiseless(&LaplaceIntervalCount, &[0.8, 1.7, 3.0]), 2.0);
    }
}
