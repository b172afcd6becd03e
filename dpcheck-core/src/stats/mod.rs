//! The hypergeometric-tail test statistic.
//!
//! Scores observed event counts against the null hypothesis that the
//! mechanism satisfies the tested privacy budget: the larger count is
//! binomially thinned by `exp(-epsilon)` and each thinned draw is checked
//! against the hypergeometric upper tail of a balanced two-sample split.

pub mod hypergeom;

use rand::rngs::SmallRng;
use rand_distr::{Binomial, Distribution};
use rayon::prelude::*;
use tracing::debug;

use self::hypergeom::HypergeometricCdf;

/// Number of binomial thinning draws averaged into one p-value.
const RESAMPLE_DRAWS: usize = 200;

/// Minimum combined signal mass, as a fraction of `iterations * exp(epsilon)`,
/// below which an event is too weak to score.
const SIGNAL_FRACTION: f64 = 0.001;

/// Returns the signal threshold for the given resolution and test budget.
///
/// Events whose combined counts do not exceed this mass are skipped by the
/// selector: with so few occurrences the statistic has no power and its
/// Monte-Carlo average would be noise.
#[must_use]
pub fn signal_threshold(iterations: usize, epsilon: f64) -> f64 {
    SIGNAL_FRACTION * iterations as f64 * epsilon.exp()
}

/// Estimates the p-value for observing counts `(cx, cy)` under the null
/// hypothesis that the mechanism is `epsilon`-differentially private.
///
/// `cx` and `cy` must already be in canonical order (`cx >= cy`), and
/// `iterations` is the per-database sample count behind them. The statistic
/// averages [`RESAMPLE_DRAWS`] thinned draws `c ~ Binomial(cx, exp(-epsilon))`,
/// scoring each with `Pr[H >= c]` where
/// `H ~ Hypergeometric(2*iterations, iterations, c + cy)`.
///
/// Numerical failures (overflow, NaN from the CDF backend) degrade to an
/// inconclusive `1.0` and are reported at debug level.
pub fn p_value(
    cx: u64,
    cy: u64,
    epsilon: f64,
    iterations: usize,
    cdf: &(impl HypergeometricCdf + ?Sized),
    rng: &mut SmallRng,
) -> f64 {
    let thinning = (-epsilon).exp();
    let Ok(binomial) = Binomial::new(cx, thinning) else {
        debug!(cx, thinning, "binomial thinning is undefined, reporting inconclusive");
        return 1.0;
    };
    let thinned: Vec<u64> = (0..RESAMPLE_DRAWS).map(|_| binomial.sample(rng)).collect();

    let population = 2 * iterations as u64;
    let successes = iterations as u64;
    let total: f64 = thinned
        .par_iter()
        .map(|&count| upper_tail(count, cy, population, successes, cdf))
        .sum();
    let mean = total / RESAMPLE_DRAWS as f64;
    if mean.is_finite() {
        mean.clamp(0.0, 1.0)
    } else {
        debug!(cx, cy, epsilon, "test statistic was not finite, reporting inconclusive");
        1.0
    }
}

/// `Pr[H >= count]` via the CDF evaluated at `count - 1`.
fn upper_tail(
    count: u64,
    cy: u64,
    population: u64,
    successes: u64,
    cdf: &(impl HypergeometricCdf + ?Sized),
) -> f64 {
    if count == 0 {
        return 1.0;
    }
    1.0 - cdf.cdf(count - 1, population, successes, count + cy)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rstest::rstest;

    use super::{hypergeom::LogSumCdf, *};

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(0x5eed)
    }

    #[rstest]
    #[case(1000, 900)]
    #[case(5000, 100)]
    #[case(42, 42)]
    fn p_values_stay_in_range(#[case] cx: u64, #[case] cy: u64) {
        let p = p_value(cx, cy, 0.5, 10_000, &LogSumCdf, &mut rng());
        assert!((0.0..=1.0).contains(&p), "p={p}");
    }

    #[test]
    fn zero_counts_are_inconclusive() {
        let p = p_value(0, 0, 0.5, 10_000, &LogSumCdf, &mut rng());
        assert!((p - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn blatant_violations_score_low() {
        // 30% of one database in the event versus nothing on the other.
        let p = p_value(3_000, 0, 0.5, 10_000, &LogSumCdf, &mut rng());
        assert!(p < 0.01, "p={p}");
    }

    #[test]
    fn balanced_counts_score_high() {
        let p = p_value(3_000, 2_950, 0.5, 10_000, &LogSumCdf, &mut rng());
        assert!(p > 0.5, "p={p}");
    }

    #[test]
    fn p_value_is_monotone_in_epsilon() {
        // Within Monte-Carlo noise a larger tested budget can only make the
        // observed ratio look more acceptable.
        let mut previous = 0.0_f64;
        for epsilon in [0.2, 0.5, 0.8, 1.1, 1.4] {
            let p = p_value(2_000, 1_000, epsilon, 10_000, &LogSumCdf, &mut rng());
            assert!(p >= previous - 0.05, "p({epsilon}) = {p} dropped below {previous}");
            previous = p;
        }
    }

    #[test]
    fn threshold_scales_with_budget() {
        assert!(signal_threshold(100_000, 1.0) > signal_threshold(100_000, 0.5));
        let expected = 0.001 * 100_000.0 * 0.5_f64.exp();
        assert!((signal_threshold(100_000, 0.5) - expected).abs() < 1e-9);
    }
}
