//! High-resolution hypothesis testing on a selected event.

use rand::{SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::{
    Result,
    arguments::Arguments,
    counter::{EventCounts, count_event},
    event::Event,
    mechanism::Mechanism,
    runner::run_mechanism,
    stats::{hypergeom::HypergeometricCdf, p_value},
};

/// The outcome of one high-resolution hypothesis test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HypothesisOutcome {
    p: f64,
    reverse_p: Option<f64>,
}

impl HypothesisOutcome {
    /// Returns the p-value of the test in the canonical direction.
    #[must_use]
    pub fn p_value(&self) -> f64 {
        self.p
    }

    /// Returns the reverse-direction diagnostic p-value when it was
    /// requested.
    #[must_use]
    pub fn reverse_p_value(&self) -> Option<f64> {
        self.reverse_p
    }
}

/// Re-samples the mechanism at high resolution on a fixed event and scores
/// the observed counts against the tested budget.
///
/// The iteration budget is split into one shard per worker of the ambient
/// rayon pool, with the remainder folded into the last shard; every shard
/// samples both databases with its own entropy-seeded generator and the raw
/// counts are summed before canonicalisation. With `report_reverse` the
/// statistic is also evaluated with the counts swapped, which diagnoses
/// violations in the opposite direction.
///
/// # Errors
/// Propagates mechanism failures, schema mismatches and event arity
/// mismatches from the sampling pass.
#[allow(clippy::too_many_arguments, reason = "mirrors the documented operation signature")]
#[instrument(
    name = "hypotest.test",
    err,
    skip(mechanism, d1, d2, args, event, cdf),
    fields(mechanism = %mechanism.name(), event = %event, epsilon, iterations)
)]
pub fn hypothesis_test<M: Mechanism + Sync>(
    mechanism: &M,
    d1: &[f64],
    d2: &[f64],
    args: &Arguments,
    event: &Event,
    epsilon: f64,
    iterations: usize,
    report_reverse: bool,
    cdf: &dyn HypergeometricCdf,
) -> Result<HypothesisOutcome> {
    let shards = shard_iterations(iterations, rayon::current_num_threads());
    let counts = shards
        .par_iter()
        .map(|&shard| {
            let samples_d1 = run_mechanism(mechanism, d1, args, shard)?;
            let samples_d2 = run_mechanism(mechanism, d2, args, shard)?;
            count_event(&samples_d1, &samples_d2, event)
        })
        .try_reduce(EventCounts::default, |left, right| Ok(left.combine(right)))?;

    let (cx, cy) = counts.canonical();
    debug!(cx, cy, "high-resolution counts");

    let mut rng = SmallRng::from_entropy();
    let p = p_value(cx, cy, epsilon, iterations, cdf, &mut rng);
    let reverse_p =
        report_reverse.then(|| p_value(cy, cx, epsilon, iterations, cdf, &mut rng));
    Ok(HypothesisOutcome { p, reverse_p })
}

/// Splits `iterations` into one chunk per worker; the last chunk absorbs the
/// remainder.
fn shard_iterations(iterations: usize, workers: usize) -> Vec<usize> {
    let workers = workers.max(1);
    let base = iterations / workers;
    let mut shards = vec![base; workers];
    if let Some(last) = shards.last_mut() {
        *last += iterations - base * workers;
    }
    shards
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::{
        event::Predicate,
        stats::hypergeom::NativeCdf,
        test_utils::FirstQuery,
    };

    #[rstest]
    #[case(100, 4, vec![25, 25, 25, 25])]
    #[case(10, 4, vec![2, 2, 2, 4])]
    #[case(3, 8, vec![0, 0, 0, 0, 0, 0, 0, 3])]
    #[case(7, 1, vec![7])]
    fn shards_cover_the_iteration_budget(
        #[case] iterations: usize,
        #[case] workers: usize,
        #[case] expected: Vec<usize>,
    ) {
        assert_eq!(shard_iterations(iterations, workers), expected);
    }

    proptest! {
        #[test]
        fn shard_sums_always_match(iterations in 0_usize..100_000, workers in 1_usize..64) {
            let shards = shard_iterations(iterations, workers);
            prop_assert_eq!(shards.len(), workers);
            prop_assert_eq!(shards.iter().sum::<usize>(), iterations);
        }
    }

    #[test]
    fn separating_event_rejects_and_reverse_direction_reports() {
        let args = crate::Arguments::new().with_epsilon(0.5);
        let event = Event::scalar(Predicate::Equals(1.0));
        let outcome = hypothesis_test(
            &FirstQuery,
            &[1.0, 1.0],
            &[0.0, 1.0],
            &args,
            &event,
            0.5,
            5_000,
            true,
            &NativeCdf,
        )
        .expect("test must succeed");
        assert!(outcome.p_value() < 0.05);
        let reverse = outcome.reverse_p_value().expect("reverse was requested");
        assert!(reverse > 0.5);
    }

    #[test]
    fn reverse_p_is_omitted_unless_requested() {
        let args = crate::Arguments::new().with_epsilon(0.5);
        let event = Event::scalar(Predicate::Equals(1.0));
        let outcome = hypothesis_test(
            &FirstQuery,
            &[1.0],
            &[1.0],
            &args,
            &event,
            0.5,
            200,
            false,
            &NativeCdf,
        )
        .expect("test must succeed");
        assert!(outcome.reverse_p_value().is_none());
        assert!(outcome.p_value() > 0.05);
    }
}
