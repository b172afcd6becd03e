//! Output events and the search space inferred from observed samples.
//!
//! An event is a conjunction of per-component predicates over a mechanism's
//! output tuple. The search space over candidate events is either supplied
//! explicitly by the caller or inferred from observed samples: components
//! taking few distinct values are treated as categorical (exact-match
//! predicates), everything else as continuous (left tails anchored in the
//! densest band of the observations).

use std::fmt;

use tracing::debug;

use crate::output::OutputMatrix;

/// Number of tail thresholds generated for a continuous component.
const TAIL_PREDICATES: usize = 10;

/// A component is categorical when it takes fewer than this fraction of the
/// per-database iteration count in distinct values.
const CATEGORICAL_FRACTION: f64 = 0.002;

/// Fraction of the combined samples covered by the densest band.
const DENSE_BAND_FRACTION: f64 = 0.7;

/// Membership test applied to a single output component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Predicate {
    /// Exact match, used for categorical components.
    Equals(f64),
    /// Open interval with strict bounds; `None` leaves a side unbounded.
    Interval {
        /// Strict lower bound, unbounded when `None`.
        lo: Option<f64>,
        /// Strict upper bound, unbounded when `None`.
        hi: Option<f64>,
    },
}

impl Predicate {
    /// The left tail `(-inf, hi)`.
    #[must_use]
    pub const fn below(hi: f64) -> Self {
        Self::Interval {
            lo: None,
            hi: Some(hi),
        }
    }

    /// The open interval `(lo, hi)`.
    #[must_use]
    pub const fn between(lo: f64, hi: f64) -> Self {
        Self::Interval {
            lo: Some(lo),
            hi: Some(hi),
        }
    }

    /// Returns whether `value` satisfies this predicate.
    ///
    /// Exact matches compare doubles for equality on purpose: categorical
    /// components carry exactly representable discrete values. Interval
    /// bounds are strict on both sides.
    #[must_use]
    pub fn matches(&self, value: f64) -> bool {
        match *self {
            Self::Equals(expected) => value == expected,
            Self::Interval { lo, hi } => {
                lo.is_none_or(|bound| value > bound) && hi.is_none_or(|bound| value < bound)
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Equals(expected) => write!(f, "{expected}"),
            Self::Interval { lo, hi } => {
                match lo {
                    Some(bound) => write!(f, "({bound}, ")?,
                    None => write!(f, "(-inf, ")?,
                }
                match hi {
                    Some(bound) => write!(f, "{bound})"),
                    None => write!(f, "inf)"),
                }
            }
        }
    }
}

/// A conjunction of per-component predicates; an output tuple matches when
/// every component satisfies its predicate.
///
/// # Examples
/// ```
/// use dpcheck_core::{Event, Predicate};
///
/// let event = Event::new(vec![Predicate::Equals(0.0), Predicate::below(1.5)]);
/// assert_eq!(event.arity(), 2);
/// assert_eq!(event.to_string(), "(0, (-inf, 1.5))");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    predicates: Vec<Predicate>,
}

impl Event {
    /// Builds an event from per-component predicates.
    #[must_use]
    pub fn new(predicates: Vec<Predicate>) -> Self {
        Self { predicates }
    }

    /// Builds a single-component event, the common case for scalar outputs.
    #[must_use]
    pub fn scalar(predicate: Predicate) -> Self {
        Self::new(vec![predicate])
    }

    /// Returns the number of components this event constrains.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.predicates.len()
    }

    /// Returns the per-component predicates.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.predicates.as_slice() {
            return write!(f, "{single}");
        }
        write!(f, "(")?;
        for (index, predicate) in self.predicates.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{predicate}")?;
        }
        write!(f, ")")
    }
}

/// The finite set of candidate events considered by the selector: one
/// predicate list per output component, combined as a Cartesian product.
#[derive(Clone, Debug, PartialEq)]
pub struct EventSpace {
    rows: Vec<Vec<Predicate>>,
}

impl EventSpace {
    /// A space holding exactly one caller-supplied event.
    #[must_use]
    pub fn singleton(event: &Event) -> Self {
        Self {
            rows: event
                .predicates()
                .iter()
                .map(|&predicate| vec![predicate])
                .collect(),
        }
    }

    /// Infers a search space from the observed samples of both databases.
    ///
    /// Each output component contributes either exact-match predicates over
    /// its distinct values (categorical) or [`TAIL_PREDICATES`] left tails
    /// whose thresholds are spaced across the densest
    /// [`DENSE_BAND_FRACTION`] band of the combined samples (continuous).
    #[must_use]
    pub fn from_observations(d1: &OutputMatrix, d2: &OutputMatrix) -> Self {
        debug_assert_eq!(d1.arity(), d2.arity());
        let iterations = d1.iterations().min(d2.iterations());
        let rows: Vec<Vec<Predicate>> = (0..d1.arity())
            .map(|row| component_predicates(d1.row(row), d2.row(row), iterations))
            .collect();
        debug!(
            components = rows.len(),
            candidates = rows.iter().map(Vec::len).product::<usize>(),
            "inferred event search space"
        );
        Self { rows }
    }

    /// Returns the number of events in the space.
    #[must_use]
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.rows.iter().map(Vec::len).product()
    }

    /// Returns whether the space contains no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.iter().any(Vec::is_empty) || self.rows.is_empty()
    }

    /// Iterates over the events in row-major (last component fastest) order.
    pub fn iter(&self) -> EventSpaceIter<'_> {
        EventSpaceIter {
            rows: &self.rows,
            indices: vec![0; self.rows.len()],
            exhausted: self.is_empty(),
        }
    }
}

/// Iterator over the Cartesian product of an [`EventSpace`]'s rows.
pub struct EventSpaceIter<'a> {
    rows: &'a [Vec<Predicate>],
    indices: Vec<usize>,
    exhausted: bool,
}

impl Iterator for EventSpaceIter<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if self.exhausted {
            return None;
        }
        let event = Event::new(
            self.rows
                .iter()
                .zip(self.indices.iter())
                .map(|(row, &index)| row[index])
                .collect(),
        );

        // Odometer advance, last component fastest.
        self.exhausted = true;
        for (row, index) in self.rows.iter().zip(self.indices.iter_mut()).rev() {
            *index += 1;
            if *index < row.len() {
                self.exhausted = false;
                break;
            }
            *index = 0;
        }
        Some(event)
    }
}

fn component_predicates(d1_row: &[f64], d2_row: &[f64], iterations: usize) -> Vec<Predicate> {
    let mut combined: Vec<f64> = d1_row.iter().chain(d2_row.iter()).copied().collect();
    combined.sort_unstable_by(f64::total_cmp);
    if combined.is_empty() {
        return Vec::new();
    }

    let mut distinct = Vec::with_capacity(combined.len().min(64));
    for &value in &combined {
        if distinct.last() != Some(&value) {
            distinct.push(value);
        }
    }

    if (distinct.len() as f64) < CATEGORICAL_FRACTION * iterations as f64 {
        return distinct.into_iter().map(Predicate::Equals).collect();
    }

    let (lo, hi) = densest_band(&combined);
    (0..TAIL_PREDICATES)
        .map(|step| lo + (hi - lo) * step as f64 / (TAIL_PREDICATES - 1) as f64)
        .map(Predicate::below)
        .collect()
}

/// Finds the narrowest window covering [`DENSE_BAND_FRACTION`] of the sorted
/// samples and returns its endpoints.
fn densest_band(sorted: &[f64]) -> (f64, f64) {
    let len = sorted.len();
    if len < 2 {
        return (sorted[0], sorted[0]);
    }
    let window = ((DENSE_BAND_FRACTION * len as f64).floor() as usize).clamp(1, len - 1);
    let mut best = window;
    let mut best_span = f64::INFINITY;
    for end in window..len {
        let span = sorted[end] - sorted[end - window];
        if span < best_span {
            best_span = span;
            best = end;
        }
    }
    (sorted[best - window], sorted[best])
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::output::{Output, OutputMatrix, OutputShape};

    fn matrix_from(values: &[f64]) -> OutputMatrix {
        let mut matrix = OutputMatrix::with_capacity(OutputShape::scalar(), values.len());
        for &value in values {
            matrix.push(&Output::Scalar(value));
        }
        matrix
    }

    #[rstest]
    #[case::equals_hit(Predicate::Equals(2.0), 2.0, true)]
    #[case::equals_miss(Predicate::Equals(2.0), 2.000_001, false)]
    #[case::below_hit(Predicate::below(1.0), 0.999, true)]
    #[case::below_boundary_is_strict(Predicate::below(1.0), 1.0, false)]
    #[case::between_hit(Predicate::between(0.0, 1.0), 0.5, true)]
    #[case::between_lower_is_strict(Predicate::between(0.0, 1.0), 0.0, false)]
    fn predicate_matching(#[case] predicate: Predicate, #[case] value: f64, #[case] hit: bool) {
        assert_eq!(predicate.matches(value), hit);
    }

    #[test]
    fn unbounded_sides_accept_extremes() {
        let tail = Predicate::below(0.0);
        assert!(tail.matches(f64::MIN));
        assert!(!tail.matches(f64::MAX));
    }

    #[test]
    fn categorical_components_enumerate_distinct_values() {
        let d1 = matrix_from(&[0.0; 2000]);
        let mut samples = vec![1.0; 1000];
        samples.extend(vec![2.0; 1000]);
        let d2 = matrix_from(&samples);
        let space = EventSpace::from_observations(&d1, &d2);
        let events: Vec<Event> = space.iter().collect();
        assert_eq!(
            events,
            vec![
                Event::scalar(Predicate::Equals(0.0)),
                Event::scalar(Predicate::Equals(1.0)),
                Event::scalar(Predicate::Equals(2.0)),
            ]
        );
    }

    #[test]
    fn continuous_components_get_monotone_left_tails() {
        let samples: Vec<f64> = (0..600).map(|i| i as f64 / 600.0).collect();
        let d1 = matrix_from(&samples);
        let d2 = matrix_from(&samples);
        let space = EventSpace::from_observations(&d1, &d2);
        let events: Vec<Event> = space.iter().collect();
        assert_eq!(events.len(), TAIL_PREDICATES);

        let mut previous = f64::NEG_INFINITY;
        for event in &events {
            match event.predicates() {
                [Predicate::Interval { lo: None, hi: Some(bound) }] => {
                    assert!(*bound >= previous, "thresholds must not decrease");
                    previous = *bound;
                }
                other => panic!("expected a left tail, got {other:?}"),
            }
        }
    }

    #[test]
    fn tail_thresholds_stay_within_the_observed_range() {
        let samples: Vec<f64> = (0..600).map(|i| 5.0 + i as f64 / 100.0).collect();
        let d1 = matrix_from(&samples);
        let d2 = matrix_from(&samples);
        let space = EventSpace::from_observations(&d1, &d2);
        for event in space.iter() {
            let [Predicate::Interval { hi: Some(bound), .. }] = event.predicates() else {
                panic!("expected a left tail");
            };
            assert!(*bound >= 5.0 && *bound <= 11.0);
        }
    }

    #[test]
    fn singleton_space_round_trips_the_event() {
        let event = Event::new(vec![Predicate::Equals(1.0), Predicate::below(2.0)]);
        let space = EventSpace::singleton(&event);
        assert_eq!(space.len(), 1);
        assert_eq!(space.iter().collect::<Vec<_>>(), vec![event]);
    }

    #[test]
    fn product_iteration_is_row_major() {
        let space = EventSpace {
            rows: vec![
                vec![Predicate::Equals(0.0), Predicate::Equals(1.0)],
                vec![Predicate::Equals(10.0), Predicate::Equals(20.0)],
            ],
        };
        let events: Vec<String> = space.iter().map(|event| event.to_string()).collect();
        assert_eq!(events, vec!["(0, 10)", "(0, 20)", "(1, 10)", "(1, 20)"]);
        assert_eq!(space.len(), 4);
    }

    #[test]
    fn densest_band_tracks_the_cluster() {
        let mut samples = vec![100.0, 200.0, 300.0];
        samples.extend((0..97).map(|i| i as f64 / 100.0));
        samples.sort_unstable_by(f64::total_cmp);
        let (lo, hi) = densest_band(&samples);
        assert!(hi <= 1.0, "band must avoid the outliers, got ({lo}, {hi})");
    }
}
