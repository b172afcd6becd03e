//! Event-occurrence counting over paired sample matrices.

use crate::{
    Result,
    error::DetectorError,
    event::Event,
    output::OutputMatrix,
};

/// Raw per-database match counts for one candidate event.
///
/// Counts stay attributed to their database until [`canonical`] orders them
/// for the test statistic; shard results are merged with [`combine`] first so
/// canonicalisation happens exactly once, on the totals.
///
/// [`canonical`]: EventCounts::canonical
/// [`combine`]: EventCounts::combine
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EventCounts {
    d1: u64,
    d2: u64,
}

impl EventCounts {
    /// Builds counts from the two databases' match totals.
    #[must_use]
    pub const fn new(d1: u64, d2: u64) -> Self {
        Self { d1, d2 }
    }

    /// Returns the number of matching samples drawn on the first database.
    #[must_use]
    pub const fn d1(&self) -> u64 {
        self.d1
    }

    /// Returns the number of matching samples drawn on the second database.
    #[must_use]
    pub const fn d2(&self) -> u64 {
        self.d2
    }

    /// Returns the combined signal mass of both databases.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.d1 + self.d2
    }

    /// Returns the counts ordered for the test statistic: `(max, min)`.
    #[must_use]
    pub const fn canonical(&self) -> (u64, u64) {
        if self.d1 >= self.d2 {
            (self.d1, self.d2)
        } else {
            (self.d2, self.d1)
        }
    }

    /// Merges counts accumulated by another shard.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        Self {
            d1: self.d1 + other.d1,
            d2: self.d2 + other.d2,
        }
    }
}

/// Counts how many releases from each database fall into `event`.
///
/// A release matches when every output component satisfies its per-component
/// predicate.
///
/// # Errors
/// Returns [`DetectorError::EventArityMismatch`] when the event does not
/// constrain exactly as many components as the matrices carry.
pub fn count_event(d1: &OutputMatrix, d2: &OutputMatrix, event: &Event) -> Result<EventCounts> {
    Ok(EventCounts::new(
        count_matches(d1, event)?,
        count_matches(d2, event)?,
    ))
}

fn count_matches(matrix: &OutputMatrix, event: &Event) -> Result<u64> {
    if event.arity() != matrix.arity() {
        return Err(DetectorError::EventArityMismatch {
            expected: matrix.arity(),
            got: event.arity(),
        });
    }
    let matched = (0..matrix.iterations())
        .filter(|&column| {
            event
                .predicates()
                .iter()
                .enumerate()
                .all(|(row, predicate)| predicate.matches(matrix.row(row)[column]))
        })
        .count();
    Ok(matched as u64)
}
