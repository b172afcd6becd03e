//! Event selection across candidate inputs (low-resolution pass).
//!
//! For every candidate adjacent pair the selector samples the mechanism,
//! derives (or accepts) an event search space, counts event occurrences and
//! scores them with the test statistic. The pair/event with the smallest
//! estimated p-value wins and is handed to the high-resolution hypothesis
//! tester.

use rand::{SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use crate::{
    Result,
    counter::{EventCounts, count_event},
    error::DetectorError,
    event::{Event, EventSpace},
    generators::CandidateInput,
    mechanism::Mechanism,
    runner::run_mechanism,
    stats::{hypergeom::HypergeometricCdf, p_value, signal_threshold},
};

/// The selector's verdict: which input and event to test at high resolution.
#[derive(Clone, Debug)]
pub struct Selection {
    input: CandidateInput,
    event: Event,
    counts: EventCounts,
    p_estimate: f64,
}

impl Selection {
    /// Returns the selected candidate input.
    #[must_use]
    pub fn input(&self) -> &CandidateInput {
        &self.input
    }

    /// Returns the selected event.
    #[must_use]
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Returns the low-resolution counts behind the selection.
    #[must_use]
    pub fn counts(&self) -> EventCounts {
        self.counts
    }

    /// Returns the estimated p-value that won the selection; `1.0` when every
    /// candidate event fell below the signal threshold.
    #[must_use]
    pub fn p_estimate(&self) -> f64 {
        self.p_estimate
    }
}

struct EvaluatedInput {
    input_index: usize,
    events: Vec<Event>,
    counts: Vec<EventCounts>,
}

/// Picks the (input, event) pair with the smallest estimated p-value.
///
/// Sampling, space inference and counting for each candidate input run on
/// the ambient rayon pool; scoring happens on the calling thread. Ties are
/// broken towards the earlier input and, within an input, the earlier event
/// of the search space, so repeated runs over identical counts agree.
///
/// When `explicit_event` is given the search space collapses to that single
/// event. When every event is filtered by the signal threshold the selector
/// falls back to the event with the largest combined counts and reports an
/// estimate of `1.0`; the caller will observe no detection.
///
/// # Errors
/// Propagates mechanism failures and schema mismatches from the runner, and
/// rejects an explicit event whose arity does not fit the mechanism's
/// output. Returns [`DetectorError::NoCandidateInputs`] for an empty input
/// list.
#[instrument(
    name = "selector.select_event",
    err,
    skip(mechanism, inputs, explicit_event, cdf),
    fields(mechanism = %mechanism.name(), inputs = inputs.len(), epsilon, iterations)
)]
pub fn select_event<M: Mechanism + Sync>(
    mechanism: &M,
    inputs: &[CandidateInput],
    epsilon: f64,
    iterations: usize,
    explicit_event: Option<&Event>,
    cdf: &dyn HypergeometricCdf,
) -> Result<Selection> {
    if inputs.is_empty() {
        return Err(DetectorError::NoCandidateInputs);
    }
    if iterations == 0 {
        return Err(DetectorError::InvalidIterations {
            option: "iterations",
        });
    }

    let evaluated: Vec<EvaluatedInput> = inputs
        .par_iter()
        .enumerate()
        .map(|(input_index, input)| evaluate_input(mechanism, input_index, input, iterations, explicit_event))
        .collect::<Result<_>>()?;

    let threshold = signal_threshold(iterations, epsilon);
    let mut rng = SmallRng::from_entropy();

    let mut best: Option<(usize, usize, f64)> = None;
    let mut strongest: Option<(usize, usize, u64)> = None;
    for evaluation in &evaluated {
        for (event_index, counts) in evaluation.counts.iter().enumerate() {
            let (cx, cy) = counts.canonical();
            if strongest.is_none_or(|(_, _, total)| counts.total() > total) {
                strongest = Some((evaluation.input_index, event_index, counts.total()));
            }
            if (cx + cy) as f64 <= threshold {
                continue;
            }
            let p = p_value(cx, cy, epsilon, iterations, cdf, &mut rng);
            debug!(
                input = evaluation.input_index,
                event = %evaluation.events[event_index],
                cx,
                cy,
                p,
                "scored candidate event"
            );
            if best.is_none_or(|(_, _, best_p)| p < best_p) {
                best = Some((evaluation.input_index, event_index, p));
            }
        }
    }

    let (input_index, event_index, p_estimate) = best.unwrap_or_else(|| {
        warn!("every candidate event fell below the signal threshold");
        let (input_index, event_index, _) =
            strongest.unwrap_or((0, 0, 0));
        (input_index, event_index, 1.0)
    });

    let evaluation = &evaluated[input_index];
    Ok(Selection {
        input: inputs[input_index].clone(),
        event: evaluation.events[event_index].clone(),
        counts: evaluation.counts[event_index],
        p_estimate,
    })
}

fn evaluate_input<M: Mechanism + Sync>(
    mechanism: &M,
    input_index: usize,
    input: &CandidateInput,
    iterations: usize,
    explicit_event: Option<&Event>,
) -> Result<EvaluatedInput> {
    let d1 = run_mechanism(mechanism, input.d1(), input.args(), iterations)?;
    let d2 = run_mechanism(mechanism, input.d2(), input.args(), iterations)?;

    let space = match explicit_event {
        Some(event) => {
            if event.arity() != d1.arity() {
                return Err(DetectorError::EventArityMismatch {
                    expected: d1.arity(),
                    got: event.arity(),
                });
            }
            EventSpace::singleton(event)
        }
        None => EventSpace::from_observations(&d1, &d2),
    };

    let mut events = Vec::with_capacity(space.len());
    let mut counts = Vec::with_capacity(space.len());
    for event in space.iter() {
        counts.push(count_event(&d1, &d2, &event)?);
        events.push(event);
    }
    Ok(EvaluatedInput {
        input_index,
        events,
        counts,
    })
}
