//! Empirical counterexample detection for differential-privacy claims.
//!
//! Given a black-box randomized [`Mechanism`] and a privacy budget to test,
//! the detector searches over canonical adjacent database pairs and
//! automatically derived output events for the combination that most
//! strongly contradicts the claimed budget, then scores it with a
//! hypergeometric-tail hypothesis test. A small final p-value means the
//! returned (pair, event) tuple is statistical evidence against the claim.
//!
//! The pipeline is exposed at three levels: [`detect_counterexample`] for
//! one-call use, [`DetectorBuilder`]/[`Detector`] for configured searches,
//! and the individual stages ([`run_mechanism`], [`select_event`],
//! [`hypothesis_test`], [`p_value`]) for callers composing their own loop.

mod arguments;
mod counter;
mod detector;
mod error;
mod event;
mod generators;
mod hypotest;
mod mechanism;
mod output;
mod runner;
mod selector;
mod stats;

pub use crate::{
    arguments::{Arguments, EPSILON_KEY},
    counter::{EventCounts, count_event},
    detector::{Detection, Detector, DetectorBuilder, detect_counterexample},
    error::{
        DetectorError, DetectorErrorCode, MechanismError, MechanismErrorCode, Result,
    },
    event::{Event, EventSpace, EventSpaceIter, Predicate},
    generators::{CandidateInput, generate_inputs},
    hypotest::{HypothesisOutcome, hypothesis_test},
    mechanism::Mechanism,
    output::{Output, OutputKind, OutputMatrix, OutputShape},
    runner::run_mechanism,
    selector::{Selection, select_event},
    stats::{
        hypergeom::{BACKEND_ENV, CdfBackend, HypergeometricCdf, LogSumCdf, NativeCdf},
        p_value, signal_threshold,
    },
};

#[cfg(test)]
pub(crate) mod test_utils;
