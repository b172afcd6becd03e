//! Error types for the dpcheck core library.
//!
//! Defines error enums exposed by the public API and a convenient result alias.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::output::OutputShape;

/// Stable codes describing [`MechanismError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum MechanismErrorCode {
    /// A required keyword argument was absent.
    MissingArgument,
    /// A keyword argument carried a value the mechanism cannot use.
    InvalidArgument,
}

impl MechanismErrorCode {
    /// Return the stable machine-readable representation of this error code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingArgument => "MECHANISM_MISSING_ARGUMENT",
            Self::InvalidArgument => "MECHANISM_INVALID_ARGUMENT",
        }
    }
}

impl fmt::Display for MechanismErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error produced by a [`Mechanism`](crate::Mechanism) invocation.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MechanismError {
    /// A required keyword argument was absent.
    #[error("required argument `{name}` is missing")]
    MissingArgument { name: Arc<str> },
    /// A keyword argument carried a value the mechanism cannot use.
    #[error("argument `{name}` has unusable value {value}")]
    InvalidArgument { name: Arc<str>, value: f64 },
}

impl MechanismError {
    /// Retrieve the stable [`MechanismErrorCode`] for this error.
    pub const fn code(&self) -> MechanismErrorCode {
        match self {
            Self::MissingArgument { .. } => MechanismErrorCode::MissingArgument,
            Self::InvalidArgument { .. } => MechanismErrorCode::InvalidArgument,
        }
    }
}

/// Stable codes describing [`DetectorError`] variants.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum DetectorErrorCode {
    /// The arguments did not provide the `epsilon` key.
    MissingEpsilon,
    /// No test epsilon values were supplied.
    NoTestEpsilons,
    /// A test epsilon value was non-finite or not positive.
    InvalidTestEpsilon,
    /// The generator was given no input sizes.
    NoInputSizes,
    /// The generator was given a zero input size.
    InvalidInputSize,
    /// No candidate input pairs were available for selection.
    NoCandidateInputs,
    /// An iteration count was zero.
    InvalidIterations,
    /// An explicit event's arity did not match the mechanism's output arity.
    EventArityMismatch,
    /// A mechanism invocation returned a shape inconsistent with its probe.
    SchemaMismatch,
    /// The mechanism under test failed while being invoked.
    MechanismFailure,
    /// The worker pool could not be constructed.
    WorkerPool,
}

impl DetectorErrorCode {
    /// Return the stable machine-readable representation of this error code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingEpsilon => "DETECTOR_MISSING_EPSILON",
            Self::NoTestEpsilons => "DETECTOR_NO_TEST_EPSILONS",
            Self::InvalidTestEpsilon => "DETECTOR_INVALID_TEST_EPSILON",
            Self::NoInputSizes => "DETECTOR_NO_INPUT_SIZES",
            Self::InvalidInputSize => "DETECTOR_INVALID_INPUT_SIZE",
            Self::NoCandidateInputs => "DETECTOR_NO_CANDIDATE_INPUTS",
            Self::InvalidIterations => "DETECTOR_INVALID_ITERATIONS",
            Self::EventArityMismatch => "DETECTOR_EVENT_ARITY_MISMATCH",
            Self::SchemaMismatch => "DETECTOR_SCHEMA_MISMATCH",
            Self::MechanismFailure => "DETECTOR_MECHANISM_FAILURE",
            Self::WorkerPool => "DETECTOR_WORKER_POOL",
        }
    }
}

impl fmt::Display for DetectorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type produced while configuring or running the detection pipeline.
///
/// Configuration variants surface before any mechanism is invoked; the
/// remaining variants abort the pipeline and propagate to the caller.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DetectorError {
    /// The arguments did not provide the `epsilon` key.
    #[error("the mechanism arguments do not provide the `epsilon` key")]
    MissingEpsilon,
    /// No test epsilon values were supplied.
    #[error("at least one test epsilon value is required")]
    NoTestEpsilons,
    /// A test epsilon value was non-finite or not positive.
    #[error("test epsilon {value} must be finite and positive")]
    InvalidTestEpsilon { value: f64 },
    /// The generator was given no input sizes.
    #[error("at least one input size is required")]
    NoInputSizes,
    /// The generator was given a zero input size.
    #[error("input sizes must be at least 1")]
    InvalidInputSize,
    /// No candidate input pairs were available for selection.
    #[error("the selector needs at least one candidate input pair")]
    NoCandidateInputs,
    /// An iteration count was zero.
    #[error("`{option}` must be at least 1")]
    InvalidIterations { option: &'static str },
    /// An explicit event's arity did not match the mechanism's output arity.
    #[error("event has arity {got} but the mechanism outputs arity {expected}")]
    EventArityMismatch { expected: usize, got: usize },
    /// A mechanism invocation returned a shape inconsistent with its probe.
    #[error("mechanism `{mechanism}` returned {got} but its probe reported {expected}")]
    SchemaMismatch {
        mechanism: Arc<str>,
        expected: OutputShape,
        got: OutputShape,
    },
    /// The mechanism under test failed while being invoked.
    #[error("mechanism `{mechanism}` failed: {error}")]
    Mechanism {
        mechanism: Arc<str>,
        #[source]
        error: MechanismError,
    },
    /// The worker pool could not be constructed.
    #[error("failed to build the worker pool: {message}")]
    WorkerPool { message: Arc<str> },
}

impl DetectorError {
    /// Retrieve the stable [`DetectorErrorCode`] for this error.
    pub const fn code(&self) -> DetectorErrorCode {
        match self {
            Self::MissingEpsilon => DetectorErrorCode::MissingEpsilon,
            Self::NoTestEpsilons => DetectorErrorCode::NoTestEpsilons,
            Self::InvalidTestEpsilon { .. } => DetectorErrorCode::InvalidTestEpsilon,
            Self::NoInputSizes => DetectorErrorCode::NoInputSizes,
            Self::InvalidInputSize => DetectorErrorCode::InvalidInputSize,
            Self::NoCandidateInputs => DetectorErrorCode::NoCandidateInputs,
            Self::InvalidIterations { .. } => DetectorErrorCode::InvalidIterations,
            Self::EventArityMismatch { .. } => DetectorErrorCode::EventArityMismatch,
            Self::SchemaMismatch { .. } => DetectorErrorCode::SchemaMismatch,
            Self::Mechanism { .. } => DetectorErrorCode::MechanismFailure,
            Self::WorkerPool { .. } => DetectorErrorCode::WorkerPool,
        }
    }

    /// Retrieve the inner [`MechanismErrorCode`] when the error originated in
    /// the mechanism under test.
    pub const fn mechanism_code(&self) -> Option<MechanismErrorCode> {
        match self {
            Self::Mechanism { error, .. } => Some(error.code()),
            _ => None,
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, DetectorError>;
