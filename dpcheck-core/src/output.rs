//! Mechanism output shapes and the dense sample matrix.

use std::fmt;

/// A single observation produced by a mechanism.
///
/// Mechanisms release either one number or a fixed-length tuple of numbers;
/// the shape must stay stable across invocations with the same arguments.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    /// A scalar release.
    Scalar(f64),
    /// A fixed-length tuple release.
    Tuple(Vec<f64>),
}

impl Output {
    /// Returns the schema descriptor for this observation.
    #[must_use]
    pub fn shape(&self) -> OutputShape {
        match self {
            Self::Scalar(_) => OutputShape::scalar(),
            Self::Tuple(components) => OutputShape::tuple(components.len()),
        }
    }

    /// Returns the number of components in this observation.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.shape().arity()
    }
}

/// The kind of value a mechanism releases.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OutputKind {
    /// A single number.
    Scalar,
    /// A fixed-length tuple of numbers.
    Tuple,
}

/// Schema descriptor learned from a mechanism's probe invocation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct OutputShape {
    kind: OutputKind,
    arity: usize,
}

impl OutputShape {
    /// Descriptor for scalar releases.
    #[must_use]
    pub const fn scalar() -> Self {
        Self {
            kind: OutputKind::Scalar,
            arity: 1,
        }
    }

    /// Descriptor for tuple releases of the given length.
    #[must_use]
    pub const fn tuple(arity: usize) -> Self {
        Self {
            kind: OutputKind::Tuple,
            arity,
        }
    }

    /// Returns the release kind.
    #[must_use]
    pub const fn kind(&self) -> OutputKind {
        self.kind
    }

    /// Returns the number of components per release.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OutputKind::Scalar => write!(f, "a scalar"),
            OutputKind::Tuple => write!(f, "a tuple of {}", self.arity),
        }
    }
}

/// A dense R×N matrix of mechanism observations on one fixed dataset.
///
/// Row `r`, column `i` holds the `r`-th component of the mechanism's `i`-th
/// release; scalar mechanisms produce a single row.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputMatrix {
    shape: OutputShape,
    rows: Vec<Vec<f64>>,
}

impl OutputMatrix {
    pub(crate) fn with_capacity(shape: OutputShape, iterations: usize) -> Self {
        Self {
            shape,
            rows: (0..shape.arity())
                .map(|_| Vec::with_capacity(iterations))
                .collect(),
        }
    }

    /// Appends one observation. The caller is responsible for having checked
    /// that the observation matches this matrix's shape.
    pub(crate) fn push(&mut self, output: &Output) {
        match output {
            Output::Scalar(value) => self.rows[0].push(*value),
            Output::Tuple(components) => {
                for (row, &component) in self.rows.iter_mut().zip(components.iter()) {
                    row.push(component);
                }
            }
        }
    }

    /// Returns the schema descriptor shared by every column.
    #[must_use]
    pub const fn shape(&self) -> OutputShape {
        self.shape
    }

    /// Returns the number of output components per release.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of releases recorded per row.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Returns the samples of one output component.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        &self.rows[index]
    }
}
