//! Keyword-argument bundles consumed by mechanisms under test.
//!
//! Arguments are passed through the pipeline unchanged apart from the
//! well-known `epsilon` key, which callers set once up front. Bundles are
//! cloned, never mutated in place, so concurrent workers can share them
//! freely.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::error::MechanismError;

/// Well-known key carrying the mechanism's privacy budget.
pub const EPSILON_KEY: &str = "epsilon";

/// A mapping from option name to numeric value, handed verbatim to every
/// mechanism invocation.
///
/// # Examples
/// ```
/// use dpcheck_core::Arguments;
///
/// let args = Arguments::new().with_epsilon(0.7).with("N", 1.0).with("T", 0.5);
/// assert_eq!(args.epsilon(), Some(0.7));
/// assert_eq!(args.get("T"), Some(0.5));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    values: BTreeMap<String, f64>,
}

impl Arguments {
    /// Creates an empty bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the bundle with `name` set to `value`.
    #[must_use]
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_owned(), value);
        self
    }

    /// Returns a copy of the bundle with the `epsilon` key set.
    #[must_use]
    pub fn with_epsilon(self, epsilon: f64) -> Self {
        self.with(EPSILON_KEY, epsilon)
    }

    /// Looks up an option by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Looks up an option by name, failing when it is absent.
    ///
    /// # Errors
    /// Returns [`MechanismError::MissingArgument`] when the bundle does not
    /// contain `name`.
    pub fn require(&self, name: &str) -> Result<f64, MechanismError> {
        self.get(name).ok_or_else(|| MechanismError::MissingArgument {
            name: Arc::from(name),
        })
    }

    /// Returns the privacy budget, if present.
    #[must_use]
    pub fn epsilon(&self) -> Option<f64> {
        self.get(EPSILON_KEY)
    }

    /// Returns whether the bundle carries the `epsilon` key.
    #[must_use]
    pub fn has_epsilon(&self) -> bool {
        self.values.contains_key(EPSILON_KEY)
    }

    /// Iterates over the options in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, &value)| (name.as_str(), value))
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, (name, value)) in self.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_epsilon_sets_the_well_known_key() {
        let args = Arguments::new().with_epsilon(0.5);
        assert!(args.has_epsilon());
        assert_eq!(args.get(EPSILON_KEY), Some(0.5));
    }

    #[test]
    fn require_reports_missing_options() {
        let args = Arguments::new().with_epsilon(0.5);
        assert_eq!(args.require(EPSILON_KEY), Ok(0.5));
        let err = args.require("T").expect_err("T was never set");
        assert!(matches!(err, MechanismError::MissingArgument { name } if &*name == "T"));
    }

    #[test]
    fn display_is_sorted_by_name() {
        let args = Arguments::new().with("T", 0.5).with_epsilon(0.7).with("N", 1.0);
        assert_eq!(args.to_string(), "{N: 1, T: 0.5, epsilon: 0.7}");
    }
}
