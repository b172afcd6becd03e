//! The black-box abstraction over mechanisms under test.

use rand::RngCore;

use crate::{arguments::Arguments, error::MechanismError, output::Output};

/// A randomized mechanism whose differential-privacy claim is under test.
///
/// The detector only ever observes the mechanism through [`invoke`]: given a
/// dataset, an argument bundle (carrying at least `epsilon`), and a source of
/// randomness, it must produce either a scalar or a fixed-length tuple of
/// numbers. The output distribution may depend on nothing but those three
/// inputs, and the shape of the output must stay stable for fixed arguments.
///
/// [`invoke`]: Mechanism::invoke
///
/// # Examples
/// ```
/// use dpcheck_core::{Arguments, Mechanism, MechanismError, Output};
/// use rand::RngCore;
///
/// /// Releases the first query with uniform dither in (-0.5, 0.5).
/// struct Dithered;
///
/// impl Mechanism for Dithered {
///     fn name(&self) -> &str {
///         "dithered"
///     }
///
///     fn invoke(
///         &self,
///         queries: &[f64],
///         args: &Arguments,
///         rng: &mut dyn RngCore,
///     ) -> Result<Output, MechanismError> {
///         args.require("epsilon")?;
///         let unit = f64::from(rng.next_u32()) / f64::from(u32::MAX);
///         Ok(Output::Scalar(queries.first().copied().unwrap_or(0.0) + unit - 0.5))
///     }
/// }
///
/// let mut rng = rand::thread_rng();
/// let args = Arguments::new().with_epsilon(1.0);
/// let out = Dithered.invoke(&[3.0], &args, &mut rng).expect("invocation succeeds");
/// assert!(matches!(out, Output::Scalar(v) if (v - 3.0).abs() < 0.5));
/// ```
pub trait Mechanism {
    /// Returns a short human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Runs the mechanism once.
    ///
    /// # Errors
    /// Returns a [`MechanismError`] when the argument bundle is unusable;
    /// any such failure aborts the detection pipeline.
    fn invoke(
        &self,
        queries: &[f64],
        args: &Arguments,
        rng: &mut dyn RngCore,
    ) -> Result<Output, MechanismError>;
}
