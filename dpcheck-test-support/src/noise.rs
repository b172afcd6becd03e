//! Noise primitives shared by the reference mechanisms.

use rand::RngCore;
use rand::distributions::Distribution;
use rand_distr::Exp;
use statrs::distribution::Laplace;

/// Draws centred Laplace noise; a zero scale (infinite budget) is noiseless.
pub(crate) fn laplace(scale: f64, rng: &mut dyn RngCore) -> f64 {
    if scale == 0.0 {
        return 0.0;
    }
    Laplace::new(0.0, scale)
        .expect("noise scale is positive")
        .sample(rng)
}

/// Draws exponential noise with the given mean; a zero scale is noiseless.
pub(crate) fn exponential(scale: f64, rng: &mut dyn RngCore) -> f64 {
    if scale == 0.0 {
        return 0.0;
    }
    Exp::new(1.0 / scale)
        .expect("noise rate is positive")
        .sample(rng)
}
