//! Hypergeometric cumulative-distribution backends.
//!
//! The test statistic needs `Pr[X <= k]` for populations in the hundreds of
//! thousands, so the computation must stay stable far into the tails. Two
//! interchangeable backends are provided: the scientific-library
//! implementation from `statrs`, and a portable log-space summation that
//! exists both as an always-available fallback and as a cross-check for the
//! native path. The backend is picked at detector construction, with an
//! environment override.

use statrs::distribution::{DiscreteCDF, Hypergeometric};
use statrs::function::gamma::ln_gamma;
use tracing::warn;

/// Environment variable selecting the CDF backend (`native` or `log-sum`).
pub const BACKEND_ENV: &str = "DPCHECK_HYPERGEOM";

/// Cumulative distribution of the hypergeometric law.
///
/// Implementations return `Pr[X <= k]` for
/// `X ~ Hypergeometric(population, successes, draws)`. Parameter
/// combinations outside the law's domain yield NaN, which the test statistic
/// degrades to an inconclusive p-value.
pub trait HypergeometricCdf: Send + Sync {
    /// Returns `Pr[X <= k]`.
    fn cdf(&self, k: u64, population: u64, successes: u64, draws: u64) -> f64;
}

/// CDF backend delegating to `statrs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeCdf;

impl HypergeometricCdf for NativeCdf {
    fn cdf(&self, k: u64, population: u64, successes: u64, draws: u64) -> f64 {
        Hypergeometric::new(population, successes, draws)
            .map_or(f64::NAN, |distribution| distribution.cdf(k))
    }
}

/// Portable CDF backend summing probability masses in log space.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSumCdf;

impl HypergeometricCdf for LogSumCdf {
    fn cdf(&self, k: u64, population: u64, successes: u64, draws: u64) -> f64 {
        if successes > population || draws > population {
            return f64::NAN;
        }
        let lower = draws.saturating_sub(population - successes);
        let upper = draws.min(successes);
        if k < lower {
            return 0.0;
        }
        if k >= upper {
            return 1.0;
        }

        // Start from the mass at the lower support bound and walk the pmf
        // recurrence upwards, accumulating a running log-sum-exp. The
        // failure-count denominator is grouped so it never dips below zero:
        // for in-support values, `population - successes + value + 1` is
        // always at least `draws + 1`.
        let mut ln_mass = ln_choose(successes, lower)
            + ln_choose(population - successes, draws - lower)
            - ln_choose(population, draws);
        let mut ln_sum = ln_mass;
        for value in lower..k {
            ln_mass += ((successes - value) as f64).ln() + ((draws - value) as f64).ln()
                - ((value + 1) as f64).ln()
                - ((population - successes + value + 1 - draws) as f64).ln();
            ln_sum = ln_add_exp(ln_sum, ln_mass);
        }
        ln_sum.exp().min(1.0)
    }
}

fn ln_choose(n: u64, r: u64) -> f64 {
    ln_gamma(n as f64 + 1.0) - ln_gamma(r as f64 + 1.0) - ln_gamma((n - r) as f64 + 1.0)
}

fn ln_add_exp(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Which hypergeometric CDF implementation the detector should use.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CdfBackend {
    /// The `statrs` implementation.
    #[default]
    Native,
    /// The portable log-space summation.
    LogSum,
}

impl CdfBackend {
    /// Reads the backend choice from [`BACKEND_ENV`], defaulting to
    /// [`CdfBackend::Native`]. Unknown values are reported and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(BACKEND_ENV) {
            Ok(raw) => Self::parse(&raw).unwrap_or_else(|| {
                warn!(
                    value = raw.as_str(),
                    "unsupported {BACKEND_ENV} value, using the native backend"
                );
                Self::Native
            }),
            Err(_) => Self::Native,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "native" => Some(Self::Native),
            "log-sum" | "pure" => Some(Self::LogSum),
            _ => None,
        }
    }

    pub(crate) fn instantiate(self) -> Box<dyn HypergeometricCdf> {
        match self {
            Self::Native => Box::new(NativeCdf),
            Self::LogSum => Box::new(LogSumCdf),
        }
    }
}
