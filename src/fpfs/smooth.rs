//! fpfs::smooth — differentiable step functions for soft selection cuts.
//!
//! Purpose
//! -------
//! Replace a hard threshold `x > center` by a smooth, monotone step of
//! width `sigma`, so that selection effects carry a shear response. The
//! strategies differ only in their tails.
//!
//! Key behaviors
//! -------------
//! - [`SmoothStep`] is a closed set of named strategies, parsed from the
//!   names `"sm"`, `"ts2"`, `"ss2"`, `"ss3"` (case-insensitive). Unknown
//!   names are rejected with
//!   [`PerturbError::UnsupportedSmoothing`](crate::perturb::errors::PerturbError::UnsupportedSmoothing).
//! - [`SmoothStep::apply`] is generic over [`Real`]; every form is an
//!   algebraic or hyperbolic expression with no branch on the input, so
//!   every derivative order propagates.
//! - [`SmoothStep::window`] and [`SmoothStep::abs_window`] build two-sided
//!   windows from a rising and a falling step of the same strategy.
//!
//! Conventions
//! -----------
//! With `t = (x − center) / sigma`:
//! - `Sm`:  `½ (1 + t / √(1 + t²))`
//! - `Ts2`: `½ (1 + tanh t)`
//! - `Ss2`: `½ (1 + erf t)`
//! - `Ss3`: `½ (1 + tanh(t + t³/3))`
//!
//! All map ℝ onto `(0, 1)`, equal `½` at `x = center`, and approach the
//! hard step as `sigma → 0`. `sigma` must be strictly positive.
use crate::{
    autodiff::Real,
    perturb::errors::{PerturbError, PerturbResult},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Named smooth-step strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothStep {
    /// Algebraic sigmoid; polynomial tails.
    Sm,
    /// Hyperbolic tangent; exponential tails.
    Ts2,
    /// Error function; Gaussian tails.
    #[default]
    Ss2,
    /// Hyperbolic tangent of a cubic; steeper exponential tails.
    Ss3,
}

impl SmoothStep {
    pub fn name(self) -> &'static str {
        match self {
            SmoothStep::Sm => "sm",
            SmoothStep::Ts2 => "ts2",
            SmoothStep::Ss2 => "ss2",
            SmoothStep::Ss3 => "ss3",
        }
    }

    /// Smooth step of `x` around `center` with width `sigma`.
    pub fn apply<T: Real>(self, x: T, center: f64, sigma: f64) -> T {
        let t = (x - center) / sigma;
        let core = match self {
            SmoothStep::Sm => {
                let denom = (t.clone() * t.clone() + 1.0).sqrt();
                t / denom
            }
            SmoothStep::Ts2 => t.tanh(),
            SmoothStep::Ss2 => t.erf(),
            SmoothStep::Ss3 => {
                let cube = t.clone() * t.clone() * t.clone();
                (t + cube / 3.0).tanh()
            }
        };
        (core + 1.0) * 0.5
    }

    /// Smooth window on `[lower, upper]`: a rising step at `lower` times a
    /// falling step at `upper`, both of width `sigma`.
    pub fn window<T: Real>(self, x: T, lower: f64, upper: f64, sigma: f64) -> T {
        let rise = self.apply(x.clone(), lower, sigma);
        let fall = -self.apply(x, upper, sigma) + 1.0;
        rise * fall
    }

    /// Smoothed indicator of `|x − center| < half_width`.
    pub fn abs_window<T: Real>(self, x: T, center: f64, half_width: f64, sigma: f64) -> T {
        self.window(x, center - half_width, center + half_width, sigma)
    }
}

impl fmt::Display for SmoothStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SmoothStep {
    type Err = PerturbError;

    fn from_str(s: &str) -> PerturbResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sm" => Ok(SmoothStep::Sm),
            "ts2" => Ok(SmoothStep::Ts2),
            "ss2" => Ok(SmoothStep::Ss2),
            "ss3" => Ok(SmoothStep::Ss3),
            _ => Err(PerturbError::UnsupportedSmoothing { name: s.to_string() }),
        }
    }
}
