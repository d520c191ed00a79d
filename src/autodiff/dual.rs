//! autodiff::dual — [`Real`] for the `num_dual` vector duals.
//!
//! Purpose
//! -------
//! Make the dynamically sized dual numbers of `num_dual` usable as
//! observable scalars. [`DualVec`] carries first-order partials and
//! [`Dual2Vec`] first- and second-order partials; both are generic over an
//! inner `T: Real`, so they nest (`DualVec<Dual2Vec<f64>>` is the third-order
//! scalar the noise bias of a shear response runs on).
//!
//! Key behaviors
//! -------------
//! - Arithmetic and the elementary functions come from `num_dual`;
//!   constants built with `from_re` carry no partials and are promoted on
//!   first use.
//! - `erf` has no `num_dual` counterpart. It is lifted from the inner
//!   scalar by a Taylor expansion around the primal part, truncated at the
//!   order the dual carries, which is exact for that order.
//!
//! Invariants & assumptions
//! ------------------------
//! - Only the `Dyn` dimension is implemented; seeds are produced by
//!   [`derivatives`](crate::autodiff::derivatives) so callers never build
//!   them by hand.
use crate::autodiff::real::Real;
use nalgebra::Dyn;
use num_dual::{Dual2Vec, DualNum, DualVec};
use std::f64::consts::FRAC_2_SQRT_PI;

/// `erf(x)` for a dual `x` with primal part `re`, via
/// `erf(re) + erf'(re)·δ + ½·erf''(re)·δ²` with `δ = x − re`.
///
/// `δ²` vanishes identically for first-order duals, so one expansion serves
/// both orders.
fn erf_lift<D, T>(x: &D, re: &T, lift: fn(T) -> D) -> D
where
    D: DualNum<f64>,
    T: Real,
{
    let f0 = re.erf();
    let f1 = (-(re.clone() * re.clone())).exp() * FRAC_2_SQRT_PI;
    let f2 = f1.clone() * re.clone() * -1.0;
    let delta = x.clone() - lift(re.clone());
    let quad = delta.clone() * delta.clone() * lift(f2);
    lift(f0) + delta * lift(f1) + quad
}

impl<T: Real> Real for DualVec<T, f64, Dyn> {
    fn value(&self) -> f64 {
        self.re.value()
    }

    fn erf(&self) -> Self {
        erf_lift(self, &self.re, DualVec::from_re)
    }
}

impl<T: Real> Real for Dual2Vec<T, f64, Dyn> {
    fn value(&self) -> f64 {
        self.re.value()
    }

    fn erf(&self) -> Self {
        erf_lift(self, &self.re, Dual2Vec::from_re)
    }
}
