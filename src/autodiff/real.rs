//! autodiff::real — the scalar interface every observable is written against.
//!
//! Purpose
//! -------
//! Define [`Real`], the scalar bound observables are generic over. It is
//! `num_dual::DualNum<f64>` (arithmetic, mixed `f64` arithmetic, and the
//! elementary functions, all on top of the `num_traits` numeric traits)
//! plus the two operations the dual-number crate does not carry: the primal
//! value and the error function.
//!
//! Key behaviors
//! -------------
//! - `f64` implements [`Real`] with `erf` taken from `statrs`.
//! - The `num_dual` vector duals implement [`Real`] in
//!   [`dual`](crate::autodiff::dual), so node code runs unchanged on plain
//!   floats and on duals of any nesting depth.
//!
//! Invariants & assumptions
//! ------------------------
//! - Implementations are pure: no hidden state, no branching on values that
//!   changes which partials are propagated.
//! - [`Real::value`] returns the primal (outermost, lowest-order) value.
use num_dual::DualNum;

/// Scalar type usable inside a differentiable observable.
pub trait Real: DualNum<f64> {
    /// Primal value with all derivative information dropped.
    fn value(&self) -> f64;

    /// Gauss error function.
    fn erf(&self) -> Self;

    /// `self^e` where the exponent is itself differentiable.
    ///
    /// Evaluated as `exp(e · ln self)`, so the base must be positive.
    fn powr(&self, e: Self) -> Self {
        (self.ln() * e).exp()
    }
}

impl Real for f64 {
    fn value(&self) -> f64 {
        *self
    }

    fn erf(&self) -> Self {
        statrs::function::erf::erf(*self)
    }

    fn powr(&self, e: Self) -> Self {
        f64::powf(*self, e)
    }
}
