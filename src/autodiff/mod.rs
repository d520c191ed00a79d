//! autodiff — forward-mode automatic differentiation for moment-vector functions.
//!
//! Purpose
//! -------
//! Supply the differentiation capability the perturbation calculus treats as
//! a first-class interface: `grad(f, x)` and `hessian(f, x)` over pure
//! scalar functions of a real vector, nestable to any order.
//!
//! Key behaviors
//! -------------
//! - [`Real`] is the scalar trait observables are written against, a thin
//!   extension of `num_dual::DualNum<f64>`.
//! - The dense vector duals of `num_dual` are the derivative carriers; they
//!   are generic over their inner scalar, so a first-order dual over a
//!   second-order dual differentiates a Hessian.
//! - [`gradient_at`] / [`hessian_at`] seed only a declared set of active
//!   coordinates and return full-width results.
//!
//! Invariants & assumptions
//! ------------------------
//! - Functions passed to the primitives are pure and use only the
//!   operations exposed by [`Real`]; there is no value-dependent branching
//!   that would cut a derivative path.
//!
//! Downstream usage
//! ----------------
//! - `perturb::observable` builds `value`, `gradient`, and `hessian` on top
//!   of these primitives; `perturb::response` and `perturb::noise` call them
//!   generically from inside their own `eval`.
//!
//! Testing notes
//! -------------
//! - Unit tests in each submodule compare against closed-form derivatives,
//!   including nested (derivative-of-derivative) evaluation.

pub mod derivatives;
pub mod dual;
pub mod real;

pub use self::derivatives::{
    Differentiable, gradient_at, hessian_at, symmetrize_hess, to_symmetric_array,
};
pub use self::real::Real;
