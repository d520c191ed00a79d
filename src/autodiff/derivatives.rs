//! autodiff::derivatives — gradient and Hessian primitives over [`Real`] functions.
//!
//! Purpose
//! -------
//! Provide the two differentiation primitives the perturbation layer is
//! built on: [`gradient_at`] and [`hessian_at`]. Both are generic in the
//! scalar type of the evaluation point, so a wrapper whose own value is a
//! gradient can itself be differentiated (the response of a response, the
//! Hessian of a response, ...).
//!
//! Key behaviors
//! -------------
//! - Only the `active` coordinates are seeded. Partials along every other
//!   coordinate are exactly zero and are written as such, which keeps the
//!   dual vectors as short as the node's declared modes.
//! - [`gradient_at`] runs `f` once on `num_dual` first-order vector duals;
//!   [`hessian_at`] runs it once on second-order vector duals, so entry
//!   `(a, b)` is `∂²f/∂x_a∂x_b` directly.
//! - [`symmetrize_hess`] averages mirrored off-diagonal entries of a
//!   concrete `f64` Hessian before it is handed to callers.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every index in `active` is `< x.len()` and appears once.
//! - `f` reads its argument only as a slice of the layout width; it never
//!   inspects partials.
//!
//! Conventions
//! -----------
//! - Returned vectors/matrices are full layout width (`x.len()`), with
//!   inactive rows and columns zero.
use crate::autodiff::real::Real;
use nalgebra::{DVector, Dyn};
use ndarray::Array2;
use num_dual::{Dual2Vec, DualVec};

/// A scalar function of a moment vector that can be evaluated on any [`Real`].
///
/// Implemented by every observable; it exists separately so the
/// differentiation primitives do not depend on the perturbation layer.
pub trait Differentiable {
    fn eval<T: Real>(&self, x: &[T]) -> T;
}

/// gradient_at — full-width gradient of `f` at `x`, seeding only `active`.
///
/// Parameters
/// ----------
/// - `f`: function to differentiate.
/// - `x`: evaluation point, on any scalar type `T`.
/// - `active`: coordinates `f` depends on.
///
/// Returns
/// -------
/// `Vec<T>` of length `x.len()`; entry `i` is `∂f/∂x_i` (zero for inactive `i`).
///
/// Examples
/// --------
/// ```rust
/// # use impt::autodiff::{Differentiable, Real, gradient_at};
/// struct Quad;
/// impl Differentiable for Quad {
///     fn eval<T: Real>(&self, x: &[T]) -> T {
///         x[0].clone() * x[0].clone() + x[1].clone() * 3.0
///     }
/// }
/// let g = gradient_at(&Quad, &[2.0_f64, 5.0, 7.0], &[0, 1]);
/// assert_eq!(g, vec![4.0, 3.0, 0.0]);
/// ```
pub fn gradient_at<F, T>(f: &F, x: &[T], active: &[usize]) -> Vec<T>
where
    F: Differentiable + ?Sized,
    T: Real,
{
    let mut grad = vec![T::zero(); x.len()];
    if active.is_empty() {
        return grad;
    }
    let seeds = DVector::from_iterator(active.len(), active.iter().map(|&i| x[i].clone()));
    let (_, partials) = num_dual::gradient(
        |v| {
            let mut lifted: Vec<DualVec<T, f64, Dyn>> =
                x.iter().cloned().map(DualVec::from_re).collect();
            for (k, &i) in active.iter().enumerate() {
                lifted[i] = v[k].clone();
            }
            f.eval(&lifted)
        },
        seeds,
    );
    for (k, &i) in active.iter().enumerate() {
        grad[i] = partials[k].clone();
    }
    grad
}

/// hessian_at — full-width Hessian of `f` at `x`, seeding only `active`.
///
/// Returns
/// -------
/// Row-major `Vec<Vec<T>>` of shape `x.len() × x.len()`; entry `(i, j)` is
/// `∂²f/∂x_i∂x_j`, zero whenever `i` or `j` is inactive.
///
/// Notes
/// -----
/// - The matrix is not symmetrised here because `T` may carry partials; the
///   concrete `f64` entry points call [`symmetrize_hess`].
pub fn hessian_at<F, T>(f: &F, x: &[T], active: &[usize]) -> Vec<Vec<T>>
where
    F: Differentiable + ?Sized,
    T: Real,
{
    let dim = x.len();
    let mut hess = vec![vec![T::zero(); dim]; dim];
    if active.is_empty() {
        return hess;
    }
    let seeds = DVector::from_iterator(active.len(), active.iter().map(|&i| x[i].clone()));
    let (_, _, second) = num_dual::hessian(
        |v| {
            let mut lifted: Vec<Dual2Vec<T, f64, Dyn>> =
                x.iter().cloned().map(Dual2Vec::from_re).collect();
            for (k, &i) in active.iter().enumerate() {
                lifted[i] = v[k].clone();
            }
            f.eval(&lifted)
        },
        seeds,
    );
    for (a, &i) in active.iter().enumerate() {
        for (b, &j) in active.iter().enumerate() {
            hess[i][j] = second[(a, b)].clone();
        }
    }
    hess
}

/// Copy a row-major `f64` Hessian into an `ndarray` matrix and enforce symmetry.
pub fn to_symmetric_array(hess: Vec<Vec<f64>>) -> Array2<f64> {
    let dim = hess.len();
    let mut out = Array2::<f64>::zeros((dim, dim));
    for (i, row) in hess.into_iter().enumerate() {
        for (j, v) in row.into_iter().enumerate() {
            out[[i, j]] = v;
        }
    }
    symmetrize_hess(&mut out);
    out
}

/// symmetrize_hess — enforce symmetry of a Hessian matrix in-place.
///
/// Replaces each off-diagonal pair `(i, j)` / `(j, i)` with their average,
/// leaving the diagonal untouched. Assumes a square matrix.
pub fn symmetrize_hess(hess: &mut Array2<f64>) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
}
