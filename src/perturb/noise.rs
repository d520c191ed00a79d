//! perturb::noise — second-order noise-bias correction.
//!
//! Purpose
//! -------
//! Provide the noise covariance container [`CovarianceMatrix`] and the
//! wrapper [`NoiseBias`], which returns the second-order term of the Taylor
//! expansion of an observable under additive measurement noise:
//!
//! ```text
//! b(x) = ½ · tr(H(x) · C) = ½ Σ_ij H_ij(x) C_ji
//! ```
//!
//! Key behaviors
//! -------------
//! - [`CovarianceMatrix::new`] validates shape, finiteness, and symmetry
//!   eagerly; a matrix with clearly negative eigenvalues is accepted but
//!   logged with `tracing::warn!`.
//! - [`NoiseBias::new`] requires a Hessian-capable node and a covariance
//!   whose size equals the node's layout width.
//! - The contraction runs over the wrapped node's `modes()` only, in the
//!   same index order used to build the Hessian; zero covariance entries
//!   are skipped, so a zero matrix yields exactly zero.
//!
//! Invariants & assumptions
//! ------------------------
//! - The covariance is indexed by the same [`MomentLayout`] as the node.
//! - A [`NoiseBias`] is an [`Observable`] itself and keeps the wrapped
//!   node's derivative rule, so its shear response can be taken.
//!
//! Conventions
//! -----------
//! - The Hessian is computed by nesting two dual levels over the scalar
//!   type of the evaluation point; wrapping a shear response therefore
//!   differentiates the wrapped node three times.
use crate::{
    autodiff::{Differentiable, Real, hessian_at},
    perturb::{
        errors::{PerturbError, PerturbResult},
        layout::MomentLayout,
        observable::Observable,
        validation::{validate_covariance, validate_covariance_dim},
    },
};
use nalgebra::DMatrix;
use ndarray::Array2;
use std::sync::Arc;

/// Relative tolerance below which a negative eigenvalue is reported.
const EIGEN_RTOL: f64 = 1e-10;

/// Validated, immutable measurement-noise covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    data: Array2<f64>,
}

impl CovarianceMatrix {
    /// Wrap a square, finite, symmetric matrix.
    ///
    /// # Errors
    /// - [`PerturbError::CovarianceShape`] if the matrix is not square.
    /// - [`PerturbError::NonFiniteCovariance`] /
    ///   [`PerturbError::AsymmetricCovariance`] for malformed entries.
    pub fn new(data: Array2<f64>) -> PerturbResult<Self> {
        validate_covariance(&data)?;
        let cov = Self { data };
        let min_eig = cov.min_eigenvalue();
        let scale = cov.data.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if min_eig < -EIGEN_RTOL * scale {
            tracing::warn!(min_eig, "noise covariance is not positive semi-definite");
        }
        Ok(cov)
    }

    /// An all-zero covariance of size `dim × dim`.
    pub fn zeros(dim: usize) -> Self {
        Self { data: Array2::zeros((dim, dim)) }
    }

    pub fn dim(&self) -> usize {
        self.data.nrows()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[[row, col]]
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    /// Noise standard deviation of column `i`, `√C_ii`.
    pub fn std(&self, i: usize) -> f64 {
        self.data[[i, i]].sqrt()
    }

    /// Smallest eigenvalue, via nalgebra's symmetric eigendecomposition.
    pub fn min_eigenvalue(&self) -> f64 {
        let n = self.dim();
        if n == 0 {
            return 0.0;
        }
        let m = DMatrix::from_fn(n, n, |i, j| self.data[[i, j]]);
        m.symmetric_eigenvalues().iter().copied().fold(f64::INFINITY, f64::min)
    }
}

/// Noise bias `½ tr(H · C)` of a wrapped observable.
#[derive(Debug)]
pub struct NoiseBias<O> {
    node: Arc<O>,
    cov: Arc<CovarianceMatrix>,
    modes: Vec<usize>,
}

impl<O: Observable> NoiseBias<O> {
    /// Noise bias of `node` under covariance `cov`.
    ///
    /// # Errors
    /// - [`PerturbError::MissingHessian`] if `node` is not Hessian-capable.
    /// - [`PerturbError::CovarianceShape`] if `cov.dim() != node.dim()`.
    pub fn new(node: Arc<O>, cov: Arc<CovarianceMatrix>) -> PerturbResult<Self> {
        if !node.hessian_capable() {
            return Err(PerturbError::MissingHessian { node: node.name() });
        }
        validate_covariance_dim(node.dim(), cov.dim())?;
        let modes = node.modes();
        tracing::debug!(node = node.name(), modes = modes.len(), "noise bias");
        Ok(Self { node, cov, modes })
    }

    pub fn node(&self) -> &Arc<O> {
        &self.node
    }

    pub fn covariance(&self) -> &Arc<CovarianceMatrix> {
        &self.cov
    }
}

impl<O: Observable> Differentiable for NoiseBias<O> {
    fn eval<T: Real>(&self, x: &[T]) -> T {
        let hess = hessian_at(&*self.node, x, &self.modes);
        let mut acc = T::zero();
        for &i in &self.modes {
            for &j in &self.modes {
                let c = self.cov.get(j, i);
                if c != 0.0 {
                    acc = acc + hess[i][j].clone() * c;
                }
            }
        }
        acc * 0.5
    }
}

impl<O: Observable> Observable for NoiseBias<O> {
    type Rule = O::Rule;

    fn name(&self) -> &'static str {
        "BiasNoise"
    }

    fn layout(&self) -> &Arc<MomentLayout> {
        self.node.layout()
    }

    fn modes(&self) -> Vec<usize> {
        self.modes.clone()
    }

    fn derivative_rule(&self) -> Option<&Self::Rule> {
        self.node.derivative_rule()
    }

    fn hessian_capable(&self) -> bool {
        self.node.hessian_capable()
    }
}
