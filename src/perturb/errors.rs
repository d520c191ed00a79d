//! Errors for the perturbation calculus (construction, schema, shapes, and
//! capability checks).
//!
//! Every variant is raised synchronously by the call that violates a
//! precondition; nothing is retried or recovered internally.
//!
//! ## Classes
//! - **Parameter values**: [`PerturbError::InvalidParameter`]. Wrong
//!   parameter *types* cannot reach a node constructor; the trait bounds
//!   reject them at compile time.
//! - **Values**: unsupported smoothing names or shear components, vector
//!   and matrix shape mismatches, malformed covariances, layout mismatches.
//! - **Capabilities**: a node wrapped by a noise-bias or shear-response
//!   wrapper lacks the Hessian or derivative rule the wrapper needs.
//! - **Schema**: a declared moment name is absent from the moment layout.

#[cfg(feature = "python-bindings")]
use pyo3::{PyErr, exceptions::PyValueError};

/// Crate-wide result alias for perturbation operations.
pub type PerturbResult<T> = Result<T, PerturbError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PerturbError {
    // ---- Parameters ----
    /// Parameter field is non-finite or outside its admissible range.
    #[error("Invalid parameter '{field}' = {value}: {reason}")]
    InvalidParameter { field: &'static str, value: f64, reason: &'static str },

    // ---- Values ----
    /// Smoothing strategy name is not one of the supported tags.
    #[error("Smoothing function '{name}' is not supported; expected one of sm, ts2, ss2, ss3")]
    UnsupportedSmoothing { name: String },

    /// Shear component outside {1, 2}.
    #[error("Unsupported g_component {component}; shear component can only be 1 or 2")]
    UnsupportedComponent { component: i64 },

    /// A moment vector does not have the layout width.
    #[error("Moment vector length mismatch: expected {expected}, found {found}")]
    VectorLengthMismatch { expected: usize, found: usize },

    /// Covariance matrix shape does not match the moment layout.
    #[error("Covariance shape mismatch: expected {expected:?}, found {found:?}")]
    CovarianceShape { expected: (usize, usize), found: (usize, usize) },

    /// Covariance entry is NaN or infinite.
    #[error("Invalid covariance at ({row}, {col}): {value}, must be finite")]
    NonFiniteCovariance { row: usize, col: usize, value: f64 },

    /// Covariance matrix is not symmetric within tolerance.
    #[error("Covariance is not symmetric at ({row}, {col}): |c_ij - c_ji| = {diff}")]
    AsymmetricCovariance { row: usize, col: usize, diff: f64 },

    /// Two composed nodes index moment vectors differently.
    #[error("Composed nodes disagree on the moment layout ({left} vs {right} columns)")]
    LayoutMismatch { left: usize, right: usize },

    /// Catalog table width disagrees with its header.
    #[error("Column mismatch: header has {header} names, table has {columns} columns")]
    ColumnMismatch { header: usize, columns: usize },

    // ---- Capabilities ----
    /// Node cannot provide a Hessian.
    #[error("Observable '{node}' does not provide a Hessian")]
    MissingHessian { node: &'static str },

    /// Node has no analytic shear-derivative rule.
    #[error("Observable '{node}' has no derivative rule for shear response")]
    MissingDerivativeRule { node: &'static str },

    // ---- Schema ----
    /// Declared moment name is absent from the moment-index table.
    #[error("Moment '{name}' is not in the moment layout")]
    UnknownMode { name: String },

    /// Moment layout lists a name twice.
    #[error("Moment '{name}' appears more than once in the layout")]
    DuplicateMode { name: String },
}

#[cfg(feature = "python-bindings")]
impl From<PerturbError> for PyErr {
    fn from(err: PerturbError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}
