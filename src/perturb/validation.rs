//! Validation helpers for the perturbation layer.
//!
//! This module centralizes the shape and value checks shared by nodes and
//! wrappers:
//!
//! - **Row checks**: [`validate_row_len`] guards every evaluation entry point.
//! - **Covariance checks**: [`validate_covariance`] enforces a square,
//!   finite, symmetric matrix; [`validate_covariance_dim`] matches it to a
//!   moment layout.
//! - **Parameter checks**: [`validate_finite`] and [`validate_positive`]
//!   back the parameter constructors.
//!
//! All helpers return the first violation found as a [`PerturbError`].
use crate::perturb::errors::{PerturbError, PerturbResult};
use ndarray::Array2;

/// Relative tolerance for covariance symmetry, scaled by the largest entry.
pub const SYMMETRY_RTOL: f64 = 1e-10;

/// Validate that a moment vector has the layout width.
///
/// # Errors
/// [`PerturbError::VectorLengthMismatch`] if `found != expected`.
pub fn validate_row_len(expected: usize, found: usize) -> PerturbResult<()> {
    if expected != found {
        return Err(PerturbError::VectorLengthMismatch { expected, found });
    }
    Ok(())
}

/// Validate the shape and entries of a noise covariance matrix.
///
/// # Checks
/// 1. The matrix is square.
/// 2. All entries are finite.
/// 3. `|c_ij − c_ji| ≤ SYMMETRY_RTOL · max|c|` for every pair.
///
/// # Errors
/// - [`PerturbError::CovarianceShape`] if the matrix is not square.
/// - [`PerturbError::NonFiniteCovariance`] with the first offending entry.
/// - [`PerturbError::AsymmetricCovariance`] with the first offending pair.
pub fn validate_covariance(cov: &Array2<f64>) -> PerturbResult<()> {
    let (rows, cols) = cov.dim();
    if rows != cols {
        return Err(PerturbError::CovarianceShape { expected: (rows, rows), found: (rows, cols) });
    }
    for ((row, col), &value) in cov.indexed_iter() {
        if !value.is_finite() {
            return Err(PerturbError::NonFiniteCovariance { row, col, value });
        }
    }
    let scale = cov.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let tol = SYMMETRY_RTOL * scale;
    for i in 0..rows {
        for j in 0..i {
            let diff = (cov[[i, j]] - cov[[j, i]]).abs();
            if diff > tol {
                return Err(PerturbError::AsymmetricCovariance { row: i, col: j, diff });
            }
        }
    }
    Ok(())
}

/// Validate that a square covariance of size `found` matches a layout of width `expected`.
pub fn validate_covariance_dim(expected: usize, found: usize) -> PerturbResult<()> {
    if expected != found {
        return Err(PerturbError::CovarianceShape {
            expected: (expected, expected),
            found: (found, found),
        });
    }
    Ok(())
}

/// Validate that a parameter value is finite.
pub fn validate_finite(field: &'static str, value: f64) -> PerturbResult<()> {
    if !value.is_finite() {
        return Err(PerturbError::InvalidParameter { field, value, reason: "must be finite" });
    }
    Ok(())
}

/// Validate that a parameter value is finite and strictly positive.
pub fn validate_positive(field: &'static str, value: f64) -> PerturbResult<()> {
    validate_finite(field, value)?;
    if value <= 0.0 {
        return Err(PerturbError::InvalidParameter { field, value, reason: "must be positive" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover the success and failure paths of each validator.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Accept a symmetric finite matrix and reject the three failure shapes.
    //
    // Given
    // -----
    // - A symmetric 2×2, a 2×3, a matrix with NaN, and an asymmetric 2×2.
    //
    // Expect
    // ------
    // - `Ok` for the first; `CovarianceShape`, `NonFiniteCovariance`, and
    //   `AsymmetricCovariance` respectively for the others.
    fn covariance_validation_paths() {
        assert!(validate_covariance(&array![[2.0, 0.5], [0.5, 1.0]]).is_ok());

        let err = validate_covariance(&Array2::zeros((2, 3))).unwrap_err();
        assert_eq!(err, PerturbError::CovarianceShape { expected: (2, 2), found: (2, 3) });

        let err = validate_covariance(&array![[1.0, f64::NAN], [0.0, 1.0]]).unwrap_err();
        assert!(matches!(err, PerturbError::NonFiniteCovariance { row: 0, col: 1, .. }));

        let err = validate_covariance(&array![[1.0, 0.2], [0.3, 1.0]]).unwrap_err();
        assert!(matches!(err, PerturbError::AsymmetricCovariance { row: 1, col: 0, .. }));
    }

    #[test]
    // Purpose
    // -------
    // Row-length and parameter validators report the offending value.
    fn row_and_parameter_validators() {
        assert!(validate_row_len(3, 3).is_ok());
        assert_eq!(
            validate_row_len(3, 2),
            Err(PerturbError::VectorLengthMismatch { expected: 3, found: 2 })
        );
        assert!(validate_positive("sigma", 0.1).is_ok());
        assert!(matches!(
            validate_positive("sigma", 0.0),
            Err(PerturbError::InvalidParameter { field: "sigma", .. })
        ));
        assert!(matches!(
            validate_finite("c0", f64::INFINITY),
            Err(PerturbError::InvalidParameter { field: "c0", .. })
        ));
    }
}
