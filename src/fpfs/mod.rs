//! fpfs — the FPFS shear-estimation system built on the perturbation layer.
//!
//! Purpose
//! -------
//! Supply everything specific to Fourier Power Function Shapelets (FPFS)
//! catalogs: the moment columns, the analytic shear response of each
//! moment, the smooth selection weight, the weighted ellipticity
//! estimators, and the factory that calibrates them against a noise
//! covariance.
//!
//! Key behaviors
//! -------------
//! - [`fpfs_layout`] fixes the column order: eight shapelet moments, then
//!   `NPEAK` peak modes, then their `g1` and `g2` responses.
//! - [`FpfsLinResponse`] is the [`DerivativeRule`](crate::perturb::DerivativeRule)
//!   of every FPFS node.
//! - [`SelectionWeight`] and [`WeightedEllipticity`] are ordinary
//!   observables; [`prepare_func`] wraps them in shear responses and
//!   noise-bias corrections.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every FPFS node is built on a layout containing all FPFS columns;
//!   construction fails with an unknown-mode error otherwise.
//! - Some shear-response terms are deliberately zero (spin-4, `M40`,
//!   `M60`); see [`linresp`].
//! - The upper size cut is not applied; its parameter is carried in the
//!   configuration only.
//!
//! Downstream usage
//! ----------------
//! - Typical flow:
//!   1. Read catalog columns and reorder them with
//!      [`MomentLayout::select_columns`](crate::perturb::MomentLayout::select_columns).
//!   2. Build a [`CovarianceMatrix`](crate::perturb::CovarianceMatrix) of the
//!      measurement noise.
//!   3. Call [`prepare_func_e1`] / [`prepare_func_e2`] and evaluate the
//!      returned [`PreparedEstimator`] on the rows.
//!
//! Testing notes
//! -------------
//! - Unit tests sit in each submodule. The finite-difference check of the
//!   shear response through the full estimator lives in the crate's
//!   integration tests.

pub mod layout;
pub mod linresp;
pub mod observables;
pub mod params;
pub mod prepare;
pub mod smooth;

pub use self::layout::{FpfsIndex, NPEAK, fpfs_col_names, fpfs_layout};
pub use self::linresp::FpfsLinResponse;
pub use self::observables::{Ellipticity, SelectionWeight, WeightedEllipticity};
pub use self::params::{EllipticityParams, FpfsParams, PrepareOptions, SelectionParams};
pub use self::prepare::{
    EstimatorColumns, PreparedEstimator, derive_params, prepare_from_array, prepare_func,
    prepare_func_e1, prepare_func_e2,
};
pub use self::smooth::SmoothStep;
