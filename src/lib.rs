//! impt — automatic-differentiation estimator of lensing perturbations.
//!
//! Purpose
//! -------
//! Serve as the crate root for Rust callers and as the PyO3 bridge that
//! exposes the FPFS shear estimator to Python via the `_impt` extension
//! module. The crate computes, per catalog row of shapelet moments, an
//! ellipticity estimate, its shear response, and the second-order
//! noise-bias corrections of both, by differentiating the estimator
//! automatically.
//!
//! Key behaviors
//! -------------
//! - [`autodiff`] provides the forward-mode dual numbers and the nested
//!   gradient / Hessian primitives everything else is built on.
//! - [`perturb`] defines the observable contract, composition, and the
//!   shear-response and noise-bias wrappers, independently of any
//!   measurement system.
//! - [`fpfs`] implements the FPFS system: column layout, analytic moment
//!   responses, selection weights, ellipticity estimators, and the
//!   `prepare_func` factory.
//! - With `python-bindings`, defines the `FpfsShearEstimator` class and the
//!   `_impt` module initializer.
//!
//! Invariants & assumptions
//! ------------------------
//! - All numerical work lives in the inner modules; this file performs only
//!   FFI glue, input conversion, and error mapping.
//! - Observables are immutable after construction and evaluation is pure,
//!   so one estimator may be shared across threads.
//!
//! Conventions
//! -----------
//! - Moment vectors follow the column order of a
//!   [`MomentLayout`](perturb::MomentLayout); batches are `rows × columns`.
//! - Errors are [`PerturbError`](perturb::PerturbError) values internally and
//!   become Python `ValueError`s at the PyO3 boundary.
//! - The library emits `tracing` events and never installs a subscriber.
//!
//! Downstream usage
//! ----------------
//! - Rust callers use [`fpfs::prepare_func_e1`] / [`fpfs::prepare_func_e2`]
//!   and evaluate the returned bundle, or compose their own observables on
//!   top of [`perturb`].
//! - The Python package imports `_impt.fpfs.FpfsShearEstimator`.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module; `tests/` holds end-to-end checks
//!   of the FPFS pipeline against finite differences.

pub mod autodiff;
pub mod fpfs;
pub mod perturb;
pub mod utils;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray1};

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    fpfs::prepare::{PreparedEstimator, prepare_func},
    perturb::{noise::CovarianceMatrix, observable::ShearComponent},
    utils::{extract_f64_matrix, extract_prepare_options},
};

/// FpfsShearEstimator — Python-facing wrapper for a prepared FPFS estimator.
///
/// Purpose
/// -------
/// Build the four FPFS outputs for one shear component from a noise
/// covariance and evaluate them on catalog rows.
///
/// Parameters
/// ----------
/// Constructed from Python via
/// `FpfsShearEstimator(cov, component=1, ratio=1.3, c0=4.0, c2=4.0,
/// alpha=0.2, beta=0.8, snr_min=12.0, r2_min=0.03, r2_max=2.0,
/// smooth="ss2", skip=1)`:
/// - `cov`: square `float64` matrix indexed by the FPFS column order.
/// - `component`: shear component, `1` or `2`.
/// - remaining keywords: factory options in units of the noise.
///
/// Notes
/// -----
/// - All validation happens in the constructor; any failure is raised as
///   `ValueError`.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "impt.fpfs")]
pub struct FpfsShearEstimator {
    inner: PreparedEstimator,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl FpfsShearEstimator {
    #[new]
    #[pyo3(
        signature = (
            cov,
            component = 1,
            ratio = None,
            c0 = None,
            c2 = None,
            alpha = None,
            beta = None,
            snr_min = None,
            r2_min = None,
            r2_max = None,
            smooth = None,
            skip = None,
        ),
        text_signature = "(cov, /, component=1, ratio=1.3, c0=4.0, c2=4.0, alpha=0.2, beta=0.8, \
                          snr_min=12.0, r2_min=0.03, r2_max=2.0, smooth='ss2', skip=1)"
    )]
    pub fn new<'py>(
        py: Python<'py>, cov: &Bound<'py, PyAny>, component: i64, ratio: Option<f64>,
        c0: Option<f64>, c2: Option<f64>, alpha: Option<f64>, beta: Option<f64>,
        snr_min: Option<f64>, r2_min: Option<f64>, r2_max: Option<f64>, smooth: Option<&str>,
        skip: Option<usize>,
    ) -> PyResult<Self> {
        let component = ShearComponent::try_from(component)?;
        let opts = extract_prepare_options(
            ratio, c0, c2, alpha, beta, snr_min, r2_min, r2_max, smooth, skip,
        )?;
        let cov_arr = extract_f64_matrix(py, cov)?;
        let cov = CovarianceMatrix::new(cov_arr.as_array().to_owned())?;
        let inner = prepare_func(cov, &opts, component)?;
        Ok(FpfsShearEstimator { inner })
    }

    /// Evaluate `(e, e_noise, response, response_noise)` on a `rows × columns` batch.
    #[pyo3(text_signature = "(self, data, /)")]
    pub fn evaluate<'py>(
        &self, py: Python<'py>, data: &Bound<'py, PyAny>,
    ) -> PyResult<(
        Bound<'py, PyArray1<f64>>,
        Bound<'py, PyArray1<f64>>,
        Bound<'py, PyArray1<f64>>,
        Bound<'py, PyArray1<f64>>,
    )> {
        let rows = extract_f64_matrix(py, data)?;
        let out = self.inner.evaluate(rows.as_array())?;
        Ok((
            out.e.into_pyarray(py),
            out.e_noise.into_pyarray(py),
            out.response.into_pyarray(py),
            out.response_noise.into_pyarray(py),
        ))
    }

    /// Shear component, `1` or `2`.
    #[getter]
    pub fn component(&self) -> i64 {
        self.inner.component().number()
    }

    /// Ordered FPFS column names the rows must follow.
    #[getter]
    pub fn columns(&self) -> Vec<String> {
        self.inner.layout().names().to_vec()
    }

    /// Noise-derived parameters as `(name, value)` pairs.
    #[getter]
    pub fn params(&self) -> Vec<(&'static str, f64)> {
        let t = self.inner.estimator.ellipticity().params();
        let c = self.inner.estimator.weight().cuts();
        vec![
            ("C0", t.c0),
            ("C2", t.c2),
            ("alpha", t.alpha),
            ("beta", t.beta),
            ("lower_m00", c.lower_m00),
            ("sigma_m00", c.sigma_m00),
            ("lower_r2", c.lower_r2),
            ("upper_r2", c.upper_r2),
            ("sigma_r2", c.sigma_r2),
            ("lower_v", c.lower_v),
            ("sigma_v", c.sigma_v),
        ]
    }
}

/// Initialize the `_impt` extension and register the `fpfs` submodule.
///
/// Notes
/// -----
/// - Invoked by Python on import; the submodule is also inserted into
///   `sys.modules` as `impt.fpfs` so dot-notation imports work.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _impt<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let fpfs_mod = PyModule::new(_py, "fpfs")?;
    fpfs_module(_py, m, &fpfs_mod)?;

    _py.import("sys")?.getattr("modules")?.set_item("impt.fpfs", fpfs_mod)?;
    Ok(())
}

#[cfg(feature = "python-bindings")]
fn fpfs_module<'py>(
    _py: Python, impt: &Bound<'py, PyModule>, m: &Bound<'py, PyModule>,
) -> PyResult<()> {
    m.add_class::<FpfsShearEstimator>()?;
    impt.add_submodule(m)?;
    Ok(())
}
