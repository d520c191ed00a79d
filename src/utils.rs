//! Conversion helpers for the PyO3 boundary.
//!
//! Everything here is compiled only with the `python-bindings` feature and
//! turns Python array-likes into contiguous `ndarray` views, and factory
//! options into [`PrepareOptions`].
#[cfg(feature = "python-bindings")]
use ndarray::Array2;

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyTypeError, exceptions::PyValueError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use numpy::{
    IntoPyArray,    // Array2 → PyArray
    PyArrayMethods, // .readonly()
    PyReadonlyArray2,
};

#[cfg(feature = "python-bindings")]
use crate::fpfs::{params::PrepareOptions, smooth::SmoothStep};

/// Accept a 2-D `numpy.ndarray`, anything with `to_numpy()`, or a nested
/// sequence of floats, and return a read-only `float64` view.
#[cfg(feature = "python-bindings")]
#[inline]
pub fn extract_f64_matrix<'py>(
    py: Python<'py>, raw_data: &Bound<'py, PyAny>,
) -> PyResult<PyReadonlyArray2<'py, f64>> {
    if let Ok(arr_ro) = raw_data.extract::<PyReadonlyArray2<f64>>() {
        return Ok(arr_ro);
    }

    if let Ok(obj) = raw_data.call_method("to_numpy", (false,), None) {
        if let Ok(frame_ro) = obj.extract::<PyReadonlyArray2<f64>>() {
            return Ok(frame_ro);
        }
    }

    let rows: Vec<Vec<f64>> = raw_data.extract().map_err(|_| {
        PyTypeError::new_err("expected a 2-D numpy.ndarray, pandas.DataFrame, or nested sequence of float64")
    })?;
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(PyValueError::new_err("rows must all have the same length"));
    }
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let nrows = if ncols == 0 { 0 } else { flat.len() / ncols };
    let arr = Array2::from_shape_vec((nrows, ncols), flat)
        .map_err(|e| PyValueError::new_err(format!("invalid matrix shape: {e}")))?;
    Ok(arr.into_pyarray(py).readonly())
}

/// Build [`PrepareOptions`] from optional Python keyword arguments; `None`
/// keeps the default.
#[cfg(feature = "python-bindings")]
pub fn extract_prepare_options(
    ratio: Option<f64>, c0: Option<f64>, c2: Option<f64>, alpha: Option<f64>, beta: Option<f64>,
    snr_min: Option<f64>, r2_min: Option<f64>, r2_max: Option<f64>, smooth: Option<&str>,
    skip: Option<usize>,
) -> PyResult<PrepareOptions> {
    let d = PrepareOptions::default();
    let smooth = match smooth {
        Some(name) => name.parse::<SmoothStep>()?,
        None => d.smooth,
    };
    Ok(PrepareOptions {
        ratio: ratio.unwrap_or(d.ratio),
        c0: c0.unwrap_or(d.c0),
        c2: c2.unwrap_or(d.c2),
        alpha: alpha.unwrap_or(d.alpha),
        beta: beta.unwrap_or(d.beta),
        snr_min: snr_min.unwrap_or(d.snr_min),
        r2_min: r2_min.unwrap_or(d.r2_min),
        r2_max: r2_max.unwrap_or(d.r2_max),
        smooth,
        skip: skip.unwrap_or(d.skip),
    })
}
