//! fpfs::prepare — the `prepare_func` factory for noise-calibrated estimators.
//!
//! Purpose
//! -------
//! Build the four standard FPFS outputs from a noise covariance matrix:
//! the weighted ellipticity, its noise bias, its shear response, and the
//! noise bias of the response. Every cut threshold and softening width is
//! expressed in units of the measurement noise read off the covariance.
//!
//! Key behaviors
//! -------------
//! With `σ00 = √C[M00,M00]`, `σ20 = √(C[M00,M00] + C[M20,M20] + C[M00,M20]
//! + C[M20,M00])` and `σv = √C[v0,v0]`:
//!
//! ```text
//! C0        = c0 · σ00          C2        = c2 · σ20
//! lower_m00 = snr_min · σ00     sigma_m00 = ratio · σ00
//! lower_r2  = r2_min            upper_r2  = r2_max
//! sigma_r2  = ratio · σ20       lower_v   = 0.4 · ratio · σv
//! sigma_v   = ratio · σv
//! ```
//!
//! - [`derive_params`] applies these formulas and validates the result.
//! - [`prepare_func`] builds the estimator and wrappers, sharing one
//!   estimator and one covariance through `Arc`.
//! - [`PreparedEstimator::evaluate`] returns all four outputs per row.
//!
//! Invariants & assumptions
//! ------------------------
//! - The covariance is indexed by the FPFS layout.
//! - A covariance with zero `M00`, `M00 + M20`, or `v0` variance yields a
//!   zero softening width and is rejected as an invalid parameter.
use crate::{
    fpfs::{
        layout::{FpfsIndex, fpfs_layout},
        observables::WeightedEllipticity,
        params::{EllipticityParams, FpfsParams, PrepareOptions, SelectionParams},
    },
    perturb::{
        errors::PerturbResult,
        layout::MomentLayout,
        noise::{CovarianceMatrix, NoiseBias},
        observable::{Observable, ShearComponent},
        response::ShearResponse,
        validation::{validate_covariance_dim, validate_finite, validate_positive},
    },
};
use ndarray::{Array1, Array2, ArrayView2};
use std::sync::Arc;

/// The four standard outputs for one shear component.
#[derive(Debug)]
pub struct PreparedEstimator {
    pub estimator: Arc<WeightedEllipticity>,
    pub noise_bias: NoiseBias<WeightedEllipticity>,
    pub response: Arc<ShearResponse<WeightedEllipticity>>,
    pub response_noise_bias: NoiseBias<ShearResponse<WeightedEllipticity>>,
}

/// Per-row outputs of [`PreparedEstimator::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorColumns {
    pub e: Array1<f64>,
    pub e_noise: Array1<f64>,
    pub response: Array1<f64>,
    pub response_noise: Array1<f64>,
}

impl PreparedEstimator {
    pub fn component(&self) -> ShearComponent {
        self.estimator.component()
    }

    pub fn layout(&self) -> &Arc<MomentLayout> {
        self.estimator.layout()
    }

    /// Evaluate all four outputs on a `rows × layout.len()` batch.
    ///
    /// # Errors
    /// [`PerturbError::VectorLengthMismatch`](crate::perturb::errors::PerturbError::VectorLengthMismatch)
    /// if the batch width differs from the layout.
    pub fn evaluate(&self, rows: ArrayView2<f64>) -> PerturbResult<EstimatorColumns> {
        Ok(EstimatorColumns {
            e: self.estimator.evaluate(rows)?,
            e_noise: self.noise_bias.evaluate(rows)?,
            response: self.response.evaluate(rows)?,
            response_noise: self.response_noise_bias.evaluate(rows)?,
        })
    }
}

/// Derive the noise-scaled parameter tree from a covariance matrix.
///
/// Parameters
/// ----------
/// - `layout`: layout indexing `cov`.
/// - `cov`: measurement-noise covariance.
/// - `opts`: factory options.
///
/// Errors
/// ------
/// - [`PerturbError::CovarianceShape`](crate::perturb::errors::PerturbError::CovarianceShape)
///   if `cov` does not match `layout`.
/// - [`PerturbError::InvalidParameter`](crate::perturb::errors::PerturbError::InvalidParameter)
///   for invalid options or a derived parameter that fails validation.
/// - [`PerturbError::UnknownMode`](crate::perturb::errors::PerturbError::UnknownMode)
///   if `layout` lacks an FPFS column.
pub fn derive_params(
    layout: &MomentLayout, cov: &CovarianceMatrix, opts: &PrepareOptions,
) -> PerturbResult<FpfsParams> {
    validate_options(opts)?;
    validate_covariance_dim(layout.len(), cov.dim())?;
    let idx = FpfsIndex::resolve(layout)?;

    let std_m00 = cov.std(idx.m00);
    let var_m20 = cov.get(idx.m00, idx.m00)
        + cov.get(idx.m20, idx.m20)
        + cov.get(idx.m00, idx.m20)
        + cov.get(idx.m20, idx.m00);
    let std_m20 = var_m20.sqrt();
    let std_v0 = cov.std(idx.v[0]);

    let tree = EllipticityParams {
        c0: opts.c0 * std_m00,
        c2: opts.c2 * std_m20,
        alpha: opts.alpha,
        beta: opts.beta,
    };
    let cuts = SelectionParams {
        lower_m00: opts.snr_min * std_m00,
        sigma_m00: opts.ratio * std_m00,
        lower_r2: opts.r2_min,
        upper_r2: opts.r2_max,
        sigma_r2: opts.ratio * std_m20,
        lower_v: opts.ratio * std_v0 * 0.4,
        sigma_v: opts.ratio * std_v0,
    };
    tracing::debug!(
        std_m00,
        std_m20,
        std_v0,
        c0 = tree.c0,
        c2 = tree.c2,
        lower_m00 = cuts.lower_m00,
        lower_v = cuts.lower_v,
        "derived FPFS parameters from noise covariance"
    );
    FpfsParams::new(tree, cuts)
}

/// Build the estimator, response, and noise-bias outputs for `component`.
///
/// # Errors
/// Any error of [`derive_params`] or of the node constructors.
pub fn prepare_func(
    cov: CovarianceMatrix, opts: &PrepareOptions, component: ShearComponent,
) -> PerturbResult<PreparedEstimator> {
    let layout = fpfs_layout()?;
    let params = derive_params(&layout, &cov, opts)?;
    let cov = Arc::new(cov);

    let estimator =
        Arc::new(WeightedEllipticity::new(layout, &params, component, opts.smooth, opts.skip)?);
    let noise_bias = NoiseBias::new(estimator.clone(), cov.clone())?;
    let response = Arc::new(ShearResponse::new(estimator.clone(), component)?);
    let response_noise_bias = NoiseBias::new(response.clone(), cov)?;
    tracing::debug!(component = component.number(), smooth = %opts.smooth, "prepared FPFS estimator");
    Ok(PreparedEstimator { estimator, noise_bias, response, response_noise_bias })
}

/// `prepare_func` for the first shear component.
pub fn prepare_func_e1(cov: CovarianceMatrix, opts: &PrepareOptions) -> PerturbResult<PreparedEstimator> {
    prepare_func(cov, opts, ShearComponent::G1)
}

/// `prepare_func` for the second shear component.
pub fn prepare_func_e2(cov: CovarianceMatrix, opts: &PrepareOptions) -> PerturbResult<PreparedEstimator> {
    prepare_func(cov, opts, ShearComponent::G2)
}

/// Convenience: validate a raw matrix and run [`prepare_func`].
pub fn prepare_from_array(
    cov: Array2<f64>, opts: &PrepareOptions, component: ShearComponent,
) -> PerturbResult<PreparedEstimator> {
    prepare_func(CovarianceMatrix::new(cov)?, opts, component)
}

fn validate_options(opts: &PrepareOptions) -> PerturbResult<()> {
    validate_positive("ratio", opts.ratio)?;
    validate_finite("c0", opts.c0)?;
    validate_finite("c2", opts.c2)?;
    validate_finite("alpha", opts.alpha)?;
    validate_finite("beta", opts.beta)?;
    validate_finite("snr_min", opts.snr_min)?;
    validate_finite("r2_min", opts.r2_min)?;
    validate_finite("r2_max", opts.r2_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fpfs::layout::NPEAK, perturb::errors::PerturbError};
    use approx::assert_relative_eq;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover the parameter-scaling formulas, the output bundle,
    // and the factory's validation paths.
    // -------------------------------------------------------------------------

    fn diag_cov(m00: f64, m20: f64, cross: f64, v0: f64) -> CovarianceMatrix {
        let layout = fpfs_layout().unwrap();
        let idx = FpfsIndex::resolve(&layout).unwrap();
        let mut c = Array2::<f64>::eye(layout.len()) * 0.01;
        c[[idx.m00, idx.m00]] = m00;
        c[[idx.m20, idx.m20]] = m20;
        c[[idx.m00, idx.m20]] = cross;
        c[[idx.m20, idx.m00]] = cross;
        c[[idx.v[0], idx.v[0]]] = v0;
        CovarianceMatrix::new(c).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Derived parameters follow the scaling formulas.
    //
    // Given
    // -----
    // - `C[M00,M00] = 16`, `C[M20,M20] = 5`, `C[M00,M20] = 2`, `C[v0,v0] = 0.25`.
    // - Default options.
    //
    // Expect
    // ------
    // - `σ00 = 4`, `σ20 = 5`, `σv = 0.5`.
    // - `lower_m00 = 48`, `C0 = 16`, `C2 = 20`, `sigma_r2 = 6.5`,
    //   `lower_v = 0.26`, `sigma_v = 0.65`.
    fn scaling_formulas() {
        let layout = fpfs_layout().unwrap();
        let cov = diag_cov(16.0, 5.0, 2.0, 0.25);
        let p = derive_params(&layout, &cov, &PrepareOptions::default()).unwrap();
        assert_relative_eq!(p.cuts.lower_m00, 48.0, epsilon = 1e-12);
        assert_relative_eq!(p.tree.c0, 16.0, epsilon = 1e-12);
        assert_relative_eq!(p.tree.c2, 20.0, epsilon = 1e-12);
        assert_relative_eq!(p.cuts.sigma_m00, 5.2, epsilon = 1e-12);
        assert_relative_eq!(p.cuts.sigma_r2, 6.5, epsilon = 1e-12);
        assert_relative_eq!(p.cuts.lower_v, 0.26, epsilon = 1e-12);
        assert_relative_eq!(p.cuts.sigma_v, 0.65, epsilon = 1e-12);
        assert_eq!((p.cuts.lower_r2, p.cuts.upper_r2), (0.03, 2.0));
        assert_eq!((p.tree.alpha, p.tree.beta), (0.2, 0.8));
    }

    #[test]
    // Purpose
    // -------
    // The bundle shares one estimator and produces one value per row for
    // each output.
    fn bundle_evaluates_all_outputs() {
        let prepared = prepare_func_e2(diag_cov(16.0, 5.0, 2.0, 0.25), &PrepareOptions::default())
            .unwrap();
        assert_eq!(prepared.component(), ShearComponent::G2);
        assert!(Arc::ptr_eq(prepared.response.node(), &prepared.estimator));
        assert_eq!(prepared.response.name(), "RespG2");

        let rows = Array2::<f64>::zeros((3, prepared.layout().len()));
        let out = prepared.evaluate(rows.view()).unwrap();
        assert_eq!(out.e.len(), 3);
        assert_eq!(out.response_noise.len(), 3);
    }

    #[test]
    // Purpose
    // -------
    // The `g1` response seeds only the moments its own rule reads.
    //
    // Given
    // -----
    // - An `e1` bundle with `skip = 1`.
    //
    // Expect
    // ------
    // - Response modes: `M00, M20, M22c, M40, M42c`, all `v_i`, all `v_i_g1`.
    // - No `M22s`, `M42s`, or `v_i_g2` column, although the estimator's
    //   `modes_child` lists them.
    fn response_modes_exclude_other_component() {
        let prepared = prepare_func_e1(diag_cov(16.0, 5.0, 2.0, 0.25), &PrepareOptions::default())
            .unwrap();
        let idx = FpfsIndex::resolve(prepared.layout()).unwrap();
        let modes = prepared.response.modes();
        let mut expected = vec![idx.m00, idx.m20, idx.m22c, idx.m40, idx.m42c];
        expected.extend(idx.v);
        expected.extend(idx.v_g1);
        expected.sort_unstable();
        assert_eq!(modes, expected);
        assert!(idx.v_g2.iter().all(|i| !modes.contains(i)));
        assert!(prepared.estimator.modes_child().contains(&idx.m22s));
        assert_eq!(prepared.estimator.modes_child().len(), modes.len() + 2 + NPEAK);
    }

    #[test]
    // Purpose
    // -------
    // Shape, variance, and option errors surface from the factory.
    fn factory_errors() {
        let err = prepare_from_array(Array2::zeros((4, 4)), &PrepareOptions::default(), ShearComponent::G1)
            .unwrap_err();
        assert_eq!(err, PerturbError::CovarianceShape { expected: (32, 32), found: (4, 4) });

        let err = prepare_func_e1(diag_cov(0.0, 5.0, 0.0, 0.25), &PrepareOptions::default()).unwrap_err();
        assert!(matches!(err, PerturbError::InvalidParameter { field: "sigma_m00", .. }));

        let opts = PrepareOptions { ratio: -1.0, ..Default::default() };
        let err = prepare_func_e1(diag_cov(16.0, 5.0, 2.0, 0.25), &opts).unwrap_err();
        assert!(matches!(err, PerturbError::InvalidParameter { field: "ratio", .. }));

        let opts = PrepareOptions { skip: 0, ..Default::default() };
        let err = prepare_func_e1(diag_cov(16.0, 5.0, 2.0, 0.25), &opts).unwrap_err();
        assert!(matches!(err, PerturbError::InvalidParameter { field: "skip", .. }));
    }
}
