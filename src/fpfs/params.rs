//! fpfs::params — FPFS estimator parameters and factory options.
//!
//! Purpose
//! -------
//! Hold the parameter tree of the FPFS ellipticity estimator and its
//! selection cuts, validated at construction and loadable from
//! configuration files through `serde`.
//!
//! Key behaviors
//! -------------
//! - [`EllipticityParams`] are the gradient-trackable fields: the
//!   estimator exposes `∂e/∂(C0, C2, alpha, beta)` through the same
//!   differentiation engine used for moments.
//! - [`SelectionParams`] are fixed hyperparameters: cut centers and
//!   softening widths, never differentiated.
//! - [`FpfsParams::new`] and [`FpfsParams::validate`] require all fields to
//!   be finite and every softening width to be strictly positive.
//! - [`PrepareOptions`] collects the noise-scaled inputs of the
//!   `prepare_func` factory.
//!
//! Conventions
//! -----------
//! - Serialized field names follow the catalog convention, with `C0` and
//!   `C2` upper-case. Both structs are flattened into [`FpfsParams`], so a
//!   configuration is one flat map; every field is defaulted.
use crate::{
    fpfs::smooth::SmoothStep,
    perturb::{
        errors::PerturbResult,
        validation::{validate_finite, validate_positive},
    },
};
use serde::{Deserialize, Serialize};

/// Gradient-trackable parameters of the ellipticity estimator.
///
/// `e = M22 / ((M00 + C0)^alpha · (M00 + M20 + C2)^beta)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EllipticityParams {
    #[serde(rename = "C0")]
    pub c0: f64,
    #[serde(rename = "C2")]
    pub c2: f64,
    pub alpha: f64,
    pub beta: f64,
}

impl Default for EllipticityParams {
    fn default() -> Self {
        Self { c0: 5.0, c2: 5.0, alpha: 1.3, beta: 1.2 }
    }
}

impl EllipticityParams {
    /// Parameters as `[C0, C2, alpha, beta]`, the order of
    /// `param_gradient` outputs.
    pub fn to_array(&self) -> [f64; 4] {
        [self.c0, self.c2, self.alpha, self.beta]
    }

    /// Require every field to be finite.
    pub fn validate(&self) -> PerturbResult<()> {
        validate_finite("C0", self.c0)?;
        validate_finite("C2", self.c2)?;
        validate_finite("alpha", self.alpha)?;
        validate_finite("beta", self.beta)
    }
}

/// Fixed selection-cut hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionParams {
    /// Flux cut center on `M00`.
    pub lower_m00: f64,
    /// Softening width of the flux cut.
    pub sigma_m00: f64,
    /// Lower cut on the size ratio `(M00 + M20) / M00`.
    pub lower_r2: f64,
    /// Upper cut on the size ratio (currently not applied).
    pub upper_r2: f64,
    /// Softening width of the size cut.
    pub sigma_r2: f64,
    /// Detection cut center on each peak mode.
    pub lower_v: f64,
    /// Softening width of the detection cut.
    pub sigma_v: f64,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            lower_m00: 0.2,
            sigma_m00: 0.2,
            lower_r2: 0.03,
            upper_r2: 2.0,
            sigma_r2: 0.2,
            lower_v: 0.005,
            sigma_v: 0.2,
        }
    }
}

impl SelectionParams {
    /// Require finite centers and strictly positive widths.
    pub fn validate(&self) -> PerturbResult<()> {
        validate_finite("lower_m00", self.lower_m00)?;
        validate_positive("sigma_m00", self.sigma_m00)?;
        validate_finite("lower_r2", self.lower_r2)?;
        validate_finite("upper_r2", self.upper_r2)?;
        validate_positive("sigma_r2", self.sigma_r2)?;
        validate_finite("lower_v", self.lower_v)?;
        validate_positive("sigma_v", self.sigma_v)
    }
}

/// FPFS parameter tree: trackable estimator parameters plus fixed cuts.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FpfsParams {
    #[serde(flatten)]
    pub tree: EllipticityParams,
    #[serde(flatten)]
    pub cuts: SelectionParams,
}

impl FpfsParams {
    /// Build and validate a parameter tree.
    ///
    /// # Errors
    /// [`PerturbError::InvalidParameter`](crate::perturb::errors::PerturbError::InvalidParameter)
    /// for the first non-finite field or non-positive width.
    pub fn new(tree: EllipticityParams, cuts: SelectionParams) -> PerturbResult<Self> {
        let params = Self { tree, cuts };
        params.validate()?;
        Ok(params)
    }

    /// Check every field; see [`FpfsParams::new`].
    pub fn validate(&self) -> PerturbResult<()> {
        self.tree.validate()?;
        self.cuts.validate()
    }
}

/// Inputs of the `prepare_func` factory, in units of the measurement noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrepareOptions {
    /// Softening widths in noise sigmas; also scales the detection cut.
    pub ratio: f64,
    /// `C0` in units of the `M00` noise.
    pub c0: f64,
    /// `C2` in units of the `M00 + M20` noise.
    pub c2: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Flux cut in units of the `M00` noise.
    pub snr_min: f64,
    pub r2_min: f64,
    pub r2_max: f64,
    pub smooth: SmoothStep,
    /// Stride over the peak-detection channels.
    pub skip: usize,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            ratio: 1.3,
            c0: 4.0,
            c2: 4.0,
            alpha: 0.2,
            beta: 0.8,
            snr_min: 12.0,
            r2_min: 0.03,
            r2_max: 2.0,
            smooth: SmoothStep::Ss2,
            skip: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perturb::errors::PerturbError;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover defaults, validation failures, and flat
    // configuration loading with partial input.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Defaults pass validation and match the documented values.
    fn defaults_are_valid() {
        let params = FpfsParams::default();
        params.validate().unwrap();
        assert_eq!(params.tree.to_array(), [5.0, 5.0, 1.3, 1.2]);
        assert_eq!(params.cuts.lower_v, 0.005);
        assert_eq!(PrepareOptions::default().skip, 1);
    }

    #[test]
    // Purpose
    // -------
    // Non-finite fields and non-positive widths are rejected by name.
    fn invalid_fields_are_rejected() {
        let tree = EllipticityParams { alpha: f64::NAN, ..Default::default() };
        let err = FpfsParams::new(tree, SelectionParams::default()).unwrap_err();
        assert!(matches!(err, PerturbError::InvalidParameter { field: "alpha", .. }));

        let cuts = SelectionParams { sigma_r2: 0.0, ..Default::default() };
        let err = FpfsParams::new(EllipticityParams::default(), cuts).unwrap_err();
        assert_eq!(
            err,
            PerturbError::InvalidParameter { field: "sigma_r2", value: 0.0, reason: "must be positive" }
        );
    }

    #[test]
    // Purpose
    // -------
    // A partial flat JSON map fills unspecified fields from defaults.
    fn partial_json_uses_defaults() {
        let json = r#"{ "C0": 16.0, "beta": 0.8, "lower_m00": 48.0 }"#;
        let params: FpfsParams = serde_json::from_str(json).unwrap();
        assert_eq!(params.tree.c0, 16.0);
        assert_eq!(params.tree.c2, 5.0);
        assert_eq!(params.tree.beta, 0.8);
        assert_eq!(params.cuts.lower_m00, 48.0);
        assert_eq!(params.cuts.sigma_v, 0.2);

        let opts: PrepareOptions = serde_json::from_str(r#"{ "smooth": "ts2" }"#).unwrap();
        assert_eq!(opts.smooth, SmoothStep::Ts2);
        assert_eq!(opts.snr_min, 12.0);
    }
}
