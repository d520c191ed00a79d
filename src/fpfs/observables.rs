//! fpfs::observables — FPFS selection weight and weighted ellipticity.
//!
//! Purpose
//! -------
//! Provide the concrete FPFS observables: the smooth selection weight and
//! the selection-weighted ellipticity estimators `E1` / `E2`. Both read raw
//! catalog moments, carry the FPFS [`FpfsLinResponse`] rule, and are
//! Hessian-capable, so they can be wrapped in shear-response and
//! noise-bias corrections to any depth.
//!
//! Key behaviors
//! -------------
//! - [`SelectionWeight`] multiplies independent smooth cuts:
//!   - flux: `S(M00; lower_m00, sigma_m00)`,
//!   - size (lower): `S(M00 (1 − lower_r2) + M20; sigma_r2, sigma_r2)`,
//!     the ratio cut `(M00 + M20)/M00 > lower_r2` rewritten without a
//!     division,
//!   - size (upper): not applied, the factor is `1`,
//!   - detection: `Π_i S(v_i; lower_v, sigma_v)` for
//!     `i = 0, skip, 2·skip, … < NPEAK`.
//! - [`Ellipticity`] is the unweighted estimator
//!   `M22 / ((M00 + C0)^alpha · (M00 + M20 + C2)^beta)` with `M22c` for
//!   `E1` and `M22s` for `E2`.
//! - [`WeightedEllipticity`] is the product of the two, composed through
//!   [`Chained`] with [`Link::Product`]; it also exposes the gradient with
//!   respect to the trackable parameters `(C0, C2, alpha, beta)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Parameters are validated when a node is built; a `skip` of zero is
//!   rejected.
//! - Both factors read the raw moment vector; neither reads the other's
//!   output.
use crate::{
    autodiff::{Differentiable, Real},
    fpfs::{
        layout::{FpfsIndex, NPEAK},
        linresp::FpfsLinResponse,
        params::{EllipticityParams, FpfsParams, SelectionParams},
        smooth::SmoothStep,
    },
    perturb::{
        chain::{Chained, Link},
        errors::{PerturbError, PerturbResult},
        layout::MomentLayout,
        observable::{Observable, ShearComponent, merge_modes},
        validation::validate_row_len,
    },
};
use nalgebra::{DVector, Dyn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use num_dual::DualVec;
use std::sync::Arc;

/// Smooth FPFS selection weight.
#[derive(Debug, Clone)]
pub struct SelectionWeight {
    layout: Arc<MomentLayout>,
    idx: FpfsIndex,
    cuts: SelectionParams,
    smooth: SmoothStep,
    peaks: Vec<usize>,
    rule: FpfsLinResponse,
    modes: Vec<usize>,
}

impl SelectionWeight {
    /// Build a selection weight on `layout`.
    ///
    /// Parameters
    /// ----------
    /// - `cuts`: cut centers and widths.
    /// - `smooth`: step strategy shared by every cut.
    /// - `skip`: stride over the `NPEAK` detection channels, `≥ 1`.
    ///
    /// Errors
    /// ------
    /// - [`PerturbError::InvalidParameter`] for invalid cuts or `skip == 0`.
    /// - [`PerturbError::UnknownMode`] if `layout` lacks an FPFS column.
    pub fn new(
        layout: Arc<MomentLayout>, cuts: SelectionParams, smooth: SmoothStep, skip: usize,
    ) -> PerturbResult<Self> {
        cuts.validate()?;
        if skip == 0 {
            return Err(PerturbError::InvalidParameter {
                field: "skip",
                value: 0.0,
                reason: "must be positive",
            });
        }
        let idx = FpfsIndex::resolve(&layout)?;
        let rule = FpfsLinResponse::new(layout.clone())?;
        let peaks: Vec<usize> = (0..NPEAK).step_by(skip).map(|i| idx.v[i]).collect();
        let modes = merge_modes([idx.m00, idx.m20].into_iter().chain(peaks.iter().copied()));
        tracing::debug!(?smooth, skip, peaks = peaks.len(), "selection weight");
        Ok(Self { layout, idx, cuts, smooth, peaks, rule, modes })
    }

    pub fn cuts(&self) -> &SelectionParams {
        &self.cuts
    }

    pub fn smooth(&self) -> SmoothStep {
        self.smooth
    }
}

impl Differentiable for SelectionWeight {
    fn eval<T: Real>(&self, x: &[T]) -> T {
        let c = &self.cuts;
        let s = self.smooth;
        let m00 = x[self.idx.m00].clone();
        let w0 = s.apply(m00.clone(), c.lower_m00, c.sigma_m00);

        let r2l = m00 * (1.0 - c.lower_r2) + x[self.idx.m20].clone();
        let w2l = s.apply(r2l, c.sigma_r2, c.sigma_r2);
        let wsel = w0 * w2l;

        let wdet = self
            .peaks
            .iter()
            .fold(T::one(), |acc, &i| acc * s.apply(x[i].clone(), c.lower_v, c.sigma_v));
        wdet * wsel
    }
}

impl Observable for SelectionWeight {
    type Rule = FpfsLinResponse;

    fn name(&self) -> &'static str {
        "SelectionWeight"
    }

    fn layout(&self) -> &Arc<MomentLayout> {
        &self.layout
    }

    fn modes(&self) -> Vec<usize> {
        self.modes.clone()
    }

    fn derivative_rule(&self) -> Option<&FpfsLinResponse> {
        Some(&self.rule)
    }
}

/// Unweighted FPFS ellipticity for one shear component.
#[derive(Debug, Clone)]
pub struct Ellipticity {
    layout: Arc<MomentLayout>,
    idx: FpfsIndex,
    tree: EllipticityParams,
    component: ShearComponent,
    numerator: usize,
    rule: FpfsLinResponse,
    modes: Vec<usize>,
}

impl Ellipticity {
    /// # Errors
    /// - [`PerturbError::InvalidParameter`] for a non-finite parameter.
    /// - [`PerturbError::UnknownMode`] if `layout` lacks an FPFS column.
    pub fn new(
        layout: Arc<MomentLayout>, tree: EllipticityParams, component: ShearComponent,
    ) -> PerturbResult<Self> {
        tree.validate()?;
        let idx = FpfsIndex::resolve(&layout)?;
        let rule = FpfsLinResponse::new(layout.clone())?;
        let numerator = match component {
            ShearComponent::G1 => idx.m22c,
            ShearComponent::G2 => idx.m22s,
        };
        let modes = merge_modes([idx.m00, idx.m20, numerator]);
        Ok(Self { layout, idx, tree, component, numerator, rule, modes })
    }

    pub fn params(&self) -> &EllipticityParams {
        &self.tree
    }

    pub fn component(&self) -> ShearComponent {
        self.component
    }

    /// Ellipticity with the tree parameters `[C0, C2, alpha, beta]` supplied
    /// on the same scalar type as the moments.
    fn eval_with<T: Real>(&self, x: &[T], p: &[T; 4]) -> T {
        let [c0, c2, alpha, beta] = p.clone();
        let m00 = x[self.idx.m00].clone();
        let size = m00.clone() + x[self.idx.m20].clone() + c2;
        let denom = (m00 + c0).powr(alpha) * size.powr(beta);
        x[self.numerator].clone() / denom
    }
}

impl Differentiable for Ellipticity {
    fn eval<T: Real>(&self, x: &[T]) -> T {
        let p = &self.tree;
        let m00 = x[self.idx.m00].clone();
        let size = m00.clone() + x[self.idx.m20].clone() + p.c2;
        let denom = (m00 + p.c0).powf(p.alpha) * size.powf(p.beta);
        x[self.numerator].clone() / denom
    }
}

impl Observable for Ellipticity {
    type Rule = FpfsLinResponse;

    fn name(&self) -> &'static str {
        match self.component {
            ShearComponent::G1 => "Ellipticity1",
            ShearComponent::G2 => "Ellipticity2",
        }
    }

    fn layout(&self) -> &Arc<MomentLayout> {
        &self.layout
    }

    fn modes(&self) -> Vec<usize> {
        self.modes.clone()
    }

    fn derivative_rule(&self) -> Option<&FpfsLinResponse> {
        Some(&self.rule)
    }
}

/// Selection-weighted FPFS ellipticity estimator (`E1` / `E2`).
#[derive(Debug)]
pub struct WeightedEllipticity {
    inner: Chained<Ellipticity, SelectionWeight>,
}

impl WeightedEllipticity {
    /// Build the weighted estimator for `component`.
    ///
    /// Parameters
    /// ----------
    /// - `layout`: moment layout containing every FPFS column.
    /// - `params`: validated parameter tree.
    /// - `smooth`, `skip`: passed to [`SelectionWeight::new`].
    ///
    /// Errors
    /// ------
    /// Any error of [`Ellipticity::new`] or [`SelectionWeight::new`].
    pub fn new(
        layout: Arc<MomentLayout>, params: &FpfsParams, component: ShearComponent,
        smooth: SmoothStep, skip: usize,
    ) -> PerturbResult<Self> {
        let weight = Arc::new(SelectionWeight::new(layout.clone(), params.cuts, smooth, skip)?);
        let ellip = Arc::new(Ellipticity::new(layout, params.tree, component)?);
        let inner = Chained::new(ellip, weight, Link::Product)?;
        Ok(Self { inner })
    }

    /// `E1`: weighted `M22c` estimator.
    pub fn e1(
        layout: Arc<MomentLayout>, params: &FpfsParams, smooth: SmoothStep, skip: usize,
    ) -> PerturbResult<Self> {
        Self::new(layout, params, ShearComponent::G1, smooth, skip)
    }

    /// `E2`: weighted `M22s` estimator.
    pub fn e2(
        layout: Arc<MomentLayout>, params: &FpfsParams, smooth: SmoothStep, skip: usize,
    ) -> PerturbResult<Self> {
        Self::new(layout, params, ShearComponent::G2, smooth, skip)
    }

    pub fn ellipticity(&self) -> &Arc<Ellipticity> {
        self.inner.node()
    }

    pub fn weight(&self) -> &Arc<SelectionWeight> {
        self.inner.parent()
    }

    pub fn component(&self) -> ShearComponent {
        self.ellipticity().component()
    }

    /// Gradient of the estimator with respect to `(C0, C2, alpha, beta)`.
    ///
    /// Returns
    /// -------
    /// `Array1` of length 4, ordered as [`EllipticityParams::to_array`].
    ///
    /// Errors
    /// ------
    /// [`PerturbError::VectorLengthMismatch`] on a row-width mismatch.
    pub fn param_gradient(&self, x: ArrayView1<f64>) -> PerturbResult<Array1<f64>> {
        validate_row_len(self.dim(), x.len())?;
        let row: Vec<f64> = x.iter().copied().collect();
        Ok(Array1::from(self.param_gradient_row(&row).to_vec()))
    }

    /// Per-row parameter gradients of a batch, as a `rows × 4` matrix.
    pub fn evaluate_param_gradient(&self, rows: ArrayView2<f64>) -> PerturbResult<Array2<f64>> {
        validate_row_len(self.dim(), rows.ncols())?;
        let mut out = Array2::<f64>::zeros((rows.nrows(), 4));
        for (r, mut dst) in rows.outer_iter().zip(out.outer_iter_mut()) {
            let row: Vec<f64> = r.iter().copied().collect();
            dst.iter_mut().zip(self.param_gradient_row(&row)).for_each(|(d, g)| *d = g);
        }
        Ok(out)
    }

    fn param_gradient_row(&self, row: &[f64]) -> [f64; 4] {
        let p = DVector::from_row_slice(&self.ellipticity().params().to_array());
        let (_, de) = num_dual::gradient(
            |v| {
                let seeded: [DualVec<f64, f64, Dyn>; 4] = std::array::from_fn(|k| v[k].clone());
                let lifted: Vec<DualVec<f64, f64, Dyn>> =
                    row.iter().copied().map(DualVec::from_re).collect();
                self.ellipticity().eval_with(&lifted, &seeded)
            },
            p,
        );
        let w = self.weight().eval(row);
        std::array::from_fn(|k| w * de[k])
    }
}

impl Differentiable for WeightedEllipticity {
    fn eval<T: Real>(&self, x: &[T]) -> T {
        self.inner.eval(x)
    }
}

impl Observable for WeightedEllipticity {
    type Rule = FpfsLinResponse;

    fn name(&self) -> &'static str {
        match self.component() {
            ShearComponent::G1 => "FpfsE1",
            ShearComponent::G2 => "FpfsE2",
        }
    }

    fn layout(&self) -> &Arc<MomentLayout> {
        self.inner.layout()
    }

    fn modes(&self) -> Vec<usize> {
        self.inner.modes()
    }

    fn derivative_rule(&self) -> Option<&FpfsLinResponse> {
        self.inner.derivative_rule()
    }

    fn hessian_capable(&self) -> bool {
        self.inner.hessian_capable()
    }
}
