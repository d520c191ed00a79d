//! fpfs::linresp — analytic shear response of FPFS moments.
//!
//! Purpose
//! -------
//! Implement [`DerivativeRule`] for the FPFS layout: the linear response of
//! each raw moment to a small shear, expressed in terms of other moments
//! of the same row.
//!
//! Key behaviors
//! -------------
//! For `g1` (the `g2` table swaps the cosine and sine channels):
//!
//! ```text
//! dM00/dg1  = −√2 · M22c
//! dM20/dg1  = −√6 · M42c
//! dM22c/dg1 = (M00 − M40) / √2
//! dM42c/dg1 = √6/2 · (M20 − M60)
//! dv_i/dg1  = v_i_g1            (precomputed column)
//! ```
//!
//! Every other entry is zero. This is a known incompleteness: the spin-4
//! terms (`dM22s/dg1`, `dM22c/dg2`) need `M44`, and the responses of `M40`,
//! `M60`, and the cross-channel `M42` terms are not modeled. The FPFS
//! ellipticity estimator does not need them beyond this order.
//!
//! Invariants & assumptions
//! ------------------------
//! - The table is resolved once from the layout; evaluation is a lookup
//!   plus at most one subtraction and one multiplication.
//! - `dependencies` lists exactly the columns each entry reads.
use crate::{
    autodiff::Real,
    fpfs::layout::FpfsIndex,
    perturb::{
        errors::PerturbResult,
        layout::MomentLayout,
        observable::{DerivativeRule, ShearComponent},
        validation::validate_row_len,
    },
};
use ndarray::ArrayView1;
use std::{
    f64::consts::{FRAC_1_SQRT_2, SQRT_2},
    sync::Arc,
};

/// One entry of the response table.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Term {
    Zero,
    /// `coef · x[src]`
    Scaled { coef: f64, src: usize },
    /// `coef · (x[plus] − x[minus])`
    Difference { coef: f64, plus: usize, minus: usize },
}

impl Term {
    fn eval<T: Real>(self, x: &[T]) -> T {
        match self {
            Term::Zero => T::zero(),
            Term::Scaled { coef, src } => x[src].clone() * coef,
            Term::Difference { coef, plus, minus } => (x[plus].clone() - x[minus].clone()) * coef,
        }
    }

    fn reads(self) -> Vec<usize> {
        match self {
            Term::Zero => Vec::new(),
            Term::Scaled { src, .. } => vec![src],
            Term::Difference { plus, minus, .. } => vec![plus, minus],
        }
    }
}

/// Linear shear response of the FPFS moments.
#[derive(Debug, Clone)]
pub struct FpfsLinResponse {
    layout: Arc<MomentLayout>,
    /// `table[i] = [∂x_i/∂g1, ∂x_i/∂g2]`.
    table: Vec<[Term; 2]>,
}

impl FpfsLinResponse {
    /// Build the response table for `layout`.
    ///
    /// # Errors
    /// [`PerturbError::UnknownMode`](crate::perturb::errors::PerturbError::UnknownMode)
    /// if `layout` is missing an FPFS column.
    pub fn new(layout: Arc<MomentLayout>) -> PerturbResult<Self> {
        let idx = FpfsIndex::resolve(&layout)?;
        let sqrt6 = 6.0_f64.sqrt();
        let mut table = vec![[Term::Zero; 2]; layout.len()];

        table[idx.m00] = [
            Term::Scaled { coef: -SQRT_2, src: idx.m22c },
            Term::Scaled { coef: -SQRT_2, src: idx.m22s },
        ];
        table[idx.m20] = [
            Term::Scaled { coef: -sqrt6, src: idx.m42c },
            Term::Scaled { coef: -sqrt6, src: idx.m42s },
        ];
        let shear_m22 = Term::Difference { coef: FRAC_1_SQRT_2, plus: idx.m00, minus: idx.m40 };
        table[idx.m22c] = [shear_m22, Term::Zero];
        table[idx.m22s] = [Term::Zero, shear_m22];
        let shear_m42 = Term::Difference { coef: sqrt6 / 2.0, plus: idx.m20, minus: idx.m60 };
        table[idx.m42c] = [shear_m42, Term::Zero];
        table[idx.m42s] = [Term::Zero, shear_m42];
        for i in 0..idx.v.len() {
            table[idx.v[i]] = [
                Term::Scaled { coef: 1.0, src: idx.v_g1[i] },
                Term::Scaled { coef: 1.0, src: idx.v_g2[i] },
            ];
        }
        Ok(Self { layout, table })
    }

    pub fn layout(&self) -> &Arc<MomentLayout> {
        &self.layout
    }

    /// Response of the moment named `name` to shear component `g_component`.
    ///
    /// Parameters
    /// ----------
    /// - `x`: one moment vector in layout order.
    /// - `name`: catalog column name, e.g. `"fpfs_M00"`.
    /// - `g_component`: `1` or `2`.
    ///
    /// Returns
    /// -------
    /// `∂x[name]/∂g`; `0.0` for names outside the layout.
    ///
    /// Errors
    /// ------
    /// - [`PerturbError::UnsupportedComponent`](crate::perturb::errors::PerturbError::UnsupportedComponent)
    ///   if `g_component ∉ {1, 2}`.
    /// - [`PerturbError::VectorLengthMismatch`](crate::perturb::errors::PerturbError::VectorLengthMismatch)
    ///   on a row-width mismatch.
    pub fn d_moment_dg_named(
        &self, x: ArrayView1<f64>, name: &str, g_component: i64,
    ) -> PerturbResult<f64> {
        let component = ShearComponent::try_from(g_component)?;
        validate_row_len(self.layout.len(), x.len())?;
        let Some(index) = self.layout.get(name) else {
            return Ok(0.0);
        };
        let row: Vec<f64> = x.iter().copied().collect();
        Ok(self.d_moment_dg(&row, index, component))
    }

    fn term(&self, index: usize, component: ShearComponent) -> Term {
        let col = match component {
            ShearComponent::G1 => 0,
            ShearComponent::G2 => 1,
        };
        self.table.get(index).map_or(Term::Zero, |entry| entry[col])
    }
}

impl DerivativeRule for FpfsLinResponse {
    fn d_moment_dg<T: Real>(&self, x: &[T], index: usize, component: ShearComponent) -> T {
        self.term(index, component).eval(x)
    }

    fn dependencies(&self, index: usize, component: ShearComponent) -> Vec<usize> {
        self.term(index, component).reads()
    }
}
