//! perturb::observable — the composable node contract.
//!
//! Purpose
//! -------
//! Define [`Observable`], the unit every estimator, selection cut, and
//! wrapper is built from, together with [`DerivativeRule`], the analytic
//! `∂(moment)/∂g` table an observable supplies for shear response.
//!
//! Key behaviors
//! -------------
//! - A node implements [`Differentiable::eval`] generically over the
//!   scalar type; `value`, `gradient`, `hessian`, and the batch entry
//!   points are provided on top of it and validate the row width.
//! - `modes()` lists the resolved moment indices a node reads (its own and
//!   its ancestors'); the differentiation primitives seed exactly those.
//!   `modes_child()` adds every index the derivative rule reads for them;
//!   `modes_with_rule` restricts that to chosen shear components, which is
//!   the set a shear-response wrapper depends on.
//! - Capabilities are explicit: [`Observable::derivative_rule`] is `None`
//!   for nodes whose moments have no known shear response, and
//!   [`Observable::hessian_capable`] is `false` for nodes that must not be
//!   wrapped in a noise-bias correction.
//!
//! Invariants & assumptions
//! ------------------------
//! - Nodes are immutable after construction; evaluation is a pure function
//!   of the moment vector.
//! - Every node built on one [`MomentLayout`] indexes vectors the same way;
//!   composition checks this.
//!
//! Conventions
//! -----------
//! - Shear components are the closed enum [`ShearComponent`]; integer
//!   components are accepted only through `TryFrom<i64>`.
//! - Batch entry points treat the leading axis as rows and evaluate each
//!   row independently.
use crate::{
    autodiff::{Differentiable, Real, gradient_at, hessian_at, to_symmetric_array},
    perturb::{
        errors::{PerturbError, PerturbResult},
        layout::MomentLayout,
        validation::validate_row_len,
    },
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::sync::Arc;

/// Weak-lensing shear component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShearComponent {
    G1,
    G2,
}

impl ShearComponent {
    /// Both components, in order.
    pub const ALL: [ShearComponent; 2] = [ShearComponent::G1, ShearComponent::G2];

    /// `1` for G1, `2` for G2.
    pub fn number(self) -> i64 {
        match self {
            ShearComponent::G1 => 1,
            ShearComponent::G2 => 2,
        }
    }
}

impl TryFrom<i64> for ShearComponent {
    type Error = PerturbError;

    fn try_from(component: i64) -> Result<Self, Self::Error> {
        match component {
            1 => Ok(ShearComponent::G1),
            2 => Ok(ShearComponent::G2),
            _ => Err(PerturbError::UnsupportedComponent { component }),
        }
    }
}

/// Analytic shear response of raw moments.
///
/// Raw moments are measured upstream and are not functions of shear inside
/// the differentiation graph; their response `∂m/∂g` is injected by hand
/// through this trait.
pub trait DerivativeRule: Clone {
    /// `∂x[index]/∂g_component` evaluated at `x`.
    fn d_moment_dg<T: Real>(&self, x: &[T], index: usize, component: ShearComponent) -> T;

    /// Indices read by [`DerivativeRule::d_moment_dg`] for `(index, component)`.
    fn dependencies(&self, index: usize, component: ShearComponent) -> Vec<usize>;
}

/// Rule for nodes without a known shear response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRule;

impl DerivativeRule for NoRule {
    fn d_moment_dg<T: Real>(&self, _x: &[T], _index: usize, _component: ShearComponent) -> T {
        T::zero()
    }

    fn dependencies(&self, _index: usize, _component: ShearComponent) -> Vec<usize> {
        Vec::new()
    }
}

/// A differentiable function of a moment vector, composable into pipelines.
///
/// Required:
/// - [`Differentiable::eval`]: value on any scalar type.
/// - `layout`, `modes`, `derivative_rule`, `name`.
///
/// Provided:
/// - `value`, `gradient`, `hessian` on one row (`ArrayView1`).
/// - `evaluate`, `evaluate_gradient` over a batch of rows (`ArrayView2`).
pub trait Observable: Differentiable {
    type Rule: DerivativeRule;

    /// Short node name used in error messages.
    fn name(&self) -> &'static str;

    /// Moment layout shared by this node and its ancestors.
    fn layout(&self) -> &Arc<MomentLayout>;

    /// Sorted, de-duplicated indices this node reads, ancestors included.
    fn modes(&self) -> Vec<usize>;

    /// Analytic shear-derivative rule, if the node has one.
    fn derivative_rule(&self) -> Option<&Self::Rule>;

    /// Whether the node is registered as twice differentiable.
    fn hessian_capable(&self) -> bool {
        true
    }

    /// `modes()` plus every index the derivative rule reads for them.
    fn modes_child(&self) -> Vec<usize> {
        self.modes_with_rule(&ShearComponent::ALL)
    }

    /// `modes()` plus the indices the derivative rule reads for `components`.
    fn modes_with_rule(&self, components: &[ShearComponent]) -> Vec<usize> {
        let mut out = self.modes();
        if let Some(rule) = self.derivative_rule() {
            for &m in &self.modes() {
                for &component in components {
                    out.extend(rule.dependencies(m, component));
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Width of the moment vectors this node accepts.
    fn dim(&self) -> usize {
        self.layout().len()
    }

    /// Evaluate the node on one moment vector.
    ///
    /// # Errors
    /// [`PerturbError::VectorLengthMismatch`] if `x.len() != self.dim()`.
    fn value(&self, x: ArrayView1<f64>) -> PerturbResult<f64> {
        validate_row_len(self.dim(), x.len())?;
        let row: Vec<f64> = x.iter().copied().collect();
        Ok(self.eval(&row))
    }

    /// Gradient of the value with respect to the full moment vector.
    ///
    /// Entries outside `modes()` are exactly zero.
    fn gradient(&self, x: ArrayView1<f64>) -> PerturbResult<Array1<f64>> {
        validate_row_len(self.dim(), x.len())?;
        let row: Vec<f64> = x.iter().copied().collect();
        Ok(Array1::from(gradient_at(self, &row, &self.modes())))
    }

    /// Symmetric Hessian of the value with respect to the full moment vector.
    ///
    /// # Errors
    /// - [`PerturbError::MissingHessian`] if the node is not Hessian-capable.
    /// - [`PerturbError::VectorLengthMismatch`] on a row-width mismatch.
    fn hessian(&self, x: ArrayView1<f64>) -> PerturbResult<Array2<f64>> {
        if !self.hessian_capable() {
            return Err(PerturbError::MissingHessian { node: self.name() });
        }
        validate_row_len(self.dim(), x.len())?;
        let row: Vec<f64> = x.iter().copied().collect();
        Ok(to_symmetric_array(hessian_at(self, &row, &self.modes())))
    }

    /// Evaluate every row of a `rows × dim` batch.
    fn evaluate(&self, rows: ArrayView2<f64>) -> PerturbResult<Array1<f64>> {
        validate_row_len(self.dim(), rows.ncols())?;
        tracing::trace!(node = self.name(), rows = rows.nrows(), "evaluating batch");
        let mut row = vec![0.0; rows.ncols()];
        let out = rows
            .outer_iter()
            .map(|r| {
                row.iter_mut().zip(r.iter()).for_each(|(dst, src)| *dst = *src);
                self.eval(&row)
            })
            .collect::<Vec<f64>>();
        Ok(Array1::from(out))
    }

    /// Per-row gradients of a `rows × dim` batch, as a `rows × dim` matrix.
    fn evaluate_gradient(&self, rows: ArrayView2<f64>) -> PerturbResult<Array2<f64>> {
        validate_row_len(self.dim(), rows.ncols())?;
        let modes = self.modes();
        let mut out = Array2::<f64>::zeros(rows.dim());
        for (r, mut dst) in rows.outer_iter().zip(out.outer_iter_mut()) {
            let row: Vec<f64> = r.iter().copied().collect();
            let grad = gradient_at(self, &row, &modes);
            dst.iter_mut().zip(grad).for_each(|(d, g)| *d = g);
        }
        Ok(out)
    }
}

/// Sort and de-duplicate a list of mode indices.
pub fn merge_modes<I: IntoIterator<Item = usize>>(modes: I) -> Vec<usize> {
    let mut out: Vec<usize> = modes.into_iter().collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Fail with [`PerturbError::LayoutMismatch`] unless both layouts agree.
pub fn ensure_same_layout(left: &Arc<MomentLayout>, right: &Arc<MomentLayout>) -> PerturbResult<()> {
    if Arc::ptr_eq(left, right) || **left == **right {
        return Ok(());
    }
    Err(PerturbError::LayoutMismatch { left: left.len(), right: right.len() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover the provided entry points of `Observable` on a small
    // hand-written node, plus shear-component parsing.
    // -------------------------------------------------------------------------

    /// f(x) = x0 · x1², reading only indices 0 and 1 of a 3-wide layout.
    struct Toy {
        layout: Arc<MomentLayout>,
    }

    impl Differentiable for Toy {
        fn eval<T: Real>(&self, x: &[T]) -> T {
            x[0].clone() * x[1].clone() * x[1].clone()
        }
    }

    impl Observable for Toy {
        type Rule = NoRule;

        fn name(&self) -> &'static str {
            "Toy"
        }

        fn layout(&self) -> &Arc<MomentLayout> {
            &self.layout
        }

        fn modes(&self) -> Vec<usize> {
            vec![0, 1]
        }

        fn derivative_rule(&self) -> Option<&NoRule> {
            None
        }
    }

    fn toy() -> Toy {
        Toy { layout: Arc::new(MomentLayout::new(["a", "b", "c"]).unwrap()) }
    }

    #[test]
    // Purpose
    // -------
    // Value, gradient, and Hessian agree with the closed forms and leave the
    // unread column at zero.
    //
    // Given
    // -----
    // - `x = (2, 3, 7)`.
    //
    // Expect
    // ------
    // - `f = 18`, `∇f = (9, 12, 0)`, `H = [[0, 6, 0], [6, 4, 0], [0, 0, 0]]`.
    fn single_row_entry_points() {
        let node = toy();
        let x = array![2.0, 3.0, 7.0];
        assert_relative_eq!(node.value(x.view()).unwrap(), 18.0);
        assert_eq!(node.gradient(x.view()).unwrap(), array![9.0, 12.0, 0.0]);
        let h = node.hessian(x.view()).unwrap();
        assert_eq!(h, array![[0.0, 6.0, 0.0], [6.0, 4.0, 0.0], [0.0, 0.0, 0.0]]);
    }

    #[test]
    // Purpose
    // -------
    // Batch evaluation maps rows independently and rejects the wrong width.
    fn batch_entry_points() {
        let node = toy();
        let rows = array![[1.0, 1.0, 0.0], [2.0, 3.0, 0.0]];
        assert_eq!(node.evaluate(rows.view()).unwrap(), array![1.0, 18.0]);
        let grads = node.evaluate_gradient(rows.view()).unwrap();
        assert_eq!(grads.row(1), array![9.0, 12.0, 0.0]);

        let err = node.evaluate(array![[1.0, 2.0]].view()).unwrap_err();
        assert_eq!(err, PerturbError::VectorLengthMismatch { expected: 3, found: 2 });
    }

    #[test]
    // Purpose
    // -------
    // Without a derivative rule, `modes_child` equals `modes`.
    fn modes_child_without_rule() {
        assert_eq!(toy().modes_child(), vec![0, 1]);
    }

    #[test]
    // Purpose
    // -------
    // Integer shear components outside {1, 2} are rejected.
    fn shear_component_parsing() {
        assert_eq!(ShearComponent::try_from(1_i64), Ok(ShearComponent::G1));
        assert_eq!(ShearComponent::try_from(2_i64), Ok(ShearComponent::G2));
        assert_eq!(
            ShearComponent::try_from(3_i64),
            Err(PerturbError::UnsupportedComponent { component: 3 })
        );
        assert_eq!(ShearComponent::G2.number(), 2);
    }
}
