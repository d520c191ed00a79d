//! perturb::response — first-order shear response of any observable.
//!
//! Purpose
//! -------
//! Wrap an observable `f` and return its total response to shear component
//! `g_c`, via the chain rule
//!
//! ```text
//! df/dg_c = Σ_m (∂f/∂x_m) · (∂x_m/∂g_c)
//! ```
//!
//! The first factor is the automatic gradient of the wrapped node through
//! its full composition; the second is the node's analytic
//! [`DerivativeRule`].
//!
//! Key behaviors
//! -------------
//! - Construction fails with
//!   [`MissingDerivativeRule`](crate::perturb::errors::PerturbError::MissingDerivativeRule)
//!   when the wrapped node has no rule.
//! - A [`ShearResponse`] is itself an [`Observable`] with the same layout and
//!   rule, so it can be wrapped again: in a noise-bias correction (the
//!   Hessian of a response) or in a second shear response.
//!
//! Invariants & assumptions
//! ------------------------
//! - The sum runs over the wrapped node's `modes()`; outside them the
//!   gradient is exactly zero.
//! - The wrapper depends on the wrapped node's own moments plus those the
//!   rule reads for the wrapper's component only.
use crate::{
    autodiff::{Differentiable, Real, gradient_at},
    perturb::{
        errors::{PerturbError, PerturbResult},
        layout::MomentLayout,
        observable::{DerivativeRule, Observable, ShearComponent},
    },
};
use std::sync::Arc;

/// Shear response `d(node)/dg_c` of a wrapped observable.
#[derive(Debug)]
pub struct ShearResponse<O: Observable> {
    node: Arc<O>,
    rule: O::Rule,
    component: ShearComponent,
    node_modes: Vec<usize>,
    modes: Vec<usize>,
}

impl<O: Observable> ShearResponse<O> {
    /// Response of `node` to shear component `component`.
    ///
    /// # Errors
    /// [`PerturbError::MissingDerivativeRule`] if `node` has no derivative rule.
    pub fn new(node: Arc<O>, component: ShearComponent) -> PerturbResult<Self> {
        let rule = node
            .derivative_rule()
            .cloned()
            .ok_or(PerturbError::MissingDerivativeRule { node: node.name() })?;
        let node_modes = node.modes();
        let modes = node.modes_with_rule(&[component]);
        tracing::debug!(node = node.name(), component = component.number(), "shear response");
        Ok(Self { node, rule, component, node_modes, modes })
    }

    /// `RespG1`: response to the first shear component.
    pub fn g1(node: Arc<O>) -> PerturbResult<Self> {
        Self::new(node, ShearComponent::G1)
    }

    /// `RespG2`: response to the second shear component.
    pub fn g2(node: Arc<O>) -> PerturbResult<Self> {
        Self::new(node, ShearComponent::G2)
    }

    pub fn component(&self) -> ShearComponent {
        self.component
    }

    pub fn node(&self) -> &Arc<O> {
        &self.node
    }
}

impl<O: Observable> Differentiable for ShearResponse<O> {
    fn eval<T: Real>(&self, x: &[T]) -> T {
        let grad = gradient_at(&*self.node, x, &self.node_modes);
        self.node_modes.iter().fold(T::zero(), |acc, &m| {
            acc + grad[m].clone() * self.rule.d_moment_dg(x, m, self.component)
        })
    }
}

impl<O: Observable> Observable for ShearResponse<O> {
    type Rule = O::Rule;

    fn name(&self) -> &'static str {
        match self.component {
            ShearComponent::G1 => "RespG1",
            ShearComponent::G2 => "RespG2",
        }
    }

    fn layout(&self) -> &Arc<MomentLayout> {
        self.node.layout()
    }

    fn modes(&self) -> Vec<usize> {
        self.modes.clone()
    }

    fn derivative_rule(&self) -> Option<&Self::Rule> {
        Some(&self.rule)
    }

    fn hessian_capable(&self) -> bool {
        self.node.hessian_capable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perturb::{
        chain::{Chained, Link},
        fixtures::{Flat, Poly, fixture_layout},
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The chain-rule sum on a node with a known closed-form response.
    // - Composition: the response of a chained node is the total derivative.
    // - Nesting: the response of a response.
    // - Per-component dependency sets.
    // - The missing-rule capability error.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Check `RespG1` and `RespG2` against hand-derived responses.
    //
    // Given
    // -----
    // - `f = a·b²` on layout `(a, b, c, d)` with rule
    //   `da/dg1 = b`, `db/dg1 = −a`, `da/dg2 = c`, `db/dg2 = 0`.
    // - `x = (2, 3, 5, 7)`.
    //
    // Expect
    // ------
    // - `df/dg1 = b²·b + 2ab·(−a) = 27 − 24 = 3`.
    // - `df/dg2 = b²·c = 45`.
    fn response_matches_closed_form() {
        let node = Arc::new(Poly::new(fixture_layout()));
        let x = array![2.0, 3.0, 5.0, 7.0];
        let r1 = ShearResponse::g1(node.clone()).unwrap();
        let r2 = ShearResponse::g2(node).unwrap();
        assert_relative_eq!(r1.value(x.view()).unwrap(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(r2.value(x.view()).unwrap(), 45.0, epsilon = 1e-12);
        assert_eq!(r1.name(), "RespG1");
    }

    #[test]
    // Purpose
    // -------
    // A response reads only the rule dependencies of its own component.
    //
    // Given
    // -----
    // - `f = a·b²`; the `g1` rule reads `(a, b)`, the `g2` rule also reads `c`.
    //
    // Expect
    // ------
    // - `RespG1` modes are `[a, b]`, `RespG2` modes are `[a, b, c]`.
    // - `modes_child` of the node still covers both components.
    fn response_modes_follow_component() {
        let node = Arc::new(Poly::new(fixture_layout()));
        assert_eq!(ShearResponse::g1(node.clone()).unwrap().modes(), vec![0, 1]);
        assert_eq!(ShearResponse::g2(node.clone()).unwrap().modes(), vec![0, 1, 2]);
        assert_eq!(node.modes_child(), vec![0, 1, 2]);
    }

    #[test]
    // Purpose
    // -------
    // The response of a chained node equals the product rule applied to the
    // responses of its parts.
    //
    // Given
    // -----
    // - `h = f · f` built with `Link::Product` from one shared node.
    //
    // Expect
    // ------
    // - `dh/dg1 = 2 f · df/dg1`.
    fn response_through_chain_is_total_derivative() {
        let node = Arc::new(Poly::new(fixture_layout()));
        let chained = Arc::new(Chained::new(node.clone(), node.clone(), Link::Product).unwrap());
        let x = array![2.0, 3.0, 5.0, 7.0];
        let f = node.value(x.view()).unwrap();
        let df = ShearResponse::g1(node).unwrap().value(x.view()).unwrap();
        let dh = ShearResponse::g1(chained).unwrap().value(x.view()).unwrap();
        assert_relative_eq!(dh, 2.0 * f * df, epsilon = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // A response can itself be wrapped in a response.
    //
    // Given
    // -----
    // - `f = a·b²`, `r = df/dg1 = b³ − 2a²b`.
    //
    // Expect
    // ------
    // - `dr/dg1 = 3b²·(−a) + (−4ab)·b + (−2a²)·(−a) = −3ab² − 4ab² + 2a³`
    //   `= −7·2·9 + 16 = −110` at `x = (2, 3, 5, 7)`.
    fn second_order_response_nests() {
        let node = Arc::new(Poly::new(fixture_layout()));
        let r1 = Arc::new(ShearResponse::g1(node).unwrap());
        let rr = ShearResponse::g1(r1).unwrap();
        let x = array![2.0, 3.0, 5.0, 7.0];
        assert_relative_eq!(rr.value(x.view()).unwrap(), -110.0, epsilon = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Wrapping a node without a derivative rule fails at construction.
    fn missing_rule_is_capability_error() {
        let node = Arc::new(Flat::new(fixture_layout()));
        let err = ShearResponse::g1(node).unwrap_err();
        assert_eq!(err, PerturbError::MissingDerivativeRule { node: "Flat" });
    }
}
