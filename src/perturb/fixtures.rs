//! Small hand-written observables shared by the perturbation unit tests.
use crate::{
    autodiff::{Differentiable, Real},
    perturb::{
        layout::MomentLayout,
        observable::{DerivativeRule, NoRule, Observable, ShearComponent},
    },
};
use std::sync::Arc;

/// Layout `(a, b, c, d)`.
pub fn fixture_layout() -> Arc<MomentLayout> {
    Arc::new(MomentLayout::new(["a", "b", "c", "d"]).unwrap())
}

/// `da/dg1 = b`, `db/dg1 = −a`, `da/dg2 = c`; everything else zero.
#[derive(Debug, Clone)]
pub struct FixtureRule;

impl DerivativeRule for FixtureRule {
    fn d_moment_dg<T: Real>(&self, x: &[T], index: usize, component: ShearComponent) -> T {
        match (index, component) {
            (0, ShearComponent::G1) => x[1].clone(),
            (1, ShearComponent::G1) => -x[0].clone(),
            (0, ShearComponent::G2) => x[2].clone(),
            _ => T::zero(),
        }
    }

    fn dependencies(&self, index: usize, component: ShearComponent) -> Vec<usize> {
        match (index, component) {
            (0, ShearComponent::G1) => vec![1],
            (1, ShearComponent::G1) => vec![0],
            (0, ShearComponent::G2) => vec![2],
            _ => Vec::new(),
        }
    }
}

/// `f = a · b²`.
#[derive(Debug)]
pub struct Poly {
    layout: Arc<MomentLayout>,
    rule: FixtureRule,
}

impl Poly {
    pub fn new(layout: Arc<MomentLayout>) -> Self {
        Self { layout, rule: FixtureRule }
    }
}

impl Differentiable for Poly {
    fn eval<T: Real>(&self, x: &[T]) -> T {
        x[0].clone() * x[1].clone() * x[1].clone()
    }
}

impl Observable for Poly {
    type Rule = FixtureRule;

    fn name(&self) -> &'static str {
        "Poly"
    }

    fn layout(&self) -> &Arc<MomentLayout> {
        &self.layout
    }

    fn modes(&self) -> Vec<usize> {
        vec![0, 1]
    }

    fn derivative_rule(&self) -> Option<&FixtureRule> {
        Some(&self.rule)
    }
}

/// `f = d`, with no derivative rule and no registered Hessian.
#[derive(Debug)]
pub struct Flat {
    layout: Arc<MomentLayout>,
}

impl Flat {
    pub fn new(layout: Arc<MomentLayout>) -> Self {
        Self { layout }
    }
}

impl Differentiable for Flat {
    fn eval<T: Real>(&self, x: &[T]) -> T {
        x[3].clone()
    }
}

impl Observable for Flat {
    type Rule = NoRule;

    fn name(&self) -> &'static str {
        "Flat"
    }

    fn layout(&self) -> &Arc<MomentLayout> {
        &self.layout
    }

    fn modes(&self) -> Vec<usize> {
        vec![3]
    }

    fn derivative_rule(&self) -> Option<&NoRule> {
        None
    }

    fn hessian_capable(&self) -> bool {
        false
    }
}
