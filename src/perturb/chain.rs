//! perturb::chain — parent/child composition of observables.
//!
//! A [`Chained`] node owns shared references to a child node and its parent
//! and combines their values with an explicit [`Link`]. Both read the raw
//! moment vector; the link is the only place their outputs meet. Parents
//! are shared (`Arc`), never mutated, and cannot form cycles because a
//! chain is built bottom-up from already-constructed nodes.
use crate::{
    autodiff::{Differentiable, Real},
    perturb::{
        errors::PerturbResult,
        layout::MomentLayout,
        observable::{Observable, ensure_same_layout, merge_modes},
    },
};
use std::sync::Arc;

/// How a child's value combines with its parent's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// `child · parent` (e.g. an estimator times a selection weight).
    Product,
    /// `child + parent`.
    Sum,
    /// `child / parent`.
    Ratio,
}

impl Link {
    fn apply<T: Real>(self, child: T, parent: T) -> T {
        match self {
            Link::Product => child * parent,
            Link::Sum => child + parent,
            Link::Ratio => child / parent,
        }
    }
}

/// A node evaluated together with its parent.
#[derive(Debug)]
pub struct Chained<N, P> {
    node: Arc<N>,
    parent: Arc<P>,
    link: Link,
    modes: Vec<usize>,
}

impl<N, P> Chained<N, P>
where
    N: Observable,
    P: Observable<Rule = N::Rule>,
{
    /// Compose `node` with `parent`.
    ///
    /// # Errors
    /// [`PerturbError::LayoutMismatch`](crate::perturb::errors::PerturbError::LayoutMismatch)
    /// if the two nodes were built on different moment layouts.
    pub fn new(node: Arc<N>, parent: Arc<P>, link: Link) -> PerturbResult<Self> {
        ensure_same_layout(node.layout(), parent.layout())?;
        let modes = merge_modes(node.modes().into_iter().chain(parent.modes()));
        tracing::debug!(node = node.name(), parent = parent.name(), ?link, "chained observable");
        Ok(Self { node, parent, link, modes })
    }

    pub fn node(&self) -> &Arc<N> {
        &self.node
    }

    pub fn parent(&self) -> &Arc<P> {
        &self.parent
    }

    pub fn link(&self) -> Link {
        self.link
    }
}

impl<N, P> Differentiable for Chained<N, P>
where
    N: Observable,
    P: Observable<Rule = N::Rule>,
{
    fn eval<T: Real>(&self, x: &[T]) -> T {
        self.link.apply(self.node.eval(x), self.parent.eval(x))
    }
}

impl<N, P> Observable for Chained<N, P>
where
    N: Observable,
    P: Observable<Rule = N::Rule>,
{
    type Rule = N::Rule;

    fn name(&self) -> &'static str {
        "Chained"
    }

    fn layout(&self) -> &Arc<MomentLayout> {
        self.node.layout()
    }

    fn modes(&self) -> Vec<usize> {
        self.modes.clone()
    }

    fn derivative_rule(&self) -> Option<&Self::Rule> {
        self.node.derivative_rule().or_else(|| self.parent.derivative_rule())
    }

    fn hessian_capable(&self) -> bool {
        self.node.hessian_capable() && self.parent.hessian_capable()
    }
}
