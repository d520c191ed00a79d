//! perturb — shear-response and noise-bias calculus over moment observables.
//!
//! Purpose
//! -------
//! Provide the system-independent layer of the estimator: the moment-index
//! table, the [`Observable`] node contract, explicit parent/child
//! composition, and the two perturbation wrappers that turn any observable
//! into its shear response ([`ShearResponse`]) or its second-order
//! noise-bias correction ([`NoiseBias`]).
//!
//! Key behaviors
//! -------------
//! - Nodes are plain immutable structs generic over nothing but their
//!   derivative rule; wrappers hold their inner node through `Arc`, so one
//!   estimator can be shared by its response, its noise bias, and the noise
//!   bias of its response.
//! - Wrappers are observables themselves and nest without limit. Each level
//!   adds one dual-number layer to the scalar type the wrapped node is
//!   evaluated on.
//! - Every capability and shape requirement is checked when a wrapper is
//!   built, never during evaluation.
//!
//! Invariants & assumptions
//! ------------------------
//! - A node and everything it is composed with share one [`MomentLayout`].
//! - Composition is bottom-up; no node holds a reference to a node built
//!   after it, so composition graphs are acyclic.
//! - Evaluation has no side effects and holds no per-row state, so nodes are
//!   `Send + Sync` whenever their rule is and may be evaluated concurrently.
//!
//! Conventions
//! -----------
//! - Row batches are `rows × layout.len()` `ndarray` matrices; outputs are
//!   one value per row.
//! - Errors are reported as [`PerturbError`] through [`PerturbResult`].
//!
//! Downstream usage
//! ----------------
//! - A concrete measurement system (see `crate::fpfs`) supplies a layout, a
//!   [`DerivativeRule`], and observables; it then wraps them with
//!   [`ShearResponse`] and [`NoiseBias`].
//!
//! Testing notes
//! -------------
//! - Shared fixtures with closed-form derivatives live in a test-only
//!   `fixtures` module and are used by the response and noise-bias tests.

pub mod chain;
pub mod errors;
pub mod layout;
pub mod noise;
pub mod observable;
pub mod response;
pub mod validation;

#[cfg(test)]
mod fixtures;

pub use self::chain::{Chained, Link};
pub use self::errors::{PerturbError, PerturbResult};
pub use self::layout::MomentLayout;
pub use self::noise::{CovarianceMatrix, NoiseBias};
pub use self::observable::{DerivativeRule, NoRule, Observable, ShearComponent};
pub use self::response::ShearResponse;
