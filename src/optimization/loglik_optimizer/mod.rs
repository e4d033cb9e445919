//! loglik_optimizer — argmin-backed maximization of log-likelihoods.
//!
//! Purpose
//! -------
//! Let model code implement one trait, [`LogLikelihood`], and call
//! [`maximize`] to run L-BFGS with a configurable line search, stopping
//! rules, and finite-difference gradients when no analytic gradient exists.
//!
//! Key behaviors
//! -------------
//! - [`adapter::ArgMinAdapter`] turns `ℓ(u)` into argmin's cost `c(u) = -ℓ(u)`.
//! - [`maximize`] validates the start with [`LogLikelihood::check`], builds
//!   the solver ([`builders`]), runs it ([`run::run_lbfgs`]) and returns an
//!   [`OptimOutcome`].
//! - [`finite_diff`] provides gradient fallbacks and the Richardson Hessian
//!   used by the inference layer.
//!
//! Invariants & assumptions
//! ------------------------
//! - Parameters live in an unconstrained space; any box constraints are
//!   handled by the model through
//!   [`numerical_stability::box_transform`](crate::optimization::numerical_stability::box_transform).
//! - `value`/`grad` return `OptError` on invalid input instead of panicking.
//!
//! Conventions
//! -----------
//! - User-facing values (`OptimOutcome::value`) are log-likelihoods, never
//!   costs.
//! - `converged` means a tolerance was met; the iteration cap alone is not
//!   convergence.
//!
//! Testing notes
//! -------------
//! - Submodules test sign conventions, solver wiring, derivative helpers,
//!   and outcome invariants on toy likelihoods.

pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::finite_diff::{compute_hessian, HessianOptions};
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, FnEvalMap, Grad, Hessian, Theta, DEFAULT_LBFGS_MEM};

pub mod prelude {
    pub use super::api::maximize;
    pub use super::finite_diff::HessianOptions;
    pub use super::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
    pub use super::types::{Cost, Grad, Theta};
}
