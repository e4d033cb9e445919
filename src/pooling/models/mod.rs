//! models — pooled likelihoods, the optimizer driver, and fitting.
//!
//! Purpose
//! -------
//! Implement the two pooled-exposure families on top of `pooling::core` and
//! the generic log-likelihood optimizer, and expose the user-facing fitting
//! entry points.
//!
//! Key behaviors
//! -------------
//! - [`likelihood`]: the [`PooledFamily`] trait, per-stratum results, and
//!   the bounded adapter the optimizer sees.
//! - [`logreg`] and [`gdfa`]: pooled logistic regression and the gamma
//!   discriminant-function approach.
//! - [`driver`]: L-BFGS over the box with one jittered restart.
//! - [`fit`]: [`fit_logreg_xerrors`], [`fit_gdfa_xerrors`], and
//!   [`FitResult`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Models are built once per fit; likelihood evaluation only reads them.
//! - θ handed to a family is in constrained model coordinates and ordered
//!   by its [`ParamLayout`](crate::pooling::core::layout::ParamLayout).

pub mod driver;
pub mod fit;
pub mod gdfa;
pub mod likelihood;
pub mod logreg;

pub use self::driver::{optimize, DriverOutcome, RestartState};
pub use self::fit::{fit_gdfa_xerrors, fit_logreg_xerrors, Diagnostic, FitResult};
pub use self::gdfa::{GammaDfaModel, GammaDfaParams};
pub use self::likelihood::{BoundedLikelihood, LogLikEvaluation, PooledFamily, StratumTerm};
pub use self::logreg::{LogisticParams, PooledLogisticModel};

pub mod prelude {
    pub use super::fit::{fit_gdfa_xerrors, fit_logreg_xerrors, Diagnostic, FitResult};
    pub use super::likelihood::PooledFamily;
}
