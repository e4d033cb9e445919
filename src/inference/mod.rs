//! inference — variance-covariance matrices and derived-quantity variances.
//!
//! Purpose
//! -------
//! Post-estimation uncertainty for the pooled-exposure models: the observed
//! information at θ̂ from a Richardson-extrapolated numerical Hessian, its
//! inverse as the classical vcov, and delta-method variances for derived
//! quantities such as the log-odds-ratio.
//!
//! Key behaviors
//! -------------
//! - [`observed_information`] and [`invert_information`] produce a
//!   [`VcovEstimate`] that carries quality flags (non-positive variances,
//!   smallest eigenvalue) instead of failing on them.
//! - [`delta_method`] combines an analytic gradient with a vcov.
//! - [`InferenceError`] / [`InferenceResult`] report unusable Hessians;
//!   the fitting layer turns them into diagnostics and omits the vcov.
//!
//! Conventions
//! -----------
//! - Parameters are in **constrained model coordinates**, the same order as
//!   the fitted parameter layout.
//! - Functions are pure: no logging, no global state.
//!
//! Testing notes
//! -------------
//! - Unit tests check analytic inverses, rejection paths, flagged
//!   indefinite matrices, and the delta method against finite differences.

pub mod delta;
pub mod errors;
pub mod hessian;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::delta::{delta_method, delta_variance, DeltaEstimate};
pub use self::errors::{InferenceError, InferenceResult};
pub use self::hessian::{invert_information, observed_information, VcovEstimate};

pub mod prelude {
    pub use super::delta::{delta_method, DeltaEstimate};
    pub use super::errors::{InferenceError, InferenceResult};
    pub use super::hessian::{invert_information, observed_information, VcovEstimate};
}
