//! Unified error handling for inference routines.
//!
//! `InferenceError` covers failures of the post-estimation step: an
//! unusable numerical Hessian, a singular information matrix, and
//! dimension mismatches in the delta method. None of these abort a fit;
//! the fitting layer turns them into diagnostics and omits the affected
//! variances.
use thiserror::Error;

use crate::optimization::errors::OptError;

pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    // ---- Hessian / information matrix ----
    #[error("Inference Error: information matrix is {rows}x{cols}, expected {expected}x{expected}")]
    DimensionMismatch { expected: usize, rows: usize, cols: usize },

    #[error("Inference Error: information matrix contains non-finite entries")]
    NonFiniteInformation,

    #[error("Inference Error: information matrix is singular (eigenvalue ratio {ratio:e})")]
    SingularInformation { ratio: f64 },

    #[error("Inference Error: inverse information matrix contains non-finite entries")]
    NonFiniteVcov,

    #[error("Inference Error: numerical Hessian failed: {reason}")]
    Hessian { reason: String },

    // ---- Delta method ----
    #[error("Inference Error: gradient has length {found}, expected {expected}")]
    GradientLengthMismatch { expected: usize, found: usize },

    #[error("Inference Error: gradient of the derived quantity is not finite")]
    NonFiniteGradient,
}

impl From<OptError> for InferenceError {
    fn from(err: OptError) -> Self {
        InferenceError::Hessian { reason: err.to_string() }
    }
}
