//! optimization::errors — unified error surface for the MLE stack.
//!
//! Every failure raised while configuring the optimizer, evaluating a
//! log-likelihood, differentiating it numerically, or running the argmin
//! backend is normalized into [`OptError`]. Model-layer errors
//! ([`PoolError`]) are wrapped transparently so that `LogLikelihood`
//! implementations can use `?` on their own validation routines.
use argmin::core::{ArgminError, Error};
use thiserror::Error;

use crate::pooling::errors::PoolError;

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptError {
    // ---- Gradient ----
    /// Signals that finite differences should be used.
    #[error("Analytic gradient not implemented")]
    GradientNotImplemented,

    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- MLEOptions ----
    #[error("Invalid gradient tolerance {tol}: {reason}")]
    InvalidTolGrad { tol: f64, reason: &'static str },

    #[error("Invalid cost change tolerance {tol}: {reason}")]
    InvalidTolCost { tol: f64, reason: &'static str },

    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    #[error("No tolerances provided")]
    NoTolerancesProvided,

    #[error("Invalid line searcher '{name}': {reason}")]
    InvalidLineSearch { name: String, reason: &'static str },

    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    // ---- Cost function ----
    #[error("Non-finite cost value: {value}")]
    NonFiniteCost { value: f64 },

    // ---- Optimizer outcome ----
    #[error("Invalid estimated parameter at index {index}: {value}: {reason}")]
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    #[error("Missing estimated parameters (theta hat)")]
    MissingThetaHat,

    // ---- Argmin ----
    #[error("Invalid parameter: {text}")]
    InvalidParameter { text: String },

    #[error("Not implemented: {text}")]
    NotImplemented { text: String },

    #[error("Not initialized: {text}")]
    NotInitialized { text: String },

    #[error("Condition violated: {text}")]
    ConditionViolated { text: String },

    #[error("Checkpoint not found: {text}")]
    CheckPointNotFound { text: String },

    #[error("Potential bug: {text}")]
    PotentialBug { text: String },

    #[error("Impossible error: {text}")]
    ImpossibleError { text: String },

    #[error("Backend error: {text}")]
    BackendError { text: String },

    // ---- Finite differences ----
    #[error("Hessian dimension mismatch: expected ({expected}, {expected}), found {found:?}")]
    HessianDimMismatch { expected: usize, found: (usize, usize) },

    #[error("Invalid Hessian at ({row}, {col}): {value}, must be finite")]
    InvalidHessian { row: usize, col: usize, value: f64 },

    #[error("Invalid Hessian step option '{name}' = {value}: {reason}")]
    InvalidHessianStep { name: &'static str, value: f64, reason: &'static str },

    // ---- Box constraints ----
    #[error("Invalid bounds at index {index}: lower {lower} must be below upper {upper}")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },

    #[error("Value {value} at index {index} lies outside the open interval ({lower}, {upper})")]
    OutsideBounds { index: usize, value: f64, lower: f64, upper: f64 },

    #[error("Bound vector lengths differ: {lower} lower vs {upper} upper")]
    BoundLengthMismatch { lower: usize, upper: usize },

    // ---- Model layer ----
    #[error(transparent)]
    Pool(#[from] PoolError),

    // ---- Fallback ----
    #[error("Unknown error")]
    UnknownError,
}

impl From<Error> for OptError {
    /// Recover a crate error that travelled through argmin unchanged, then
    /// fall back to argmin's own error kinds.
    fn from(original_err: Error) -> Self {
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast::<ArgminError>() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // A crate error routed through argmin's `anyhow`-style error must come
    // back as the same `OptError`, not a stringly `BackendError`.
    fn opt_error_survives_round_trip_through_argmin_error() {
        // Arrange
        let original = OptError::NonFiniteCost { value: f64::INFINITY };
        let boxed: Error = original.clone().into();

        // Act
        let recovered = OptError::from(boxed);

        // Assert
        assert_eq!(recovered, original);
    }

    #[test]
    // Purpose
    // -------
    // Argmin's own error kinds map onto the dedicated wrapper variants.
    fn argmin_condition_violation_maps_to_wrapper_variant() {
        // Arrange
        let boxed: Error = ArgminError::ConditionViolated { text: "wolfe".to_string() }.into();

        // Act
        let recovered = OptError::from(boxed);

        // Assert
        assert_eq!(recovered, OptError::ConditionViolated { text: "wolfe".to_string() });
    }

    #[test]
    // Purpose
    // -------
    // Pool errors are wrapped transparently and keep their message.
    fn pool_error_is_wrapped_transparently() {
        // Arrange
        let pool_err = PoolError::EmptyData;

        // Act
        let opt_err: OptError = pool_err.clone().into();

        // Assert
        assert_eq!(opt_err.to_string(), pool_err.to_string());
    }
}
