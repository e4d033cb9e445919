//! Errors for the pooled-exposure models: input validation, regime and
//! stratification checks, sampling corrections, parameter layout, options,
//! simulation, and optimizer failures.
//!
//! ## Conventions
//! - **Indices are 0-based** pool positions in the caller's input order.
//! - Every variant is raised before optimization starts except
//!   [`PoolError::OptimizationFailed`], which wraps a backend failure on
//!   every optimizer attempt.
use thiserror::Error;

use crate::optimization::errors::OptError;

pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolError {
    // ---- Input/data validation ----
    #[error("Pooled data must contain at least one pool")]
    EmptyData,

    #[error("Pool {index}: pool size must be at least 1")]
    InvalidPoolSize { index: usize },

    #[error("Pool {index}: outcome must be 0 or 1, found {value}")]
    InvalidOutcome { index: usize, value: u8 },

    #[error("Pool {index}: at least one exposure measurement is required")]
    EmptyMeasurements { index: usize },

    #[error("Pool {index}: measurement {replicate} is not finite ({value})")]
    NonFiniteMeasurement { index: usize, replicate: usize, value: f64 },

    #[error("Pool {index}: measurement {replicate} must be positive for the gamma model ({value})")]
    NonPositiveMeasurement { index: usize, replicate: usize, value: f64 },

    #[error("Pool {index}: expected {expected} covariates, found {found}")]
    CovariateWidthMismatch { index: usize, expected: usize, found: usize },

    #[error("Pool {index}: covariate {column} is not finite ({value})")]
    NonFiniteCovariate { index: usize, column: usize, value: f64 },

    #[error("Column '{name}' has length {found}, expected {expected}")]
    ColumnLengthMismatch { name: &'static str, expected: usize, found: usize },

    // ---- Regime / stratification ----
    #[error("Unknown error regime '{name}': expected 'neither', 'processing', 'measurement' or 'both'")]
    InvalidRegime { name: String },

    #[error("Pool {index}: {replicates} replicates supplied but the regime assumes error-free measurements")]
    ReplicatesWithoutError { index: usize, replicates: usize },

    #[error("Pool {index}: {replicates} replicates of a single-specimen pool carry no processing error")]
    ReplicatedSingleton { index: usize, replicates: usize },

    // ---- Sampling correction / offsets ----
    #[error("Prevalence must lie strictly between 0 and 1, found {value}")]
    InvalidPrevalence { value: f64 },

    #[error("Sampling fraction {value} is invalid: {reason}")]
    InvalidSamplingFraction { value: f64, reason: &'static str },

    #[error("Prevalence and sampling fractions are mutually exclusive")]
    ConflictingSamplingCorrection,

    #[error("No pools of size {size} with outcome {outcome}: the case-control offset is undefined")]
    MissingOutcomeForPoolSize { size: usize, outcome: u8 },

    // ---- Layout / options ----
    #[error("'{name}' has length {found}, expected {expected}")]
    LengthMismatch { name: &'static str, expected: usize, found: usize },

    #[error("Parameter '{label}': lower bound {lower} must be below upper bound {upper}")]
    InvalidBounds { label: String, lower: f64, upper: f64 },

    #[error("Parameter '{label}': start value {value} lies outside ({lower}, {upper})")]
    StartOutsideBounds { label: String, value: f64, lower: f64, upper: f64 },

    #[error("Parameter '{label}': variance lower bound must be positive, found {lower}")]
    NonPositiveVarianceBound { label: String, lower: f64 },

    #[error("Jitter standard deviation must be finite and positive, found {value}")]
    InvalidJitter { value: f64 },

    #[error("Integration option '{name}' = {value} is invalid: {reason}")]
    InvalidIntegrationOption { name: &'static str, value: f64, reason: &'static str },

    #[error("Confidence level must lie strictly between 0 and 1, found {value}")]
    InvalidConfidenceLevel { value: f64 },

    // ---- Simulation ----
    #[error("Simulation setting '{name}' = {value} is invalid: {reason}")]
    InvalidSimParam { name: &'static str, value: f64, reason: &'static str },

    // ---- Optimizer ----
    #[error("Optimization failed: {reason}")]
    OptimizationFailed { reason: String },
}

impl From<OptError> for PoolError {
    fn from(err: OptError) -> Self {
        match err {
            OptError::Pool(inner) => inner,
            other => PoolError::OptimizationFailed { reason: other.to_string() },
        }
    }
}
