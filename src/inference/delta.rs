//! inference::delta — delta-method variances of derived quantities.
//!
//! For a smooth scalar `h(θ)` with gradient `∇h(θ̂)` and a variance-covariance
//! matrix `V` of θ̂, `Var(h(θ̂)) ≈ ∇hᵀ V ∇h`. Model layers supply the
//! analytic gradient (for example `(−1/b0², +1/b1²)` on `(b0, b1)` for the
//! gamma log-odds-ratio); this module only does the quadratic form and its
//! shape checks.
use ndarray::{Array1, Array2};

use crate::inference::errors::{InferenceError, InferenceResult};

/// A derived scalar with its delta-method variance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaEstimate {
    pub estimate: f64,
    pub variance: f64,
}

impl DeltaEstimate {
    pub fn std_error(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }
}

/// `∇hᵀ V ∇h`.
///
/// Errors
/// ------
/// - `InferenceError::GradientLengthMismatch` when `grad` and `vcov`
///   disagree in dimension.
/// - `InferenceError::NonFiniteGradient` for NaN/∞ gradient entries.
pub fn delta_variance(vcov: &Array2<f64>, grad: &Array1<f64>) -> InferenceResult<f64> {
    if vcov.nrows() != grad.len() || vcov.ncols() != grad.len() {
        return Err(InferenceError::GradientLengthMismatch {
            expected: vcov.nrows(),
            found: grad.len(),
        });
    }
    if grad.iter().any(|g| !g.is_finite()) {
        return Err(InferenceError::NonFiniteGradient);
    }
    Ok(grad.dot(&vcov.dot(grad)))
}

/// Evaluate `h` at θ̂ and attach its delta-method variance.
pub fn delta_method(
    estimate: f64, vcov: &Array2<f64>, grad: &Array1<f64>,
) -> InferenceResult<DeltaEstimate> {
    Ok(DeltaEstimate { estimate, variance: delta_variance(vcov, grad)? })
}
