//! Numerically stable scalar transforms.
//!
//! Guarded forms of softplus, the logistic function, and their inverses.
//! The `20.0` cutoffs keep `f64` arithmetic away from overflow: beyond it
//! `ln(1 + eˣ)` equals `x` to machine precision.

/// Cutoff above which `softplus(x) == x` in `f64`.
const SOFTPLUS_CUTOFF: f64 = 20.0;

/// `softplus(x) = ln(1 + eˣ)`, mapping ℝ → (0, ∞) without overflow.
pub fn safe_softplus(x: f64) -> f64 {
    if x > SOFTPLUS_CUTOFF { x } else { x.exp().ln_1p() }
}

/// Inverse of softplus on `(0, ∞)`: `ln(eˣ − 1)`.
///
/// `x` must be finite and `> 0`; `x == 0` maps to `−∞`.
pub fn safe_softplus_inv(x: f64) -> f64 {
    if x > SOFTPLUS_CUTOFF { x } else { x.exp_m1().ln() }
}

/// Logistic function `1 / (1 + e⁻ˣ)`, evaluated on the side that cannot
/// overflow.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln(logistic(x)) = −softplus(−x)`; finite for all finite `x`.
pub fn log_logistic(x: f64) -> f64 {
    -safe_softplus(-x)
}

/// Logit `ln(p / (1 − p))` for `p ∈ (0, 1)`.
pub fn safe_logit(p: f64) -> f64 {
    p.ln() - (-p).ln_1p()
}

/// Bernoulli log-probability of `y ∈ {0, 1}` under success logit `eta`.
pub fn bernoulli_logit_ln_pmf(y: f64, eta: f64) -> f64 {
    if y > 0.5 { log_logistic(eta) } else { log_logistic(-eta) }
}
