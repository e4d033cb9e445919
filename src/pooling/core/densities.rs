//! Log-densities and closed-form approximations used by the likelihoods.
//!
//! `statrs::distribution::{Normal, LogNormal, Gamma}` provide the same
//! log-densities through `Continuous::ln_pdf`, but each call would first
//! build and validate a distribution object. The versions here are called
//! once per quadrature node, so they are written out directly, use
//! `statrs::function::gamma::ln_gamma`, and are tested against the `statrs`
//! distributions. All functions return `−∞` (not NaN) when an argument
//! leaves the support, so callers can treat the result as a log-density
//! without extra branching.
use statrs::function::gamma::ln_gamma;
use std::f64::consts::PI;

use crate::optimization::numerical_stability::transformations::log_logistic;

/// `ln √(2π)`.
pub const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Normal log-density with mean `mean` and variance `var > 0`.
pub fn ln_normal_pdf(x: f64, mean: f64, var: f64) -> f64 {
    if var <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let d = x - mean;
    -LN_SQRT_2PI - 0.5 * var.ln() - 0.5 * d * d / var
}

/// Log-normal log-density: `ln x ~ N(mu_log, var_log)`.
pub fn ln_lognormal_pdf(x: f64, mu_log: f64, var_log: f64) -> f64 {
    if x <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let lx = x.ln();
    ln_normal_pdf(lx, mu_log, var_log) - lx
}

/// Gamma log-density with shape `a > 0` and scale `s > 0`.
pub fn ln_gamma_pdf(x: f64, shape: f64, scale: f64) -> f64 {
    if x <= 0.0 || shape <= 0.0 || scale <= 0.0 {
        return f64::NEG_INFINITY;
    }
    (shape - 1.0) * x.ln() - x / scale - ln_gamma(shape) - shape * scale.ln()
}

/// Log-density of `k` exchangeable normal measurements with common mean
/// `mean`, shared variance component `shared_var` and independent component
/// `idio_var`, i.e. covariance `shared_var·J + idio_var·I`.
///
/// Uses the closed-form determinant `idio^(k−1)·(idio + k·shared)` and the
/// Sherman–Morrison inverse, so cost is linear in `k`.
pub fn ln_mvn_compound_symmetric(xs: &[f64], mean: f64, shared_var: f64, idio_var: f64) -> f64 {
    let k = xs.len();
    if k == 1 {
        return ln_normal_pdf(xs[0], mean, shared_var + idio_var);
    }
    if idio_var <= 0.0 || shared_var < 0.0 {
        return f64::NEG_INFINITY;
    }
    let kf = k as f64;
    let denom = idio_var + kf * shared_var;
    let (sum_d, sum_d2) = xs.iter().fold((0.0, 0.0), |(s, s2), &x| {
        let d = x - mean;
        (s + d, s2 + d * d)
    });
    let quad = (sum_d2 - shared_var * sum_d * sum_d / denom) / idio_var;
    let log_det = (kf - 1.0) * idio_var.ln() + denom.ln();
    -kf * LN_SQRT_2PI - 0.5 * log_det - 0.5 * quad
}

/// Normal posterior of a latent mean given `k` independent measurements.
///
/// Prior `N(prior_mean, prior_var)`, measurements `x_r | X ~ N(X, noise_var)`.
/// Returns `(mean, variance)`.
pub fn normal_posterior(prior_mean: f64, prior_var: f64, xs: &[f64], noise_var: f64) -> (f64, f64) {
    let k = xs.len() as f64;
    let sum: f64 = xs.iter().sum();
    let v = 1.0 / (1.0 / prior_var + k / noise_var);
    let m = v * (prior_mean / prior_var + sum / noise_var);
    (m, v)
}

/// `ln P(Y = y)` when `logit P(Y = 1 | X) = a + b·X` and `X ~ N(m, v)`,
/// using the probit-matching approximation
/// `E[expit(a + bX)] ≈ expit((a + b·m) / √(1 + π b² v / 8))`.
pub fn ln_logistic_normal_approx(y: u8, a: f64, b: f64, m: f64, v: f64) -> f64 {
    let z = (a + b * m) / (1.0 + PI * b * b * v / 8.0).sqrt();
    if y == 1 { log_logistic(z) } else { log_logistic(-z) }
}

/// Gamma `(shape, scale)` with the given mean and variance.
pub fn gamma_moment_match(mean: f64, var: f64) -> (f64, f64) {
    (mean * mean / var, var / mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use statrs::distribution::{Continuous, Gamma, LogNormal, Normal};

    #[test]
    // Purpose
    // -------
    // Hand-written univariate log-densities agree with `statrs`.
    fn univariate_log_densities_match_statrs() {
        let normal = Normal::new(0.3, 1.7).unwrap();
        assert_relative_eq!(ln_normal_pdf(1.1, 0.3, 1.7 * 1.7), normal.ln_pdf(1.1), max_relative = 1e-12);

        // statrs Gamma is parameterized by rate.
        let gamma = Gamma::new(2.5, 1.0 / 0.8).unwrap();
        assert_relative_eq!(ln_gamma_pdf(1.9, 2.5, 0.8), gamma.ln_pdf(1.9), max_relative = 1e-10);

        let lognormal = LogNormal::new(-0.2, 0.5).unwrap();
        assert_relative_eq!(
            ln_lognormal_pdf(0.7, -0.2, 0.25),
            lognormal.ln_pdf(0.7),
            max_relative = 1e-12
        );
        assert_eq!(ln_gamma_pdf(-1.0, 2.0, 1.0), f64::NEG_INFINITY);
    }

    #[test]
    // Purpose
    // -------
    // The compound-symmetric closed form equals a dense Cholesky evaluation.
    //
    // Given
    // -----
    // - Three measurements, shared variance 0.6, idiosyncratic 0.25.
    //
    // Expect
    // ------
    // - Same log-density as `−(k/2)ln 2π − ½ln|Σ| − ½dᵀΣ⁻¹d` computed densely.
    fn compound_symmetric_density_matches_dense_computation() {
        // Arrange
        let xs = [0.4, 1.2, 0.9];
        let (mean, shared, idio) = (0.7, 0.6, 0.25);
        let k = xs.len();
        let sigma = DMatrix::from_fn(k, k, |i, j| shared + if i == j { idio } else { 0.0 });
        let d = DVector::from_iterator(k, xs.iter().map(|x| x - mean));

        // Act
        let closed = ln_mvn_compound_symmetric(&xs, mean, shared, idio);
        let chol = sigma.cholesky().unwrap();
        let log_det = 2.0 * chol.l().diagonal().iter().map(|v| v.ln()).sum::<f64>();
        let quad = d.dot(&chol.solve(&d));
        let dense = -(k as f64) * LN_SQRT_2PI - 0.5 * log_det - 0.5 * quad;

        // Assert
        assert_relative_eq!(closed, dense, max_relative = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // The posterior reduces to the prior without information and the
    // approximation is exact when the latent variance vanishes.
    fn posterior_and_probit_approximation_limits() {
        let (m, v) = normal_posterior(1.0, 2.0, &[3.0, 5.0], 1e12);
        assert_relative_eq!(m, 1.0, max_relative = 1e-9);
        assert_relative_eq!(v, 2.0, max_relative = 1e-9);

        let exact = log_logistic(0.2 + 1.5 * 0.4);
        assert_relative_eq!(ln_logistic_normal_approx(1, 0.2, 1.5, 0.4, 0.0), exact, max_relative = 1e-14);
    }

    #[test]
    fn gamma_moment_match_recovers_moments() {
        let (a, s) = gamma_moment_match(2.0, 0.5);
        assert_relative_eq!(a * s, 2.0, max_relative = 1e-14);
        assert_relative_eq!(a * s * s, 0.5, max_relative = 1e-14);
    }
}
