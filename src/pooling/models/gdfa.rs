//! Gamma discriminant-function approach for pooled exposures.
//!
//! Purpose
//! -------
//! Evaluate the outcome-conditional log-likelihood `ln f(x̃ | y, c)` under
//! `X | Y=y, C ~ Gamma(shape = exp(γ0 + γcᵀC), scale = b_y)`, whose implied
//! log-odds-ratio per unit exposure is `1/b0 − 1/b1`.
//!
//! Key behaviors
//! -------------
//! - Pools are homogeneous in `C`, so the pool average is
//!   `X̄ | y, c ~ Gamma(A, S)` with `A = g·exp(γ0 + γcᵀc)`, `S = b_y/g`.
//! - Errors are multiplicative and unit-mean:
//!   `ln x̃_r | X̄ ~ N(ln X̄ − τ²/2, τ²)`.
//! - Exact stratum: `ln Gamma(x̃; A, S)`.
//! - Contaminated, approximate: the replicate mean is treated as gamma with
//!   mean `A·S` and variance `A·S² + (A·S² + A²·S²)(e^{τ²} − 1)/k`.
//! - Contaminated, exact: `∫ Gamma(X̄; A, S) Π LogN(x̃_r; X̄, τ²) dX̄`,
//!   integrated in `w = ln X̄`. The integrand is centred at its mode,
//!   scaled by its curvature, and shifted by its peak value, so the mapped
//!   integrand is at most one and looks like a standard normal bump
//!   wherever the replicates sit relative to the gamma mass.
//!
//! Invariants & assumptions
//! ------------------------
//! - All measurements are strictly positive (checked in
//!   [`GammaDfaModel::new`]).
//! - No offsets and no sampling correction: the likelihood conditions on
//!   the outcome.
use ndarray::{s, Array1, ArrayView1};

use crate::pooling::{
    core::{
        data::PoolData,
        densities::{gamma_moment_match, ln_gamma_pdf, ln_lognormal_pdf},
        layout::{ErrorVariances, ModelFamily, ParamLayout},
        options::{IntegrationOptions, XErrorsOptions},
        quadrature::{integrate_latent, Integral, LatentDomain},
        strata::{stratify, Strata, Stratum, StratumSlice},
    },
    errors::PoolResult,
    models::likelihood::PooledFamily,
};

const MODE_MAX_ITER: usize = 200;
// Largest Newton step on the log scale.
const MODE_MAX_STEP: f64 = 1.0;

/// Decoded gamma-family parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GammaDfaParams {
    pub gamma_0: f64,
    pub gamma_c: Array1<f64>,
    pub b1: f64,
    pub b0: f64,
    pub errors: ErrorVariances,
}

/// Gamma DFA model bound to one data set.
#[derive(Debug, Clone)]
pub struct GammaDfaModel {
    layout: ParamLayout,
    strata: Strata,
    approx_integral: bool,
    constant_pe: bool,
    integration: IntegrationOptions,
}

impl GammaDfaModel {
    /// Errors
    /// ------
    /// - `PoolError::NonPositiveMeasurement` for any `x̃ <= 0`.
    /// - Stratification errors for replicates inconsistent with the regime.
    pub fn new(data: &PoolData, opts: &XErrorsOptions) -> PoolResult<Self> {
        data.require_positive_measurements()?;
        let strata = stratify(data, opts.regime, None)?;
        let layout =
            ParamLayout::new(ModelFamily::GammaDfa, opts.regime, opts.flags, data.n_covariates());
        Ok(GammaDfaModel {
            layout,
            strata,
            approx_integral: opts.approx_integral,
            constant_pe: opts.flags.constant_pe,
            integration: opts.integration,
        })
    }

    fn contaminated_ln_lik(&self, shape: f64, scale: f64, tau2: f64, xs: &[f64]) -> f64 {
        let k = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / k;
        if self.approx_integral {
            let mean = shape * scale;
            let s2 = scale * scale;
            let var = shape * s2 + (shape * s2 + shape * shape * s2) * tau2.exp_m1() / k;
            let (a, b) = gamma_moment_match(mean, var);
            return ln_gamma_pdf(mean_x, a, b);
        }
        let (mode, curvature) = log_mean_mode(shape, scale, tau2, xs);
        let sd = curvature.sqrt().recip();
        let h = |w: f64| {
            let v = ln_gamma_pdf(w.exp(), shape, scale)
                + xs.iter().map(|&x| ln_lognormal_pdf(x, w - 0.5 * tau2, tau2)).sum::<f64>()
                + w;
            if v.is_nan() { f64::NEG_INFINITY } else { v }
        };
        let peak = h(mode);
        let integral = integrate_latent(
            LatentDomain::SymmetricUnit,
            |z| h(mode + sd * z) - peak,
            &self.integration,
        );
        match integral {
            Integral::Value(i) => peak + sd.ln() + i.ln(),
            Integral::Degenerate => f64::NEG_INFINITY,
        }
    }
}

/// Mode and curvature of the log-integrand in `w = ln X̄`,
/// `h(w) = ln Gamma(e^w; A, S) + Σ ln LogN(x̃_r; w − τ²/2, τ²) + w`.
///
/// `h'(w) = A − e^w/S + k(c − w)/τ²` with `c` the mean of `ln x̃_r + τ²/2`,
/// and `h'' = −e^w/S − k/τ² < 0`, so `h` is strictly concave and Newton
/// from `c` converges monotonically once it passes the root.
fn log_mean_mode(shape: f64, scale: f64, tau2: f64, xs: &[f64]) -> (f64, f64) {
    let k = xs.len() as f64;
    let centre = xs.iter().map(|x| x.ln()).sum::<f64>() / k + 0.5 * tau2;
    let slope = |w: f64| shape - w.exp() / scale + k * (centre - w) / tau2;
    let curvature = |w: f64| w.exp() / scale + k / tau2;
    let mut w = centre;
    for _ in 0..MODE_MAX_ITER {
        let step = (slope(w) / curvature(w)).clamp(-MODE_MAX_STEP, MODE_MAX_STEP);
        w += step;
        if step.abs() <= 1e-12 * (1.0 + w.abs()) {
            break;
        }
    }
    (w, curvature(w))
}

impl PooledFamily for GammaDfaModel {
    type Params = GammaDfaParams;

    fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    fn strata(&self) -> &Strata {
        &self.strata
    }

    fn decode(&self, theta: ArrayView1<f64>) -> GammaDfaParams {
        let p = self.layout.n_covariates();
        GammaDfaParams {
            gamma_0: theta[0],
            gamma_c: theta.slice(s![1..1 + p]).to_owned(),
            b1: theta[1 + p],
            b0: theta[2 + p],
            errors: self.layout.error_variances(theta),
        }
    }

    fn unit_ln_lik(&self, p: &GammaDfaParams, slice: &StratumSlice, row: usize) -> f64 {
        let size = slice.sizes[row];
        let g = size as f64;
        let y = slice.outcomes[row];
        let c = slice.covariates.row(row);
        let shape = g * (p.gamma_0 + p.gamma_c.dot(&c)).exp();
        let scale = (if y == 1 { p.b1 } else { p.b0 }) / g;
        let xs = &slice.xtilde[row];
        match slice.stratum {
            Stratum::Exact => ln_gamma_pdf(xs[0], shape, scale),
            Stratum::Replicated | Stratum::SingleSurrogate => {
                let tau2 = p.errors.total(size, y, self.constant_pe);
                self.contaminated_ln_lik(shape, scale, tau2, xs)
            }
        }
    }

    /// `log OR = 1/b0 − 1/b1`.
    fn log_or(&self, theta: ArrayView1<f64>) -> (f64, Array1<f64>) {
        let p = self.layout.n_covariates();
        let (i1, i0) = (1 + p, 2 + p);
        let (b1, b0) = (theta[i1], theta[i0]);
        let mut grad = Array1::zeros(theta.len());
        grad[i1] = 1.0 / (b1 * b1);
        grad[i0] = -1.0 / (b0 * b0);
        (1.0 / b0 - 1.0 / b1, grad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pooling::{
        core::{
            data::Pool,
            regime::{ErrorFlags, ErrorRegime},
        },
        errors::PoolError,
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    fn data() -> PoolData {
        PoolData::new(vec![
            Pool::new(1, 1, vec![1.4], vec![]),
            Pool::new(2, 1, vec![1.2], vec![]),
            Pool::new(1, 0, vec![0.7], vec![]),
            Pool::new(3, 0, vec![0.9], vec![]),
        ])
        .unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Without error the likelihood is the sum of pooled gamma log-densities.
    fn neither_regime_is_sum_of_pooled_gamma_densities() {
        // Arrange
        let data = PoolData::new(vec![
            Pool::new(1, 1, vec![1.4], vec![]),
            Pool::new(2, 0, vec![0.8], vec![]),
        ])
        .unwrap();
        let model = GammaDfaModel::new(&data, &XErrorsOptions::default()).unwrap();
        let theta = array![0.4, 1.5, 0.9];

        // Act
        let value = model.evaluate(theta.view()).total();

        // Assert
        let a = 0.4f64.exp();
        let expected = ln_gamma_pdf(1.4, a, 1.5) + ln_gamma_pdf(0.8, 2.0 * a, 0.9 / 2.0);
        assert_relative_eq!(value, expected, max_relative = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Approximate and exact modes agree as the error variance vanishes and
    // the approximation is close for moderate error.
    //
    // Given
    // -----
    // - Single-surrogate pools under `measurement`; with one measurement
    //   both modes describe the density of the same quantity.
    fn approximate_and_exact_modes_converge() {
        // Arrange
        let data = data();
        let opts = XErrorsOptions::new(ErrorRegime::Measurement, ErrorFlags::default());
        let approx = GammaDfaModel::new(&data, &opts).unwrap();
        let exact = GammaDfaModel::new(&data, &opts.clone().with_exact_integral()).unwrap();

        for (tau2, tol) in [(1e-6, 1e-3), (0.05, 0.15)] {
            let theta = array![0.8, 1.2, 0.6, tau2];

            // Act
            let a = approx.evaluate(theta.view());
            let e = exact.evaluate(theta.view());

            // Assert
            assert!(!a.is_degenerate() && !e.is_degenerate());
            assert!((a.total() - e.total()).abs() < tol, "tau2 = {tau2}");
        }
    }

    /// `ln ∫ Gamma(X̄; A, S) Π LogN(x̃_r; X̄, τ²) dX̄` by log-sum-exp over a
    /// fine grid in `ln X̄`.
    fn brute_force_ln_lik(shape: f64, scale: f64, tau2: f64, xs: &[f64]) -> f64 {
        let dw = 1e-4;
        let values: Vec<f64> = (0..300_000)
            .map(|i| {
                let w = -15.0 + i as f64 * dw;
                ln_gamma_pdf(w.exp(), shape, scale)
                    + xs.iter().map(|&x| ln_lognormal_pdf(x, w - 0.5 * tau2, tau2)).sum::<f64>()
                    + w
            })
            .collect();
        let top = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        top + (values.iter().map(|v| (v - top).exp()).sum::<f64>() * dw).ln()
    }

    #[test]
    // Purpose
    // -------
    // Exact mode stays finite and accurate when the measurements sit far
    // from the bulk of the pooled gamma density.
    //
    // Given
    // -----
    // - θ = (γ0 = 6, b1 = b0 = 0.05, σ²m = 0.5): `X̄` has mean ≈ 20 while
    //   the measurements are near 1.
    // - One replicated case pool and one single-surrogate control pool.
    //
    // Expect
    // ------
    // - No degenerate stratum; the total equals a brute-force grid integral.
    fn exact_mode_handles_measurements_far_from_gamma_mass() {
        // Arrange
        let data = PoolData::new(vec![
            Pool::new(2, 1, vec![0.8, 1.3], vec![]),
            Pool::new(1, 0, vec![1.0], vec![]),
        ])
        .unwrap();
        let opts = XErrorsOptions::new(ErrorRegime::Measurement, ErrorFlags::default())
            .with_exact_integral();
        let model = GammaDfaModel::new(&data, &opts).unwrap();
        let theta = array![6.0, 0.05, 0.05, 0.5];

        // Act
        let eval = model.evaluate(theta.view());

        // Assert
        assert!(!eval.is_degenerate(), "{:?}", eval.terms());
        let a = 6.0f64.exp();
        let expected = brute_force_ln_lik(2.0 * a, 0.05 / 2.0, 0.5, &[0.8, 1.3])
            + brute_force_ln_lik(a, 0.05, 0.5, &[1.0]);
        assert_relative_eq!(eval.total(), expected, max_relative = 1e-6);
    }

    #[test]
    fn log_mean_mode_zeroes_the_slope() {
        let (shape, scale, tau2, xs) = (50.0, 0.4, 0.1, [0.9, 1.6, 1.1]);
        let (w, curvature) = log_mean_mode(shape, scale, tau2, &xs);
        let centre = xs.iter().map(|x: &f64| x.ln()).sum::<f64>() / 3.0 + 0.05;
        let slope = shape - w.exp() / scale + 3.0 * (centre - w) / tau2;
        assert!(slope.abs() < 1e-8, "slope {slope}");
        assert_relative_eq!(curvature, w.exp() / scale + 30.0, max_relative = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // The log-OR gradient is analytic in (b1, b0) and zero elsewhere.
    fn log_or_and_gradient() {
        let data = data();
        let opts = XErrorsOptions::new(ErrorRegime::Measurement, ErrorFlags::default());
        let model = GammaDfaModel::new(&data, &opts).unwrap();
        let (log_or, grad) = model.log_or(array![0.1, 2.0, 0.5, 0.2].view());
        assert_relative_eq!(log_or, 2.0 - 0.5);
        assert_relative_eq!(grad[1], 0.25);
        assert_relative_eq!(grad[2], -4.0);
        assert_eq!((grad[0], grad[3]), (0.0, 0.0));
    }

    #[test]
    fn non_positive_measurements_are_rejected() {
        let data = PoolData::new(vec![
            Pool::new(1, 1, vec![0.0], vec![]),
            Pool::new(1, 0, vec![0.5], vec![]),
        ])
        .unwrap();
        assert!(matches!(
            GammaDfaModel::new(&data, &XErrorsOptions::default()),
            Err(PoolError::NonPositiveMeasurement { index: 0, .. })
        ));
    }
}
