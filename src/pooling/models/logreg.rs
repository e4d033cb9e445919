//! Pooled logistic regression with processing and measurement error.
//!
//! Purpose
//! -------
//! Evaluate the joint log-likelihood `ln f(y, x̃ | c)` of case-control pools
//! under the individual model
//! `logit P(Y=1 | X, C) = β0 + βx X + βcᵀC`, `X | C ~ N(α0 + αcᵀC, σ²x)`.
//!
//! Key behaviors
//! -------------
//! For a pool of size `g` with summed covariates `c` and offset `q_g`:
//!
//! - outcome model `logit P(y=1 | X̄) = a + b X̄`, `a = gβ0 + βcᵀc + q_g`,
//!   `b = gβx`;
//! - exposure model `X̄ | c ~ N(μ, s²)`, `μ = α0 + αcᵀc/g`, `s² = σ²x/g`;
//! - replicates `x̃_r = X̄ + U_r`, `U_r ~ N(0, τ²)` independent.
//!
//! Per stratum:
//!
//! - exact: `ln P(y | X̄ = x̃) + ln N(x̃; μ, s²)`;
//! - contaminated, approximate: compound-symmetric marginal of `x̃` plus the
//!   probit-matched `P(y | x̃)` under the normal posterior of `X̄`;
//! - contaminated, exact: `∫ P(y | X̄) Π N(x̃_r; X̄, τ²) N(X̄; μ, s²) dX̄`,
//!   integrated over the posterior-standardized latent variable.
//!
//! Invariants & assumptions
//! ------------------------
//! - Offsets are computed once in [`PooledLogisticModel::new`] and carried
//!   by the stratum slices.
//! - In exact mode the integrand is shifted by its log-value at the
//!   posterior mean before exponentiation, so underflow only occurs for
//!   genuinely degenerate integrands.
use ndarray::{s, Array1, ArrayView1};

use crate::{
    optimization::numerical_stability::transformations::bernoulli_logit_ln_pmf,
    pooling::{
        core::{
            data::PoolData,
            densities::{
                ln_logistic_normal_approx, ln_mvn_compound_symmetric, ln_normal_pdf,
                normal_posterior,
            },
            layout::{ErrorVariances, ModelFamily, ParamLayout},
            offsets::{case_control_offsets, SamplingCorrection},
            options::{IntegrationOptions, XErrorsOptions},
            quadrature::{integrate_latent, Integral, LatentDomain},
            strata::{stratify, Strata, Stratum, StratumSlice},
        },
        errors::PoolResult,
        models::likelihood::PooledFamily,
    },
};

/// Decoded logistic-family parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticParams {
    pub beta_0: f64,
    pub beta_x: f64,
    pub beta_c: Array1<f64>,
    pub alpha_0: f64,
    pub alpha_c: Array1<f64>,
    pub sigsq_x: f64,
    pub errors: ErrorVariances,
}

/// Pooled logistic model bound to one data set.
#[derive(Debug, Clone)]
pub struct PooledLogisticModel {
    layout: ParamLayout,
    strata: Strata,
    approx_integral: bool,
    constant_pe: bool,
    integration: IntegrationOptions,
}

impl PooledLogisticModel {
    /// Compute offsets, stratify, and fix the parameter layout.
    ///
    /// Errors
    /// ------
    /// - Offset errors (invalid correction, a pool size missing an outcome).
    /// - Stratification errors for replicates inconsistent with the regime.
    pub fn new(
        data: &PoolData, opts: &XErrorsOptions, correction: SamplingCorrection,
    ) -> PoolResult<Self> {
        let offsets = case_control_offsets(data, &correction)?;
        let strata = stratify(data, opts.regime, Some(&offsets))?;
        let layout =
            ParamLayout::new(ModelFamily::Logistic, opts.regime, opts.flags, data.n_covariates());
        Ok(PooledLogisticModel {
            layout,
            strata,
            approx_integral: opts.approx_integral,
            constant_pe: opts.flags.constant_pe,
            integration: opts.integration,
        })
    }

    fn exact_ln_lik(y: u8, a: f64, b: f64, mu: f64, s2: f64, x: f64) -> f64 {
        bernoulli_logit_ln_pmf(f64::from(y), a + b * x) + ln_normal_pdf(x, mu, s2)
    }

    fn contaminated_ln_lik(
        &self, y: u8, a: f64, b: f64, mu: f64, s2: f64, tau2: f64, xs: &[f64],
    ) -> f64 {
        let (m, v) = normal_posterior(mu, s2, xs, tau2);
        if self.approx_integral {
            return ln_mvn_compound_symmetric(xs, mu, s2, tau2)
                + ln_logistic_normal_approx(y, a, b, m, v);
        }
        let joint = |xbar: f64| {
            bernoulli_logit_ln_pmf(f64::from(y), a + b * xbar)
                + xs.iter().map(|&x| ln_normal_pdf(x, xbar, tau2)).sum::<f64>()
                + ln_normal_pdf(xbar, mu, s2)
        };
        let sd = v.sqrt();
        let reference = joint(m);
        let integral = integrate_latent(
            LatentDomain::SymmetricUnit,
            |z| joint(m + sd * z) - reference,
            &self.integration,
        );
        match integral {
            Integral::Value(i) => reference + i.ln() + sd.ln(),
            Integral::Degenerate => f64::NEG_INFINITY,
        }
    }
}

impl PooledFamily for PooledLogisticModel {
    type Params = LogisticParams;

    fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    fn strata(&self) -> &Strata {
        &self.strata
    }

    fn decode(&self, theta: ArrayView1<f64>) -> LogisticParams {
        let p = self.layout.n_covariates();
        LogisticParams {
            beta_0: theta[0],
            beta_x: theta[1],
            beta_c: theta.slice(s![2..2 + p]).to_owned(),
            alpha_0: theta[2 + p],
            alpha_c: theta.slice(s![3 + p..3 + 2 * p]).to_owned(),
            sigsq_x: theta[3 + 2 * p],
            errors: self.layout.error_variances(theta),
        }
    }

    fn unit_ln_lik(&self, p: &LogisticParams, slice: &StratumSlice, row: usize) -> f64 {
        let g = slice.sizes[row] as f64;
        let y = slice.outcomes[row];
        let c = slice.covariates.row(row);
        let a = g * p.beta_0 + p.beta_c.dot(&c) + slice.offsets[row];
        let b = g * p.beta_x;
        let mu = p.alpha_0 + p.alpha_c.dot(&c) / g;
        let s2 = p.sigsq_x / g;
        let xs = &slice.xtilde[row];
        match slice.stratum {
            Stratum::Exact => Self::exact_ln_lik(y, a, b, mu, s2, xs[0]),
            Stratum::Replicated | Stratum::SingleSurrogate => {
                let tau2 = p.errors.total(slice.sizes[row], y, self.constant_pe);
                self.contaminated_ln_lik(y, a, b, mu, s2, tau2, xs)
            }
        }
    }

    /// `log OR = βx`.
    fn log_or(&self, theta: ArrayView1<f64>) -> (f64, Array1<f64>) {
        let mut grad = Array1::zeros(theta.len());
        grad[1] = 1.0;
        (theta[1], grad)
    }
}
