//! Fitting entry points and the [`FitResult`] summary.
//!
//! Purpose
//! -------
//! Tie the pieces together for one call: build the model (validation,
//! offsets, stratification, layout), resolve start values and bounds,
//! optimize or accept a previous outcome, then compute the observed
//! information, the vcov, and the delta-method variance of the log-OR.
//!
//! Key behaviors
//! -------------
//! - Every validation error surfaces before the optimizer runs.
//! - Numerical trouble after optimization (degenerate units at θ̂,
//!   non-convergence, an unusable Hessian, flagged variances) never fails
//!   the call; it is recorded in [`FitResult::diagnostics`] and logged at
//!   `warn!`.
//! - A previous [`OptimOutcome`] skips optimization; only the inference
//!   step is recomputed.
//!
//! Conventions
//! -----------
//! - `theta_hat`, `vcov`, and the labels share the parameter layout order.
//! - `aic = 2(p + NLL)` with NLL the negative log-likelihood at θ̂.
//! - A degenerate evaluation at θ̂ is never reported as a log-likelihood:
//!   `loglik = −∞`, `aic = +∞`, and no vcov is computed.
use std::fmt;

use log::{info, warn};
use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, Normal};

use crate::{
    inference::{delta_method, invert_information, observed_information},
    optimization::{
        errors::OptResult,
        loglik_optimizer::{OptimOutcome, Theta},
        numerical_stability::box_transform::BoxTransform,
    },
    pooling::{
        core::{
            data::PoolData,
            layout::ModelFamily,
            offsets::SamplingCorrection,
            options::{ResolvedStart, XErrorsOptions},
            regime::ErrorRegime,
            strata::Stratum,
        },
        errors::{PoolError, PoolResult},
        models::{
            driver::{optimize, DriverOutcome, RestartState},
            gdfa::GammaDfaModel,
            likelihood::PooledFamily,
            logreg::PooledLogisticModel,
        },
    },
};

/// Non-fatal findings of a fit.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The integral of `unit` was degenerate at θ̂.
    DegenerateUnit { stratum: Stratum, unit: usize },
    /// The optimizer stopped without meeting a tolerance.
    NotConverged { status: String },
    /// The vcov could not be computed.
    VcovUnavailable { reason: String },
    /// A diagonal entry of the vcov is not positive.
    NonPositiveVariance { label: String, value: f64 },
    /// The vcov has a meaningfully negative eigenvalue.
    NotPositiveSemidefinite { min_eigenvalue: f64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DegenerateUnit { stratum, unit } => {
                write!(f, "degenerate integral for pool {unit} ({} stratum)", stratum.as_str())
            }
            Diagnostic::NotConverged { status } => write!(f, "optimizer did not converge: {status}"),
            Diagnostic::VcovUnavailable { reason } => write!(f, "no variance estimate: {reason}"),
            Diagnostic::NonPositiveVariance { label, value } => {
                write!(f, "non-positive variance for '{label}': {value:.3e}")
            }
            Diagnostic::NotPositiveSemidefinite { min_eigenvalue } => {
                write!(f, "vcov is not positive semidefinite (min eigenvalue {min_eigenvalue:.3e})")
            }
        }
    }
}

/// Result of a pooled-exposure fit.
///
/// Fields
/// ------
/// - `family`, `regime`: what was fitted.
/// - `labels`, `theta_hat`: labelled estimates in model coordinates.
/// - `vcov`: inverse observed information, `None` when unavailable or not
///   requested.
/// - `optim`: raw optimizer outcome (unconstrained coordinates).
/// - `loglik`, `aic`: log-likelihood at θ̂ and `2(p − loglik)`; `−∞` and
///   `+∞` when any unit is degenerate at θ̂.
/// - `log_or`, `log_or_variance`: log-odds-ratio of exposure and its
///   delta-method variance.
/// - `diagnostics`: non-fatal findings.
/// - `restart_state`, `attempts`: optimizer history; a warm restart reports
///   `Initial` with zero attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub family: ModelFamily,
    pub regime: ErrorRegime,
    pub labels: Vec<String>,
    pub theta_hat: Array1<f64>,
    pub vcov: Option<Array2<f64>>,
    pub optim: OptimOutcome,
    pub loglik: f64,
    pub aic: f64,
    pub log_or: f64,
    pub log_or_variance: Option<f64>,
    pub diagnostics: Vec<Diagnostic>,
    pub restart_state: RestartState,
    pub attempts: usize,
}

impl FitResult {
    /// The optimizer met a tolerance and the likelihood at θ̂ is a real
    /// value.
    pub fn converged(&self) -> bool {
        self.optim.converged && self.loglik.is_finite()
    }

    /// Estimate for `label`, if present.
    pub fn estimate(&self, label: &str) -> Option<f64> {
        self.labels.iter().position(|l| l == label).map(|i| self.theta_hat[i])
    }

    /// Square roots of the vcov diagonal; NaN where the variance is not
    /// positive.
    pub fn standard_errors(&self) -> Option<Array1<f64>> {
        self.vcov
            .as_ref()
            .map(|v| v.diag().mapv(|d| if d > 0.0 { d.sqrt() } else { f64::NAN }))
    }

    /// Wald intervals `θ̂ ± z·SE` as a `p × 2` array of `(lower, upper)`.
    ///
    /// Errors
    /// ------
    /// - `PoolError::InvalidConfidenceLevel` unless `0 < level < 1`.
    pub fn wald_intervals(&self, level: f64) -> PoolResult<Option<Array2<f64>>> {
        if !(level.is_finite() && level > 0.0 && level < 1.0) {
            return Err(PoolError::InvalidConfidenceLevel { value: level });
        }
        let z = Normal::new(0.0, 1.0)
            .map_err(|_| PoolError::InvalidConfidenceLevel { value: level })?
            .inverse_cdf(0.5 + 0.5 * level);
        Ok(self.standard_errors().map(|se| {
            Array2::from_shape_fn((se.len(), 2), |(i, j)| {
                let half = z * se[i];
                if j == 0 { self.theta_hat[i] - half } else { self.theta_hat[i] + half }
            })
        }))
    }
}

fn family_title(family: ModelFamily) -> &'static str {
    match family {
        ModelFamily::Logistic => "Pooled logistic regression",
        ModelFamily::GammaDfa => "Gamma discriminant function approach",
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} errors)", family_title(self.family), self.regime)?;
        let width = self.labels.iter().map(String::len).max().unwrap_or(0).max(8);
        writeln!(f, "{:<width$}  {:>12}  {:>12}", "", "estimate", "std. error")?;
        let se = self.standard_errors();
        for (i, label) in self.labels.iter().enumerate() {
            match &se {
                Some(se) => writeln!(f, "{label:<width$}  {:>12.6}  {:>12.6}", self.theta_hat[i], se[i])?,
                None => writeln!(f, "{label:<width$}  {:>12.6}  {:>12}", self.theta_hat[i], "-")?,
            }
        }
        match self.log_or_variance {
            Some(v) => writeln!(f, "{:<width$}  {:>12.6}  {:>12.6}", "log OR", self.log_or, v.max(0.0).sqrt())?,
            None => writeln!(f, "{:<width$}  {:>12.6}  {:>12}", "log OR", self.log_or, "-")?,
        }
        writeln!(f, "log-likelihood = {:.4}, AIC = {:.4}", self.loglik, self.aic)?;
        write!(
            f,
            "{} ({})",
            if self.converged() { "converged" } else { "not converged" },
            self.optim.status
        )?;
        for d in &self.diagnostics {
            write!(f, "\nwarning: {d}")?;
        }
        Ok(())
    }
}

/// Fit the pooled logistic model.
///
/// Parameters
/// ----------
/// - `data`: validated pools.
/// - `opts`: full fit configuration.
/// - `correction`: case-control intercept correction.
/// - `previous`: outcome of an earlier fit on the same data and layout;
///   when given, optimization is skipped.
///
/// Errors
/// ------
/// - Validation errors from offsets, stratification, and start/bounds.
/// - `PoolError::LengthMismatch` when `previous` does not match the layout.
/// - `PoolError::OptimizationFailed` when every optimizer attempt failed.
pub fn fit_logreg_xerrors(
    data: &PoolData, opts: &XErrorsOptions, correction: SamplingCorrection,
    previous: Option<&OptimOutcome>,
) -> PoolResult<FitResult> {
    let model = PooledLogisticModel::new(data, opts, correction)?;
    fit_model(&model, opts, previous)
}

/// Fit the gamma discriminant-function model.
///
/// Errors
/// ------
/// As [`fit_logreg_xerrors`], plus `PoolError::NonPositiveMeasurement`.
pub fn fit_gdfa_xerrors(
    data: &PoolData, opts: &XErrorsOptions, previous: Option<&OptimOutcome>,
) -> PoolResult<FitResult> {
    let model = GammaDfaModel::new(data, opts)?;
    fit_model(&model, opts, previous)
}

fn reuse_previous(previous: &OptimOutcome, start: &ResolvedStart) -> PoolResult<DriverOutcome> {
    if previous.theta_hat.len() != start.start.len() {
        return Err(PoolError::LengthMismatch {
            name: "previous theta_hat",
            expected: start.start.len(),
            found: previous.theta_hat.len(),
        });
    }
    let transform = BoxTransform::new(start.lower.view(), start.upper.view())?;
    let theta = transform.to_constrained(previous.theta_hat.view());
    Ok(DriverOutcome { outcome: previous.clone(), theta, state: RestartState::Initial, attempts: 0 })
}

fn fit_model<M: PooledFamily>(
    model: &M, opts: &XErrorsOptions, previous: Option<&OptimOutcome>,
) -> PoolResult<FitResult> {
    let layout = model.layout();
    let start = opts.start_bounds.resolve(layout)?;
    let driven = match previous {
        Some(prev) => reuse_previous(prev, &start)?,
        None => optimize(model, &start, opts)?,
    };
    let DriverOutcome { outcome, theta, state, attempts } = driven;
    let labels = layout.labels().to_vec();
    let mut diagnostics = Vec::new();

    if !outcome.converged {
        diagnostics.push(Diagnostic::NotConverged { status: outcome.status.clone() });
    }

    let eval = model.evaluate(theta.view());
    for (stratum, unit) in eval.degenerate_units() {
        warn!("degenerate integral at the estimate for pool {unit} ({} stratum)", stratum.as_str());
        diagnostics.push(Diagnostic::DegenerateUnit { stratum, unit });
    }
    let loglik = eval.value().unwrap_or(f64::NEG_INFINITY);
    let aic = 2.0 * (layout.len() as f64 - loglik);

    let vcov = if opts.estimate_var && eval.is_degenerate() {
        warn!("variance estimate skipped: the likelihood is degenerate at the estimate");
        diagnostics.push(Diagnostic::VcovUnavailable {
            reason: "likelihood is degenerate at the estimate".into(),
        });
        None
    } else if opts.estimate_var {
        // A degenerate neighbour yields an infinite entry, which the Hessian
        // check rejects.
        let nll = |t: &Theta| -> OptResult<f64> {
            Ok(model.evaluate(t.view()).value().map_or(f64::INFINITY, |v| -v))
        };
        match observed_information(&nll, &theta, &opts.hessian).and_then(|j| invert_information(&j)) {
            Ok(est) => {
                for &i in &est.nonpositive_diagonal {
                    let value = est.vcov[[i, i]];
                    warn!("non-positive variance estimate for '{}': {value:.3e}", labels[i]);
                    diagnostics.push(Diagnostic::NonPositiveVariance { label: labels[i].clone(), value });
                }
                if !est.is_psd() {
                    warn!("vcov is not positive semidefinite (min eigenvalue {:.3e})", est.min_eigenvalue);
                    diagnostics
                        .push(Diagnostic::NotPositiveSemidefinite { min_eigenvalue: est.min_eigenvalue });
                }
                Some(est.vcov)
            }
            Err(err) => {
                warn!("variance estimate unavailable: {err}");
                diagnostics.push(Diagnostic::VcovUnavailable { reason: err.to_string() });
                None
            }
        }
    } else {
        None
    };

    let (log_or, grad) = model.log_or(theta.view());
    let log_or_variance =
        vcov.as_ref().and_then(|v| delta_method(log_or, v, &grad).ok()).map(|d| d.variance);

    info!(
        "{} ({} errors): loglik = {loglik:.4}, AIC = {aic:.4}, log OR = {log_or:.4}, converged = {}",
        family_title(layout.family()),
        layout.regime(),
        outcome.converged
    );

    Ok(FitResult {
        family: layout.family(),
        regime: layout.regime(),
        labels,
        theta_hat: theta,
        vcov,
        optim: outcome,
        loglik,
        aic,
        log_or,
        log_or_variance,
        diagnostics,
        restart_state: state,
        attempts,
    })
}
