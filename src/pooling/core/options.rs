//! Pooled-model options — start values, bounds, integration, restarts.
//!
//! Purpose
//! -------
//! Collect the configuration of a pooled-exposure fit in one validated
//! bundle, [`XErrorsOptions`], so the fitting entry points receive explicit
//! settings instead of loose flags.
//!
//! Key behaviors
//! -------------
//! - [`StartBounds`] holds `(non-variance, variance)` scalar pairs for start,
//!   lower, and upper values plus optional full per-parameter vectors, and
//!   resolves them against a [`ParamLayout`] into [`ResolvedStart`].
//! - [`IntegrationOptions`] configures the adaptive Gauss–Kronrod
//!   integrator and its degeneracy re-scan.
//! - [`RestartOptions`] controls the single jittered retry of the optimizer.
//! - [`DegeneratePolicy`] decides what the optimizer sees when a unit's
//!   integral is degenerate.
//!
//! Invariants & assumptions
//! ------------------------
//! - Resolution fails fast: vector lengths must match the layout, every
//!   lower bound is below its upper bound, variance-kind lower bounds are
//!   strictly positive, and every start lies strictly inside its bounds.
//! - Nothing here touches data; data-dependent checks live in `data`,
//!   `strata`, and `offsets`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover default broadcasting, full-vector overrides, and each
//!   rejection rule.
use ndarray::Array1;

use crate::{
    optimization::loglik_optimizer::{HessianOptions, MLEOptions},
    pooling::{
        core::{
            layout::{ParamKind, ParamLayout},
            regime::{ErrorFlags, ErrorRegime},
        },
        errors::{PoolError, PoolResult},
    },
};

/// Log-likelihood reported to the optimizer under [`DegeneratePolicy::Penalize`].
pub const DEGENERATE_PENALTY: f64 = -1.0e10;

/// Start values and box constraints.
///
/// Scalar pairs are `(non-variance, variance)` and are broadcast over the
/// layout; a full vector, when present, overrides its pair.
///
/// Default
/// -------
/// start `(0.01, 1.0)`, lower `(−∞, 1e-4)`, upper `(∞, ∞)`, no vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct StartBounds {
    pub start: (f64, f64),
    pub lower: (f64, f64),
    pub upper: (f64, f64),
    pub start_vec: Option<Array1<f64>>,
    pub lower_vec: Option<Array1<f64>>,
    pub upper_vec: Option<Array1<f64>>,
}

impl Default for StartBounds {
    fn default() -> Self {
        StartBounds {
            start: (0.01, 1.0),
            lower: (f64::NEG_INFINITY, 1e-4),
            upper: (f64::INFINITY, f64::INFINITY),
            start_vec: None,
            lower_vec: None,
            upper_vec: None,
        }
    }
}

/// Start, lower, and upper vectors aligned with a [`ParamLayout`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStart {
    pub start: Array1<f64>,
    pub lower: Array1<f64>,
    pub upper: Array1<f64>,
}

impl StartBounds {
    /// Override the start vector.
    pub fn with_start(mut self, start: Array1<f64>) -> Self {
        self.start_vec = Some(start);
        self
    }

    /// Override the lower and upper vectors.
    pub fn with_bounds(mut self, lower: Array1<f64>, upper: Array1<f64>) -> Self {
        self.lower_vec = Some(lower);
        self.upper_vec = Some(upper);
        self
    }

    /// Broadcast, override, and validate against `layout`.
    ///
    /// Errors
    /// ------
    /// - `PoolError::LengthMismatch` for a vector of the wrong length.
    /// - `PoolError::InvalidBounds` when `lower >= upper` or a bound is NaN.
    /// - `PoolError::NonPositiveVarianceBound` for a variance entry with
    ///   `lower <= 0`.
    /// - `PoolError::StartOutsideBounds` unless `lower < start < upper`.
    pub fn resolve(&self, layout: &ParamLayout) -> PoolResult<ResolvedStart> {
        let pick = |name: &'static str, vec: &Option<Array1<f64>>, pair: (f64, f64)| {
            match vec {
                Some(v) if v.len() != layout.len() => Err(PoolError::LengthMismatch {
                    name,
                    expected: layout.len(),
                    found: v.len(),
                }),
                Some(v) => Ok(v.clone()),
                None => Ok(layout.broadcast(pair.0, pair.1)),
            }
        };
        let start = pick("start", &self.start_vec, self.start)?;
        let lower = pick("lower", &self.lower_vec, self.lower)?;
        let upper = pick("upper", &self.upper_vec, self.upper)?;

        for (i, label) in layout.labels().iter().enumerate() {
            let (s, l, u) = (start[i], lower[i], upper[i]);
            if l.is_nan() || u.is_nan() || l >= u {
                return Err(PoolError::InvalidBounds { label: label.clone(), lower: l, upper: u });
            }
            if layout.kinds()[i] == ParamKind::Variance && l <= 0.0 {
                return Err(PoolError::NonPositiveVarianceBound { label: label.clone(), lower: l });
            }
            if !(s.is_finite() && s > l && s < u) {
                return Err(PoolError::StartOutsideBounds {
                    label: label.clone(),
                    value: s,
                    lower: l,
                    upper: u,
                });
            }
        }
        Ok(ResolvedStart { start, lower, upper })
    }
}

/// Adaptive Gauss–Kronrod settings.
///
/// - `abs_tol`, `rel_tol`: stop once the error estimate is below
///   `max(abs_tol, rel_tol·|I|)`.
/// - `max_subdivisions`: cap on the number of subintervals.
/// - `rescan_points`: grid size of the degeneracy re-scan.
/// - `rescan_margin`: margin added on both sides of the positive region,
///   as a fraction of the original interval width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationOptions {
    pub abs_tol: f64,
    pub rel_tol: f64,
    pub max_subdivisions: usize,
    pub rescan_points: usize,
    pub rescan_margin: f64,
}

impl IntegrationOptions {
    /// Errors
    /// ------
    /// - `PoolError::InvalidIntegrationOption` for a negative or non-finite
    ///   tolerance, both tolerances zero, fewer than one subdivision, fewer
    ///   than two re-scan points, or a margin outside `[0, 0.5)`.
    pub fn new(
        abs_tol: f64, rel_tol: f64, max_subdivisions: usize, rescan_points: usize,
        rescan_margin: f64,
    ) -> PoolResult<Self> {
        let bad = |name: &'static str, value: f64, reason: &'static str| {
            Err(PoolError::InvalidIntegrationOption { name, value, reason })
        };
        if !(abs_tol.is_finite() && abs_tol >= 0.0) {
            return bad("abs_tol", abs_tol, "must be finite and non-negative");
        }
        if !(rel_tol.is_finite() && rel_tol >= 0.0) {
            return bad("rel_tol", rel_tol, "must be finite and non-negative");
        }
        if abs_tol == 0.0 && rel_tol == 0.0 {
            return bad("rel_tol", rel_tol, "at least one tolerance must be positive");
        }
        if max_subdivisions == 0 {
            return bad("max_subdivisions", 0.0, "must be at least 1");
        }
        if rescan_points < 2 {
            return bad("rescan_points", rescan_points as f64, "must be at least 2");
        }
        if !(rescan_margin.is_finite() && (0.0..0.5).contains(&rescan_margin)) {
            return bad("rescan_margin", rescan_margin, "must lie in [0, 0.5)");
        }
        Ok(IntegrationOptions { abs_tol, rel_tol, max_subdivisions, rescan_points, rescan_margin })
    }
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        IntegrationOptions {
            abs_tol: 0.0,
            rel_tol: 1e-6,
            max_subdivisions: 100,
            rescan_points: 1000,
            rescan_margin: 0.01,
        }
    }
}

/// Retry policy after a non-converged or failed optimizer attempt.
///
/// - `retry`: allow the single jittered retry.
/// - `jitter_sd`: standard deviation of the Gaussian jitter added to the
///   unconstrained start.
/// - `seed`: RNG seed; `None` draws from entropy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestartOptions {
    pub retry: bool,
    pub jitter_sd: f64,
    pub seed: Option<u64>,
}

impl RestartOptions {
    /// Errors
    /// ------
    /// - `PoolError::InvalidJitter` unless `jitter_sd` is finite and positive.
    pub fn new(retry: bool, jitter_sd: f64, seed: Option<u64>) -> PoolResult<Self> {
        if !(jitter_sd.is_finite() && jitter_sd > 0.0) {
            return Err(PoolError::InvalidJitter { value: jitter_sd });
        }
        Ok(RestartOptions { retry, jitter_sd, seed })
    }
}

impl Default for RestartOptions {
    fn default() -> Self {
        RestartOptions { retry: true, jitter_sd: 0.5, seed: None }
    }
}

/// What the optimizer sees when a unit's integral is degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegeneratePolicy {
    /// Abandon the rest of the stratum and keep the partial sum.
    #[default]
    DropRemaining,
    /// Report [`DEGENERATE_PENALTY`] instead of the log-likelihood.
    Penalize,
}

/// XErrorsOptions — full configuration of a pooled-exposure fit.
///
/// Fields
/// ------
/// - `regime`, `flags`: error structure (see `regime`).
/// - `approx_integral`: use the closed-form approximation instead of
///   numerical integration for contaminated strata.
/// - `estimate_var`: compute the variance-covariance matrix at θ̂.
/// - `start_bounds`: start values and box constraints.
/// - `integration`: exact-mode integrator settings.
/// - `mle_opts`: optimizer tolerances, iteration cap, line search.
/// - `restart`: jittered-retry policy.
/// - `hessian`: step controls of the numerical Hessian.
/// - `degenerate_policy`: handling of degenerate integrals.
///
/// Default
/// -------
/// `neither` regime, default flags, approximate integral, variance
/// estimation on, and each component's default.
#[derive(Debug, Clone, PartialEq)]
pub struct XErrorsOptions {
    pub regime: ErrorRegime,
    pub flags: ErrorFlags,
    pub approx_integral: bool,
    pub estimate_var: bool,
    pub start_bounds: StartBounds,
    pub integration: IntegrationOptions,
    pub mle_opts: MLEOptions,
    pub restart: RestartOptions,
    pub hessian: HessianOptions,
    pub degenerate_policy: DegeneratePolicy,
}

impl XErrorsOptions {
    /// Default options for `regime` with the given flags.
    pub fn new(regime: ErrorRegime, flags: ErrorFlags) -> Self {
        XErrorsOptions { regime, flags, ..XErrorsOptions::default() }
    }

    pub fn with_exact_integral(mut self) -> Self {
        self.approx_integral = false;
        self
    }
}

impl Default for XErrorsOptions {
    fn default() -> Self {
        XErrorsOptions {
            regime: ErrorRegime::default(),
            flags: ErrorFlags::default(),
            approx_integral: true,
            estimate_var: true,
            start_bounds: StartBounds::default(),
            integration: IntegrationOptions::default(),
            mle_opts: MLEOptions::default(),
            restart: RestartOptions::default(),
            hessian: HessianOptions::default(),
            degenerate_policy: DegeneratePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pooling::core::layout::ModelFamily;
    use ndarray::array;

    fn processing_layout() -> ParamLayout {
        // beta_0, beta_x, alpha_0, sigsq_x, sigsq_p
        ParamLayout::new(
            ModelFamily::Logistic,
            ErrorRegime::Processing,
            ErrorFlags::default(),
            0,
        )
    }

    #[test]
    // Purpose
    // -------
    // Default pairs broadcast by parameter kind.
    fn defaults_broadcast_by_kind() {
        // Arrange
        let layout = processing_layout();

        // Act
        let resolved = StartBounds::default().resolve(&layout).unwrap();

        // Assert
        assert_eq!(resolved.start, array![0.01, 0.01, 0.01, 1.0, 1.0]);
        assert_eq!(resolved.lower[0], f64::NEG_INFINITY);
        assert_eq!(resolved.lower[4], 1e-4);
        assert!(resolved.upper.iter().all(|u| u.is_infinite()));
    }

    #[test]
    // Purpose
    // -------
    // Full vectors override the pairs and are length-checked.
    fn full_vectors_override_and_are_length_checked() {
        let layout = processing_layout();
        let sb = StartBounds::default().with_start(array![0.0, 0.5, 1.0, 2.0, 0.3]);
        assert_eq!(sb.resolve(&layout).unwrap().start[1], 0.5);

        let short = StartBounds::default().with_start(array![0.0, 0.5]);
        assert_eq!(
            short.resolve(&layout),
            Err(PoolError::LengthMismatch { name: "start", expected: 5, found: 2 })
        );
    }

    #[test]
    // Purpose
    // -------
    // Inconsistent bounds and starts are rejected before optimization.
    fn invalid_bounds_and_starts_are_rejected() {
        let layout = processing_layout();

        let zero_var = StartBounds { lower: (f64::NEG_INFINITY, 0.0), ..StartBounds::default() };
        assert!(matches!(
            zero_var.resolve(&layout),
            Err(PoolError::NonPositiveVarianceBound { .. })
        ));

        let crossed = StartBounds { upper: (-1.0, f64::INFINITY), ..StartBounds::default() };
        assert!(matches!(crossed.resolve(&layout), Err(PoolError::StartOutsideBounds { .. })));

        let inverted = StartBounds { lower: (2.0, 1e-4), upper: (1.0, 5.0), ..StartBounds::default() };
        assert!(matches!(inverted.resolve(&layout), Err(PoolError::InvalidBounds { .. })));

        let on_bound = StartBounds { start: (0.01, 1e-4), ..StartBounds::default() };
        assert!(matches!(on_bound.resolve(&layout), Err(PoolError::StartOutsideBounds { .. })));
    }

    #[test]
    fn integration_and_restart_options_validate() {
        assert!(IntegrationOptions::new(0.0, 1e-8, 50, 200, 0.05).is_ok());
        assert!(IntegrationOptions::new(0.0, 0.0, 50, 200, 0.05).is_err());
        assert!(IntegrationOptions::new(1e-10, 1e-8, 0, 200, 0.05).is_err());
        assert!(IntegrationOptions::new(1e-10, 1e-8, 50, 1, 0.05).is_err());
        assert!(IntegrationOptions::new(1e-10, 1e-8, 50, 200, 0.5).is_err());
        assert_eq!(RestartOptions::new(true, 0.0, None), Err(PoolError::InvalidJitter { value: 0.0 }));
        assert!(RestartOptions::new(true, 0.2, Some(7)).is_ok());
    }
}
