//! Public optimizer surface: the [`LogLikelihood`] trait, optimizer
//! configuration, and the normalized [`OptimOutcome`].
//!
//! Convention: we *maximize* `ℓ(u)` by minimizing `c(u) = -ℓ(u)`. Analytic
//! gradients, when provided, are gradients of `ℓ`; the adapter flips signs.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
        Cost, FnEvalMap, Grad, Theta,
    },
};
use argmin::core::{TerminationReason, TerminationStatus};
use argmin_math::ArgminL2Norm;
use std::str::FromStr;

/// User-implemented log-likelihood interface.
///
/// - `value(&Theta, &Data)`: evaluate `ℓ(u)`; return an `OptError` for
///   invalid inputs instead of panicking.
/// - `check(&Theta, &Data)`: called once on the starting point before the
///   solver runs.
/// - `grad(&Theta, &Data)`: optional analytic `∇ℓ(u)`. The default returns
///   [`OptError::GradientNotImplemented`], which routes the solver to
///   finite differences.
pub trait LogLikelihood {
    type Data;

    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Line search used inside L-BFGS. Parses case-insensitively from
/// `"MoreThuente"` / `"HagerZhang"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearcher {
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Optimizer-level configuration.
///
/// Fields
/// ------
/// - `tols`: stopping rules and the iteration cap.
/// - `line_searcher`: line search used by L-BFGS.
/// - `verbose`: attach argmin's terminal observer (needs the `obs_slog`
///   feature; otherwise only `log::debug!` summaries are emitted).
/// - `lbfgs_mem`: history size, `None` for [`DEFAULT_LBFGS_MEM`](super::DEFAULT_LBFGS_MEM).
///
/// Default
/// -------
/// `tol_grad = 1e-5`, `tol_cost = 1e-10`, `max_iter = 500`, More–Thuente,
/// quiet, default memory. The cost tolerance matters in practice because
/// finite-difference gradients rarely reach tight gradient norms.
#[derive(Debug, Clone, PartialEq)]
pub struct MLEOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl MLEOptions {
    /// Build optimizer options. Numeric tolerances are validated in
    /// [`Tolerances::new`]; this only rejects a zero L-BFGS memory.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if let Some(m) = lbfgs_mem {
            if m == 0 {
                return Err(OptError::InvalidLBFGSMem {
                    mem: m,
                    reason: "L-BFGS memory must be greater than zero.",
                });
            }
        }
        Ok(Self { tols, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for MLEOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances::default(),
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Stopping rules for the optimizer.
///
/// At least one of the three must be provided. Tolerances must be finite and
/// strictly positive; `max_iter` must be non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// Errors
    /// ------
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for
    ///   non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_tol_grad(tol_grad)?;
        if let Some(max_iter) = max_iter {
            if max_iter == 0 {
                return Err(OptError::InvalidMaxIter {
                    max_iter,
                    reason: "Maximum iterations must be greater than zero.",
                });
            }
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self { tol_grad: Some(1e-5), tol_cost: Some(1e-10), max_iter: Some(500) }
    }
}

/// Normalized result of one optimizer run.
///
/// - `theta_hat`: best point found, in the optimizer's unconstrained space.
/// - `value`: best **log-likelihood** `ℓ(θ̂)` (not the cost).
/// - `converged`: `true` only when argmin reports that the solver met a
///   tolerance (`SolverConverged`) or reached a target cost. Hitting the
///   iteration cap is *not* convergence.
/// - `status`: human-readable termination status.
/// - `iterations`, `fn_evals`: argmin counters.
/// - `grad_norm`: norm of the last gradient, if the solver kept one.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Build a validated outcome from raw solver state.
    ///
    /// Errors
    /// ------
    /// - [`OptError::MissingThetaHat`] / [`OptError::InvalidThetaHat`] when
    ///   the solver produced no finite best point.
    /// - [`OptError::NonFiniteCost`] when the best value is not finite.
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: TerminationStatus,
        iterations: u64, fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let converged = is_converged(&termination);
        let status = match termination {
            TerminationStatus::NotTerminated => "Not terminated".to_string(),
            TerminationStatus::Terminated(reason) => reason.text().to_string(),
        };
        let grad_norm = grad.map(|g| g.l2_norm());
        Ok(Self {
            theta_hat,
            value,
            converged,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm,
        })
    }
}

fn is_converged(termination: &TerminationStatus) -> bool {
    matches!(
        termination,
        TerminationStatus::Terminated(
            TerminationReason::SolverConverged | TerminationReason::TargetCostReached
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Line-search names parse case-insensitively; unknown names are rejected.
    fn line_searcher_parses_case_insensitively() {
        assert_eq!("hagerzhang".parse::<LineSearcher>().unwrap(), LineSearcher::HagerZhang);
        assert_eq!("MORETHUENTE".parse::<LineSearcher>().unwrap(), LineSearcher::MoreThuente);
        assert!(matches!(
            "bfgs".parse::<LineSearcher>(),
            Err(OptError::InvalidLineSearch { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Tolerances reject the all-empty configuration and non-positive values.
    fn tolerances_validate_inputs() {
        assert_eq!(Tolerances::new(None, None, None), Err(OptError::NoTolerancesProvided));
        assert!(matches!(
            Tolerances::new(Some(-1.0), None, None),
            Err(OptError::InvalidTolGrad { .. })
        ));
        assert!(matches!(
            Tolerances::new(None, Some(f64::NAN), None),
            Err(OptError::InvalidTolCost { .. })
        ));
        assert!(matches!(
            Tolerances::new(None, None, Some(0)),
            Err(OptError::InvalidMaxIter { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // A zero L-BFGS memory is rejected at construction.
    fn mle_options_reject_zero_memory() {
        let result = MLEOptions::new(Tolerances::default(), LineSearcher::HagerZhang, false, Some(0));
        assert!(matches!(result, Err(OptError::InvalidLBFGSMem { mem: 0, .. })));
    }

    #[test]
    // Purpose
    // -------
    // Only genuine convergence sets `converged`; the iteration cap does not.
    //
    // Given
    // -----
    // - Identical solver states terminated by `SolverConverged` and by
    //   `MaxItersReached`.
    //
    // Expect
    // ------
    // - `converged == true` for the first, `false` for the second.
    fn outcome_distinguishes_convergence_from_iteration_cap() {
        // Arrange
        let theta = array![0.5, -0.25];
        let converged = TerminationStatus::Terminated(TerminationReason::SolverConverged);
        let capped = TerminationStatus::Terminated(TerminationReason::MaxItersReached);

        // Act
        let ok = OptimOutcome::new(Some(theta.clone()), -3.0, converged, 12, FnEvalMap::new(), None)
            .unwrap();
        let cap = OptimOutcome::new(Some(theta), -3.0, capped, 500, FnEvalMap::new(), None).unwrap();

        // Assert
        assert!(ok.converged);
        assert!(!cap.converged);
        assert_eq!(cap.iterations, 500);
    }

    #[test]
    // Purpose
    // -------
    // Missing or non-finite best points are reported as errors.
    fn outcome_rejects_missing_or_non_finite_theta() {
        let status = TerminationStatus::NotTerminated;
        assert_eq!(
            OptimOutcome::new(None, 0.0, status.clone(), 0, FnEvalMap::new(), None),
            Err(OptError::MissingThetaHat)
        );
        let bad = OptimOutcome::new(
            Some(array![f64::NAN]),
            0.0,
            status,
            0,
            FnEvalMap::new(),
            None,
        );
        assert!(matches!(bad, Err(OptError::InvalidThetaHat { index: 0, .. })));
    }
}
