//! Optimizer driver — box-constrained L-BFGS with one jittered restart.
//!
//! Purpose
//! -------
//! Maximize a [`PooledFamily`] log-likelihood over its box constraints and
//! hand back the best point in model coordinates together with the restart
//! history.
//!
//! Key behaviors
//! -------------
//! - The box is removed with a [`BoxTransform`]; L-BFGS runs on the
//!   unconstrained `u`.
//! - [`RestartState`] is an explicit state machine: a non-converged or
//!   failed first attempt moves to `Retried` and restarts from the original
//!   `u₀` plus `N(0, jitter_sd²)` noise; a second miss ends in `Failed`.
//! - The outcome with the higher log-likelihood across attempts is kept.
//!
//! Invariants & assumptions
//! ------------------------
//! - At most two attempts are made.
//! - An error is returned only when no attempt produced an outcome.
use log::{debug, warn};
use ndarray::Array1;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::{
    optimization::{
        loglik_optimizer::{maximize, OptimOutcome},
        numerical_stability::box_transform::BoxTransform,
    },
    pooling::{
        core::options::{ResolvedStart, RestartOptions, XErrorsOptions},
        errors::{PoolError, PoolResult},
        models::likelihood::{BoundedLikelihood, PooledFamily},
    },
};

/// Restart state after the latest attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartState {
    /// Only the first attempt has run.
    Initial,
    /// The jittered retry has run.
    Retried,
    /// No attempt converged.
    Failed,
}

impl RestartState {
    /// Next state and whether to run another attempt.
    pub fn after_attempt(self, converged: bool, retry: bool) -> (RestartState, bool) {
        match (self, converged) {
            (state, true) => (state, false),
            (RestartState::Initial, false) if retry => (RestartState::Retried, true),
            (RestartState::Initial, false) => (RestartState::Failed, false),
            (RestartState::Retried | RestartState::Failed, false) => (RestartState::Failed, false),
        }
    }
}

/// Best optimizer result across attempts.
///
/// - `outcome`: raw outcome; `theta_hat` is in unconstrained coordinates.
/// - `theta`: `outcome.theta_hat` mapped back into the box.
/// - `state`: final [`RestartState`].
/// - `attempts`: number of optimizer runs.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverOutcome {
    pub outcome: OptimOutcome,
    pub theta: Array1<f64>,
    pub state: RestartState,
    pub attempts: usize,
}

fn jittered(u0: &Array1<f64>, restart: &RestartOptions) -> PoolResult<Array1<f64>> {
    let noise = Normal::new(0.0, restart.jitter_sd)
        .map_err(|_| PoolError::InvalidJitter { value: restart.jitter_sd })?;
    let mut rng = match restart.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    Ok(u0.mapv(|u| u + noise.sample(&mut rng)))
}

/// Maximize `model` from `start` under `opts`.
///
/// Errors
/// ------
/// - `PoolError::OptimizationFailed` when the box is invalid for the
///   optimizer or every attempt failed inside the backend.
pub fn optimize<M: PooledFamily>(
    model: &M, start: &ResolvedStart, opts: &XErrorsOptions,
) -> PoolResult<DriverOutcome> {
    let transform = BoxTransform::new(start.lower.view(), start.upper.view())?;
    let u0 = transform.to_unconstrained(start.start.view())?;
    let objective = BoundedLikelihood::new(model, opts.degenerate_policy);

    let mut state = RestartState::Initial;
    let mut best: Option<OptimOutcome> = None;
    let mut last_error = None;
    let mut attempts = 0;
    loop {
        let theta0 = match state {
            RestartState::Initial => u0.clone(),
            _ => jittered(&u0, &opts.restart)?,
        };
        attempts += 1;
        let converged = match maximize(&objective, theta0, &transform, &opts.mle_opts) {
            Ok(out) => {
                let converged = out.converged;
                debug!(
                    "attempt {attempts}: loglik = {:.6}, status = {}, iterations = {}",
                    out.value, out.status, out.iterations
                );
                if best.as_ref().map_or(true, |b| out.value > b.value) {
                    best = Some(out);
                }
                converged
            }
            Err(err) => {
                debug!("attempt {attempts} failed: {err}");
                last_error = Some(err.to_string());
                false
            }
        };
        let (next, again) = state.after_attempt(converged, opts.restart.retry);
        if next != state {
            debug!("restart state {state:?} -> {next:?}");
        }
        state = next;
        if !again {
            break;
        }
    }

    let outcome = best.ok_or_else(|| PoolError::OptimizationFailed {
        reason: last_error.unwrap_or_else(|| "no optimizer attempt produced a result".into()),
    })?;
    if state == RestartState::Failed {
        warn!(
            "optimizer did not converge after {attempts} attempt(s) ({}); returning the best point",
            outcome.status
        );
    }
    let theta = transform.to_constrained(outcome.theta_hat.view());
    Ok(DriverOutcome { outcome, theta, state, attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        optimization::loglik_optimizer::{MLEOptions, Tolerances},
        pooling::core::{
            data::{Pool, PoolData},
            offsets::SamplingCorrection,
        },
        pooling::models::logreg::PooledLogisticModel,
    };

    fn model_and_start(opts: &XErrorsOptions) -> (PooledLogisticModel, ResolvedStart) {
        let data = PoolData::new(vec![
            Pool::new(1, 1, vec![0.9], vec![]),
            Pool::new(1, 1, vec![0.4], vec![]),
            Pool::new(1, 1, vec![-0.1], vec![]),
            Pool::new(1, 0, vec![-0.2], vec![]),
            Pool::new(1, 0, vec![0.3], vec![]),
            Pool::new(1, 0, vec![-0.7], vec![]),
        ])
        .unwrap();
        let model = PooledLogisticModel::new(&data, opts, SamplingCorrection::None).unwrap();
        let start = opts.start_bounds.resolve(model.layout()).unwrap();
        (model, start)
    }

    #[test]
    // Purpose
    // -------
    // The state machine allows exactly one retry.
    fn restart_transitions() {
        use RestartState::*;
        assert_eq!(Initial.after_attempt(true, true), (Initial, false));
        assert_eq!(Initial.after_attempt(false, true), (Retried, true));
        assert_eq!(Initial.after_attempt(false, false), (Failed, false));
        assert_eq!(Retried.after_attempt(true, true), (Retried, false));
        assert_eq!(Retried.after_attempt(false, true), (Failed, false));
    }

    #[test]
    // Purpose
    // -------
    // A well-posed problem converges on the first attempt and the returned
    // θ respects the variance bound.
    //
    // Given
    // -----
    // - Six error-free singleton pools under the default options.
    //
    // Expect
    // ------
    // - `Initial`, one attempt, converged, `sigsq_x > 1e-4`.
    fn converges_on_first_attempt() {
        // Arrange
        let opts = XErrorsOptions::default();
        let (model, start) = model_and_start(&opts);

        // Act
        let out = optimize(&model, &start, &opts).unwrap();

        // Assert
        assert!(out.outcome.converged, "{}", out.outcome.status);
        assert_eq!((out.state, out.attempts), (RestartState::Initial, 1));
        assert!(out.theta[3] > 1e-4);
        assert!(out.outcome.value.is_finite());
    }

    #[test]
    // Purpose
    // -------
    // An iteration cap that prevents convergence triggers the retry and
    // ends in `Failed`, still returning the best point.
    fn iteration_cap_retries_then_fails() {
        // Arrange
        let tols = Tolerances::new(None, None, Some(1)).unwrap();
        let mut opts = XErrorsOptions::default();
        opts.mle_opts = MLEOptions { tols, ..MLEOptions::default() };
        opts.restart = RestartOptions::new(true, 0.1, Some(11)).unwrap();
        let (model, start) = model_and_start(&opts);

        // Act
        let out = optimize(&model, &start, &opts).unwrap();

        // Assert
        assert_eq!((out.state, out.attempts), (RestartState::Failed, 2));
        assert!(!out.outcome.converged);
        assert!(out.theta.iter().all(|v| v.is_finite()));

        // Without retry the first miss is final.
        opts.restart.retry = false;
        let out = optimize(&model, &start, &opts).unwrap();
        assert_eq!((out.state, out.attempts), (RestartState::Failed, 1));
    }

    #[test]
    fn jitter_is_reproducible_with_a_seed() {
        let u0 = Array1::zeros(4);
        let restart = RestartOptions::new(true, 0.5, Some(3)).unwrap();
        let a = jittered(&u0, &restart).unwrap();
        let b = jittered(&u0, &restart).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().any(|&v| v != 0.0));
    }
}
