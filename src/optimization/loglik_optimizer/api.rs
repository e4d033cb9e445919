//! loglik_optimizer::api — the single entry point [`maximize`].
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{LineSearcher, LogLikelihood, MLEOptions},
        OptimOutcome, Theta,
    },
};

/// Maximize `ℓ(u)` from `theta0` with L-BFGS.
///
/// Parameters
/// ----------
/// - `f`: the log-likelihood.
/// - `theta0`: starting point in the optimizer's unconstrained space.
/// - `data`: payload forwarded to every `value`/`grad` call.
/// - `opts`: tolerances, iteration cap, line search, verbosity.
///
/// Returns
/// -------
/// An [`OptimOutcome`] whose `value` is the best log-likelihood. Reaching the
/// iteration cap is reported through `converged == false`, not as an error.
///
/// Errors
/// ------
/// - Whatever `f.check` returns for `theta0`.
/// - Solver construction errors from invalid tolerances.
/// - Backend failures, e.g. a line search that cannot find a finite cost.
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::errors::{OptError, OptResult};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1};

    /// Gaussian log-likelihood in (mean, log sd) for a fixed sample.
    struct GaussianLoglik;

    impl LogLikelihood for GaussianLoglik {
        type Data = Array1<f64>;

        fn value(&self, theta: &Theta, data: &Array1<f64>) -> OptResult<f64> {
            let (mu, log_sd) = (theta[0], theta[1]);
            let var = (2.0 * log_sd).exp();
            let n = data.len() as f64;
            let ss: f64 = data.iter().map(|x| (x - mu).powi(2)).sum();
            Ok(-0.5 * n * (2.0 * std::f64::consts::PI * var).ln() - 0.5 * ss / var)
        }

        fn check(&self, theta: &Theta, _data: &Array1<f64>) -> OptResult<()> {
            if theta.len() != 2 {
                return Err(OptError::GradientDimMismatch { expected: 2, found: theta.len() });
            }
            Ok(())
        }
    }

    #[test]
    // Purpose
    // -------
    // Both line searches recover the closed-form Gaussian MLE and report
    // convergence.
    //
    // Given
    // -----
    // - Sample {1, 2, 3, 4, 5}: mean 3, MLE variance 2.
    //
    // Expect
    // ------
    // - μ̂ ≈ 3, exp(2·log σ̂) ≈ 2, converged.
    fn maximize_recovers_gaussian_mle_with_both_line_searches() {
        let data = array![1.0, 2.0, 3.0, 4.0, 5.0];
        for ls in [LineSearcher::MoreThuente, LineSearcher::HagerZhang] {
            // Arrange
            let opts = MLEOptions { line_searcher: ls, ..MLEOptions::default() };

            // Act
            let out = maximize(&GaussianLoglik, array![0.0, 0.0], &data, &opts).unwrap();

            // Assert
            assert!(out.converged, "{ls:?} did not converge: {}", out.status);
            assert_abs_diff_eq!(out.theta_hat[0], 3.0, epsilon = 1e-4);
            assert_abs_diff_eq!((2.0 * out.theta_hat[1]).exp(), 2.0, epsilon = 1e-3);
        }
    }

    #[test]
    // Purpose
    // -------
    // `check` runs before the solver and its error is returned verbatim.
    fn maximize_runs_check_first() {
        let data = array![1.0];
        let err = maximize(&GaussianLoglik, array![0.0], &data, &MLEOptions::default())
            .unwrap_err();
        assert_eq!(err, OptError::GradientDimMismatch { expected: 2, found: 1 });
    }
}
