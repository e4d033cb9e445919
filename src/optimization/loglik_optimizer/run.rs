//! loglik_optimizer::run — executes a configured L-BFGS solver.
//!
//! Seeds the executor with the initial point, applies the iteration cap,
//! optionally attaches argmin's slog observer, and normalizes the final state
//! into an [`OptimOutcome`].
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{adapter::ArgMinAdapter, Grad, LogLikelihood, MLEOptions, OptimOutcome, Theta},
};
use argmin::core::{CostFunction, Executor, IterState, Solver, State};

pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, IterState<Theta, Grad, (), (), (), f64>>,
{
    if opts.verbose {
        match problem.cost(&theta0) {
            Ok(c0) => log::debug!("L-BFGS start: loglik = {:.6}", -c0),
            Err(e) => log::debug!("L-BFGS start: loglik not evaluable ({e})"),
        }
    }
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad = result.take_gradient();
    let outcome = OptimOutcome::new(
        result.take_best_param(),
        -result.get_best_cost(),
        termination,
        iterations,
        function_counts,
        grad,
    )?;
    log::debug!(
        "L-BFGS finished after {} iterations: loglik = {:.6}, status = {}",
        outcome.iterations,
        outcome.value,
        outcome.status
    );
    Ok(outcome)
}
