//! loglik_optimizer::builders — L-BFGS construction from [`MLEOptions`].
//!
//! One builder per supported line search; both funnel through
//! [`configure_lbfgs`] so tolerance wiring lives in one place. The iteration
//! cap is applied on the executor in [`run`](super::run), not here.
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        traits::MLEOptions,
        types::{
            Cost, Grad, HagerZhangLS, LbfgsHagerZhang, LbfgsMoreThuente, MoreThuenteLS, Theta,
            DEFAULT_LBFGS_MEM,
        },
    },
};

pub fn build_optimizer_hager_zhang(opts: &MLEOptions) -> OptResult<LbfgsHagerZhang> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsHagerZhang::new(HagerZhangLS::new(), mem), opts)
}

pub fn build_optimizer_more_thuente(opts: &MLEOptions) -> OptResult<LbfgsMoreThuente> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    configure_lbfgs(LbfgsMoreThuente::new(MoreThuenteLS::new(), mem), opts)
}

/// Apply the optional gradient and cost tolerances; absent ones keep argmin's
/// defaults.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &MLEOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::traits::{LineSearcher, Tolerances};

    #[test]
    // Purpose
    // -------
    // Both builders succeed with default and explicit L-BFGS memory.
    fn builders_accept_default_and_explicit_memory() {
        let tols = Tolerances::new(Some(1e-6), Some(1e-8), Some(50)).unwrap();
        for mem in [None, Some(11)] {
            let hz = MLEOptions::new(tols, LineSearcher::HagerZhang, false, mem).unwrap();
            let mt = MLEOptions::new(tols, LineSearcher::MoreThuente, false, mem).unwrap();
            assert!(build_optimizer_hager_zhang(&hz).is_ok());
            assert!(build_optimizer_more_thuente(&mt).is_ok());
        }
    }

    #[test]
    // Purpose
    // -------
    // Absent tolerances leave argmin's defaults in place.
    fn configure_lbfgs_respects_absent_tolerances() {
        let raw = LBFGS::new(MoreThuenteLS::new(), DEFAULT_LBFGS_MEM);
        let tols = Tolerances::new(None, None, Some(50)).unwrap();
        let opts = MLEOptions::new(tols, LineSearcher::MoreThuente, false, None).unwrap();
        assert!(configure_lbfgs(raw, &opts).is_ok());
    }
}
