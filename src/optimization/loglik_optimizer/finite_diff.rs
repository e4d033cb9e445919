//! loglik_optimizer::finite_diff — finite-difference gradients and Hessians.
//!
//! Purpose
//! -------
//! Supply derivatives when a log-likelihood has no analytic form for them:
//! first derivatives for the L-BFGS solver and second derivatives for the
//! observed-information matrix used by the inference layer.
//!
//! Key behaviors
//! -------------
//! - [`run_fd_diff`]: forward-difference gradient with error capture, used
//!   as the fallback when the central-difference gradient in the adapter
//!   fails validation.
//! - [`compute_hessian`]: value-based central second differences refined by
//!   Richardson extrapolation over a geometric sequence of steps, controlled
//!   by [`HessianOptions`]. The result is validated and symmetrized.
//!
//! Invariants & assumptions
//! ------------------------
//! - Objectives may fail at perturbed points (e.g. a variance pushed below
//!   zero). Such failures abort the derivative and surface as `OptError`.
//! - Returned gradients satisfy [`validate_grad`]; returned Hessians satisfy
//!   [`validate_hessian`] and are exactly symmetric.
//!
//! Conventions
//! -----------
//! - The initial step for coordinate `i` is `d·|x_i|`, plus `eps` when
//!   `|x_i| < zero_tol`. Each Richardson level divides the step by `v`.
//!
//! Testing notes
//! -------------
//! - Unit tests compare against analytic Hessians of smooth functions and
//!   exercise the error-capture paths.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        types::Hessian,
        validation::{validate_grad, validate_hessian},
        Grad, Theta,
    },
};
use argmin::core::Error;
use finitediff::FiniteDiff;
use std::cell::RefCell;

/// Step controls for the Richardson-extrapolated Hessian.
///
/// Fields
/// ------
/// - `d`: relative initial step (default `0.1`).
/// - `eps`: absolute step added for near-zero coordinates (default `1e-4`).
/// - `zero_tol`: threshold below which a coordinate counts as zero
///   (default `sqrt(ε_mach / 7e-7)`).
/// - `r`: number of Richardson levels (default `4`).
/// - `v`: step reduction factor between levels (default `2`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HessianOptions {
    pub d: f64,
    pub eps: f64,
    pub zero_tol: f64,
    pub r: usize,
    pub v: f64,
}

impl HessianOptions {
    /// Validated constructor.
    ///
    /// Errors
    /// ------
    /// - [`OptError::InvalidHessianStep`] when `d`, `eps`, or `zero_tol` is
    ///   not finite and positive, `r == 0`, or `v <= 1`.
    pub fn new(d: f64, eps: f64, zero_tol: f64, r: usize, v: f64) -> OptResult<Self> {
        for (name, value) in [("d", d), ("eps", eps), ("zero_tol", zero_tol)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(OptError::InvalidHessianStep {
                    name,
                    value,
                    reason: "Step controls must be finite and positive.",
                });
            }
        }
        if r == 0 {
            return Err(OptError::InvalidHessianStep {
                name: "r",
                value: 0.0,
                reason: "At least one Richardson level is required.",
            });
        }
        if !v.is_finite() || v <= 1.0 {
            return Err(OptError::InvalidHessianStep {
                name: "v",
                value: v,
                reason: "Step reduction factor must exceed one.",
            });
        }
        Ok(Self { d, eps, zero_tol, r, v })
    }
}

impl Default for HessianOptions {
    fn default() -> Self {
        Self { d: 0.1, eps: 1e-4, zero_tol: (f64::EPSILON / 7e-7).sqrt(), r: 4, v: 2.0 }
    }
}

/// Forward-difference gradient of `func` at `theta`.
///
/// Any error recorded by `func` into `closure_err` during differencing
/// aborts the computation and is returned as an `OptError`.
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}

/// Richardson-extrapolated central-difference Hessian of a scalar function.
///
/// Parameters
/// ----------
/// - `f`: fallible scalar objective, typically the negative log-likelihood
///   in model space.
/// - `theta`: evaluation point.
/// - `opts`: step controls.
///
/// Returns
/// -------
/// A validated, symmetric `n × n` matrix.
///
/// Errors
/// ------
/// - Any error returned by `f` at the center or a perturbed point.
/// - [`OptError::InvalidHessian`] if extrapolation produced a non-finite entry.
///
/// Notes
/// -----
/// - Cost is `r · (2n + 2n(n−1))` evaluations plus one at the center.
pub fn compute_hessian<F>(f: &F, theta: &Theta, opts: &HessianOptions) -> OptResult<Hessian>
where
    F: Fn(&Theta) -> OptResult<f64>,
{
    let n = theta.len();
    let f0 = f(theta)?;
    let base_steps: Vec<f64> = theta
        .iter()
        .map(|&x| {
            let bump = if x.abs() < opts.zero_tol { opts.eps } else { 0.0 };
            opts.d * x.abs() + bump
        })
        .collect();

    let mut levels: Vec<Hessian> = Vec::with_capacity(opts.r);
    for k in 0..opts.r {
        let scale = opts.v.powi(k as i32);
        let h: Vec<f64> = base_steps.iter().map(|s| s / scale).collect();
        levels.push(second_differences(f, theta, f0, &h)?);
    }

    for m in 1..opts.r {
        let factor = opts.v.powi(2 * m as i32);
        for k in 0..opts.r - m {
            let refined = (&levels[k + 1] * factor - &levels[k]) / (factor - 1.0);
            levels[k] = refined;
        }
    }

    let mut hess = levels.swap_remove(0);
    validate_hessian(&hess, n)?;
    symmetrize_hess(&mut hess);
    Ok(hess)
}

// ---- Helper methods ----

fn second_differences<F>(f: &F, theta: &Theta, f0: f64, h: &[f64]) -> OptResult<Hessian>
where
    F: Fn(&Theta) -> OptResult<f64>,
{
    let n = theta.len();
    let mut est = Hessian::zeros((n, n));
    let mut point = theta.clone();
    let mut shifted = |moves: &[(usize, f64)]| -> OptResult<f64> {
        for &(i, step) in moves {
            point[i] += step;
        }
        let value = f(&point);
        for &(i, _) in moves {
            point[i] = theta[i];
        }
        value
    };

    for i in 0..n {
        let fp = shifted(&[(i, h[i])])?;
        let fm = shifted(&[(i, -h[i])])?;
        est[[i, i]] = (fp - 2.0 * f0 + fm) / (h[i] * h[i]);
        for j in 0..i {
            let fpp = shifted(&[(i, h[i]), (j, h[j])])?;
            let fpm = shifted(&[(i, h[i]), (j, -h[j])])?;
            let fmp = shifted(&[(i, -h[i]), (j, h[j])])?;
            let fmm = shifted(&[(i, -h[i]), (j, -h[j])])?;
            let cross = (fpp - fpm - fmp + fmm) / (4.0 * h[i] * h[j]);
            est[[i, j]] = cross;
            est[[j, i]] = cross;
        }
    }
    Ok(est)
}

fn symmetrize_hess(hess: &mut Hessian) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use argmin::core::ArgminError;
    use ndarray::{array, Array1};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // - Forward-difference gradients with and without closure errors.
    // - Richardson Hessians against analytic second derivatives.
    // - Step-option validation.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // `run_fd_diff` returns a finite gradient of the right length for a
    // smooth objective.
    fn run_fd_diff_quadratic_returns_valid_gradient() {
        // Arrange
        let theta: Theta = array![0.5, 1.0];
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let f = |x: &Theta| x.dot(x);

        // Act
        let grad = run_fd_diff(&theta, &f, &closure_err).unwrap();

        // Assert
        assert_abs_diff_eq!(grad[0], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(grad[1], 2.0, epsilon = 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // An error recorded by the objective aborts the gradient.
    fn run_fd_diff_closure_error_is_propagated() {
        // Arrange
        let theta: Theta = array![1.0];
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let f = |_: &Theta| {
            closure_err.replace(Some(ArgminError::NotImplemented { text: "fd".into() }.into()));
            f64::NAN
        };

        // Act
        let err = run_fd_diff(&theta, &f, &closure_err).unwrap_err();

        // Assert
        assert_eq!(err, OptError::NotImplemented { text: "fd".into() });
    }

    #[test]
    // Purpose
    // -------
    // The extrapolated Hessian reproduces analytic second derivatives of a
    // non-quadratic function, including the cross term.
    //
    // Given
    // -----
    // - f(x, y) = exp(x) + x²y³ at (0.3, −0.7).
    //
    // Expect
    // ------
    // - f_xx = eˣ + 2y³, f_yy = 6x²y, f_xy = 6xy² within 1e-7.
    fn compute_hessian_matches_analytic_second_derivatives() {
        // Arrange
        let f = |t: &Theta| -> OptResult<f64> { Ok(t[0].exp() + t[0] * t[0] * t[1].powi(3)) };
        let theta: Theta = array![0.3, -0.7];
        let (x, y) = (theta[0], theta[1]);

        // Act
        let hess = compute_hessian(&f, &theta, &HessianOptions::default()).unwrap();

        // Assert
        assert_abs_diff_eq!(hess[[0, 0]], x.exp() + 2.0 * y.powi(3), epsilon = 1e-7);
        assert_abs_diff_eq!(hess[[1, 1]], 6.0 * x * x * y, epsilon = 1e-7);
        assert_abs_diff_eq!(hess[[0, 1]], 6.0 * x * y * y, epsilon = 1e-7);
        assert_eq!(hess[[0, 1]], hess[[1, 0]]);
    }

    #[test]
    // Purpose
    // -------
    // Coordinates at zero still get a usable step through `eps`.
    fn compute_hessian_handles_zero_coordinates() {
        let f = |t: &Theta| -> OptResult<f64> { Ok(2.0 * t[0] * t[0] + t[0] * t[1]) };
        let theta: Theta = Array1::zeros(2);
        let hess = compute_hessian(&f, &theta, &HessianOptions::default()).unwrap();
        assert_abs_diff_eq!(hess[[0, 0]], 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hess[[0, 1]], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hess[[1, 1]], 0.0, epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // Objective failures at perturbed points surface as errors.
    fn compute_hessian_propagates_objective_errors() {
        let f = |t: &Theta| -> OptResult<f64> {
            if t[0] > 1.0 { Err(OptError::NonFiniteCost { value: f64::NAN }) } else { Ok(t[0]) }
        };
        let theta: Theta = array![1.0];
        assert!(compute_hessian(&f, &theta, &HessianOptions::default()).is_err());
    }

    #[test]
    fn hessian_options_reject_bad_steps() {
        assert!(HessianOptions::new(0.0, 1e-4, 1e-5, 4, 2.0).is_err());
        assert!(HessianOptions::new(0.1, 1e-4, 1e-5, 0, 2.0).is_err());
        assert!(HessianOptions::new(0.1, 1e-4, 1e-5, 4, 1.0).is_err());
        assert!(HessianOptions::new(0.1, 1e-4, 1e-5, 4, 2.0).is_ok());
    }
}
