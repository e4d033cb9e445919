//! inference::hessian — observed information and its inverse.
//!
//! Purpose
//! -------
//! Turn a negative log-likelihood into a variance-covariance matrix at the
//! MLE: a Richardson-extrapolated numerical Hessian gives the observed
//! information `J(θ̂)`, and its inverse is the classical vcov.
//!
//! Key behaviors
//! -------------
//! - [`observed_information`] wraps
//!   [`compute_hessian`](crate::optimization::loglik_optimizer::compute_hessian)
//!   on the NLL in constrained (model) coordinates.
//! - [`invert_information`] copies `J` into a `nalgebra::DMatrix`
//!   ([`fill_dmatrix`]), rejects non-finite or singular matrices, inverts,
//!   symmetrizes, and reports non-positive diagonal entries and the smallest
//!   eigenvalue of the result.
//!
//! Invariants & assumptions
//! ------------------------
//! - Singularity is judged by the ratio of the smallest to the largest
//!   absolute eigenvalue of `J`; ratios at most [`EIGEN_EPS`] are singular.
//! - A returned vcov is finite and exactly symmetric. It may still be
//!   indefinite when θ̂ is not a strict maximum; that case is flagged, not
//!   rejected.
//!
//! Conventions
//! -----------
//! - The Hessian is of the **summed** NLL, so the inverse is on the
//!   parameter scale without further rescaling.
//! - Errors are reported via [`InferenceResult<T>`]; callers turn them into
//!   diagnostics.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the ndarray → nalgebra copy, inversion of a known
//!   matrix, singular and non-finite rejection, flagging of negative
//!   diagonals, and the numerical information of a Gaussian NLL.
use nalgebra::DMatrix;
use ndarray::Array2;

use crate::{
    inference::errors::{InferenceError, InferenceResult},
    optimization::{
        errors::OptResult,
        loglik_optimizer::{compute_hessian, HessianOptions, Theta},
    },
};

/// Relative eigenvalue threshold below which a matrix counts as singular.
pub const EIGEN_EPS: f64 = 1e-12;

/// Inverse of the observed information with its quality flags.
#[derive(Debug, Clone, PartialEq)]
pub struct VcovEstimate {
    /// Symmetric `p × p` variance-covariance matrix.
    pub vcov: Array2<f64>,
    /// Indices whose variance is `<= 0`.
    pub nonpositive_diagonal: Vec<usize>,
    /// Smallest eigenvalue of `vcov`.
    pub min_eigenvalue: f64,
}

impl VcovEstimate {
    /// `true` when no eigenvalue is meaningfully negative.
    pub fn is_psd(&self) -> bool {
        let scale = self.vcov.diag().iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
        self.min_eigenvalue >= -EIGEN_EPS.sqrt() * scale
    }
}

/// Observed information `J(θ̂)`, the Hessian of the negative log-likelihood.
///
/// Parameters
/// ----------
/// - `nll`: negative log-likelihood in model coordinates.
/// - `theta_hat`: evaluation point.
/// - `opts`: Richardson step controls.
///
/// Errors
/// ------
/// - `InferenceError::Hessian` wrapping any `OptError` raised by `nll` or
///   by the Hessian validation (non-finite entries, wrong shape).
pub fn observed_information<F>(
    nll: &F, theta_hat: &Theta, opts: &HessianOptions,
) -> InferenceResult<Array2<f64>>
where
    F: Fn(&Theta) -> OptResult<f64>,
{
    Ok(compute_hessian(nll, theta_hat, opts)?)
}

/// Invert the observed information into a [`VcovEstimate`].
///
/// Errors
/// ------
/// - `InferenceError::DimensionMismatch` for a non-square input.
/// - `InferenceError::NonFiniteInformation` for NaN/∞ entries.
/// - `InferenceError::SingularInformation` when the eigenvalue ratio is at
///   most [`EIGEN_EPS`] or LU inversion fails.
/// - `InferenceError::NonFiniteVcov` when the inverse overflows.
pub fn invert_information(info: &Array2<f64>) -> InferenceResult<VcovEstimate> {
    let (rows, cols) = info.dim();
    if rows != cols {
        return Err(InferenceError::DimensionMismatch { expected: rows, rows, cols });
    }
    if info.iter().any(|v| !v.is_finite()) {
        return Err(InferenceError::NonFiniteInformation);
    }
    let mut info_nalg = DMatrix::<f64>::zeros(rows, cols);
    fill_dmatrix(info, &mut info_nalg);

    let eigenvalues = info_nalg.clone().symmetric_eigen().eigenvalues;
    let max_abs = eigenvalues.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let min_abs = eigenvalues.iter().fold(f64::INFINITY, |m, v| m.min(v.abs()));
    let ratio = if max_abs > 0.0 { min_abs / max_abs } else { 0.0 };
    if ratio <= EIGEN_EPS {
        return Err(InferenceError::SingularInformation { ratio });
    }

    let inverse = info_nalg.try_inverse().ok_or(InferenceError::SingularInformation { ratio })?;
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(InferenceError::NonFiniteVcov);
    }
    let symmetric = (&inverse + inverse.transpose()) * 0.5;
    let min_eigenvalue =
        symmetric.clone().symmetric_eigen().eigenvalues.iter().fold(f64::INFINITY, |m, v| m.min(*v));
    let vcov = Array2::from_shape_fn((rows, cols), |(i, j)| symmetric[(i, j)]);
    let nonpositive_diagonal = (0..rows).filter(|&i| vcov[[i, i]] <= 0.0).collect();

    Ok(VcovEstimate { vcov, nonpositive_diagonal, min_eigenvalue })
}

// ---- Helper methods ----

/// Copy a square `ndarray` matrix into a preallocated `DMatrix`, column by
/// column. Shapes must match.
fn fill_dmatrix(src: &Array2<f64>, dst: &mut DMatrix<f64>) {
    let n = src.ncols();
    for j in 0..n {
        for i in 0..src.nrows() {
            dst[(i, j)] = src[[i, j]];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    #[test]
    // Purpose
    // -------
    // Verify that `fill_dmatrix` copies entries without altering them.
    fn fill_dmatrix_copies_ndarray_into_dmatrix_without_modification() {
        // Arrange
        let src: Array2<f64> = array![[2.0, 0.5], [0.5, 1.0]];
        let mut dst = DMatrix::<f64>::zeros(2, 2);

        // Act
        fill_dmatrix(&src, &mut dst);

        // Assert
        assert_eq!(dst[(0, 0)], 2.0);
        assert_eq!(dst[(0, 1)], 0.5);
        assert_eq!(dst[(1, 0)], 0.5);
        assert_eq!(dst[(1, 1)], 1.0);
    }

    #[test]
    // Purpose
    // -------
    // Inverting a positive-definite information matrix yields the analytic
    // inverse, symmetric and PSD, with no flagged diagonals.
    //
    // Given
    // -----
    // - J = [[4, 1], [1, 2]], det 7.
    //
    // Expect
    // ------
    // - vcov = (1/7)·[[2, −1], [−1, 4]].
    fn invert_information_matches_analytic_inverse() {
        // Arrange
        let info = array![[4.0, 1.0], [1.0, 2.0]];

        // Act
        let est = invert_information(&info).unwrap();

        // Assert
        assert_relative_eq!(est.vcov[[0, 0]], 2.0 / 7.0, max_relative = 1e-12);
        assert_relative_eq!(est.vcov[[0, 1]], -1.0 / 7.0, max_relative = 1e-12);
        assert_eq!(est.vcov[[0, 1]], est.vcov[[1, 0]]);
        assert_relative_eq!(est.vcov[[1, 1]], 4.0 / 7.0, max_relative = 1e-12);
        assert!(est.nonpositive_diagonal.is_empty());
        assert!(est.is_psd());
    }

    #[test]
    // Purpose
    // -------
    // An indefinite information matrix still inverts, but the negative
    // variance is flagged and the result is not PSD.
    fn indefinite_information_is_flagged_not_rejected() {
        let info = array![[2.0, 0.0], [0.0, -0.5]];
        let est = invert_information(&info).unwrap();
        assert_eq!(est.nonpositive_diagonal, vec![1]);
        assert!(!est.is_psd());
        assert_relative_eq!(est.min_eigenvalue, -2.0, max_relative = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Singular, non-finite, and non-square inputs are rejected.
    fn unusable_information_is_rejected() {
        assert!(matches!(
            invert_information(&array![[1.0, 1.0], [1.0, 1.0]]),
            Err(InferenceError::SingularInformation { .. })
        ));
        assert_eq!(
            invert_information(&array![[f64::NAN, 0.0], [0.0, 1.0]]),
            Err(InferenceError::NonFiniteInformation)
        );
        assert!(matches!(
            invert_information(&Array2::zeros((2, 3))),
            Err(InferenceError::DimensionMismatch { rows: 2, cols: 3, .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // The observed information of a Gaussian NLL in (μ, σ²) at the MLE has
    // the analytic diagonal `n/σ²` and `n/(2σ⁴)`.
    fn observed_information_of_gaussian_nll_is_analytic() {
        // Arrange
        let data: Array1<f64> = array![0.3, -1.2, 0.8, 2.1, 0.4, -0.5];
        let n = data.len() as f64;
        let mu = data.mean().unwrap();
        let s2 = data.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / n;
        let nll = |theta: &Theta| -> OptResult<f64> {
            let (m, v) = (theta[0], theta[1]);
            let ss: f64 = data.iter().map(|x| (x - m).powi(2)).sum();
            Ok(0.5 * n * (2.0 * std::f64::consts::PI * v).ln() + 0.5 * ss / v)
        };

        // Act
        let info = observed_information(&nll, &array![mu, s2], &HessianOptions::default()).unwrap();

        // Assert
        assert_relative_eq!(info[[0, 0]], n / s2, max_relative = 1e-6);
        assert_relative_eq!(info[[1, 1]], n / (2.0 * s2 * s2), max_relative = 1e-6);
        assert!(info[[0, 1]].abs() < 1e-6);
    }
}
