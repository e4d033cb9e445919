//! box_transform — unconstrained reparameterization of box constraints.
//!
//! Purpose
//! -------
//! L-BFGS works on ℝⁿ, while model parameters live in boxes
//! `lower_i < θ_i < upper_i` (variances bounded away from zero, optional
//! user limits on coefficients). [`BoxTransform`] maps each coordinate
//! between the box and ℝ with a smooth bijection chosen from which bounds
//! are finite.
//!
//! Key behaviors
//! -------------
//! - `(−∞, ∞)`: identity.
//! - `(l, ∞)`: `θ = l + softplus(u)`.
//! - `(−∞, h)`: `θ = h − softplus(u)`.
//! - `(l, h)`: `θ = l + (h − l)·logistic(u)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `lower_i < upper_i` for every coordinate (checked in [`BoxTransform::new`]).
//! - [`BoxTransform::to_unconstrained`] requires the point to lie strictly
//!   inside the box; boundary points have no finite preimage.
//! - [`BoxTransform::to_constrained`] never fails; extreme `u` saturate at
//!   the bound in floating point, which keeps lower-bounded variances
//!   positive.
use ndarray::{Array1, ArrayView1};

use crate::optimization::{
    errors::{OptError, OptResult},
    numerical_stability::transformations::{
        safe_logistic, safe_logit, safe_softplus, safe_softplus_inv,
    },
};

/// Which sides of a coordinate's box are finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Free,
    Lower(f64),
    Upper(f64),
    Interval(f64, f64),
}

impl Bound {
    fn from_limits(lower: f64, upper: f64) -> Self {
        match (lower.is_finite(), upper.is_finite()) {
            (false, false) => Bound::Free,
            (true, false) => Bound::Lower(lower),
            (false, true) => Bound::Upper(upper),
            (true, true) => Bound::Interval(lower, upper),
        }
    }

    fn limits(&self) -> (f64, f64) {
        match *self {
            Bound::Free => (f64::NEG_INFINITY, f64::INFINITY),
            Bound::Lower(l) => (l, f64::INFINITY),
            Bound::Upper(h) => (f64::NEG_INFINITY, h),
            Bound::Interval(l, h) => (l, h),
        }
    }

    fn forward(&self, u: f64) -> f64 {
        match *self {
            Bound::Free => u,
            Bound::Lower(l) => l + safe_softplus(u),
            Bound::Upper(h) => h - safe_softplus(u),
            Bound::Interval(l, h) => l + (h - l) * safe_logistic(u),
        }
    }

    fn inverse(&self, x: f64) -> f64 {
        match *self {
            Bound::Free => x,
            Bound::Lower(l) => safe_softplus_inv(x - l),
            Bound::Upper(h) => safe_softplus_inv(h - x),
            Bound::Interval(l, h) => safe_logit((x - l) / (h - l)),
        }
    }
}

/// Per-coordinate box reparameterization.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxTransform {
    bounds: Vec<Bound>,
}

impl BoxTransform {
    /// Build the transform from lower and upper bound vectors.
    ///
    /// Errors
    /// ------
    /// - [`OptError::BoundLengthMismatch`] when the vectors differ in length.
    /// - [`OptError::InvalidBounds`] when `lower_i >= upper_i` or either is NaN.
    pub fn new(lower: ArrayView1<f64>, upper: ArrayView1<f64>) -> OptResult<Self> {
        if lower.len() != upper.len() {
            return Err(OptError::BoundLengthMismatch { lower: lower.len(), upper: upper.len() });
        }
        let bounds = lower
            .iter()
            .zip(upper.iter())
            .enumerate()
            .map(|(index, (&l, &h))| {
                if l.is_nan() || h.is_nan() || l >= h {
                    return Err(OptError::InvalidBounds { index, lower: l, upper: h });
                }
                Ok(Bound::from_limits(l, h))
            })
            .collect::<OptResult<Vec<_>>>()?;
        Ok(Self { bounds })
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    /// Map an unconstrained optimizer point into the box.
    pub fn to_constrained(&self, u: ArrayView1<f64>) -> Array1<f64> {
        u.iter().zip(&self.bounds).map(|(&ui, b)| b.forward(ui)).collect()
    }

    /// Map a point strictly inside the box to optimizer space.
    ///
    /// Errors
    /// ------
    /// - [`OptError::OutsideBounds`] for a coordinate on or beyond a bound,
    ///   or not finite.
    pub fn to_unconstrained(&self, theta: ArrayView1<f64>) -> OptResult<Array1<f64>> {
        theta
            .iter()
            .zip(&self.bounds)
            .enumerate()
            .map(|(index, (&x, b))| {
                let (lower, upper) = b.limits();
                if !x.is_finite() || x <= lower || x >= upper {
                    return Err(OptError::OutsideBounds { index, value: x, lower, upper });
                }
                Ok(b.inverse(x))
            })
            .collect()
    }
}
