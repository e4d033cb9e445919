//! Likelihood evaluator — stratified log-likelihood with explicit
//! degeneracy reporting.
//!
//! Purpose
//! -------
//! Sum per-unit log-likelihood contributions over the exact, replicated, and
//! single-surrogate strata, and hand the optimizer a value it can use even
//! when an integral collapses.
//!
//! Key behaviors
//! -------------
//! - [`PooledFamily`] is implemented by each model family: it decodes θ and
//!   evaluates one unit at a time. The provided
//!   [`PooledFamily::evaluate`] walks the strata in order and builds a
//!   [`LogLikEvaluation`].
//! - A unit whose contribution is not finite (a degenerate integral, or a
//!   closed form that underflowed) ends its stratum:
//!   [`StratumTerm::Degenerate`] records the unit and the partial sum.
//! - [`LogLikEvaluation::value`] is `None` for a degenerate evaluation, so
//!   a partial sum is never mistaken for a log-likelihood.
//! - [`BoundedLikelihood`] adapts a family to the optimizer's
//!   [`LogLikelihood`] trait in unconstrained coordinates, applying the
//!   [`DegeneratePolicy`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Strata are evaluated in the fixed order exact → replicated →
//!   single-surrogate, so partial sums are reproducible.
//! - `evaluate` never fails: input validation happened at construction, and
//!   numerical trouble is reported through the returned value.
use log::debug;
use ndarray::{Array1, ArrayView1};

use crate::{
    optimization::{
        errors::OptResult,
        loglik_optimizer::{LogLikelihood, Theta},
        numerical_stability::box_transform::BoxTransform,
    },
    pooling::{
        core::{
            layout::ParamLayout,
            options::{DegeneratePolicy, DEGENERATE_PENALTY},
            strata::{Strata, Stratum, StratumSlice},
        },
        errors::PoolError,
    },
};

/// Contribution of one stratum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StratumTerm {
    /// Every unit contributed a finite value.
    Value(f64),
    /// Evaluation stopped at `unit` (original pool index); `partial` is the
    /// sum over the units before it.
    Degenerate { unit: usize, partial: f64 },
}

impl StratumTerm {
    pub fn partial_value(&self) -> f64 {
        match *self {
            StratumTerm::Value(v) => v,
            StratumTerm::Degenerate { partial, .. } => partial,
        }
    }
}

/// Per-stratum results of one likelihood evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogLikEvaluation {
    terms: Vec<(Stratum, StratumTerm)>,
}

impl LogLikEvaluation {
    pub fn push(&mut self, stratum: Stratum, term: StratumTerm) {
        self.terms.push((stratum, term));
    }

    pub fn terms(&self) -> &[(Stratum, StratumTerm)] {
        &self.terms
    }

    /// Sum of values and partial sums.
    pub fn total(&self) -> f64 {
        self.terms.iter().map(|(_, t)| t.partial_value()).sum()
    }

    /// `(stratum, unit)` for every abandoned stratum.
    pub fn degenerate_units(&self) -> Vec<(Stratum, usize)> {
        self.terms
            .iter()
            .filter_map(|(s, t)| match *t {
                StratumTerm::Degenerate { unit, .. } => Some((*s, unit)),
                StratumTerm::Value(_) => None,
            })
            .collect()
    }

    /// The log-likelihood, or `None` when any stratum was abandoned.
    pub fn value(&self) -> Option<f64> {
        if self.is_degenerate() { None } else { Some(self.total()) }
    }

    pub fn is_degenerate(&self) -> bool {
        self.terms.iter().any(|(_, t)| matches!(t, StratumTerm::Degenerate { .. }))
    }

    /// Value the optimizer sees under `policy`.
    pub fn objective(&self, policy: DegeneratePolicy) -> f64 {
        match policy {
            DegeneratePolicy::Penalize if self.is_degenerate() => DEGENERATE_PENALTY,
            _ => self.total(),
        }
    }
}

/// A pooled model family evaluated unit by unit.
pub trait PooledFamily {
    /// Decoded, model-specific view of θ.
    type Params;

    fn layout(&self) -> &ParamLayout;

    fn strata(&self) -> &Strata;

    /// Decode constrained θ; `theta.len() == self.layout().len()`.
    fn decode(&self, theta: ArrayView1<f64>) -> Self::Params;

    /// Log-likelihood of unit `row` of `slice`.
    fn unit_ln_lik(&self, params: &Self::Params, slice: &StratumSlice, row: usize) -> f64;

    /// Log-odds-ratio of exposure at constrained θ and its gradient in θ.
    fn log_or(&self, theta: ArrayView1<f64>) -> (f64, Array1<f64>);

    /// Evaluate all strata at constrained θ.
    fn evaluate(&self, theta: ArrayView1<f64>) -> LogLikEvaluation {
        let params = self.decode(theta);
        let mut eval = LogLikEvaluation::default();
        for slice in self.strata().iter() {
            eval.push(slice.stratum, stratum_term(self, &params, slice));
        }
        eval
    }
}

fn stratum_term<M: PooledFamily + ?Sized>(
    model: &M, params: &M::Params, slice: &StratumSlice,
) -> StratumTerm {
    let mut sum = 0.0;
    for row in 0..slice.len() {
        let value = model.unit_ln_lik(params, slice, row);
        if !value.is_finite() {
            return StratumTerm::Degenerate { unit: slice.units[row], partial: sum };
        }
        sum += value;
    }
    StratumTerm::Value(sum)
}

/// A [`PooledFamily`] seen by the optimizer in unconstrained coordinates.
///
/// `Data` is the [`BoxTransform`] mapping `u ∈ ℝᵖ` to the constrained θ.
pub struct BoundedLikelihood<'a, M: PooledFamily> {
    model: &'a M,
    policy: DegeneratePolicy,
}

impl<'a, M: PooledFamily> BoundedLikelihood<'a, M> {
    pub fn new(model: &'a M, policy: DegeneratePolicy) -> Self {
        BoundedLikelihood { model, policy }
    }
}

impl<M: PooledFamily> LogLikelihood for BoundedLikelihood<'_, M> {
    type Data = BoxTransform;

    fn value(&self, u: &Theta, transform: &BoxTransform) -> OptResult<f64> {
        let theta = transform.to_constrained(u.view());
        let eval = self.model.evaluate(theta.view());
        if eval.is_degenerate() {
            debug!("degenerate likelihood evaluation at units {:?}", eval.degenerate_units());
        }
        Ok(eval.objective(self.policy))
    }

    fn check(&self, u: &Theta, transform: &BoxTransform) -> OptResult<()> {
        let expected = self.model.layout().len();
        for (name, found) in [("theta", u.len()), ("bounds", transform.len())] {
            if found != expected {
                return Err(PoolError::LengthMismatch { name, expected, found }.into());
            }
        }
        Ok(())
    }
}
