//! Pooled-data simulator for both model families.
//!
//! Purpose
//! -------
//! Generate [`PoolData`] from known parameters so that estimators can be
//! checked for recovery and calibration, and so that examples do not depend
//! on external data files.
//!
//! Key behaviors
//! -------------
//! - [`simulate_logreg`]: draws individuals `(C, X, Y)` from the individual
//!   logistic model, fills case and control pools separately (case-control
//!   pooling), records pool-average exposure and **summed** covariates.
//! - [`simulate_gdfa`]: draws one covariate row per pool (homogeneous
//!   pools), then `X̄ | y, c` from the pooled gamma model directly.
//! - Replicates are contaminated by additive normal (logistic) or unit-mean
//!   log-normal (gamma) error with the per-replicate variance given by
//!   [`ErrorVariances::total`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Pool sizes are assigned in rotation, so every size appears for both
//!   outcomes whenever `pools_per_outcome >= sizes.len()`.
//! - Covariates are independent standard normals.
//! - Pools of size one only receive replicates when measurement error is
//!   present; otherwise their single value is exact.
//!
//! Conventions
//! -----------
//! - `seed: Some(s)` makes a run reproducible; `None` draws from entropy.
use rand::{
    distributions::{Bernoulli, Distribution},
    rngs::StdRng,
    SeedableRng,
};
use rand_distr::{Gamma, Normal, StandardNormal};

use crate::{
    optimization::numerical_stability::transformations::safe_logistic,
    pooling::{
        core::{
            data::{Pool, PoolData},
            layout::ErrorVariances,
        },
        errors::{PoolError, PoolResult},
    },
};

/// Upper bound on individual draws per requested pool member.
const MAX_DRAWS_PER_MEMBER: usize = 10_000;

/// Pooling design and RNG settings.
///
/// - `sizes`: pool sizes, assigned in rotation within each outcome.
/// - `pools_per_outcome`: number of case pools and of control pools.
/// - `replicates`: measurements per replicated pool.
/// - `replicate_every`: replicate every n-th eligible pool (`1` = all).
/// - `seed`: optional RNG seed.
#[derive(Debug, Clone, PartialEq)]
pub struct SimOpts {
    pub sizes: Vec<usize>,
    pub pools_per_outcome: usize,
    pub replicates: usize,
    pub replicate_every: usize,
    pub seed: Option<u64>,
}

impl SimOpts {
    /// Errors
    /// ------
    /// - `PoolError::InvalidSimParam` for empty or zero sizes, zero pools,
    ///   zero replicates, or `replicate_every == 0`.
    pub fn new(
        sizes: Vec<usize>, pools_per_outcome: usize, replicates: usize, replicate_every: usize,
        seed: Option<u64>,
    ) -> PoolResult<Self> {
        let bad = |name: &'static str, value: usize, reason: &'static str| {
            Err(PoolError::InvalidSimParam { name, value: value as f64, reason })
        };
        if sizes.is_empty() {
            return bad("sizes", 0, "at least one pool size is required");
        }
        if let Some(&g) = sizes.iter().find(|&&g| g == 0) {
            return bad("sizes", g, "pool sizes must be at least 1");
        }
        if pools_per_outcome == 0 {
            return bad("pools_per_outcome", 0, "must be at least 1");
        }
        if replicates == 0 {
            return bad("replicates", 0, "must be at least 1");
        }
        if replicate_every == 0 {
            return bad("replicate_every", 0, "must be at least 1");
        }
        Ok(SimOpts { sizes, pools_per_outcome, replicates, replicate_every, seed })
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        }
    }

    fn size_of(&self, j: usize) -> usize {
        self.sizes[j % self.sizes.len()]
    }

    fn replicates_for(&self, j: usize, size: usize, errors: &ErrorVariances) -> usize {
        let contaminated = size > 1 || errors.measurement.iter().any(|&v| v > 0.0);
        if contaminated && j % self.replicate_every == 0 { self.replicates } else { 1 }
    }
}

/// True parameters of the individual logistic model.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticSimParams {
    pub beta_0: f64,
    pub beta_x: f64,
    pub beta_c: Vec<f64>,
    pub alpha_0: f64,
    pub alpha_c: Vec<f64>,
    pub sigsq_x: f64,
    pub errors: ErrorVariances,
    pub constant_pe: bool,
}

/// True parameters of the gamma discriminant-function model.
#[derive(Debug, Clone, PartialEq)]
pub struct GammaDfaSimParams {
    pub gamma_0: f64,
    pub gamma_c: Vec<f64>,
    pub b1: f64,
    pub b0: f64,
    pub errors: ErrorVariances,
    pub constant_pe: bool,
}

/// Simulate case-control pooled data from the logistic model.
///
/// Errors
/// ------
/// - `PoolError::InvalidSimParam` for `beta_c`/`alpha_c` of different
///   lengths, non-positive or non-finite variances, or when one outcome is
///   too rare to fill its pools within the draw budget.
pub fn simulate_logreg(params: &LogisticSimParams, opts: &SimOpts) -> PoolResult<PoolData> {
    if params.beta_c.len() != params.alpha_c.len() {
        return Err(PoolError::InvalidSimParam {
            name: "alpha_c",
            value: params.alpha_c.len() as f64,
            reason: "must have the same length as beta_c",
        });
    }
    check_positive("sigsq_x", params.sigsq_x)?;
    check_errors(&params.errors)?;
    let p = params.beta_c.len();
    let mut rng = opts.rng();
    let exposure_sd = params.sigsq_x.sqrt();

    // members needed per outcome: [control, case]
    let needed: usize = (0..opts.pools_per_outcome).map(|j| opts.size_of(j)).sum();
    let mut members: [Vec<(f64, Vec<f64>)>; 2] = [Vec::new(), Vec::new()];
    let budget = needed * MAX_DRAWS_PER_MEMBER;
    let mut draws = 0;
    while members.iter().any(|m| m.len() < needed) {
        if draws >= budget {
            let short = if members[1].len() < needed { 1.0 } else { 0.0 };
            return Err(PoolError::InvalidSimParam {
                name: "outcome",
                value: short,
                reason: "outcome too rare to fill the requested pools",
            });
        }
        draws += 1;
        let c: Vec<f64> = (0..p).map(|_| std_normal(&mut rng)).collect();
        let mean_x = params.alpha_0 + dot(&params.alpha_c, &c);
        let x = mean_x + exposure_sd * std_normal(&mut rng);
        let eta = params.beta_0 + params.beta_x * x + dot(&params.beta_c, &c);
        let y = usize::from(bernoulli(safe_logistic(eta))?.sample(&mut rng));
        if members[y].len() < needed {
            members[y].push((x, c));
        }
    }

    let mut pools = Vec::with_capacity(2 * opts.pools_per_outcome);
    for outcome in [1u8, 0u8] {
        let mut queue = members[usize::from(outcome)].iter();
        for j in 0..opts.pools_per_outcome {
            let size = opts.size_of(j);
            let mut x_sum = 0.0_f64;
            let mut c_sum = vec![0.0_f64; p];
            for (x, c) in queue.by_ref().take(size) {
                x_sum += *x;
                c_sum.iter_mut().zip(c).for_each(|(s, v)| *s += v);
            }
            let xbar = x_sum / size as f64;
            let k = opts.replicates_for(j, size, &params.errors);
            let tau2 = params.errors.total(size, outcome, params.constant_pe);
            let xtilde = (0..k)
                .map(|_| xbar + tau2.sqrt() * std_normal(&mut rng))
                .collect();
            pools.push(Pool::new(size, outcome, xtilde, c_sum));
        }
    }
    PoolData::new(pools)
}

/// Simulate pooled data from the gamma discriminant-function model.
///
/// Errors
/// ------
/// - `PoolError::InvalidSimParam` for non-positive scales, variances, or a
///   gamma shape that overflows.
pub fn simulate_gdfa(params: &GammaDfaSimParams, opts: &SimOpts) -> PoolResult<PoolData> {
    check_positive("b1", params.b1)?;
    check_positive("b0", params.b0)?;
    check_errors(&params.errors)?;
    let p = params.gamma_c.len();
    let mut rng = opts.rng();

    let mut pools = Vec::with_capacity(2 * opts.pools_per_outcome);
    for outcome in [1u8, 0u8] {
        let scale = if outcome == 1 { params.b1 } else { params.b0 };
        for j in 0..opts.pools_per_outcome {
            let size = opts.size_of(j);
            let g = size as f64;
            let c: Vec<f64> = (0..p).map(|_| std_normal(&mut rng)).collect();
            let shape = g * (params.gamma_0 + dot(&params.gamma_c, &c)).exp();
            let latent = Gamma::new(shape, scale / g).map_err(|_| PoolError::InvalidSimParam {
                name: "gamma_shape",
                value: shape,
                reason: "implied gamma shape must be finite and positive",
            })?;
            let xbar = latent.sample(&mut rng);
            let k = opts.replicates_for(j, size, &params.errors);
            let tau2 = params.errors.total(size, outcome, params.constant_pe);
            let log_error = Normal::new(-0.5 * tau2, tau2.sqrt()).map_err(|_| {
                PoolError::InvalidSimParam {
                    name: "error_variance",
                    value: tau2,
                    reason: "must be finite",
                }
            })?;
            let xtilde = (0..k).map(|_| xbar * log_error.sample(&mut rng).exp()).collect();
            pools.push(Pool::new(size, outcome, xtilde, c));
        }
    }
    PoolData::new(pools)
}

// ---- Helper methods ----

fn std_normal(rng: &mut StdRng) -> f64 {
    StandardNormal.sample(rng)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn bernoulli(p: f64) -> PoolResult<Bernoulli> {
    Bernoulli::new(p).map_err(|_| PoolError::InvalidSimParam {
        name: "probability",
        value: p,
        reason: "must lie in [0, 1]",
    })
}

fn check_positive(name: &'static str, value: f64) -> PoolResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PoolError::InvalidSimParam { name, value, reason: "must be finite and positive" })
    }
}

fn check_errors(errors: &ErrorVariances) -> PoolResult<()> {
    for &v in errors.processing.iter().chain(errors.measurement.iter()) {
        if !(v.is_finite() && v >= 0.0) {
            return Err(PoolError::InvalidSimParam {
                name: "error_variance",
                value: v,
                reason: "must be finite and non-negative",
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logistic_params(errors: ErrorVariances) -> LogisticSimParams {
        LogisticSimParams {
            beta_0: -1.0,
            beta_x: 0.5,
            beta_c: vec![0.2],
            alpha_0: 0.5,
            alpha_c: vec![0.3],
            sigsq_x: 1.0,
            errors,
            constant_pe: true,
        }
    }

    #[test]
    // Purpose
    // -------
    // Logistic simulation yields balanced case-control pools in rotation,
    // replicates only where error is present, and summed covariates.
    //
    // Given
    // -----
    // - Sizes {1, 2, 3}, 6 pools per outcome, processing error only,
    //   duplicates on every pool.
    //
    // Expect
    // ------
    // - 12 pools, 6 per outcome, size-1 pools single-valued, others with 2.
    fn logistic_simulation_respects_design() {
        // Arrange
        let errors = ErrorVariances { processing: [0.2, 0.2], measurement: [0.0, 0.0] };
        let opts = SimOpts::new(vec![1, 2, 3], 6, 2, 1, Some(11)).unwrap();

        // Act
        let data = simulate_logreg(&logistic_params(errors), &opts).unwrap();

        // Assert
        assert_eq!(data.len(), 12);
        assert_eq!(data.n_covariates(), 1);
        assert_eq!(data.pools().iter().filter(|p| p.outcome == 1).count(), 6);
        for pool in data.pools() {
            let expected_k = if pool.size == 1 { 1 } else { 2 };
            assert_eq!(pool.replicates(), expected_k);
        }
    }

    #[test]
    // Purpose
    // -------
    // Seeded runs are reproducible.
    fn seeded_simulation_is_reproducible() {
        let errors = ErrorVariances { processing: [0.0, 0.0], measurement: [0.1, 0.1] };
        let opts = SimOpts::new(vec![2], 4, 1, 1, Some(3)).unwrap();
        let params = GammaDfaSimParams {
            gamma_0: 0.5,
            gamma_c: vec![],
            b1: 1.5,
            b0: 1.0,
            errors,
            constant_pe: true,
        };
        let a = simulate_gdfa(&params, &opts).unwrap();
        let b = simulate_gdfa(&params, &opts).unwrap();
        assert_eq!(a, b);
        assert!(a.require_positive_measurements().is_ok());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(SimOpts::new(vec![], 4, 1, 1, None).is_err());
        assert!(SimOpts::new(vec![0, 2], 4, 1, 1, None).is_err());
        assert!(SimOpts::new(vec![2], 4, 0, 1, None).is_err());
        let mut params = logistic_params(ErrorVariances::default());
        params.sigsq_x = 0.0;
        let opts = SimOpts::new(vec![1], 2, 1, 1, Some(1)).unwrap();
        assert!(matches!(
            simulate_logreg(&params, &opts),
            Err(PoolError::InvalidSimParam { name: "sigsq_x", .. })
        ));
    }
}
