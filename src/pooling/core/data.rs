//! Pooled observation containers.
//!
//! Purpose
//! -------
//! Provide validated containers for pooled exposure data: one outcome per
//! pool, one or more surrogate measurements of the pool-average exposure,
//! and a covariate row. Validation happens once here so that stratification
//! and likelihood code can index freely.
//!
//! Invariants & assumptions
//! ------------------------
//! - At least one pool; every pool has `size >= 1` and `outcome ∈ {0, 1}`.
//! - Every pool carries at least one finite measurement.
//! - All covariate rows share one width (possibly zero) and are finite.
//! - For the logistic family, covariate rows hold **poolwise sums** of the
//!   members' covariates; for the gamma family they hold the members'
//!   common value.
//!
//! Conventions
//! -----------
//! - Indices are 0-based positions in the caller's input order and are the
//!   unit identifiers reported in diagnostics.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the happy path and each rejection rule of
//!   [`PoolData::new`] and [`PoolData::from_columns`].
use ndarray::ArrayView2;

use crate::pooling::errors::{PoolError, PoolResult};

/// A single pool: size `g`, outcome `y`, replicate measurements of the
/// pool-average exposure, and a covariate row.
#[derive(Debug, Clone, PartialEq)]
pub struct Pool {
    pub size: usize,
    pub outcome: u8,
    pub xtilde: Vec<f64>,
    pub covariates: Vec<f64>,
}

impl Pool {
    pub fn new(size: usize, outcome: u8, xtilde: Vec<f64>, covariates: Vec<f64>) -> Self {
        Pool { size, outcome, xtilde, covariates }
    }

    /// Number of replicate measurements `k`.
    pub fn replicates(&self) -> usize {
        self.xtilde.len()
    }
}

/// `PoolData` — validated collection of pools with a common covariate width.
///
/// Fields are private so the invariants in the module docs hold for every
/// instance; read access goes through [`PoolData::pools`].
#[derive(Debug, Clone, PartialEq)]
pub struct PoolData {
    pools: Vec<Pool>,
    n_covariates: usize,
}

impl PoolData {
    /// Validate and wrap a vector of pools.
    ///
    /// Errors
    /// ------
    /// - `PoolError::EmptyData` for an empty vector.
    /// - `PoolError::InvalidPoolSize` / `InvalidOutcome` /
    ///   `EmptyMeasurements` / `NonFiniteMeasurement` for a malformed pool.
    /// - `PoolError::CovariateWidthMismatch` when a row's width differs from
    ///   the first pool's, `NonFiniteCovariate` for NaN/∞ covariates.
    pub fn new(pools: Vec<Pool>) -> PoolResult<Self> {
        let first = pools.first().ok_or(PoolError::EmptyData)?;
        let n_covariates = first.covariates.len();
        for (index, pool) in pools.iter().enumerate() {
            validate_pool(index, pool, n_covariates)?;
        }
        Ok(PoolData { pools, n_covariates })
    }

    /// Build from column-oriented inputs.
    ///
    /// Parameters
    /// ----------
    /// - `sizes`, `outcomes`: one entry per pool.
    /// - `xtilde`: per-pool replicate vectors.
    /// - `covariates`: optional `n × p` matrix, rows aligned with pools.
    ///
    /// Errors
    /// ------
    /// - `PoolError::ColumnLengthMismatch` when columns differ in length.
    /// - Any error of [`PoolData::new`].
    pub fn from_columns(
        sizes: &[usize], outcomes: &[u8], xtilde: Vec<Vec<f64>>,
        covariates: Option<ArrayView2<f64>>,
    ) -> PoolResult<Self> {
        let n = sizes.len();
        check_column("outcomes", n, outcomes.len())?;
        check_column("xtilde", n, xtilde.len())?;
        if let Some(c) = covariates.as_ref() {
            check_column("covariates", n, c.nrows())?;
        }
        let pools = sizes
            .iter()
            .zip(outcomes)
            .zip(xtilde)
            .enumerate()
            .map(|(i, ((&g, &y), xt))| {
                let row = covariates.as_ref().map(|c| c.row(i).to_vec()).unwrap_or_default();
                Pool::new(g, y, xt, row)
            })
            .collect();
        PoolData::new(pools)
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn n_covariates(&self) -> usize {
        self.n_covariates
    }

    /// The gamma family needs strictly positive measurements.
    ///
    /// Errors
    /// ------
    /// - `PoolError::NonPositiveMeasurement` for the first value `<= 0`.
    pub fn require_positive_measurements(&self) -> PoolResult<()> {
        for (index, pool) in self.pools.iter().enumerate() {
            if let Some((replicate, &value)) =
                pool.xtilde.iter().enumerate().find(|(_, v)| **v <= 0.0)
            {
                return Err(PoolError::NonPositiveMeasurement { index, replicate, value });
            }
        }
        Ok(())
    }
}

// ---- Helper methods ----

fn check_column(name: &'static str, expected: usize, found: usize) -> PoolResult<()> {
    if expected != found {
        return Err(PoolError::ColumnLengthMismatch { name, expected, found });
    }
    Ok(())
}

fn validate_pool(index: usize, pool: &Pool, n_covariates: usize) -> PoolResult<()> {
    if pool.size == 0 {
        return Err(PoolError::InvalidPoolSize { index });
    }
    if pool.outcome > 1 {
        return Err(PoolError::InvalidOutcome { index, value: pool.outcome });
    }
    if pool.xtilde.is_empty() {
        return Err(PoolError::EmptyMeasurements { index });
    }
    if let Some((replicate, &value)) = pool.xtilde.iter().enumerate().find(|(_, v)| !v.is_finite())
    {
        return Err(PoolError::NonFiniteMeasurement { index, replicate, value });
    }
    if pool.covariates.len() != n_covariates {
        return Err(PoolError::CovariateWidthMismatch {
            index,
            expected: n_covariates,
            found: pool.covariates.len(),
        });
    }
    if let Some((column, &value)) =
        pool.covariates.iter().enumerate().find(|(_, v)| !v.is_finite())
    {
        return Err(PoolError::NonFiniteCovariate { index, column, value });
    }
    Ok(())
}
