//! Observation stratifier.
//!
//! Purpose
//! -------
//! Partition pools into the three likelihood strata before any evaluation:
//!
//! - [`Stratum::Exact`]: the measurement equals the pool-average exposure;
//!   closed-form likelihood.
//! - [`Stratum::Replicated`]: two or more contaminated replicates; the
//!   latent exposure is integrated against their joint density.
//! - [`Stratum::SingleSurrogate`]: one contaminated measurement; same
//!   integral with a univariate error density.
//!
//! Key behaviors
//! -------------
//! Routing by regime, pool size `g`, and replicate count `k`:
//!
//! | regime                  | rule                                                        |
//! |-------------------------|-------------------------------------------------------------|
//! | `neither`               | exact; `k >= 2` is rejected                                 |
//! | `processing`            | `g = 1, k = 1` exact; `g = 1, k >= 2` rejected; `g > 1` by `k` |
//! | `measurement`, `both`   | every pool contaminated; routed by `k`                      |
//!
//! Invariants & assumptions
//! ------------------------
//! - The strata are disjoint and exhaustive over the input pools.
//! - Each [`StratumSlice`] keeps the original pool indices so diagnostics
//!   can name the offending unit.
//! - Slices are built once per fit and are read-only afterwards.
use ndarray::Array2;

use crate::pooling::{
    core::{data::PoolData, regime::ErrorRegime},
    errors::{PoolError, PoolResult},
};

/// Likelihood stratum of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stratum {
    Exact,
    Replicated,
    SingleSurrogate,
}

impl Stratum {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stratum::Exact => "exact",
            Stratum::Replicated => "replicated",
            Stratum::SingleSurrogate => "single-surrogate",
        }
    }
}

/// Per-stratum copy of the inputs, aligned by position.
#[derive(Debug, Clone, PartialEq)]
pub struct StratumSlice {
    pub stratum: Stratum,
    /// Original pool indices.
    pub units: Vec<usize>,
    pub sizes: Vec<usize>,
    pub outcomes: Vec<u8>,
    pub xtilde: Vec<Vec<f64>>,
    /// `len × n_covariates`.
    pub covariates: Array2<f64>,
    /// Case-control offsets `q_g`; zero when the family uses none.
    pub offsets: Vec<f64>,
}

impl StratumSlice {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// The three strata of one data set.
#[derive(Debug, Clone, PartialEq)]
pub struct Strata {
    pub exact: StratumSlice,
    pub replicated: StratumSlice,
    pub single: StratumSlice,
}

impl Strata {
    /// Strata in evaluation order: exact, replicated, single-surrogate.
    pub fn iter(&self) -> impl Iterator<Item = &StratumSlice> {
        [&self.exact, &self.replicated, &self.single].into_iter()
    }

    pub fn total_units(&self) -> usize {
        self.iter().map(StratumSlice::len).sum()
    }
}

/// Assign one pool to a stratum.
///
/// Errors
/// ------
/// - `PoolError::ReplicatesWithoutError` under `neither` with `k >= 2`.
/// - `PoolError::ReplicatedSingleton` under `processing` with `g = 1, k >= 2`.
pub fn classify(index: usize, size: usize, replicates: usize, regime: ErrorRegime) -> PoolResult<Stratum> {
    let by_replicates = |k: usize| {
        if k >= 2 { Stratum::Replicated } else { Stratum::SingleSurrogate }
    };
    match regime {
        ErrorRegime::Neither => {
            if replicates >= 2 {
                return Err(PoolError::ReplicatesWithoutError { index, replicates });
            }
            Ok(Stratum::Exact)
        }
        ErrorRegime::Processing => match (size, replicates) {
            (1, 1) => Ok(Stratum::Exact),
            (1, k) => Err(PoolError::ReplicatedSingleton { index, replicates: k }),
            (_, k) => Ok(by_replicates(k)),
        },
        ErrorRegime::Measurement | ErrorRegime::Both => Ok(by_replicates(replicates)),
    }
}

/// Partition `data` into strata.
///
/// Parameters
/// ----------
/// - `data`: validated pools.
/// - `regime`: error regime that drives the routing table above.
/// - `offsets`: optional per-pool offsets aligned with `data`; zeros when
///   `None`.
///
/// Errors
/// ------
/// - Any classification error from [`classify`].
/// - `PoolError::LengthMismatch` when `offsets` is not aligned with `data`.
pub fn stratify(data: &PoolData, regime: ErrorRegime, offsets: Option<&[f64]>) -> PoolResult<Strata> {
    if let Some(q) = offsets {
        if q.len() != data.len() {
            return Err(PoolError::LengthMismatch {
                name: "offsets",
                expected: data.len(),
                found: q.len(),
            });
        }
    }
    let mut members: [Vec<usize>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for (index, pool) in data.pools().iter().enumerate() {
        let slot = match classify(index, pool.size, pool.replicates(), regime)? {
            Stratum::Exact => 0,
            Stratum::Replicated => 1,
            Stratum::SingleSurrogate => 2,
        };
        members[slot].push(index);
    }
    let [exact, replicated, single] = members;
    Ok(Strata {
        exact: build_slice(data, Stratum::Exact, exact, offsets),
        replicated: build_slice(data, Stratum::Replicated, replicated, offsets),
        single: build_slice(data, Stratum::SingleSurrogate, single, offsets),
    })
}

// ---- Helper methods ----

fn build_slice(
    data: &PoolData, stratum: Stratum, units: Vec<usize>, offsets: Option<&[f64]>,
) -> StratumSlice {
    let pools = data.pools();
    let p = data.n_covariates();
    let mut covariates = Array2::<f64>::zeros((units.len(), p));
    for (row, &u) in units.iter().enumerate() {
        for (col, &c) in pools[u].covariates.iter().enumerate() {
            covariates[[row, col]] = c;
        }
    }
    StratumSlice {
        stratum,
        sizes: units.iter().map(|&u| pools[u].size).collect(),
        outcomes: units.iter().map(|&u| pools[u].outcome).collect(),
        xtilde: units.iter().map(|&u| pools[u].xtilde.clone()).collect(),
        offsets: units.iter().map(|&u| offsets.map_or(0.0, |q| q[u])).collect(),
        covariates,
        units,
    }
}
