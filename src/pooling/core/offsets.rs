//! Case-control offsets for pooled logistic regression.
//!
//! Purpose
//! -------
//! Pools are formed separately from cases and controls, so the pooled
//! logistic model needs a per-pool-size offset `q_g` to recover an intercept
//! on the right scale (Weinberg & Umbach). The offset is computed once from
//! the data before optimization and never changes afterwards.
//!
//! Key behaviors
//! -------------
//! With `n1g`/`n0g` case/control pools of size `g` and `n1`/`n0` case/control
//! individuals:
//!
//! - no correction: `q_g = ln(n1g/n0g) − g·ln(n1/n0)`;
//! - known prevalence `π`: `q_g = ln(n1g/n0g) − g·ln(π/(1−π))`;
//! - known sampling fractions `(s1, s0)`:
//!   `q_g = ln(n1g/n0g) − g·ln(n1/n0) + g·ln(s1/s0)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every pool size present must have at least one case and one control
//!   pool; otherwise `q_g` is infinite and construction fails.
//! - Prevalence and sampling fractions are mutually exclusive.
use std::collections::BTreeMap;

use crate::pooling::{
    core::data::PoolData,
    errors::{PoolError, PoolResult},
};

/// Optional correction of the case-control intercept.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SamplingCorrection {
    /// Intercept stays on the case-control scale.
    #[default]
    None,
    /// Population prevalence of the outcome, in `(0, 1)`.
    Prevalence(f64),
    /// Probabilities of being sampled given `Y = 1` and `Y = 0`, in `(0, 1]`.
    SamplingFractions { case: f64, control: f64 },
}

impl SamplingCorrection {
    /// Build from the two optional user inputs.
    ///
    /// Errors
    /// ------
    /// - `PoolError::ConflictingSamplingCorrection` when both are given.
    /// - Range errors from [`SamplingCorrection::validate`].
    pub fn from_options(prev: Option<f64>, samp_y1y0: Option<(f64, f64)>) -> PoolResult<Self> {
        let correction = match (prev, samp_y1y0) {
            (Some(_), Some(_)) => return Err(PoolError::ConflictingSamplingCorrection),
            (Some(p), None) => SamplingCorrection::Prevalence(p),
            (None, Some((case, control))) => SamplingCorrection::SamplingFractions { case, control },
            (None, None) => SamplingCorrection::None,
        };
        correction.validate()?;
        Ok(correction)
    }

    /// Errors
    /// ------
    /// - `PoolError::InvalidPrevalence` unless `0 < π < 1`.
    /// - `PoolError::InvalidSamplingFraction` unless `0 < s <= 1`.
    pub fn validate(&self) -> PoolResult<()> {
        match *self {
            SamplingCorrection::None => Ok(()),
            SamplingCorrection::Prevalence(p) => {
                if p.is_finite() && p > 0.0 && p < 1.0 {
                    Ok(())
                } else {
                    Err(PoolError::InvalidPrevalence { value: p })
                }
            }
            SamplingCorrection::SamplingFractions { case, control } => {
                for value in [case, control] {
                    if !(value.is_finite() && value > 0.0 && value <= 1.0) {
                        return Err(PoolError::InvalidSamplingFraction {
                            value,
                            reason: "must lie in (0, 1]",
                        });
                    }
                }
                Ok(())
            }
        }
    }
}

/// Per-pool offsets `q_g`, aligned with `data.pools()`.
///
/// Errors
/// ------
/// - `PoolError::MissingOutcomeForPoolSize` when a pool size has no case or
///   no control pools.
/// - Validation errors of `correction`.
pub fn case_control_offsets(data: &PoolData, correction: &SamplingCorrection) -> PoolResult<Vec<f64>> {
    correction.validate()?;
    // size -> [control pools, case pools]
    let mut by_size: BTreeMap<usize, [usize; 2]> = BTreeMap::new();
    let mut individuals = [0usize; 2];
    for pool in data.pools() {
        let y = usize::from(pool.outcome);
        by_size.entry(pool.size).or_insert([0, 0])[y] += 1;
        individuals[y] += pool.size;
    }

    let mut q_by_size: BTreeMap<usize, f64> = BTreeMap::new();
    for (&size, &[n0g, n1g]) in &by_size {
        if n1g == 0 || n0g == 0 {
            let outcome = if n1g == 0 { 1 } else { 0 };
            return Err(PoolError::MissingOutcomeForPoolSize { size, outcome });
        }
        let g = size as f64;
        let pool_ratio = (n1g as f64 / n0g as f64).ln();
        let individual_ratio = (individuals[1] as f64 / individuals[0] as f64).ln();
        let q = match *correction {
            SamplingCorrection::None => pool_ratio - g * individual_ratio,
            SamplingCorrection::Prevalence(p) => pool_ratio - g * (p / (1.0 - p)).ln(),
            SamplingCorrection::SamplingFractions { case, control } => {
                pool_ratio - g * individual_ratio + g * (case / control).ln()
            }
        };
        q_by_size.insert(size, q);
    }

    Ok(data.pools().iter().map(|pool| q_by_size[&pool.size]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pooling::core::data::Pool;
    use approx::assert_relative_eq;

    fn two_size_data() -> PoolData {
        // size 1: 2 cases, 3 controls; size 2: 1 case, 2 controls
        // individuals: cases 2 + 2 = 4, controls 3 + 4 = 7
        let mk = |g, y| Pool::new(g, y, vec![0.0], vec![]);
        PoolData::new(vec![
            mk(1, 1),
            mk(1, 1),
            mk(1, 0),
            mk(1, 0),
            mk(1, 0),
            mk(2, 1),
            mk(2, 0),
            mk(2, 0),
        ])
        .unwrap()
    }

    #[test]
    // Purpose
    // -------
    // The uncorrected offset matches the hand-computed formula per size.
    fn uncorrected_offsets_match_hand_computation() {
        // Arrange
        let data = two_size_data();

        // Act
        let q = case_control_offsets(&data, &SamplingCorrection::None).unwrap();

        // Assert
        let r = (4.0f64 / 7.0).ln();
        assert_relative_eq!(q[0], (2.0f64 / 3.0).ln() - r, max_relative = 1e-12);
        assert_relative_eq!(q[7], (1.0f64 / 2.0).ln() - 2.0 * r, max_relative = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Prevalence and sampling-fraction corrections use their own terms.
    fn corrected_offsets_use_prevalence_or_sampling_fractions() {
        let data = two_size_data();
        let prev = case_control_offsets(&data, &SamplingCorrection::Prevalence(0.1)).unwrap();
        assert_relative_eq!(
            prev[5],
            (0.5f64).ln() - 2.0 * (0.1f64 / 0.9).ln(),
            max_relative = 1e-12
        );
        let samp = case_control_offsets(
            &data,
            &SamplingCorrection::SamplingFractions { case: 0.8, control: 0.2 },
        )
        .unwrap();
        let base = case_control_offsets(&data, &SamplingCorrection::None).unwrap();
        assert_relative_eq!(samp[5] - base[5], 2.0 * 4.0f64.ln(), max_relative = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Invalid or conflicting corrections fail fast.
    fn invalid_corrections_are_rejected() {
        assert_eq!(
            SamplingCorrection::from_options(Some(0.1), Some((0.5, 0.5))),
            Err(PoolError::ConflictingSamplingCorrection)
        );
        assert_eq!(
            SamplingCorrection::from_options(Some(1.0), None),
            Err(PoolError::InvalidPrevalence { value: 1.0 })
        );
        assert!(SamplingCorrection::from_options(None, Some((0.0, 0.5))).is_err());
        assert_eq!(SamplingCorrection::from_options(None, None), Ok(SamplingCorrection::None));
    }

    #[test]
    // Purpose
    // -------
    // A pool size without control pools leaves the offset undefined.
    fn missing_controls_for_a_size_is_an_error() {
        let data = PoolData::new(vec![
            Pool::new(1, 1, vec![0.0], vec![]),
            Pool::new(1, 0, vec![0.0], vec![]),
            Pool::new(3, 1, vec![0.0], vec![]),
        ])
        .unwrap();
        assert_eq!(
            case_control_offsets(&data, &SamplingCorrection::None),
            Err(PoolError::MissingOutcomeForPoolSize { size: 3, outcome: 0 })
        );
    }
}
