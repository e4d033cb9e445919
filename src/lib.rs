//! pooling_xerrors — maximum-likelihood regression on pooled exposures.
//!
//! Purpose
//! -------
//! Fit a binary outcome against a continuous exposure that is measured only
//! on pools of specimens, correcting for processing error, assay error, and
//! case-control sampling. Two model families are provided: pooled logistic
//! regression and the gamma discriminant-function approach.
//!
//! Key behaviors
//! -------------
//! - [`pooling`]: data containers, error regimes, stratified likelihoods,
//!   latent-exposure integration, and the `fit_*_xerrors` entry points.
//! - [`optimization`]: the argmin-backed L-BFGS maximizer, finite
//!   differences, and the box reparameterization.
//! - [`inference`]: observed information, vcov, and delta-method variances.
//!
//! Invariants & assumptions
//! ------------------------
//! - Fits are single-threaded and deterministic given the options; the only
//!   randomness is the seedable restart jitter.
//! - Input validation fails fast with typed errors; numerical trouble after
//!   optimization is reported as diagnostics on the fit result.
//!
//! Downstream usage
//! ----------------
//! ```no_run
//! use pooling_xerrors::pooling::prelude::*;
//!
//! # fn main() -> Result<(), PoolError> {
//! let data = PoolData::new(vec![
//!     Pool::new(2, 1, vec![1.3, 1.1], vec![]),
//!     Pool::new(2, 0, vec![0.4], vec![]),
//!     Pool::new(1, 1, vec![0.9], vec![]),
//!     Pool::new(1, 0, vec![0.2], vec![]),
//! ])?;
//! let opts = XErrorsOptions::new(ErrorRegime::Processing, ErrorFlags::default());
//! let fit = fit_logreg_xerrors(&data, &opts, SamplingCorrection::None, None)?;
//! println!("{fit}");
//! # Ok(())
//! # }
//! ```

pub mod inference;
pub mod optimization;
pub mod pooling;
