//! pooling — regression on pooled exposures with processing and
//! measurement error.
//!
//! Purpose
//! -------
//! Estimate the association between a binary outcome and an exposure that
//! is only observed as pool averages, possibly contaminated by a processing
//! error (from physically pooling specimens) and an assay error, under
//! case-control sampling.
//!
//! Key behaviors
//! -------------
//! - [`core`]: pool containers, error regimes, parameter layout,
//!   stratification, offsets, options, densities, quadrature, simulation.
//! - [`models`]: the pooled logistic and gamma DFA likelihoods, the
//!   optimizer driver, and the fitting entry points.
//! - [`errors`]: [`PoolError`] and [`PoolResult`].
//!
//! Conventions
//! -----------
//! - Pool indices in errors and diagnostics are 0-based positions in the
//!   caller's input order.
//! - Logging goes through the `log` facade: `warn!` for findings recorded
//!   as diagnostics, `debug!` inside the optimizer loop, `info!` for fit
//!   summaries.

pub mod core;
pub mod errors;
pub mod models;

pub use self::errors::{PoolError, PoolResult};

pub mod prelude {
    pub use super::core::{
        data::{Pool, PoolData},
        offsets::SamplingCorrection,
        options::{
            DegeneratePolicy, IntegrationOptions, RestartOptions, StartBounds, XErrorsOptions,
        },
        regime::{ErrorFlags, ErrorRegime},
        simulate::{simulate_gdfa, simulate_logreg, GammaDfaSimParams, LogisticSimParams, SimOpts},
    };
    pub use super::errors::{PoolError, PoolResult};
    pub use super::models::prelude::*;
}
