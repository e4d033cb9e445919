//! pooling::core — data, error structure, and numerical building blocks.
//!
//! Purpose
//! -------
//! Everything the pooled likelihoods need except the likelihoods themselves:
//! validated pool containers, error regimes and the parameter layout they
//! imply, stratification, case-control offsets, option structs, log-density
//! helpers, the latent-variable integrator, and a data simulator.
//!
//! Key behaviors
//! -------------
//! - [`data`]: [`Pool`](data::Pool) and [`PoolData`](data::PoolData).
//! - [`regime`] and [`layout`]: error regimes, flags, and the ordered
//!   parameter vector they produce.
//! - [`strata`]: exact / replicated / single-surrogate partition.
//! - [`offsets`]: Weinberg–Umbach offsets and sampling corrections.
//! - [`options`]: start values, bounds, integration, restarts, policies.
//! - [`densities`] and [`quadrature`]: log-densities and adaptive
//!   Gauss–Kronrod integration over the latent exposure.
//! - [`simulate`]: pooled data from known parameters.
//!
//! Conventions
//! -----------
//! - Outcome-indexed pairs are stored as `[control, case]`.
//! - All validation returns [`PoolError`](crate::pooling::errors::PoolError)
//!   before any likelihood is evaluated.

pub mod data;
pub mod densities;
pub mod layout;
pub mod offsets;
pub mod options;
pub mod quadrature;
pub mod regime;
pub mod simulate;
pub mod strata;
