//! numerical_stability — stable scalar transforms and box reparameterization.
//!
//! - [`transformations`]: guarded softplus / logistic / logit and the
//!   Bernoulli log-pmf on the logit scale.
//! - [`box_transform`]: maps box-constrained parameters to ℝⁿ and back for
//!   the unconstrained optimizer.
//!
//! Pure numerical helpers: no logging, no allocation beyond returned
//! vectors, no panics on finite input.

pub mod box_transform;
pub mod transformations;

pub mod prelude {
    pub use super::box_transform::{Bound, BoxTransform};
    pub use super::transformations::{
        bernoulli_logit_ln_pmf, log_logistic, safe_logistic, safe_logit, safe_softplus,
        safe_softplus_inv,
    };
}
