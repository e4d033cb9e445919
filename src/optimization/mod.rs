//! optimization — MLE stack, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide the optimization layer used by the pooled-exposure models: an
//! argmin-backed log-likelihood maximizer, finite-difference derivatives,
//! numerically stable transforms, and a single error/result surface.
//!
//! Key behaviors
//! -------------
//! - [`loglik_optimizer`]: maximize `ℓ(u)` with L-BFGS, normalize results
//!   into `OptimOutcome`, compute Richardson-extrapolated Hessians.
//! - [`numerical_stability`]: stable scalar transforms and the box
//!   reparameterization that keeps variances positive.
//! - [`errors`]: [`OptError`](errors::OptError) and `OptResult<T>`; argmin
//!   and model-layer errors are converted at the boundary.
//!
//! Conventions
//! -----------
//! - Solvers maximize `ℓ` by minimizing `c = -ℓ`; every user-facing value is
//!   expressed in `ℓ`.
//! - Logging is limited to `log::debug!` summaries of solver runs.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
