//! MIGRAD variable-metric minimizer.
//!
//! This module provides the quasi-Newton minimizer at the heart of the crate:
//! a BFGS approximation of the inverse Hessian, a parabolic line search and
//! an edm-based convergence test, with optional HESSE refinement of the
//! covariance after convergence.

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod line_search;
pub mod state;

// Re-export key types
pub use algorithm::Migrad;
pub use config::{default_max_calls, HessianSettings, MigradConfig, Strategy};
pub use convergence::MinimizerStatus;
pub use line_search::{LineSearchConfig, LineSearchResult};
pub use state::MinimizerState;
