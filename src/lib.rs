//! # minuit-rs
//!
//! `minuit-rs` is a Rust implementation of the MINUIT function minimizer and
//! error analysis engine.
//!
//! The library provides:
//! - MIGRAD, a variable-metric minimizer with numerical or analytic gradients
//! - HESSE, the covariance matrix from the full second-derivative matrix
//! - MINOS, asymmetric confidence intervals from the profile of the objective
//! - Named parameters with step sizes, fixing and optional limits
//! - A [`Minuit`] front end and a one-call [`minimize`] function
//!
//! ## Basic Usage
//!
//! ```
//! use minuit_rs::Minuit;
//!
//! let fcn = |p: &[f64]| (p[0] - 2.0).powi(2) + (p[1] - 3.0).powi(2) + (p[2] - 4.0).powi(2);
//! let mut m = Minuit::new(fcn, &["x", "y", "z"], &[0.0, 0.0, 0.0]).unwrap();
//!
//! m.migrad(None, 1).unwrap();
//! m.hesse(None).unwrap();
//! let merrors = m.minos(&["x"], 1.0).unwrap();
//!
//! assert!(m.valid());
//! assert!((m.values()["z"] - 4.0).abs() < 1e-3);
//! assert!((m.errors()["y"] - 1.0).abs() < 1e-3);
//! assert!((merrors[0].upper - 1.0).abs() < 1e-2);
//! ```

// Public modules
pub mod error;
pub mod function;

// Parameter system
pub mod parameters;

// Minimizer and error analysis
pub mod migrad;
pub mod minimum;
pub mod uncertainty;

// Front ends
pub mod cost;
pub mod minimize;
pub mod minuit;

pub mod utils;

// Re-exports for convenience
pub use error::{MinuitError, Result};
pub use function::{Fallible, FunctionAdapter, Objective, WithGradient, LEAST_SQUARES, LIKELIHOOD};
pub use migrad::{Migrad, MigradConfig, MinimizerStatus, Strategy};
pub use minimize::{minimize, MinimizeOptions, OptimizeResult};
pub use minimum::FunctionMinimum;
pub use minuit::{Minuit, MinuitConfig};
pub use parameters::{Parameter, Parameters};
pub use uncertainty::{Hesse, Minos, MinosError};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
