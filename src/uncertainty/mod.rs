//! # Uncertainty Calculation
//!
//! Error analysis around a [`FunctionMinimum`](crate::minimum::FunctionMinimum):
//!
//! - HESSE: the full second-derivative matrix by finite differences and the
//!   covariance matrix derived from it
//! - MINOS: asymmetric intervals from the profile of the objective
//! - Profiles of the objective along one parameter
//! - Conversion between confidence levels and objective increases

pub mod confidence;
pub mod covariance;
pub mod hesse;
pub mod minos;
pub mod profile;

pub use confidence::{
    chi2_quantile_1dof, cl_to_delta, probability_to_sigma, sigma_to_probability,
};
pub use covariance::{calculate_correlation, make_pos_def, Covariance};
pub use hesse::{Hesse, HesseConfig, HesseEstimate, HesseFailure};
pub use minos::{minos_parallel, Minos, MinosConfig, MinosError, MinosFailure};
pub use profile::{mnprofile, profile, ProfileScan};
