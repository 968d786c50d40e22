//! Utility functions and helpers for the minuit-rs library.

pub mod finite_difference;
pub mod matrix_convert;

// Re-export commonly used utilities
pub use finite_difference::{
    analytic_gradient, initial_gradient, numerical_gradient, FunctionGradient, GradientSettings,
    MachinePrecision,
};
pub use matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};
