//! Integration tests for the MIGRAD minimizer

// Convergence on standard problems
mod convergence_tests;

// Call and iteration limits, failures and recovery
mod limits_tests;
