//! Tests for HESSE, MINOS, profiles and confidence levels

mod hesse_tests;
mod minos_tests;
