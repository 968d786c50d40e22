//! # Confidence Levels
//!
//! Conversion between confidence levels given as a number of standard
//! deviations or as a probability, and the increase of the objective that
//! bounds the corresponding interval of one parameter.

use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::error::{MinuitError, Result};

/// Objective increase for a confidence level.
///
/// `cl >= 1` is a number of standard deviations and gives `up * cl^2`;
/// `0 < cl < 1` is a probability and gives `up` times the chi-square
/// quantile with one degree of freedom.
///
/// # Examples
///
/// ```
/// use minuit_rs::uncertainty::cl_to_delta;
///
/// assert_eq!(cl_to_delta(2.0, 1.0).unwrap(), 4.0);
/// assert!((cl_to_delta(0.6826894921, 0.5).unwrap() - 0.5).abs() < 1e-6);
/// ```
pub fn cl_to_delta(cl: f64, up: f64) -> Result<f64> {
    check_level(cl)?;
    if cl >= 1.0 {
        Ok(up * cl * cl)
    } else {
        Ok(up * chi2_quantile_1dof(cl)?)
    }
}

/// Quantile of the chi-square distribution with one degree of freedom.
pub fn chi2_quantile_1dof(probability: f64) -> Result<f64> {
    if !(0.0..1.0).contains(&probability) {
        return Err(MinuitError::InvalidConfig(format!(
            "probability must be in [0, 1), got {}",
            probability
        )));
    }
    let chi2 = ChiSquared::new(1.0).map_err(|e| MinuitError::Other(e.to_string()))?;
    Ok(chi2.inverse_cdf(probability))
}

/// Convert a number of standard deviations to a two-sided probability.
pub fn sigma_to_probability(sigma: f64) -> Result<f64> {
    let normal = standard_normal()?;
    Ok(normal.cdf(sigma) - normal.cdf(-sigma))
}

/// Convert a two-sided probability to a number of standard deviations.
///
/// Values of 1 or more are taken to be sigmas already.
pub fn probability_to_sigma(prob: f64) -> Result<f64> {
    check_level(prob)?;
    if prob >= 1.0 {
        return Ok(prob);
    }
    Ok(standard_normal()?.inverse_cdf(0.5 + 0.5 * prob))
}

fn check_level(cl: f64) -> Result<()> {
    if cl.is_finite() && cl > 0.0 {
        Ok(())
    } else {
        Err(MinuitError::InvalidConfig(format!(
            "confidence level must be positive, got {}",
            cl
        )))
    }
}

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| MinuitError::Other(e.to_string()))
}
