//! Scans of the objective along one parameter.
//!
//! [`profile`] evaluates the objective with the other parameters held at
//! their fitted values. [`mnprofile`] minimizes the other parameters again
//! at every point, which gives the profile that MINOS intervals are read
//! from.

use ndarray::Array1;
use serde::Serialize;

use crate::error::{MinuitError, Result};
use crate::function::{FunctionAdapter, Objective};
use crate::migrad::{Migrad, MigradConfig};
use crate::minimum::FunctionMinimum;
use crate::parameters::Parameters;

/// Objective values along one parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileScan {
    pub name: String,
    pub values: Vec<f64>,
    pub fvals: Vec<f64>,
    /// Point evaluated (profile) or minimized (mnprofile) successfully
    pub valid: Vec<bool>,
}

impl ProfileScan {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Scan point with the lowest valid objective value
    pub fn best(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .zip(self.fvals.iter())
            .zip(self.valid.iter())
            .filter(|(_, ok)| **ok)
            .map(|((&x, &f), _)| (x, f))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Scan points for `name`: the given range, or two errors around the fit
/// value clipped to the parameter limits.
fn scan_points(
    params: &Parameters,
    name: &str,
    range: Option<(f64, f64)>,
    size: usize,
) -> Result<(usize, Array1<f64>)> {
    if size < 2 {
        return Err(MinuitError::InvalidConfig(format!(
            "a scan needs at least 2 points, got {}",
            size
        )));
    }
    let index = params
        .index_of(name)
        .ok_or_else(|| MinuitError::ParameterNotFound(name.to_string()))?;
    let param = &params[index];

    let (lo, hi) = match range {
        Some((lo, hi)) => (lo, hi),
        None => {
            let bounds = param.bounds();
            let width = 2.0 * param.error();
            (
                bounds.clamp(param.value() - width),
                bounds.clamp(param.value() + width),
            )
        }
    };
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(MinuitError::InvalidConfig(format!(
            "invalid scan range [{}, {}]",
            lo, hi
        )));
    }

    Ok((index, Array1::linspace(lo, hi, size)))
}

/// Objective along `name` with all other parameters at their fit values.
pub fn profile(
    objective: &dyn Objective,
    minimum: &FunctionMinimum,
    name: &str,
    range: Option<(f64, f64)>,
    size: usize,
) -> Result<ProfileScan> {
    let params = minimum.parameters();
    let (index, points) = scan_points(params, name, range, size)?;
    let fcn = FunctionAdapter::new(objective, params.clone());

    let mut x = params.external_values();
    let mut fvals = Vec::with_capacity(size);
    let mut valid = Vec::with_capacity(size);
    for &value in points.iter() {
        x[index] = value;
        match fcn.eval_external(&x) {
            Ok(f) => {
                fvals.push(f);
                valid.push(true);
            }
            Err(err) => {
                log::debug!("profile of '{}' at {}: {}", name, value, err);
                fvals.push(f64::NAN);
                valid.push(false);
            }
        }
    }

    Ok(ProfileScan {
        name: name.to_string(),
        values: points.to_vec(),
        fvals,
        valid,
    })
}

/// Objective along `name` with the other parameters minimized at each point.
///
/// Every minimization starts from the fit values of the other parameters.
pub fn mnprofile(
    objective: &dyn Objective,
    minimum: &FunctionMinimum,
    name: &str,
    range: Option<(f64, f64)>,
    size: usize,
    config: &MigradConfig,
    recovery: Option<f64>,
) -> Result<ProfileScan> {
    let (_, points) = scan_points(minimum.parameters(), name, range, size)?;

    let mut fvals = Vec::with_capacity(size);
    let mut valid = Vec::with_capacity(size);
    for &value in points.iter() {
        let mut params = minimum.parameters().clone();
        params.require_mut(name)?.set_value(value)?;
        params.fix(name)?;

        let fcn = FunctionAdapter::new(objective, params)
            .with_errordef(minimum.up())
            .with_recovery(recovery);
        match Migrad::with_config(config.clone()).minimize(&fcn) {
            Ok(fit) => {
                fvals.push(fit.fval());
                valid.push(fit.is_valid());
            }
            Err(MinuitError::EvaluationError(msg)) => {
                log::debug!("mnprofile of '{}' at {}: {}", name, value, msg);
                fvals.push(f64::NAN);
                valid.push(false);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(ProfileScan {
        name: name.to_string(),
        values: points.to_vec(),
        fvals,
        valid,
    })
}
