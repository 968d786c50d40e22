//! # MINOS
//!
//! Asymmetric confidence intervals from the profile of the objective. For a
//! parameter `p` and one side, `p` is fixed at trial values away from the
//! minimum and the other parameters are minimized again, until the profiled
//! objective has risen by `delta` above the minimum.
//!
//! The crossing is bracketed starting one HESSE error away from the minimum
//! and then refined with the Illinois variant of regula falsi on
//! `u(t) = sqrt(f(t) - fmin) - sqrt(delta)`, which is linear in the offset
//! `t` when the profile is parabolic.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::confidence::cl_to_delta;
use crate::error::{MinuitError, Result};
use crate::function::{FunctionAdapter, Objective};
use crate::migrad::{Migrad, MigradConfig, MinimizerStatus, Strategy};
use crate::minimum::FunctionMinimum;
use crate::parameters::parameter::default_step;

/// Why the crossing on one side of a parameter was not found.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MinosFailure {
    #[error("no crossing found within {iterations} iterations")]
    IterationLimit { iterations: usize },

    #[error("parameter limit {limit} reached before the crossing")]
    BoundaryHit { limit: f64 },

    #[error("call limit reached after {nfcn} calls")]
    CallLimit { nfcn: usize },

    #[error("minimization with the parameter fixed at {value} failed: {status}")]
    MinimizationFailed { value: f64, status: MinimizerStatus },

    #[error("new minimum found with fval = {fval}")]
    NewMinimum { fval: f64 },
}

/// Configuration options for MINOS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinosConfig {
    /// Strategy of the minimizations along the profile. Default: 1
    pub strategy: Strategy,

    /// MIGRAD tolerance of the minimizations along the profile. Default: 0.1
    pub tolerance: f64,

    /// Accepted deviation of `f - fmin` from `delta`, in units of up. Default: 0.01
    pub crossing_tolerance: f64,

    /// Maximum number of profile points per side. Default: 20
    pub max_iterations: usize,

    /// Maximum number of function calls per side. Default: `2 (n + 1) (200 + 100 n + 5 n^2)`
    pub max_calls: Option<usize>,
}

impl Default for MinosConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Default,
            tolerance: 0.1,
            crossing_tolerance: 0.01,
            max_iterations: 20,
            max_calls: None,
        }
    }
}

impl MinosConfig {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = Some(max_calls);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Call budget per side for `n` free parameters
    pub fn call_limit(&self, n: usize) -> usize {
        self.max_calls
            .unwrap_or_else(|| 2 * (n + 1) * (200 + 100 * n + 5 * n * n))
    }
}

/// MINOS interval of one parameter.
///
/// `lower` and `upper` are offsets from `value`; `lower` is negative. A side
/// that failed reports the parabolic error instead and is marked invalid.
#[derive(Debug, Clone, PartialEq)]
pub struct MinosError {
    pub name: String,
    pub value: f64,
    pub cl: f64,
    pub lower: f64,
    pub upper: f64,
    pub lower_valid: bool,
    pub upper_valid: bool,
    pub at_lower_limit: bool,
    pub at_upper_limit: bool,
    pub at_lower_max_fcn: bool,
    pub at_upper_max_fcn: bool,
    pub lower_new_min: bool,
    pub upper_new_min: bool,
    pub lower_failure: Option<MinosFailure>,
    pub upper_failure: Option<MinosFailure>,
    pub nfcn: usize,
}

impl MinosError {
    pub fn is_valid(&self) -> bool {
        self.lower_valid && self.upper_valid
    }

    /// Interval bounds in parameter units
    pub fn interval(&self) -> (f64, f64) {
        (self.value + self.lower, self.value + self.upper)
    }
}

impl fmt::Display for MinosError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |valid: bool, failure: &Option<MinosFailure>| match failure {
            Some(failure) if !valid => format!("invalid ({})", failure),
            _ => "valid".to_string(),
        };
        writeln!(f, "{:<12} {:>12} {:>12} {:>12}", "Parameter", "Value", "Lower", "Upper")?;
        writeln!(
            f,
            "{:<12} {:>12.6} {:>12.6} {:>12.6}",
            self.name, self.value, self.lower, self.upper
        )?;
        writeln!(f, "  lower: {}", side(self.lower_valid, &self.lower_failure))?;
        writeln!(f, "  upper: {}", side(self.upper_valid, &self.upper_failure))
    }
}

/// Crossing on one side: signed offset or the failure, plus calls spent.
struct SideOutcome {
    crossing: std::result::Result<f64, MinosFailure>,
    nfcn: usize,
}

/// The MINOS error calculator for a given minimum.
pub struct Minos<'a> {
    objective: &'a dyn Objective,
    minimum: &'a FunctionMinimum,
    config: MinosConfig,
    recovery: Option<f64>,
}

impl<'a> Minos<'a> {
    pub fn new(objective: &'a dyn Objective, minimum: &'a FunctionMinimum) -> Self {
        Self {
            objective,
            minimum,
            config: MinosConfig::default(),
            recovery: None,
        }
    }

    pub fn with_config(mut self, config: MinosConfig) -> Self {
        self.config = config;
        self
    }

    /// Value returned in place of failed evaluations along the profile.
    pub fn with_recovery(mut self, recovery: Option<f64>) -> Self {
        self.recovery = recovery;
        self
    }

    /// Both sides of the interval of `name` at confidence level `cl`.
    ///
    /// Failures of one side are recorded in the result; errors are returned
    /// for unknown or fixed parameters and for an invalid minimum.
    pub fn error(&self, name: &str, cl: f64) -> Result<MinosError> {
        let index = self.check(name)?;
        let delta = cl_to_delta(cl, self.minimum.up())?;
        let param = &self.minimum.parameters()[index];
        let sigma = param.error();

        let lower = self.side(index, -1.0, delta)?;
        let upper = self.side(index, 1.0, delta)?;

        let mut result = MinosError {
            name: name.to_string(),
            value: param.value(),
            cl,
            lower: -sigma,
            upper: sigma,
            lower_valid: false,
            upper_valid: false,
            at_lower_limit: false,
            at_upper_limit: false,
            at_lower_max_fcn: false,
            at_upper_max_fcn: false,
            lower_new_min: false,
            upper_new_min: false,
            lower_failure: None,
            upper_failure: None,
            nfcn: lower.nfcn + upper.nfcn,
        };

        match lower.crossing {
            Ok(offset) => {
                result.lower = offset;
                result.lower_valid = true;
            }
            Err(failure) => {
                log::warn!("MINOS: lower error of '{}' failed: {}", name, failure);
                result.at_lower_limit = matches!(failure, MinosFailure::BoundaryHit { .. });
                result.at_lower_max_fcn = matches!(failure, MinosFailure::CallLimit { .. });
                result.lower_new_min = matches!(failure, MinosFailure::NewMinimum { .. });
                result.lower_failure = Some(failure);
            }
        }
        match upper.crossing {
            Ok(offset) => {
                result.upper = offset;
                result.upper_valid = true;
            }
            Err(failure) => {
                log::warn!("MINOS: upper error of '{}' failed: {}", name, failure);
                result.at_upper_limit = matches!(failure, MinosFailure::BoundaryHit { .. });
                result.at_upper_max_fcn = matches!(failure, MinosFailure::CallLimit { .. });
                result.upper_new_min = matches!(failure, MinosFailure::NewMinimum { .. });
                result.upper_failure = Some(failure);
            }
        }

        Ok(result)
    }

    /// Lower offset of `name`, failing if the crossing is not found.
    pub fn lower(&self, name: &str, cl: f64) -> Result<f64> {
        self.one_side(name, cl, -1.0)
    }

    /// Upper offset of `name`, failing if the crossing is not found.
    pub fn upper(&self, name: &str, cl: f64) -> Result<f64> {
        self.one_side(name, cl, 1.0)
    }

    /// Intervals of several parameters, in the given order.
    pub fn errors(&self, names: &[&str], cl: f64) -> Result<Vec<MinosError>> {
        names.iter().map(|name| self.error(name, cl)).collect()
    }

    fn one_side(&self, name: &str, cl: f64, sign: f64) -> Result<f64> {
        let index = self.check(name)?;
        let delta = cl_to_delta(cl, self.minimum.up())?;
        self.side(index, sign, delta)?
            .crossing
            .map_err(|reason| MinuitError::MinosFailed {
                name: name.to_string(),
                reason,
            })
    }

    fn check(&self, name: &str) -> Result<usize> {
        let params = self.minimum.parameters();
        let index = params
            .index_of(name)
            .ok_or_else(|| MinuitError::ParameterNotFound(name.to_string()))?;
        if params[index].is_fixed() {
            return Err(MinuitError::InvalidState(format!(
                "MINOS needs a free parameter, '{}' is fixed",
                name
            )));
        }
        if !self.minimum.is_valid() {
            return Err(MinuitError::InvalidState(
                "MINOS requires a valid minimum".to_string(),
            ));
        }
        Ok(index)
    }

    fn side(&self, index: usize, sign: f64, delta: f64) -> Result<SideOutcome> {
        let param = &self.minimum.parameters()[index];
        let x0 = param.value();
        let sigma = param.error();
        let limit = if sign > 0.0 { param.max() } else { param.min() };
        let up = self.minimum.up();
        let fmin = self.minimum.fval();
        let tol = self.config.crossing_tolerance * up;
        let budget = self.config.call_limit(self.minimum.parameters().n_free());
        let sqrt_delta = delta.sqrt();

        let mut nfcn = 0;
        let mut iterations = 0;
        let outcome = |crossing, nfcn| Ok(SideOutcome { crossing, nfcn });

        // profile value at offset t; clamped to the limit on this side
        let evaluate = |t: f64, nfcn: &mut usize| -> Result<std::result::Result<(f64, f64), MinosFailure>> {
            let value = x0 + sign * t;
            let remaining = budget.saturating_sub(*nfcn);
            if remaining == 0 {
                return Ok(Err(MinosFailure::CallLimit { nfcn: *nfcn }));
            }
            let fit = match self.fit_at(index, value, remaining) {
                Ok(fit) => fit,
                Err(MinuitError::EvaluationError(msg)) => {
                    log::debug!("MINOS: evaluation at {} failed: {}", value, msg);
                    return Ok(Err(MinosFailure::MinimizationFailed {
                        value,
                        status: MinimizerStatus::Aborted,
                    }));
                }
                Err(err) => return Err(err),
            };
            *nfcn += fit.nfcn();
            log::debug!(
                "MINOS: {} = {:.6e}, f - fmin = {:.6e}, status = {:?}",
                self.minimum.parameters()[index].name(),
                value,
                fit.fval() - fmin,
                fit.status()
            );

            if *nfcn > budget {
                return Ok(Err(MinosFailure::CallLimit { nfcn: *nfcn }));
            }
            match fit.status() {
                MinimizerStatus::Converged => {}
                MinimizerStatus::MaxCallsExceeded => {
                    return Ok(Err(MinosFailure::CallLimit { nfcn: *nfcn }));
                }
                status => return Ok(Err(MinosFailure::MinimizationFailed { value, status })),
            }
            if fit.fval() < fmin - tol {
                return Ok(Err(MinosFailure::NewMinimum { fval: fit.fval() }));
            }
            let df = fit.fval() - fmin;
            Ok(Ok((df, df.max(0.0).sqrt() - sqrt_delta)))
        };

        // bracket the crossing
        let mut t = first_offset(x0, sigma, delta / up);
        let mut lo = (0.0, -sqrt_delta);
        let hi;
        loop {
            if iterations >= self.config.max_iterations {
                return outcome(Err(MinosFailure::IterationLimit { iterations }), nfcn);
            }
            iterations += 1;

            let mut at_limit = false;
            if limit.is_finite() && sign * (x0 + sign * t - limit) >= 0.0 {
                t = sign * (limit - x0);
                at_limit = true;
            }

            let (df, u) = match evaluate(t, &mut nfcn)? {
                Ok(point) => point,
                Err(failure) => return outcome(Err(failure), nfcn),
            };
            if (df - delta).abs() < tol {
                return outcome(Ok(sign * t), nfcn);
            }
            if u > 0.0 {
                hi = (t, u);
                break;
            }
            if at_limit {
                return outcome(Err(MinosFailure::BoundaryHit { limit }), nfcn);
            }

            let next = if u > lo.1 {
                t - u * (t - lo.0) / (u - lo.1)
            } else {
                2.0 * t
            };
            lo = (t, u);
            t = next.max(1.05 * t).min(4.0 * t);
        }

        // Illinois regula falsi between lo (below) and hi (above)
        let (mut a, mut fa) = lo;
        let (mut b, mut fb) = hi;
        let mut retained = 0;
        loop {
            if iterations >= self.config.max_iterations {
                return outcome(Err(MinosFailure::IterationLimit { iterations }), nfcn);
            }
            iterations += 1;

            let c = (a * fb - b * fa) / (fb - fa);
            let (df, u) = match evaluate(c, &mut nfcn)? {
                Ok(point) => point,
                Err(failure) => return outcome(Err(failure), nfcn),
            };
            if (df - delta).abs() < tol {
                return outcome(Ok(sign * c), nfcn);
            }

            if u > 0.0 {
                b = c;
                fb = u;
                if retained == -1 {
                    fa *= 0.5;
                }
                retained = -1;
            } else {
                a = c;
                fa = u;
                if retained == 1 {
                    fb *= 0.5;
                }
                retained = 1;
            }
        }
    }

    /// Minimize the other parameters with parameter `index` fixed at `value`.
    ///
    /// The others start from the fit values shifted along the direction the
    /// covariance matrix predicts.
    fn fit_at(&self, index: usize, value: f64, max_calls: usize) -> Result<FunctionMinimum> {
        let mut params = self.minimum.parameters().clone();
        let x0 = params[index].value();
        let mut values = params.external_values();
        values[index] = value;

        if let Some(cov) = self.minimum.covariance() {
            let cov = cov.matrix();
            let cpp = cov[[index, index]];
            if cpp > 0.0 {
                for j in params.free_indices() {
                    if j != index {
                        let shifted = values[j] + cov[[j, index]] / cpp * (value - x0);
                        values[j] = params[j].bounds().clamp(shifted);
                    }
                }
            }
        }

        params.set_values(&values)?;
        let name = params[index].name().to_string();
        params.fix(&name)?;

        let fcn = FunctionAdapter::new(self.objective, params)
            .with_errordef(self.minimum.up())
            .with_recovery(self.recovery);
        let config = MigradConfig::default()
            .with_strategy(self.config.strategy)
            .with_tolerance(self.config.tolerance)
            .with_max_calls(max_calls);
        Migrad::with_config(config).minimize(&fcn)
    }
}

/// MINOS intervals of several parameters computed in parallel.
///
/// Every parameter gets its own function adapter, so call counts stay per
/// run; the objective must be shareable between threads.
pub fn minos_parallel<O>(
    objective: &O,
    minimum: &FunctionMinimum,
    names: &[&str],
    cl: f64,
    config: &MinosConfig,
    recovery: Option<f64>,
) -> Result<Vec<MinosError>>
where
    O: Objective + Sync,
{
    names
        .par_iter()
        .map(|name| {
            Minos::new(objective, minimum)
                .with_config(config.clone())
                .with_recovery(recovery)
                .error(name, cl)
        })
        .collect()
}

/// Offset of the first trial: `sigma * sqrt(ratio)`.
///
/// A zero or non-finite error falls back to the default step at `x0`, since a
/// zero offset never grows during bracketing.
fn first_offset(x0: f64, sigma: f64, ratio: f64) -> f64 {
    let t = sigma * ratio.sqrt();
    if t.is_finite() && t > 0.0 {
        t
    } else {
        default_step(x0) * ratio.sqrt()
    }
}
