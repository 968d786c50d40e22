//! One-dimensional search along a descent direction.
//!
//! The search fits a parabola through `f(0)`, the directional derivative at
//! 0 and the latest trial, and uses its minimum to pick the next step. A
//! step is accepted once it gives sufficient decrease and the parabola slope
//! at the step is small compared to the initial slope.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{MinuitError, Result};
use crate::function::FunctionAdapter;

/// Line search settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSearchConfig {
    /// Sufficient decrease factor. Default: 1e-4
    pub c1: f64,

    /// Curvature factor on the parabola slope. Default: 0.5
    pub c2: f64,

    /// Maximum number of function evaluations. Default: 12
    pub max_trials: usize,

    /// Maximum growth of the step per expansion. Default: 4
    pub max_expansion: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self {
            c1: 1e-4,
            c2: 0.5,
            max_trials: 12,
            max_expansion: 4.0,
        }
    }
}

impl LineSearchConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.c1 && self.c1 < self.c2 && self.c2 < 1.0) {
            return Err(MinuitError::InvalidConfig(format!(
                "line search needs 0 < c1 < c2 < 1, got c1 = {}, c2 = {}",
                self.c1, self.c2
            )));
        }
        if self.max_trials == 0 || self.max_expansion <= 1.0 {
            return Err(MinuitError::InvalidConfig(
                "line search needs max_trials >= 1 and max_expansion > 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Accepted step of a line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchResult {
    /// Step length along the direction
    pub alpha: f64,
    /// Function value at `x + alpha * direction`
    pub fval: f64,
    /// Number of trial evaluations
    pub trials: usize,
}

/// Search along `direction` from `x`.
///
/// `f0` is the function value at `x` and `gdel` the directional derivative,
/// which must be negative. Returns the lowest point found, or
/// `LineSearchFailed` when no trial decreased the function.
pub fn line_search(
    fcn: &FunctionAdapter,
    x: &Array1<f64>,
    direction: &Array1<f64>,
    f0: f64,
    gdel: f64,
    config: &LineSearchConfig,
) -> Result<LineSearchResult> {
    let mut alpha = 1.0;
    let mut best: Option<(f64, f64)> = None;
    let mut trials = 0;

    while trials < config.max_trials {
        trials += 1;
        let point = x + &(direction * alpha);
        let f = match fcn.eval_internal(&point) {
            Ok(f) => f,
            Err(MinuitError::EvaluationError(msg)) => {
                log::debug!("line search trial at alpha = {:.3e} rejected: {}", alpha, msg);
                alpha *= 0.25;
                continue;
            }
            Err(err) => return Err(err),
        };

        if f < f0 && best.map_or(true, |(_, fb)| f < fb) {
            best = Some((alpha, f));
        }

        // parabola through f0 with slope gdel and the trial point
        let curvature = (f - f0 - gdel * alpha) / (alpha * alpha);

        if f > f0 + config.c1 * alpha * gdel {
            let next = if curvature > 0.0 {
                -gdel / (2.0 * curvature)
            } else {
                0.5 * alpha
            };
            alpha = next.clamp(0.1 * alpha, 0.5 * alpha);
            continue;
        }

        let slope = gdel + 2.0 * curvature * alpha;
        if slope.abs() <= config.c2 * gdel.abs() {
            break;
        }

        if slope < 0.0 {
            let limit = config.max_expansion * alpha;
            let next = if curvature > 0.0 {
                (-gdel / (2.0 * curvature)).min(limit)
            } else {
                limit
            };
            alpha = next;
        } else {
            alpha = -gdel / (2.0 * curvature);
        }
    }

    match best {
        Some((alpha, fval)) => Ok(LineSearchResult {
            alpha,
            fval,
            trials,
        }),
        None => Err(MinuitError::LineSearchFailed { trials }),
    }
}
