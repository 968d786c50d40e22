//! Configuration options for the MIGRAD minimizer.
//!
//! This module defines the strategy levels, which trade function calls for
//! accuracy of the derivatives, and the MIGRAD stopping criteria.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use super::line_search::LineSearchConfig;
use crate::error::MinuitError;
use crate::utils::finite_difference::GradientSettings;

/// Cycle count and tolerances for the HESSE diagonal step refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HessianSettings {
    pub ncycles: usize,
    pub step_tolerance: f64,
    pub g2_tolerance: f64,
}

/// Accuracy level of the minimization.
///
/// Higher levels spend more function calls on derivatives and on checking
/// the covariance matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Strategy {
    /// Level 0: cheap derivatives, HESSE only on request
    Fast,

    /// Level 1: HESSE after convergence when the covariance is not trusted
    #[default]
    Default,

    /// Level 2: accurate derivatives, HESSE at the start and after convergence
    Thorough,
}

impl Strategy {
    /// Numeric strategy level (0, 1 or 2)
    pub fn level(&self) -> u8 {
        match self {
            Strategy::Fast => 0,
            Strategy::Default => 1,
            Strategy::Thorough => 2,
        }
    }

    pub fn gradient_settings(&self) -> GradientSettings {
        match self {
            Strategy::Fast => GradientSettings {
                ncycles: 2,
                step_tolerance: 0.5,
                grad_tolerance: 0.1,
            },
            Strategy::Default => GradientSettings {
                ncycles: 3,
                step_tolerance: 0.3,
                grad_tolerance: 0.05,
            },
            Strategy::Thorough => GradientSettings {
                ncycles: 5,
                step_tolerance: 0.1,
                grad_tolerance: 0.02,
            },
        }
    }

    pub fn hessian_settings(&self) -> HessianSettings {
        match self {
            Strategy::Fast => HessianSettings {
                ncycles: 3,
                step_tolerance: 0.5,
                g2_tolerance: 0.1,
            },
            Strategy::Default => HessianSettings {
                ncycles: 5,
                step_tolerance: 0.3,
                g2_tolerance: 0.05,
            },
            Strategy::Thorough => HessianSettings {
                ncycles: 7,
                step_tolerance: 0.1,
                g2_tolerance: 0.02,
            },
        }
    }
}

impl TryFrom<u8> for Strategy {
    type Error = MinuitError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(Strategy::Fast),
            1 => Ok(Strategy::Default),
            2 => Ok(Strategy::Thorough),
            other => Err(MinuitError::InvalidConfig(format!(
                "strategy must be 0, 1 or 2, got {}",
                other
            ))),
        }
    }
}

impl From<Strategy> for u8 {
    fn from(strategy: Strategy) -> Self {
        strategy.level()
    }
}

/// Default call budget for a minimization with `n` free parameters.
pub fn default_max_calls(n: usize) -> usize {
    200 + 100 * n + 5 * n * n
}

/// Configuration options for MIGRAD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigradConfig {
    /// Strategy level. Default: 1
    pub strategy: Strategy,

    /// Convergence tolerance; the edm goal is `0.002 * tolerance * up`. Default: 0.1
    pub tolerance: f64,

    /// Maximum number of function calls. Default: `200 + 100 n + 5 n^2`
    pub max_calls: Option<usize>,

    /// Maximum number of iterations. Default: unlimited
    pub max_iterations: Option<usize>,

    /// Maximum number of HESSE refinements after convergence. Default: 3
    pub max_hesse_refinements: usize,

    /// Line search settings
    pub line_search: LineSearchConfig,
}

impl Default for MigradConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Default,
            tolerance: 0.1,
            max_calls: None,
            max_iterations: None,
            max_hesse_refinements: 3,
            line_search: LineSearchConfig::default(),
        }
    }
}

impl MigradConfig {
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
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn with_line_search(mut self, line_search: LineSearchConfig) -> Self {
        self.line_search = line_search;
        self
    }

    /// Call budget for `n` free parameters
    pub fn call_limit(&self, n: usize) -> usize {
        self.max_calls.unwrap_or_else(|| default_max_calls(n))
    }

    /// Target estimated distance to minimum
    pub fn edm_goal(&self, up: f64) -> f64 {
        0.002 * self.tolerance * up
    }

    /// Check that the settings are usable
    pub fn validate(&self) -> Result<(), MinuitError> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(MinuitError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_calls == Some(0) {
            return Err(MinuitError::InvalidConfig(
                "max_calls must be at least 1".to_string(),
            ));
        }
        self.line_search.validate()
    }
}
