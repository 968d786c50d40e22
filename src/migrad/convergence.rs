//! Convergence states of the MIGRAD minimizer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Possible states of a minimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinimizerStatus {
    /// Start point and gradient are being set up.
    Initializing,

    /// The variable-metric loop is running.
    Iterating,

    /// The estimated distance to minimum is below the goal.
    Converged,

    /// The iteration budget ran out before convergence.
    MaxIterationsExceeded,

    /// The call budget ran out before convergence.
    MaxCallsExceeded,

    /// No further progress was possible.
    Aborted,
}

impl MinimizerStatus {
    /// Returns true if the minimization has stopped (either converged or failed).
    pub fn is_terminated(&self) -> bool {
        !matches!(self, MinimizerStatus::Initializing | MinimizerStatus::Iterating)
    }

    /// Returns true if the minimization has converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, MinimizerStatus::Converged)
    }

    /// Returns a description of the status.
    pub fn description(&self) -> &'static str {
        match self {
            MinimizerStatus::Initializing => "Minimization has not started",
            MinimizerStatus::Iterating => "Minimization is still running",
            MinimizerStatus::Converged => "Converged: estimated distance to minimum below goal",
            MinimizerStatus::MaxIterationsExceeded => "Terminated: maximum iterations reached",
            MinimizerStatus::MaxCallsExceeded => "Terminated: call limit reached",
            MinimizerStatus::Aborted => "Terminated: no further decrease possible",
        }
    }
}

impl fmt::Display for MinimizerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Estimated vertical distance to the minimum, `g^T V g / 2`.
pub fn estimated_distance(gradient: &ndarray::Array1<f64>, inv_hessian: &ndarray::Array2<f64>) -> f64 {
    0.5 * gradient.dot(&inv_hessian.dot(gradient))
}
