//! Result of a minimization.
//!
//! A [`FunctionMinimum`] is immutable once created. It carries the final
//! parameters with their errors, the covariance matrix and the flags that
//! say how far the result can be trusted.

use ndarray::Array2;
use std::fmt;

use crate::error::Result;
use crate::function::FunctionAdapter;
use crate::migrad::state::MinimizerState;
use crate::migrad::MinimizerStatus;
use crate::parameters::{NamedValues, Parameters};
use crate::uncertainty::covariance::Covariance;

/// How the inverse Hessian of a minimum was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CovarianceQuality {
    pub accurate: bool,
    pub made_pos_def: bool,
    pub hesse_failed: bool,
}

impl CovarianceQuality {
    /// Successful HESSE
    pub fn accurate() -> Self {
        Self {
            accurate: true,
            ..Self::default()
        }
    }

    /// HESSE with a forced positive-definite matrix
    pub fn made_pos_def() -> Self {
        Self {
            made_pos_def: true,
            ..Self::default()
        }
    }

    /// HESSE failed; the variable-metric approximation is kept
    pub fn failed() -> Self {
        Self {
            hesse_failed: true,
            ..Self::default()
        }
    }

    /// Variable-metric approximation, accurate when the last update was small
    pub fn from_updates(dcovar: f64) -> Self {
        Self {
            accurate: dcovar < 0.1,
            ..Self::default()
        }
    }
}

/// Minimum found by MIGRAD, possibly refined by HESSE.
#[derive(Debug, Clone)]
pub struct FunctionMinimum {
    state: MinimizerState,
    parameters: Parameters,
    covariance: Option<Covariance>,
    status: MinimizerStatus,
    quality: CovarianceQuality,
    up: f64,
    edm_goal: f64,
    nfcn: usize,
    at_limit: bool,
}

impl FunctionMinimum {
    /// Build a minimum from the final state of a run.
    ///
    /// Parameter values and errors are taken from the internal point and the
    /// inverse Hessian of `state`.
    pub fn new(
        fcn: &FunctionAdapter,
        state: MinimizerState,
        status: MinimizerStatus,
        edm_goal: f64,
        quality: CovarianceQuality,
        nfcn: usize,
    ) -> Result<Self> {
        let up = fcn.errordef();
        let mut parameters = fcn.parameters().clone();
        let x = state.x.to_vec();
        parameters.update_from_internal(&x)?;

        let covariance = if state.n() > 0 {
            let internal = &state.inv_hessian * (2.0 * up);
            let errors: Vec<f64> = parameters
                .free()
                .iter()
                .enumerate()
                .map(|(k, p)| {
                    let variance = internal[[k, k]];
                    if variance > 0.0 {
                        p.bounds_transform().external_error(x[k], variance.sqrt())
                    } else {
                        0.0
                    }
                })
                .collect();
            parameters.set_free_errors(&errors)?;
            Some(Covariance::from_internal(&parameters, &x, &internal))
        } else {
            None
        };

        let at_limit = parameters.at_limit(&x).into_iter().any(|b| b);

        Ok(Self {
            state,
            parameters,
            covariance,
            status,
            quality,
            up,
            edm_goal,
            nfcn,
            at_limit,
        })
    }

    /// Final value of the objective
    pub fn fval(&self) -> f64 {
        self.state.fval
    }

    /// Estimated distance to minimum
    pub fn edm(&self) -> f64 {
        self.state.edm
    }

    pub fn edm_goal(&self) -> f64 {
        self.edm_goal
    }

    /// errordef the minimum was computed with
    pub fn up(&self) -> f64 {
        self.up
    }

    pub fn status(&self) -> MinimizerStatus {
        self.status
    }

    /// Function calls spent, including HESSE calls
    pub fn nfcn(&self) -> usize {
        self.nfcn
    }

    pub fn iterations(&self) -> usize {
        self.state.iteration
    }

    /// Final parameters with values and errors
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn values(&self) -> NamedValues {
        self.parameters.values()
    }

    pub fn errors(&self) -> NamedValues {
        self.parameters.errors()
    }

    /// Covariance in external coordinates over all parameters
    pub fn covariance(&self) -> Option<&Covariance> {
        self.covariance.as_ref()
    }

    /// Covariance of the free parameters in internal coordinates
    pub fn internal_covariance(&self) -> Array2<f64> {
        &self.state.inv_hessian * (2.0 * self.up)
    }

    /// Internal state at the minimum
    pub fn state(&self) -> &MinimizerState {
        &self.state
    }

    pub fn is_above_max_edm(&self) -> bool {
        self.state.edm > 10.0 * self.edm_goal
    }

    pub fn has_reached_call_limit(&self) -> bool {
        self.status == MinimizerStatus::MaxCallsExceeded
    }

    /// Minimum is converged and the parameters can be trusted
    pub fn has_valid_parameters(&self) -> bool {
        self.status.is_converged() && !self.is_above_max_edm() && !self.has_reached_call_limit()
    }

    /// Parameters and covariance can be trusted
    pub fn is_valid(&self) -> bool {
        self.has_valid_parameters() && !self.quality.hesse_failed
    }

    pub fn has_covariance(&self) -> bool {
        self.covariance.is_some()
    }

    pub fn has_accurate_covar(&self) -> bool {
        self.has_covariance() && self.quality.accurate && !self.quality.hesse_failed
    }

    pub fn has_posdef_covar(&self) -> bool {
        self.has_covariance() && !self.quality.made_pos_def && !self.quality.hesse_failed
    }

    pub fn has_made_posdef_covar(&self) -> bool {
        self.quality.made_pos_def
    }

    pub fn hesse_failed(&self) -> bool {
        self.quality.hesse_failed
    }

    pub fn has_parameters_at_limit(&self) -> bool {
        self.at_limit
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

impl fmt::Display for FunctionMinimum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Function Minimum:")?;
        writeln!(
            f,
            "  Status: {} ({})",
            self.status,
            if self.is_valid() { "valid" } else { "invalid" }
        )?;
        writeln!(f, "  FCN = {:.6e}  Nfcn = {}", self.fval(), self.nfcn)?;
        writeln!(f, "  EDM = {:.3e} (Goal: {:.3e})", self.edm(), self.edm_goal)?;
        writeln!(
            f,
            "  Above EDM threshold: {}  Reached call limit: {}  Parameters at limit: {}",
            flag(self.is_above_max_edm()),
            flag(self.has_reached_call_limit()),
            flag(self.at_limit)
        )?;
        writeln!(
            f,
            "  Covariance: accurate {}  pos. def. {}  forced {}  HESSE failed {}",
            flag(self.has_accurate_covar()),
            flag(self.has_posdef_covar()),
            flag(self.has_made_posdef_covar()),
            flag(self.hesse_failed())
        )?;
        write!(f, "{}", self.parameters)
    }
}
