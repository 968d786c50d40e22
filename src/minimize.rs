//! One-call minimization with a result shaped like `scipy.optimize`'s.

use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::error::{MinuitError, Result};
use crate::function::Objective;
use crate::migrad::{MinimizerStatus, Strategy};
use crate::minuit::{Minuit, MinuitConfig};
use crate::parameters::Parameters;

/// Options of [`minimize`].
#[derive(Debug, Clone, Default)]
pub struct MinimizeOptions {
    /// Limits per parameter; infinite values leave a side open
    pub bounds: Option<Vec<(f64, f64)>>,
    /// MIGRAD tolerance
    pub tol: Option<f64>,
    /// Call limit
    pub max_calls: Option<usize>,
    pub strategy: Strategy,
}

impl MinimizeOptions {
    pub fn with_bounds(mut self, bounds: Vec<(f64, f64)>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = Some(max_calls);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Result of [`minimize`].
#[derive(Debug, Clone, Serialize)]
pub struct OptimizeResult {
    /// Parameter values at the minimum
    pub x: Array1<f64>,
    /// Objective value at the minimum
    pub fun: f64,
    pub success: bool,
    pub status: MinimizerStatus,
    pub message: String,
    /// Function calls
    pub nfev: usize,
    /// MIGRAD iterations
    pub nit: usize,
    /// Gradient with respect to `x` at the minimum
    pub jac: Array1<f64>,
    /// Inverse Hessian with respect to `x`
    pub hess_inv: Array2<f64>,
}

/// Minimize `fcn` starting from `x0` with MIGRAD.
///
/// Parameters are named `x0`, `x1`, ... A call limit or a minimum that is
/// not valid gives `success == false`, not an error.
///
/// # Examples
///
/// ```
/// use minuit_rs::{minimize, MinimizeOptions};
///
/// let rosenbrock = |p: &[f64]| (1.0 - p[0]).powi(2) + 100.0 * (p[1] - p[0] * p[0]).powi(2);
/// let options = MinimizeOptions::default().with_max_calls(10_000);
/// let result = minimize(rosenbrock, &[-1.2, 1.0], &options).unwrap();
/// assert!(result.success);
/// assert!((result.x[0] - 1.0).abs() < 1e-2);
/// ```
pub fn minimize<O: Objective>(fcn: O, x0: &[f64], options: &MinimizeOptions) -> Result<OptimizeResult> {
    if let Some(bounds) = &options.bounds {
        if bounds.len() != x0.len() {
            return Err(MinuitError::DimensionMismatch(format!(
                "{} bounds for {} parameters",
                bounds.len(),
                x0.len()
            )));
        }
    }
    let mut params = Parameters::new();
    for (i, &value) in x0.iter().enumerate() {
        let name = format!("x{}", i);
        match options.bounds.as_ref().and_then(|b| b.get(i)) {
            Some(&(lo, hi)) if lo > f64::NEG_INFINITY || hi < f64::INFINITY => {
                params.add_param_with_bounds(&name, value, lo, hi)?
            }
            _ => params.add_param(&name, value)?,
        }
    }

    let mut config = MinuitConfig::default().with_strategy(options.strategy);
    if let Some(tol) = options.tol {
        config = config.with_tolerance(tol);
    }
    let mut m = Minuit::from_parameters(fcn, params).with_config(config);
    let fmin = m.migrad(options.max_calls, 1)?;

    let message = if fmin.is_valid() {
        "Optimization terminated successfully.".to_string()
    } else {
        let mut message = "Optimization failed.".to_string();
        if fmin.has_reached_call_limit() {
            message.push_str(" Call limit was reached.");
        }
        if fmin.is_above_max_edm() {
            message.push_str(" Estimated distance to minimum too large.");
        }
        message
    };

    let state = fmin.state();
    let parameters = fmin.parameters();
    let x_int = state.x.to_vec();
    let dext = parameters.dext_dint(&x_int);
    let jac = Array1::from_iter(
        state
            .gradient
            .grad
            .iter()
            .zip(dext.iter())
            .map(|(&g, &d)| if d != 0.0 { g / d } else { 0.0 }),
    );
    let hess_inv = match fmin.covariance() {
        Some(cov) => cov.matrix() / (2.0 * fmin.up()),
        None => Array2::zeros((x0.len(), x0.len())),
    };

    Ok(OptimizeResult {
        x: Array1::from_vec(parameters.external_values()),
        fun: fmin.fval(),
        success: fmin.is_valid(),
        status: fmin.status(),
        message,
        nfev: fmin.nfcn(),
        nit: fmin.iterations(),
        jac,
        hess_inv,
    })
}
