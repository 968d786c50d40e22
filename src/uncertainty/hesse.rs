//! # HESSE
//!
//! Finite-difference Hessian at a candidate minimum. The diagonal is found by
//! central differences whose step is tuned until the change of the function
//! along the step ("sag") matches a target set by machine precision; the
//! off-diagonal elements reuse those steps in a mixed difference. The inverse,
//! scaled by `2 up`, is the covariance matrix in internal coordinates.

use nalgebra::SymmetricEigen;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::covariance::make_pos_def;
use crate::error::Result;
use crate::function::FunctionAdapter;
use crate::migrad::config::{default_max_calls, HessianSettings, Strategy};
use crate::migrad::state::MinimizerState;
use crate::migrad::MinimizerStatus;
use crate::minimum::{CovarianceQuality, FunctionMinimum};
use crate::utils::finite_difference::{FunctionGradient, MachinePrecision};
use crate::utils::matrix_convert::{nalgebra_to_ndarray, ndarray_to_nalgebra};

/// Reasons the Hessian could not be turned into a covariance matrix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HesseFailure {
    #[error("second derivative of parameter {index} is not positive")]
    NonPositiveDiagonal { index: usize },

    #[error("Hessian is not positive definite (eigenvalue {eigenvalue:.3e} along {direction:?})")]
    NotPositiveDefinite { eigenvalue: f64, direction: Vec<f64> },

    #[error("Hessian is singular")]
    Singular,

    #[error("call limit of {limit} reached")]
    CallLimit { limit: usize },
}

/// Configuration options for HESSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HesseConfig {
    /// Strategy level selecting cycle counts and tolerances. Default: 1
    pub strategy: Strategy,

    /// Maximum number of function calls. Default: `200 + 100 n + 5 n^2`
    pub max_calls: Option<usize>,
}

impl Default for HesseConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Default,
            max_calls: None,
        }
    }
}

impl HesseConfig {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = Some(max_calls);
        self
    }

    pub fn call_limit(&self, n: usize) -> usize {
        self.max_calls.unwrap_or_else(|| default_max_calls(n))
    }
}

/// Outcome of a Hessian computation.
#[derive(Debug, Clone)]
pub struct HesseEstimate {
    /// Second derivative matrix in internal coordinates
    pub hessian: Array2<f64>,
    /// Gradient with the curvature and steps found along the diagonal
    pub gradient: FunctionGradient,
    /// Function calls spent
    pub nfcn: usize,
    /// Inverse Hessian, or why it is not usable
    pub inverse: std::result::Result<Array2<f64>, HesseFailure>,
}

/// The HESSE error estimator.
#[derive(Debug, Clone, Default)]
pub struct Hesse {
    config: HesseConfig,
}

impl Hesse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HesseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HesseConfig {
        &self.config
    }

    /// Compute the Hessian at `x`, where the function value is `fval`.
    ///
    /// Evaluation errors are returned as errors; numerical problems with the
    /// matrix are reported through [`HesseEstimate::inverse`].
    pub fn estimate(
        &self,
        fcn: &FunctionAdapter,
        x: &Array1<f64>,
        fval: f64,
        gradient: &FunctionGradient,
    ) -> Result<HesseEstimate> {
        let settings = self.config.strategy.hessian_settings();
        let limit = self.config.call_limit(x.len());
        let start = fcn.nfcn();
        let mut hessian = Array2::zeros((x.len(), x.len()));
        let mut gradient = gradient.clone();

        let diagonal = diagonal_elements(fcn, x, fval, &mut gradient, &settings, start, limit)?;
        let inverse = match diagonal {
            Ok(yy) => {
                for i in 0..x.len() {
                    hessian[[i, i]] = gradient.g2[i];
                }
                off_diagonal_elements(fcn, x, fval, &gradient.gstep, &yy, &mut hessian)?;
                check_pos_def(&hessian).and_then(|_| invert_symmetric(&hessian))
            }
            Err(failure) => {
                for i in 0..x.len() {
                    hessian[[i, i]] = gradient.g2[i];
                }
                Err(failure)
            }
        };

        Ok(HesseEstimate {
            hessian,
            gradient,
            nfcn: fcn.nfcn() - start,
            inverse,
        })
    }

    /// Inverse Hessian at `x`, failing on any numerical problem.
    pub fn compute(
        &self,
        fcn: &FunctionAdapter,
        x: &Array1<f64>,
        fval: f64,
        gradient: &FunctionGradient,
    ) -> Result<Array2<f64>> {
        Ok(self.estimate(fcn, x, fval, gradient)?.inverse?)
    }

    /// Recompute the covariance of an existing minimum.
    ///
    /// `fcn` must be built from the minimum's parameters. If the Hessian is
    /// only indefinite a forced positive-definite version is used; any other
    /// failure keeps the previous covariance and marks the result invalid.
    pub fn update(&self, fcn: &FunctionAdapter, minimum: &FunctionMinimum) -> Result<FunctionMinimum> {
        let previous = minimum.state();
        let estimate = self.estimate(fcn, &previous.x, previous.fval, &previous.gradient)?;
        let mut state = previous.clone();
        state.gradient = estimate.gradient.clone();

        let quality = apply_estimate(&mut state, &estimate);
        FunctionMinimum::new(
            fcn,
            state,
            minimum.status(),
            minimum.edm_goal(),
            quality,
            minimum.nfcn() + estimate.nfcn,
        )
    }

    /// Covariance at the current parameter values, without minimizing first.
    ///
    /// The result is reported as converged when its edm is below `edm_goal`.
    pub fn at_point(&self, fcn: &FunctionAdapter, edm_goal: f64) -> Result<FunctionMinimum> {
        let start = fcn.nfcn();
        let mut state = crate::migrad::algorithm::initial_state(fcn, self.config.strategy)?;
        let estimate = self.estimate(fcn, &state.x, state.fval, &state.gradient)?;
        state.gradient = estimate.gradient.clone();

        let quality = apply_estimate(&mut state, &estimate);
        let status = if state.edm < edm_goal {
            MinimizerStatus::Converged
        } else {
            MinimizerStatus::Initializing
        };
        FunctionMinimum::new(fcn, state, status, edm_goal, quality, fcn.nfcn() - start)
    }
}

/// Install the inverse from `estimate` into `state`.
pub(crate) fn apply_estimate(state: &mut MinimizerState, estimate: &HesseEstimate) -> CovarianceQuality {
    match &estimate.inverse {
        Ok(inverse) => {
            state.set_inv_hessian(inverse.clone());
            state.dcovar = 0.0;
            CovarianceQuality::accurate()
        }
        Err(HesseFailure::NotPositiveDefinite { eigenvalue, .. }) => {
            log::warn!(
                "HESSE: Hessian not positive definite (eigenvalue {:.3e}), forcing it",
                eigenvalue
            );
            let (forced, _) = make_pos_def(&estimate.hessian);
            match invert_symmetric(&forced) {
                Ok(inverse) => {
                    state.set_inv_hessian(inverse);
                    CovarianceQuality::made_pos_def()
                }
                Err(failure) => {
                    log::warn!("HESSE failed after forcing positive definiteness: {}", failure);
                    state.update_edm();
                    CovarianceQuality::failed()
                }
            }
        }
        Err(failure) => {
            log::warn!("HESSE failed: {}", failure);
            state.update_edm();
            CovarianceQuality::failed()
        }
    }
}

/// Diagonal second derivatives; returns `f(x + d_i)` for every parameter.
fn diagonal_elements(
    fcn: &FunctionAdapter,
    x: &Array1<f64>,
    fval: f64,
    gradient: &mut FunctionGradient,
    settings: &HessianSettings,
    start: usize,
    limit: usize,
) -> Result<std::result::Result<Array1<f64>, HesseFailure>> {
    let prec = MachinePrecision::default();
    let limited = fcn.parameters().free_has_limits();
    let up = fcn.errordef();
    let aimsag = prec.eps2.sqrt() * (fval.abs() + up);

    let n = x.len();
    let mut yy = Array1::zeros(n);
    let mut point = x.clone();

    for i in 0..n {
        let xtf = x[i];
        let dmin = 8.0 * prec.eps2 * (xtf.abs() + prec.eps2);
        let mut d = gradient.gstep[i].abs().max(dmin);

        for _ in 0..settings.ncycles {
            let mut sag = 0.0;
            let mut fs1 = 0.0;
            let mut fs2 = 0.0;
            let mut resolved = false;

            for _ in 0..5 {
                point[i] = xtf + d;
                fs1 = fcn.eval_internal(&point)?;
                point[i] = xtf - d;
                fs2 = fcn.eval_internal(&point)?;
                point[i] = xtf;

                sag = 0.5 * (fs1 + fs2 - 2.0 * fval);
                if sag > prec.eps2 {
                    resolved = true;
                    break;
                }
                if limited[i] {
                    if d > 0.5 {
                        break;
                    }
                    d *= 10.0;
                    if d > 0.5 {
                        d = 0.51;
                    }
                } else {
                    d *= 10.0;
                }
            }

            if !resolved {
                log::debug!("HESSE: no curvature along parameter {} (sag = {:.3e})", i, sag);
                return Ok(Err(HesseFailure::NonPositiveDiagonal { index: i }));
            }

            let g2_before = gradient.g2[i];
            gradient.g2[i] = 2.0 * sag / (d * d);
            gradient.grad[i] = (fs1 - fs2) / (2.0 * d);
            gradient.gstep[i] = d;
            yy[i] = fs1;

            let dlast = d;
            d = (2.0 * aimsag / gradient.g2[i].abs()).sqrt();
            if limited[i] {
                d = d.min(0.5);
            }
            if d < dmin {
                d = dmin;
            }

            if ((d - dlast) / d).abs() < settings.step_tolerance {
                break;
            }
            if ((gradient.g2[i] - g2_before) / gradient.g2[i]).abs() < settings.g2_tolerance {
                break;
            }
            d = d.min(10.0 * dlast).max(0.1 * dlast);
        }

        if fcn.nfcn() - start > limit {
            return Ok(Err(HesseFailure::CallLimit { limit }));
        }
    }

    Ok(Ok(yy))
}

/// Mixed second derivatives from the diagonal steps.
fn off_diagonal_elements(
    fcn: &FunctionAdapter,
    x: &Array1<f64>,
    fval: f64,
    steps: &Array1<f64>,
    yy: &Array1<f64>,
    hessian: &mut Array2<f64>,
) -> Result<()> {
    let n = x.len();
    let mut point = x.clone();

    for i in 0..n {
        point[i] = x[i] + steps[i];
        for j in (i + 1)..n {
            point[j] = x[j] + steps[j];
            let fs1 = fcn.eval_internal(&point)?;
            let elem = (fs1 + fval - yy[i] - yy[j]) / (steps[i] * steps[j]);
            hessian[[i, j]] = elem;
            hessian[[j, i]] = elem;
            point[j] = x[j];
        }
        point[i] = x[i];
    }

    Ok(())
}

/// Check a symmetric matrix for positive definiteness.
///
/// The matrix is scaled to unit diagonal first, so the test is on
/// correlations rather than on the raw scale of the parameters.
pub fn check_pos_def(matrix: &Array2<f64>) -> std::result::Result<(), HesseFailure> {
    let n = matrix.nrows();
    if n == 0 {
        return Ok(());
    }
    for i in 0..n {
        if !(matrix[[i, i]] > 0.0) {
            return Err(HesseFailure::NonPositiveDiagonal { index: i });
        }
    }

    let scale: Array1<f64> = matrix.diag().mapv(|d| 1.0 / d.sqrt());
    let scaled = Array2::from_shape_fn((n, n), |(i, j)| matrix[[i, j]] * scale[i] * scale[j]);
    let eigen = SymmetricEigen::new(ndarray_to_nalgebra(&scaled));

    let (imin, pmin) = eigen
        .eigenvalues
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::INFINITY), |acc, (k, v)| if v < acc.1 { (k, v) } else { acc });
    let pmax = eigen
        .eigenvalues
        .iter()
        .fold(1.0_f64, |acc, v| acc.max(v.abs()));

    let epspdf = 1e-6_f64.max(MachinePrecision::default().eps2);
    if pmin > epspdf * pmax {
        return Ok(());
    }

    let direction = (0..n).map(|k| eigen.eigenvectors[(k, imin)] * scale[k]).collect();
    Err(HesseFailure::NotPositiveDefinite {
        eigenvalue: pmin,
        direction,
    })
}

/// Invert a symmetric positive-definite matrix via Cholesky.
pub fn invert_symmetric(matrix: &Array2<f64>) -> std::result::Result<Array2<f64>, HesseFailure> {
    if matrix.is_empty() {
        return Ok(matrix.clone());
    }
    let cholesky = ndarray_to_nalgebra(matrix)
        .cholesky()
        .ok_or(HesseFailure::Singular)?;
    let inverse = nalgebra_to_ndarray(&cholesky.inverse());
    if inverse.iter().all(|v| v.is_finite()) {
        Ok(inverse)
    } else {
        Err(HesseFailure::Singular)
    }
}
