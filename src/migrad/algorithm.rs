//! Implementation of the MIGRAD variable-metric minimizer.
//!
//! The loop keeps an approximation `V` of the inverse Hessian in internal
//! coordinates, steps along `-V g` with a line search and corrects `V` with
//! the BFGS formula. It stops when the estimated distance to the minimum,
//! `g^T V g / 2`, drops below the goal. Depending on the strategy, HESSE then
//! replaces `V` by the inverse of the finite-difference Hessian, and the loop
//! resumes if that moves the edm back above the goal.

use ndarray::{Array1, Array2};

use super::config::{MigradConfig, Strategy};
use super::convergence::MinimizerStatus;
use super::line_search::line_search;
use super::state::MinimizerState;
use crate::error::{MinuitError, Result};
use crate::function::FunctionAdapter;
use crate::minimum::{CovarianceQuality, FunctionMinimum};
use crate::uncertainty::hesse::{apply_estimate, Hesse, HesseConfig};
use crate::utils::finite_difference::{
    analytic_gradient, initial_gradient, numerical_gradient, FunctionGradient, MachinePrecision,
};

/// The MIGRAD minimizer.
#[derive(Debug, Clone, Default)]
pub struct Migrad {
    /// Configuration options
    config: MigradConfig,
}

impl Migrad {
    /// Create a new minimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new minimizer with the given configuration.
    pub fn with_config(config: MigradConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MigradConfig {
        &self.config
    }

    /// Set the strategy level.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    /// Set the maximum number of function calls.
    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.config.max_calls = Some(max_calls);
        self
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = Some(max_iterations);
        self
    }

    /// Minimize the objective behind `fcn`, starting from its parameters.
    ///
    /// Running out of calls or iterations is reported through the status of
    /// the returned minimum. Errors are returned for invalid configuration
    /// and when the objective cannot be evaluated at the start point.
    pub fn minimize(&self, fcn: &FunctionAdapter) -> Result<FunctionMinimum> {
        self.config.validate()?;
        let start = fcn.nfcn();
        let n = fcn.n_free();
        let edm_goal = self.config.edm_goal(fcn.errordef());

        if n == 0 {
            let x = Array1::zeros(0);
            let fval = fcn.eval_internal(&x)?;
            let gradient = FunctionGradient {
                grad: Array1::zeros(0),
                g2: Array1::zeros(0),
                gstep: Array1::zeros(0),
                analytic: false,
            };
            let state = MinimizerState::new(x, fval, gradient, Array2::zeros((0, 0)), 0.0);
            return FunctionMinimum::new(
                fcn,
                state,
                MinimizerStatus::Converged,
                edm_goal,
                CovarianceQuality::accurate(),
                fcn.nfcn() - start,
            );
        }

        let mut state = initial_state(fcn, self.config.strategy)?;
        let mut hesse_quality = None;

        if self.config.strategy == Strategy::Thorough {
            match self.hesse(fcn, start).estimate(fcn, &state.x, state.fval, &state.gradient) {
                Ok(estimate) => {
                    state.gradient = estimate.gradient.clone();
                    let quality = apply_estimate(&mut state, &estimate);
                    if !quality.hesse_failed {
                        hesse_quality = Some(quality);
                    }
                }
                Err(MinuitError::EvaluationError(msg)) => {
                    log::warn!("MIGRAD: initial HESSE failed, using diagonal seed: {}", msg);
                }
                Err(err) => return Err(err),
            }
        }

        log::debug!(
            "MIGRAD start: n = {}, fval = {:.6e}, edm = {:.3e}, goal = {:.3e}",
            n,
            state.fval,
            state.edm,
            edm_goal
        );

        let status = self.iterate(fcn, &mut state, &mut hesse_quality, start, edm_goal)?;
        let quality = hesse_quality.unwrap_or_else(|| CovarianceQuality::from_updates(state.dcovar));

        log::debug!(
            "MIGRAD finished: {}, fval = {:.6e}, edm = {:.3e}, nfcn = {}",
            status,
            state.fval,
            state.edm,
            fcn.nfcn() - start
        );

        FunctionMinimum::new(fcn, state, status, edm_goal, quality, fcn.nfcn() - start)
    }

    fn iterate(
        &self,
        fcn: &FunctionAdapter,
        state: &mut MinimizerState,
        hesse_quality: &mut Option<CovarianceQuality>,
        start: usize,
        edm_goal: f64,
    ) -> Result<MinimizerStatus> {
        let strategy = self.config.strategy;
        let call_limit = self.config.call_limit(state.n());
        let eps2 = MachinePrecision::default().eps2;
        let mut refinements = 0;
        let mut reset = false;

        loop {
            if state.edm < edm_goal {
                if hesse_quality.is_some()
                    || refinements >= self.config.max_hesse_refinements
                    || !needs_refinement(strategy, state.dcovar)
                {
                    return Ok(MinimizerStatus::Converged);
                }

                refinements += 1;
                match self.hesse(fcn, start).estimate(fcn, &state.x, state.fval, &state.gradient) {
                    Ok(estimate) => {
                        state.gradient = estimate.gradient.clone();
                        let quality = apply_estimate(state, &estimate);
                        *hesse_quality = Some(quality);
                        if quality.hesse_failed || state.edm < edm_goal {
                            return Ok(MinimizerStatus::Converged);
                        }
                        log::debug!(
                            "MIGRAD: edm {:.3e} above goal after HESSE, continuing",
                            state.edm
                        );
                    }
                    Err(MinuitError::EvaluationError(msg)) => {
                        log::warn!("MIGRAD: HESSE after convergence failed: {}", msg);
                        *hesse_quality = Some(CovarianceQuality::failed());
                        return Ok(MinimizerStatus::Converged);
                    }
                    Err(err) => return Err(err),
                }
            }

            if fcn.nfcn() - start >= call_limit {
                log::debug!("MIGRAD: call limit {} reached", call_limit);
                return Ok(MinimizerStatus::MaxCallsExceeded);
            }
            if let Some(max_iterations) = self.config.max_iterations {
                if state.iteration >= max_iterations {
                    return Ok(MinimizerStatus::MaxIterationsExceeded);
                }
            }

            let mut direction = -state.inv_hessian.dot(&state.gradient.grad);
            let mut gdel = state.gradient.grad.dot(&direction);
            if !(gdel < 0.0) {
                log::warn!("MIGRAD: not a descent direction (gdel = {:.3e}), resetting", gdel);
                state.set_inv_hessian(MinimizerState::diagonal_inverse(&state.gradient, eps2));
                direction = -state.inv_hessian.dot(&state.gradient.grad);
                gdel = state.gradient.grad.dot(&direction);
                if !(gdel < 0.0) {
                    return Ok(MinimizerStatus::Aborted);
                }
            }

            let step = match line_search(
                fcn,
                &state.x,
                &direction,
                state.fval,
                gdel,
                &self.config.line_search,
            ) {
                Ok(step) => step,
                Err(MinuitError::LineSearchFailed { trials }) => {
                    if reset {
                        log::warn!("MIGRAD: line search failed again after {} trials, aborting", trials);
                        return Ok(MinimizerStatus::Aborted);
                    }
                    log::warn!(
                        "MIGRAD: line search failed after {} trials, resetting to steepest descent",
                        trials
                    );
                    reset = true;
                    state.set_inv_hessian(MinimizerState::diagonal_inverse(&state.gradient, eps2));
                    *hesse_quality = None;
                    continue;
                }
                Err(err) => return Err(err),
            };
            reset = false;

            let x_new = &state.x + &(&direction * step.alpha);
            let gradient = match compute_gradient(fcn, &x_new, step.fval, &state.gradient, strategy) {
                Ok(gradient) => gradient,
                Err(MinuitError::EvaluationError(msg)) => {
                    log::warn!("MIGRAD: gradient evaluation failed, aborting: {}", msg);
                    return Ok(MinimizerStatus::Aborted);
                }
                Err(err) => return Err(err),
            };

            let s = &x_new - &state.x;
            let y = &gradient.grad - &state.gradient.grad;
            let pinned = fcn.parameters().at_limit(&x_new.to_vec());
            if let Some(delta) = bfgs_update(&mut state.inv_hessian, &s, &y, &pinned) {
                let norm: f64 = state.inv_hessian.iter().map(|v| v.abs()).sum();
                if norm > 0.0 {
                    state.dcovar = 0.5 * (state.dcovar + delta / norm);
                }
            }

            state.x = x_new;
            state.fval = step.fval;
            state.gradient = gradient;
            state.iteration += 1;
            state.update_edm();
            *hesse_quality = None;

            log::debug!(
                "MIGRAD iteration {}: fval = {:.6e}, edm = {:.3e}, alpha = {:.3e}, nfcn = {}",
                state.iteration,
                state.fval,
                state.edm,
                step.alpha,
                fcn.nfcn() - start
            );
        }
    }

    fn hesse(&self, fcn: &FunctionAdapter, start: usize) -> Hesse {
        let used = fcn.nfcn() - start;
        let remaining = self.config.call_limit(fcn.n_free()).saturating_sub(used).max(1);
        Hesse::with_config(HesseConfig {
            strategy: self.config.strategy,
            max_calls: Some(remaining),
        })
    }
}

fn needs_refinement(strategy: Strategy, dcovar: f64) -> bool {
    match strategy {
        Strategy::Fast => false,
        Strategy::Default => dcovar > 0.05,
        Strategy::Thorough => true,
    }
}

/// Start point, function value, gradient and diagonal inverse Hessian.
///
/// An evaluation failure here is fatal.
pub(crate) fn initial_state(fcn: &FunctionAdapter, strategy: Strategy) -> Result<MinimizerState> {
    let mut x = fcn.parameters().internal_values()?;
    move_off_limits(fcn, &mut x)?;
    let fval = fcn.eval_internal(&x)?;
    let seed = initial_gradient(fcn, &x)?;
    let gradient = compute_gradient(fcn, &x, fval, &seed, strategy)?;
    if !gradient.is_finite() {
        return Err(MinuitError::EvaluationError(
            "gradient at the start point is not finite".to_string(),
        ));
    }
    let inv_hessian = MinimizerState::diagonal_inverse(&gradient, MachinePrecision::default().eps2);
    Ok(MinimizerState::new(x, fval, gradient, inv_hessian, 1.0))
}

/// Smallest internal displacement used to leave a saturated bound.
const MIN_LIMIT_OFFSET: f64 = 0.1;

/// Move free parameters that start on a bound off the saturated point of
/// their transform, where the gradient vanishes.
///
/// Each one is shifted by its internal step, at least `MIN_LIMIT_OFFSET`, in
/// whichever direction restores the larger dext/dint.
fn move_off_limits(fcn: &FunctionAdapter, x: &mut Array1<f64>) -> Result<()> {
    let params = fcn.parameters();
    let at_limit = params.at_limit(&x.to_vec());
    if !at_limit.iter().any(|&pinned| pinned) {
        return Ok(());
    }

    let steps = params.internal_steps()?;
    let names = params.free_names();
    for i in (0..x.len()).filter(|&i| at_limit[i]) {
        let shift = steps[i].max(MIN_LIMIT_OFFSET);
        let mut trial = x.to_vec();
        trial[i] = x[i] + shift;
        let up = params.dext_dint(&trial)[i].abs();
        trial[i] = x[i] - shift;
        let down = params.dext_dint(&trial)[i].abs();

        x[i] += if up >= down { shift } else { -shift };
        log::debug!(
            "MIGRAD: {} starts on a limit, internal value moved to {:.4e}",
            names[i],
            x[i]
        );
    }
    Ok(())
}

fn compute_gradient(
    fcn: &FunctionAdapter,
    x: &Array1<f64>,
    fval: f64,
    previous: &FunctionGradient,
    strategy: Strategy,
) -> Result<FunctionGradient> {
    if fcn.has_gradient() {
        analytic_gradient(fcn, x, previous)
    } else {
        numerical_gradient(fcn, x, fval, previous, &strategy.gradient_settings())
    }
}

/// BFGS update of the inverse Hessian restricted to the non-pinned indices.
///
/// Returns the summed absolute change, or `None` when the update was skipped
/// because `s.y <= 0` or every parameter is pinned.
pub(crate) fn bfgs_update(
    inv_hessian: &mut Array2<f64>,
    s: &Array1<f64>,
    y: &Array1<f64>,
    pinned: &[bool],
) -> Option<f64> {
    let active: Vec<usize> = (0..s.len()).filter(|&i| !pinned.get(i).copied().unwrap_or(false)).collect();
    if active.is_empty() {
        return None;
    }

    let s_a: Array1<f64> = active.iter().map(|&i| s[i]).collect();
    let y_a: Array1<f64> = active.iter().map(|&i| y[i]).collect();
    let v_a = Array2::from_shape_fn((active.len(), active.len()), |(a, b)| {
        inv_hessian[[active[a], active[b]]]
    });

    let sy = s_a.dot(&y_a);
    if !(sy > 0.0) {
        log::debug!("BFGS update skipped: s.y = {:.3e}", sy);
        return None;
    }

    let vy = v_a.dot(&y_a);
    let yvy = y_a.dot(&vy);
    let factor = (sy + yvy) / (sy * sy);

    let mut delta = 0.0;
    for (a, &i) in active.iter().enumerate() {
        for (b, &j) in active.iter().enumerate() {
            let change = factor * s_a[a] * s_a[b] - (vy[a] * s_a[b] + s_a[a] * vy[b]) / sy;
            inv_hessian[[i, j]] += change;
            delta += change.abs();
        }
    }

    Some(delta)
}
