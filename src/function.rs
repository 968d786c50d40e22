//! Objective definition trait and the function adapter.
//!
//! This module defines the `Objective` trait, a scalar function of an ordered
//! slice of external parameter values, and the `FunctionAdapter` that the
//! minimizer talks to: it maps internal coordinates to external values,
//! counts calls and turns failed or non-finite evaluations into errors.

use ndarray::Array1;
use std::cell::Cell;

use crate::error::{MinuitError, Result};
use crate::parameters::Parameters;

/// errordef for chi-square / least-squares objectives
pub const LEAST_SQUARES: f64 = 1.0;

/// errordef for negative log-likelihood objectives
pub const LIKELIHOOD: f64 = 0.5;

/// A scalar objective to be minimized.
///
/// Closures `Fn(&[f64]) -> f64` implement this trait directly; use
/// [`Fallible`] for closures that can fail and [`WithGradient`] to supply an
/// analytic gradient.
pub trait Objective {
    /// Evaluate the objective at the given external parameter values.
    ///
    /// The values are in declaration order of the parameters.
    fn eval(&self, params: &[f64]) -> Result<f64>;

    /// Evaluate the analytic gradient with respect to the external values.
    ///
    /// Only called when [`has_gradient`](Objective::has_gradient) returns true.
    fn gradient(&self, _params: &[f64]) -> Result<Vec<f64>> {
        Err(MinuitError::InvalidState(
            "objective does not provide an analytic gradient".to_string(),
        ))
    }

    /// Check if this objective provides an analytic gradient.
    fn has_gradient(&self) -> bool {
        false
    }

    /// Increase of the objective that corresponds to one standard deviation.
    ///
    /// 1.0 for chi-square objectives, 0.5 for negative log-likelihoods.
    fn errordef(&self) -> f64 {
        LEAST_SQUARES
    }
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> f64,
{
    fn eval(&self, params: &[f64]) -> Result<f64> {
        Ok(self(params))
    }
}

/// Wraps a closure that can fail.
pub struct Fallible<F>(pub F);

impl<F> Objective for Fallible<F>
where
    F: Fn(&[f64]) -> Result<f64>,
{
    fn eval(&self, params: &[f64]) -> Result<f64> {
        (self.0)(params)
    }
}

/// An objective with an analytic gradient.
pub struct WithGradient<F, G> {
    function: F,
    gradient: G,
    errordef: f64,
}

impl<F, G> WithGradient<F, G>
where
    F: Fn(&[f64]) -> f64,
    G: Fn(&[f64]) -> Vec<f64>,
{
    pub fn new(function: F, gradient: G) -> Self {
        Self {
            function,
            gradient,
            errordef: LEAST_SQUARES,
        }
    }

    pub fn with_errordef(mut self, errordef: f64) -> Self {
        self.errordef = errordef;
        self
    }
}

impl<F, G> Objective for WithGradient<F, G>
where
    F: Fn(&[f64]) -> f64,
    G: Fn(&[f64]) -> Vec<f64>,
{
    fn eval(&self, params: &[f64]) -> Result<f64> {
        Ok((self.function)(params))
    }

    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        Ok((self.gradient)(params))
    }

    fn has_gradient(&self) -> bool {
        true
    }

    fn errordef(&self) -> f64 {
        self.errordef
    }
}

/// Bridges the minimizer's internal coordinates and the user objective.
///
/// The adapter owns a snapshot of the parameters (bounds, fixed values) and a
/// call counter that starts at zero for every adapter, so each minimization
/// run counts its own calls.
pub struct FunctionAdapter<'a> {
    objective: &'a dyn Objective,
    params: Parameters,
    errordef: f64,
    recovery: Option<f64>,
    nfcn: Cell<usize>,
    ngrad: Cell<usize>,
}

impl<'a> FunctionAdapter<'a> {
    /// Create an adapter using the objective's own errordef.
    pub fn new(objective: &'a dyn Objective, params: Parameters) -> Self {
        let errordef = objective.errordef();
        Self {
            objective,
            params,
            errordef,
            recovery: None,
            nfcn: Cell::new(0),
            ngrad: Cell::new(0),
        }
    }

    /// Override the errordef of the objective.
    pub fn with_errordef(mut self, errordef: f64) -> Self {
        self.errordef = errordef;
        self
    }

    /// Value returned in place of failed or non-finite evaluations.
    pub fn with_recovery(mut self, recovery: Option<f64>) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn errordef(&self) -> f64 {
        self.errordef
    }

    pub fn recovery(&self) -> Option<f64> {
        self.recovery
    }

    pub fn objective(&self) -> &'a dyn Objective {
        self.objective
    }

    /// Number of function evaluations made through this adapter.
    pub fn nfcn(&self) -> usize {
        self.nfcn.get()
    }

    /// Number of analytic gradient evaluations made through this adapter.
    pub fn ngrad(&self) -> usize {
        self.ngrad.get()
    }

    pub fn n_free(&self) -> usize {
        self.params.n_free()
    }

    pub fn has_gradient(&self) -> bool {
        self.objective.has_gradient()
    }

    /// Evaluate at a full vector of external values.
    pub fn eval_external(&self, external: &[f64]) -> Result<f64> {
        if external.len() != self.params.len() {
            return Err(MinuitError::DimensionMismatch(format!(
                "Expected {} parameter values, got {}",
                self.params.len(),
                external.len()
            )));
        }

        self.nfcn.set(self.nfcn.get() + 1);
        match self.objective.eval(external) {
            Ok(value) if value.is_finite() => Ok(value),
            Ok(value) => self.recover(format!("objective returned {} at {:?}", value, external)),
            Err(err) => self.recover(format!("objective failed at {:?}: {}", external, err)),
        }
    }

    /// Evaluate at internal coordinates of the free parameters.
    pub fn eval_internal(&self, internal: &Array1<f64>) -> Result<f64> {
        let external = self.to_external(internal)?;
        self.eval_external(&external)
    }

    /// Full external vector for internal coordinates.
    pub fn to_external(&self, internal: &Array1<f64>) -> Result<Vec<f64>> {
        let internal = internal.to_vec();
        Ok(self.params.external_from_internal(&internal)?)
    }

    /// Analytic gradient with respect to the internal coordinates.
    pub fn analytic_gradient(&self, internal: &Array1<f64>) -> Result<Array1<f64>> {
        let external = self.to_external(internal)?;
        self.ngrad.set(self.ngrad.get() + 1);
        let full = self.objective.gradient(&external)?;
        if full.len() != self.params.len() {
            return Err(MinuitError::DimensionMismatch(format!(
                "Expected gradient of length {}, got {}",
                self.params.len(),
                full.len()
            )));
        }

        let chain = self.params.dext_dint(&internal.to_vec());
        let grad: Array1<f64> = self
            .params
            .free_indices()
            .into_iter()
            .zip(chain.iter())
            .map(|(i, &d)| full[i] * d)
            .collect();

        if grad.iter().all(|g| g.is_finite()) {
            Ok(grad)
        } else {
            Err(MinuitError::EvaluationError(format!(
                "analytic gradient is not finite at {:?}",
                external
            )))
        }
    }

    fn recover(&self, message: String) -> Result<f64> {
        match self.recovery {
            Some(value) => {
                log::debug!("{}; using recovery value {}", message, value);
                Ok(value)
            }
            None => Err(MinuitError::EvaluationError(message)),
        }
    }
}
