//! State of the variable-metric loop.

use ndarray::{Array1, Array2};

use super::convergence::estimated_distance;
use crate::utils::finite_difference::FunctionGradient;

/// Point, function value, gradient and inverse Hessian approximation,
/// all in internal coordinates of the free parameters.
#[derive(Debug, Clone)]
pub struct MinimizerState {
    /// Internal coordinates
    pub x: Array1<f64>,
    /// Function value at `x`
    pub fval: f64,
    /// Gradient at `x`
    pub gradient: FunctionGradient,
    /// Approximate inverse Hessian of the objective
    pub inv_hessian: Array2<f64>,
    /// Estimated distance to minimum
    pub edm: f64,
    /// Relative change of the last inverse Hessian update
    pub dcovar: f64,
    /// Completed iterations
    pub iteration: usize,
}

impl MinimizerState {
    /// New state with edm computed from the gradient and inverse Hessian.
    pub fn new(
        x: Array1<f64>,
        fval: f64,
        gradient: FunctionGradient,
        inv_hessian: Array2<f64>,
        dcovar: f64,
    ) -> Self {
        let edm = estimated_distance(&gradient.grad, &inv_hessian);
        Self {
            x,
            fval,
            gradient,
            inv_hessian,
            edm,
            dcovar,
            iteration: 0,
        }
    }

    pub fn n(&self) -> usize {
        self.x.len()
    }

    /// Replace the inverse Hessian and recompute edm.
    pub fn set_inv_hessian(&mut self, inv_hessian: Array2<f64>) {
        self.inv_hessian = inv_hessian;
        self.update_edm();
    }

    pub fn update_edm(&mut self) {
        self.edm = estimated_distance(&self.gradient.grad, &self.inv_hessian);
    }

    /// Diagonal inverse Hessian from the gradient curvature estimates.
    ///
    /// Non-positive or negligible curvatures fall back to 1.
    pub fn diagonal_inverse(gradient: &FunctionGradient, eps2: f64) -> Array2<f64> {
        let diag: Array1<f64> = gradient
            .g2
            .iter()
            .map(|&g2| if g2 > eps2 { 1.0 / g2 } else { 1.0 })
            .collect();
        Array2::from_diag(&diag)
    }
}
