//! Finite difference methods for numerical differentiation.
//!
//! The gradient used by MIGRAD is a two-point central difference whose step
//! is adapted per parameter from the current second-derivative estimate. Each
//! call refines the step from the previous gradient, so the gradient object
//! carries the step sizes and second derivatives along with the derivatives.

use crate::error::Result;
use crate::function::FunctionAdapter;
use ndarray::Array1;

/// Machine precision constants used by the step-size heuristics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachinePrecision {
    /// Relative precision of a function value
    pub eps: f64,
    /// 2 * sqrt(eps), the relative precision of a finite difference
    pub eps2: f64,
}

impl Default for MachinePrecision {
    fn default() -> Self {
        Self::new(4.0 * f64::EPSILON)
    }
}

impl MachinePrecision {
    pub fn new(eps: f64) -> Self {
        Self {
            eps,
            eps2: 2.0 * eps.sqrt(),
        }
    }

    /// Smallest step that can still be resolved
    pub fn very_small(&self) -> f64 {
        8.0 * self.eps * self.eps
    }
}

/// Cycle count and tolerances for the gradient step refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientSettings {
    pub ncycles: usize,
    pub step_tolerance: f64,
    pub grad_tolerance: f64,
}

/// Gradient in internal coordinates with its step sizes and curvature.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionGradient {
    /// First derivatives
    pub grad: Array1<f64>,
    /// Second derivative estimates along each coordinate
    pub g2: Array1<f64>,
    /// Step sizes used for the finite differences
    pub gstep: Array1<f64>,
    /// Whether `grad` came from the objective's analytic gradient
    pub analytic: bool,
}

impl FunctionGradient {
    pub fn len(&self) -> usize {
        self.grad.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grad.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.grad.iter().all(|g| g.is_finite())
    }
}

/// Gradient seed from the parameter step sizes alone.
///
/// No function calls are made. The curvature is set so that a step of one
/// internal error changes the function by `2 * up`.
pub fn initial_gradient(fcn: &FunctionAdapter, x: &Array1<f64>) -> Result<FunctionGradient> {
    let prec = MachinePrecision::default();
    let dirin = fcn.parameters().internal_steps()?;
    let limited = fcn.parameters().free_has_limits();
    let up = fcn.errordef();

    let n = x.len();
    let mut grad = Array1::zeros(n);
    let mut g2 = Array1::zeros(n);
    let mut gstep = Array1::zeros(n);

    for i in 0..n {
        let gsmin = 8.0 * prec.eps2 * (x[i].abs() + prec.eps2);
        let d = dirin[i].max(gsmin);
        g2[i] = 2.0 * up / (d * d);
        gstep[i] = gsmin.max(0.1 * d);
        if limited[i] {
            gstep[i] = gstep[i].min(0.5);
        }
        grad[i] = g2[i] * d;
    }

    Ok(FunctionGradient {
        grad,
        g2,
        gstep,
        analytic: false,
    })
}

/// Central-difference gradient refined from a previous estimate.
///
/// `fval` must be the function value at `x`.
pub fn numerical_gradient(
    fcn: &FunctionAdapter,
    x: &Array1<f64>,
    fval: f64,
    previous: &FunctionGradient,
    settings: &GradientSettings,
) -> Result<FunctionGradient> {
    let prec = MachinePrecision::default();
    let limited = fcn.parameters().free_has_limits();
    let dfmin = 8.0 * prec.eps2 * (fval.abs() + fcn.errordef());
    let vrysml = prec.very_small();

    let mut grad = previous.grad.clone();
    let mut g2 = previous.g2.clone();
    let mut gstep = previous.gstep.clone();
    let mut point = x.clone();

    for i in 0..x.len() {
        let xtf = x[i];
        let epspri = prec.eps2 + (grad[i] * prec.eps2).abs();
        let mut stepb4 = 0.0;

        for _ in 0..settings.ncycles {
            let optstp = (dfmin / (g2[i].abs() + epspri)).sqrt();
            let mut step = optstp.max((0.1 * gstep[i]).abs());
            if limited[i] && step > 0.5 {
                step = 0.5;
            }
            let stpmax = 10.0 * gstep[i].abs();
            if step > stpmax {
                step = stpmax;
            }
            let stpmin = vrysml.max(8.0 * (prec.eps2 * xtf).abs());
            if step < stpmin {
                step = stpmin;
            }
            if ((step - stepb4) / step).abs() < settings.step_tolerance {
                break;
            }
            gstep[i] = step;
            stepb4 = step;

            point[i] = xtf + step;
            let fs1 = fcn.eval_internal(&point)?;
            point[i] = xtf - step;
            let fs2 = fcn.eval_internal(&point)?;
            point[i] = xtf;

            let grdb4 = grad[i];
            grad[i] = 0.5 * (fs1 - fs2) / step;
            g2[i] = (fs1 + fs2 - 2.0 * fval) / step / step;

            if (grdb4 - grad[i]).abs() / (grad[i].abs() + dfmin / step) < settings.grad_tolerance {
                break;
            }
        }
    }

    Ok(FunctionGradient {
        grad,
        g2,
        gstep,
        analytic: false,
    })
}

/// Analytic gradient in internal coordinates.
///
/// Curvature and step sizes are carried over from `previous`, which is
/// used to seed the variable metric and by HESSE.
pub fn analytic_gradient(
    fcn: &FunctionAdapter,
    x: &Array1<f64>,
    previous: &FunctionGradient,
) -> Result<FunctionGradient> {
    let grad = fcn.analytic_gradient(x)?;
    Ok(FunctionGradient {
        grad,
        g2: previous.g2.clone(),
        gstep: previous.gstep.clone(),
        analytic: true,
    })
}
