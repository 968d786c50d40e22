//! Cost functions built from a model and data.

use ndarray::Array1;

use crate::error::{MinuitError, Result};
use crate::function::{Objective, LEAST_SQUARES};

/// Chi-square of a model against data with Gaussian uncertainties.
///
/// The model is called as `model(x, params)` for every data point.
///
/// # Examples
///
/// ```
/// use minuit_rs::cost::LeastSquares;
/// use minuit_rs::Minuit;
/// use ndarray::array;
///
/// let x = array![0.0, 1.0, 2.0, 3.0];
/// let y = array![1.0, 3.1, 4.9, 7.0];
/// let yerr = array![0.1, 0.1, 0.1, 0.1];
/// let line = |x: f64, p: &[f64]| p[0] + p[1] * x;
///
/// let cost = LeastSquares::new(x, y, yerr, line).unwrap();
/// let mut m = Minuit::new(cost, &["a", "b"], &[0.0, 1.0]).unwrap();
/// m.migrad(None, 1).unwrap();
/// assert!((m.values()["b"] - 2.0).abs() < 0.1);
/// ```
pub struct LeastSquares<M> {
    x: Array1<f64>,
    y: Array1<f64>,
    yerr: Array1<f64>,
    model: M,
}

impl<M> LeastSquares<M>
where
    M: Fn(f64, &[f64]) -> f64,
{
    /// Create the cost; all arrays must have the same length and `yerr` must
    /// be positive.
    pub fn new(x: Array1<f64>, y: Array1<f64>, yerr: Array1<f64>, model: M) -> Result<Self> {
        if x.len() != y.len() || x.len() != yerr.len() {
            return Err(MinuitError::DimensionMismatch(format!(
                "x, y and yerr have lengths {}, {} and {}",
                x.len(),
                y.len(),
                yerr.len()
            )));
        }
        if let Some(bad) = yerr.iter().find(|&&e| !(e.is_finite() && e > 0.0)) {
            return Err(MinuitError::InvalidConfig(format!(
                "uncertainties must be positive, got {}",
                bad
            )));
        }
        Ok(Self { x, y, yerr, model })
    }

    /// Create the cost with unit uncertainties.
    pub fn unweighted(x: Array1<f64>, y: Array1<f64>, model: M) -> Result<Self> {
        let yerr = Array1::ones(x.len());
        Self::new(x, y, yerr, model)
    }

    /// Number of data points
    pub fn ndata(&self) -> usize {
        self.x.len()
    }

    /// Pulls `(y - model) / yerr` at the given parameters
    pub fn pulls(&self, params: &[f64]) -> Array1<f64> {
        Array1::from_iter(
            self.x
                .iter()
                .zip(self.y.iter())
                .zip(self.yerr.iter())
                .map(|((&x, &y), &e)| (y - (self.model)(x, params)) / e),
        )
    }
}

impl<M> Objective for LeastSquares<M>
where
    M: Fn(f64, &[f64]) -> f64,
{
    fn eval(&self, params: &[f64]) -> Result<f64> {
        Ok(self.pulls(params).mapv(|r| r * r).sum())
    }

    fn errordef(&self) -> f64 {
        LEAST_SQUARES
    }
}
