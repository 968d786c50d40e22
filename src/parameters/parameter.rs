//! Parameter definition and implementation
//!
//! This module provides the Parameter struct, the fundamental building block
//! of the parameter system. A parameter has a value, a step size (its initial
//! error estimate), optional bounds and a fixed flag.

use crate::parameters::bounds::{Bounds, BoundsError, BoundsTransform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Bounds error: {0}")]
    BoundsError(#[from] BoundsError),

    #[error("Step size for parameter '{name}' must be positive and finite, got {step}")]
    InvalidStep { name: String, step: f64 },

    #[error("Value for parameter '{name}' must be finite, got {value}")]
    InvalidValue { name: String, value: f64 },

    #[error("Parameter '{name}' not found")]
    ParameterNotFound { name: String },

    #[error("Parameter '{name}' is already defined")]
    DuplicateName { name: String },

    #[error("Expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Step size used when none is given: one percent of the value, or 0.1 at zero.
pub fn default_step(value: f64) -> f64 {
    let step = 0.01 * value.abs();
    if step > 0.0 {
        step
    } else {
        0.1
    }
}

/// A parameter of a minimization problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    /// Name of the parameter
    name: String,

    /// Current value of the parameter
    value: f64,

    /// Initial value when created (for reset operations)
    init_value: f64,

    /// Current error estimate; before a fit this is the initial step size
    error: f64,

    /// Initial step size (for reset operations)
    init_error: f64,

    /// Whether this parameter is held constant during minimization
    fixed: bool,

    /// Minimum and maximum bounds for the parameter value
    bounds: Bounds,
}

impl Parameter {
    /// Create a new free, unbounded parameter with the default step size
    ///
    /// # Examples
    ///
    /// ```
    /// use minuit_rs::parameters::parameter::Parameter;
    ///
    /// let param = Parameter::new("amplitude", 10.0);
    /// assert_eq!(param.name(), "amplitude");
    /// assert_eq!(param.value(), 10.0);
    /// assert_eq!(param.error(), 0.1);
    /// assert!(!param.is_fixed());
    /// ```
    pub fn new(name: &str, value: f64) -> Self {
        let error = default_step(value);
        Self {
            name: name.to_string(),
            value,
            init_value: value,
            error,
            init_error: error,
            fixed: false,
            bounds: Bounds::default(),
        }
    }

    /// Create a new parameter with an explicit step size
    pub fn with_step(name: &str, value: f64, step: f64) -> Result<Self, ParameterError> {
        let mut param = Self::new(name, value);
        param.set_error(step)?;
        param.init_error = param.error;
        Ok(param)
    }

    /// Create a new parameter with the given bounds; the value is clamped into them
    ///
    /// # Examples
    ///
    /// ```
    /// use minuit_rs::parameters::parameter::Parameter;
    ///
    /// let param = Parameter::with_bounds("amplitude", 25.0, 0.0, 20.0).unwrap();
    /// assert_eq!(param.value(), 20.0);
    /// assert_eq!(param.min(), 0.0);
    /// assert_eq!(param.max(), 20.0);
    /// ```
    pub fn with_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<Self, ParameterError> {
        let bounds = Bounds::new(min, max)?;
        let value = bounds.clamp(value);
        let error = default_step(value);

        Ok(Self {
            name: name.to_string(),
            value,
            init_value: value,
            error,
            init_error: error,
            fixed: false,
            bounds,
        })
    }

    /// Get the current value of the parameter
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the value of the parameter
    ///
    /// Returns an error if the value is not finite or lies outside the bounds.
    pub fn set_value(&mut self, value: f64) -> Result<(), ParameterError> {
        if !value.is_finite() {
            return Err(ParameterError::InvalidValue {
                name: self.name.clone(),
                value,
            });
        }
        if !self.bounds.is_within_bounds(value) {
            return Err(ParameterError::BoundsError(BoundsError::ValueOutsideBounds {
                value,
                min: self.bounds.min,
                max: self.bounds.max,
            }));
        }

        self.value = value;
        Ok(())
    }

    /// Get the initial value of the parameter
    pub fn init_value(&self) -> f64 {
        self.init_value
    }

    /// Reset value and step size to their initial settings
    pub fn reset(&mut self) {
        self.value = self.bounds.clamp(self.init_value);
        self.error = self.init_error;
    }

    /// Get the name of the parameter
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current error estimate (the step size before any fit)
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Set the error estimate / step size; it must be positive and finite
    pub fn set_error(&mut self, error: f64) -> Result<(), ParameterError> {
        if !(error.is_finite() && error > 0.0) {
            return Err(ParameterError::InvalidStep {
                name: self.name.clone(),
                step: error,
            });
        }
        self.error = error;
        Ok(())
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    /// Get the minimum allowed value for the parameter
    pub fn min(&self) -> f64 {
        self.bounds.min
    }

    /// Get the maximum allowed value for the parameter
    pub fn max(&self) -> f64 {
        self.bounds.max
    }

    /// Set the bounds for the parameter; the current value is clamped into them
    pub fn set_bounds(&mut self, min: f64, max: f64) -> Result<(), ParameterError> {
        let bounds = Bounds::new(min, max)?;
        self.bounds = bounds;
        self.value = bounds.clamp(self.value);
        Ok(())
    }

    /// Remove both bounds
    pub fn clear_bounds(&mut self) {
        self.bounds = Bounds::unbounded();
    }

    /// Get the bounds of the parameter
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Whether the parameter has at least one finite bound
    pub fn has_limits(&self) -> bool {
        self.bounds.is_bounded()
    }

    /// Create a bounds transform for this parameter
    pub fn bounds_transform(&self) -> BoundsTransform {
        BoundsTransform::new(self.bounds)
    }

    /// Convert the parameter value to an internal value for the minimizer
    pub fn to_internal(&self) -> Result<f64, ParameterError> {
        self.bounds_transform()
            .to_internal(self.value)
            .map_err(ParameterError::from)
    }

    /// Convert an internal value from the minimizer to an external value
    pub fn from_internal(&self, internal_value: f64) -> f64 {
        self.bounds_transform().to_external(internal_value)
    }

    /// Step size expressed in internal coordinates at the current value
    pub fn internal_step(&self) -> Result<f64, ParameterError> {
        self.bounds_transform()
            .internal_error(self.value, self.error)
            .map_err(ParameterError::from)
    }
}
