//! Parameter bounds implementation
//!
//! This module provides the bounds attached to a parameter and the MINUIT
//! transformation that maps a bounded external value onto an unbounded
//! internal coordinate seen by the minimizer.

use serde::{Deserialize, Serialize};
use std::f64::{INFINITY, NEG_INFINITY};
use thiserror::Error;

/// Below this |dext/dint| (relative to the half range) a parameter is pinned at its bound.
const PINNED_DERIVATIVE: f64 = 1e-4;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must be less than max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Parameter value {value} is outside bounds: [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Infinite parameter value is not allowed")]
    InfiniteValue,
}

/// Represents the bounds constraints on a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Bounds", 2)?;

        // JSON has no infinity, an open side is written as null
        if self.min.is_infinite() && self.min.is_sign_negative() {
            state.serialize_field("min", &serde_json::Value::Null)?;
        } else {
            state.serialize_field("min", &self.min)?;
        }

        if self.max.is_infinite() && self.max.is_sign_positive() {
            state.serialize_field("max", &serde_json::Value::Null)?;
        } else {
            state.serialize_field("max", &self.max)?;
        }

        state.end()
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct BoundsHelper {
            #[serde(default)]
            min: Option<f64>,

            #[serde(default)]
            max: Option<f64>,
        }

        let helper = BoundsHelper::deserialize(deserializer)?;

        let min = helper.min.unwrap_or(NEG_INFINITY);
        let max = helper.max.unwrap_or(INFINITY);

        Bounds::new(min, max).map_err(serde::de::Error::custom)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create a new bounds constraint with min and max values
    ///
    /// # Examples
    ///
    /// ```
    /// use minuit_rs::parameters::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert_eq!(bounds.max, 10.0);
    /// assert!(Bounds::new(1.0, 1.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() || min >= max {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Create an unbounded constraint (negative infinity to positive infinity)
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create a bounds constraint with only a minimum value
    pub fn min_only(min: f64) -> Self {
        Self { min, max: INFINITY }
    }

    /// Create a bounds constraint with only a maximum value
    pub fn max_only(max: f64) -> Self {
        Self {
            min: NEG_INFINITY,
            max,
        }
    }

    /// Check if a value is within the bounds
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Check if both min and max are finite
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Check if the parameter is bounded on at least one side
    pub fn is_bounded(&self) -> bool {
        self.has_lower_bound() || self.has_upper_bound()
    }

    /// Check if the parameter is bounded from below
    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    /// Check if the parameter is bounded from above
    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Implements the MINUIT parameter transformations for handling bounds constraints
///
/// The minimizer works with unbounded internal values while the objective sees
/// external values that never leave the bounds:
///
/// - two-sided `[a, b]`: `ext = a + (b - a) / 2 * (sin(int) + 1)`
/// - lower only: `ext = a - 1 + sqrt(int^2 + 1)`
/// - upper only: `ext = b + 1 - sqrt(int^2 + 1)`
///
/// `to_internal` returns the principal branch: `[-pi/2, pi/2]` for two-sided
/// bounds and `[0, inf)` for one-sided bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsTransform {
    bounds: Bounds,
}

impl BoundsTransform {
    /// Create a new bounds transform
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }

    /// The bounds this transform maps into
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Transform an internal parameter value to an external value
    ///
    /// The result is clamped: round-off near a limit never leaves the bounds.
    pub fn to_external(&self, internal_value: f64) -> f64 {
        let b = &self.bounds;
        match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => internal_value,
            (true, false) => b.clamp(b.min - 1.0 + (internal_value * internal_value + 1.0).sqrt()),
            (false, true) => b.clamp(b.max + 1.0 - (internal_value * internal_value + 1.0).sqrt()),
            (true, true) => b.clamp(b.min + (internal_value.sin() + 1.0) * (b.max - b.min) / 2.0),
        }
    }

    /// Transform an external parameter value to an internal value
    ///
    /// Returns an error if the external value is not finite or outside the bounds.
    pub fn to_internal(&self, external_value: f64) -> Result<f64, BoundsError> {
        if !external_value.is_finite() {
            return Err(BoundsError::InfiniteValue);
        }

        let b = &self.bounds;
        if !b.is_within_bounds(external_value) {
            return Err(BoundsError::ValueOutsideBounds {
                value: external_value,
                min: b.min,
                max: b.max,
            });
        }

        let internal = match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => external_value,
            (true, false) => ((external_value - b.min + 1.0).powi(2) - 1.0).max(0.0).sqrt(),
            (false, true) => ((b.max - external_value + 1.0).powi(2) - 1.0).max(0.0).sqrt(),
            (true, true) => {
                let scaled = 2.0 * (external_value - b.min) / (b.max - b.min) - 1.0;
                scaled.clamp(-1.0, 1.0).asin()
            }
        };

        Ok(internal)
    }

    /// Derivative of the external value with respect to the internal value
    pub fn dext_dint(&self, internal_value: f64) -> f64 {
        let b = &self.bounds;
        match (b.has_lower_bound(), b.has_upper_bound()) {
            (false, false) => 1.0,
            (true, false) => internal_value / (internal_value * internal_value + 1.0).sqrt(),
            (false, true) => -internal_value / (internal_value * internal_value + 1.0).sqrt(),
            (true, true) => 0.5 * (b.max - b.min) * internal_value.cos(),
        }
    }

    /// Whether the transform is saturated at this internal value
    ///
    /// A saturated parameter sits on one of its bounds and the objective no
    /// longer responds to changes of the internal coordinate to first order.
    pub fn is_at_limit(&self, internal_value: f64) -> bool {
        let b = &self.bounds;
        if !b.is_bounded() {
            return false;
        }
        let scale = if b.is_finite() {
            0.5 * (b.max - b.min)
        } else {
            1.0
        };
        self.dext_dint(internal_value).abs() < PINNED_DERIVATIVE * scale
    }

    /// Convert an internal error into a (symmetrized) external error
    pub fn external_error(&self, internal_value: f64, internal_error: f64) -> f64 {
        let b = &self.bounds;
        if !b.is_bounded() {
            return internal_error;
        }

        let ui = self.to_external(internal_value);
        let mut du1 = self.to_external(internal_value + internal_error) - ui;
        let du2 = self.to_external(internal_value - internal_error) - ui;
        if b.is_finite() && internal_error > 1.0 {
            du1 = b.max - b.min;
        }

        0.5 * (du1.abs() + du2.abs())
    }

    /// Convert an external error at an external value into an internal step
    ///
    /// The step is measured by moving the external value by `external_error`
    /// in both directions (stopping at the bounds) and averaging the internal
    /// displacement.
    pub fn internal_error(&self, external_value: f64, external_error: f64) -> Result<f64, BoundsError> {
        let b = &self.bounds;
        if !b.is_bounded() {
            return Ok(external_error);
        }

        let var = self.to_internal(external_value)?;
        let up = b.clamp(external_value + external_error);
        let down = b.clamp(external_value - external_error);
        let vplu = self.to_internal(up)? - var;
        let vmin = self.to_internal(down)? - var;

        Ok(0.5 * (vplu.abs() + vmin.abs()))
    }
}
