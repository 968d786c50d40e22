//! Parameters collection implementation
//!
//! This module provides the Parameters struct, an ordered collection of
//! Parameter objects. The order is the call order of the objective, and it is
//! the iteration order of every name-keyed view derived from the collection.

use crate::parameters::parameter::{Parameter, ParameterError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::ops::Index;
use std::path::Path;

/// An ordered collection of parameters
///
/// Free parameters form the internal coordinate vector seen by the minimizer,
/// in declaration order; fixed parameters are left out of it and re-inserted
/// at their current value whenever external values are assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<Parameter>", into = "Vec<Parameter>")]
pub struct Parameters {
    /// Parameters in declaration order
    params: Vec<Parameter>,

    /// Map of parameter names to their position in `params`
    index: HashMap<String, usize>,
}

impl Parameters {
    /// Create a new empty parameters collection
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create a collection from names and starting values
    ///
    /// # Examples
    ///
    /// ```
    /// use minuit_rs::parameters::Parameters;
    ///
    /// let params = Parameters::from_names(&["x", "y"], &[1.0, 2.0]).unwrap();
    /// assert_eq!(params.names(), vec!["x", "y"]);
    /// assert_eq!(params.values()["y"], 2.0);
    /// ```
    pub fn from_names(names: &[&str], values: &[f64]) -> Result<Self, ParameterError> {
        if names.len() != values.len() {
            return Err(ParameterError::LengthMismatch {
                expected: names.len(),
                actual: values.len(),
            });
        }

        let mut params = Self::new();
        for (name, &value) in names.iter().zip(values.iter()) {
            params.add_param(name, value)?;
        }
        Ok(params)
    }

    /// Add a parameter to the end of the collection
    ///
    /// Returns an error if a parameter with the same name already exists.
    pub fn add(&mut self, param: Parameter) -> Result<(), ParameterError> {
        if self.index.contains_key(param.name()) {
            return Err(ParameterError::DuplicateName {
                name: param.name().to_string(),
            });
        }
        if !param.value().is_finite() {
            return Err(ParameterError::InvalidValue {
                name: param.name().to_string(),
                value: param.value(),
            });
        }

        self.index.insert(param.name().to_string(), self.params.len());
        self.params.push(param);
        Ok(())
    }

    /// Add a new free, unbounded parameter
    pub fn add_param(&mut self, name: &str, value: f64) -> Result<(), ParameterError> {
        self.add(Parameter::new(name, value))
    }

    /// Add a new parameter with an explicit step size
    pub fn add_param_with_step(&mut self, name: &str, value: f64, step: f64) -> Result<(), ParameterError> {
        self.add(Parameter::with_step(name, value, step)?)
    }

    /// Add a new parameter with bounds
    pub fn add_param_with_bounds(
        &mut self,
        name: &str,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<(), ParameterError> {
        self.add(Parameter::with_bounds(name, value, min, max)?)
    }

    /// Get a parameter by name
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    /// Get a mutable reference to a parameter by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.params[i]),
            None => None,
        }
    }

    /// Get a parameter by name, or a `ParameterNotFound` error
    pub fn require(&self, name: &str) -> Result<&Parameter, ParameterError> {
        self.get(name).ok_or_else(|| ParameterError::ParameterNotFound {
            name: name.to_string(),
        })
    }

    /// Get a mutable parameter by name, or a `ParameterNotFound` error
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Parameter, ParameterError> {
        self.get_mut(name).ok_or_else(|| ParameterError::ParameterNotFound {
            name: name.to_string(),
        })
    }

    /// Position of a parameter in declaration order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Check if a parameter with the given name exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Names in declaration order
    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name().to_string()).collect()
    }

    /// Iterate over parameters in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Current values keyed by name
    pub fn values(&self) -> NamedValues {
        NamedValues::new(
            self.names(),
            self.params.iter().map(|p| p.value()).collect(),
        )
    }

    /// Current errors keyed by name
    pub fn errors(&self) -> NamedValues {
        NamedValues::new(
            self.names(),
            self.params.iter().map(|p| p.error()).collect(),
        )
    }

    /// External values of all parameters in declaration order
    pub fn external_values(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.value()).collect()
    }

    /// Declaration indices of the free parameters
    pub fn free_indices(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_fixed())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of free parameters (the dimension of the internal vector)
    pub fn n_free(&self) -> usize {
        self.params.iter().filter(|p| !p.is_fixed()).count()
    }

    /// Names of the free parameters in declaration order
    pub fn free_names(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|p| !p.is_fixed())
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Internal coordinates of the free parameters
    ///
    /// # Examples
    ///
    /// ```
    /// use minuit_rs::parameters::Parameters;
    ///
    /// let mut params = Parameters::new();
    /// params.add_param_with_bounds("amplitude", 10.0, 0.0, 20.0).unwrap();
    /// params.add_param("center", 5.0).unwrap();
    /// params.get_mut("center").unwrap().set_fixed(true);
    ///
    /// let internal = params.internal_values().unwrap();
    /// assert_eq!(internal.len(), 1);
    /// assert!(internal[0].abs() < 1e-12);
    /// ```
    pub fn internal_values(&self) -> Result<Array1<f64>, ParameterError> {
        let values = self
            .params
            .iter()
            .filter(|p| !p.is_fixed())
            .map(|p| p.to_internal())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Array1::from_vec(values))
    }

    /// Step sizes of the free parameters in internal coordinates
    pub fn internal_steps(&self) -> Result<Array1<f64>, ParameterError> {
        let steps = self
            .params
            .iter()
            .filter(|p| !p.is_fixed())
            .map(|p| p.internal_step())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Array1::from_vec(steps))
    }

    /// Assemble the full external vector from internal coordinates
    ///
    /// Fixed parameters contribute their current value.
    pub fn external_from_internal(&self, internal: &[f64]) -> Result<Vec<f64>, ParameterError> {
        let n_free = self.n_free();
        if internal.len() != n_free {
            return Err(ParameterError::LengthMismatch {
                expected: n_free,
                actual: internal.len(),
            });
        }

        let mut free = internal.iter();
        let external = self
            .params
            .iter()
            .map(|p| {
                if p.is_fixed() {
                    p.value()
                } else {
                    // length checked above
                    free.next().map(|&v| p.from_internal(v)).unwrap_or_else(|| p.value())
                }
            })
            .collect();
        Ok(external)
    }

    /// dext/dint for every free parameter at the given internal point
    pub fn dext_dint(&self, internal: &[f64]) -> Array1<f64> {
        self.params
            .iter()
            .filter(|p| !p.is_fixed())
            .zip(internal.iter())
            .map(|(p, &v)| p.bounds_transform().dext_dint(v))
            .collect()
    }

    /// For every free parameter, whether it is pinned at one of its bounds
    pub fn at_limit(&self, internal: &[f64]) -> Vec<bool> {
        self.params
            .iter()
            .filter(|p| !p.is_fixed())
            .zip(internal.iter())
            .map(|(p, &v)| p.bounds_transform().is_at_limit(v))
            .collect()
    }

    /// Whether the free parameter at position `k` of the internal vector has bounds
    pub fn free_has_limits(&self) -> Vec<bool> {
        self.params
            .iter()
            .filter(|p| !p.is_fixed())
            .map(|p| p.has_limits())
            .collect()
    }

    /// Update the free parameters from internal coordinates
    pub fn update_from_internal(&mut self, internal: &[f64]) -> Result<(), ParameterError> {
        let external = self.external_from_internal(internal)?;
        self.set_values(&external)
    }

    /// Set all values in declaration order; values outside the bounds are rejected
    pub fn set_values(&mut self, values: &[f64]) -> Result<(), ParameterError> {
        if values.len() != self.params.len() {
            return Err(ParameterError::LengthMismatch {
                expected: self.params.len(),
                actual: values.len(),
            });
        }

        // Validate everything before touching anything
        let mut updated = self.params.clone();
        for (param, &value) in updated.iter_mut().zip(values.iter()) {
            param.set_value(value)?;
        }
        self.params = updated;
        Ok(())
    }

    /// Set the external errors of the free parameters, in internal vector order
    pub fn set_free_errors(&mut self, errors: &[f64]) -> Result<(), ParameterError> {
        let free = self.free_indices();
        if errors.len() != free.len() {
            return Err(ParameterError::LengthMismatch {
                expected: free.len(),
                actual: errors.len(),
            });
        }
        for (&i, &err) in free.iter().zip(errors.iter()) {
            // a zero or broken error keeps the previous step size
            if err.is_finite() && err > 0.0 {
                self.params[i].set_error(err)?;
            }
        }
        Ok(())
    }

    /// Reset all parameters to their initial values and steps
    pub fn reset(&mut self) {
        for param in self.params.iter_mut() {
            param.reset();
        }
    }

    /// Hold a parameter at its current value
    pub fn fix(&mut self, name: &str) -> Result<(), ParameterError> {
        self.require_mut(name)?.set_fixed(true);
        Ok(())
    }

    /// Let a fixed parameter vary again
    pub fn release(&mut self, name: &str) -> Result<(), ParameterError> {
        self.require_mut(name)?.set_fixed(false);
        Ok(())
    }

    /// Free parameters
    pub fn free(&self) -> Vec<&Parameter> {
        self.params.iter().filter(|p| !p.is_fixed()).collect()
    }

    /// Fixed parameters
    pub fn fixed(&self) -> Vec<&Parameter> {
        self.params.iter().filter(|p| p.is_fixed()).collect()
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<Parameter>> for Parameters {
    type Error = ParameterError;

    fn try_from(params: Vec<Parameter>) -> Result<Self, Self::Error> {
        let mut collection = Parameters::new();
        for param in params {
            collection.add(param)?;
        }
        Ok(collection)
    }
}

impl From<Parameters> for Vec<Parameter> {
    fn from(params: Parameters) -> Self {
        params.params
    }
}

impl Index<usize> for Parameters {
    type Output = Parameter;

    fn index(&self, index: usize) -> &Parameter {
        &self.params[index]
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>3} | {:<12} | {:>12} | {:>10} | {:>10} | {:>10} | {:<5}",
            "", "Name", "Value", "Error", "Min", "Max", "Fixed"
        )?;
        for (i, p) in self.params.iter().enumerate() {
            let min = if p.bounds().has_lower_bound() {
                format!("{:.4}", p.min())
            } else {
                String::new()
            };
            let max = if p.bounds().has_upper_bound() {
                format!("{:.4}", p.max())
            } else {
                String::new()
            };
            writeln!(
                f,
                "{:>3} | {:<12} | {:>12.6} | {:>10.4} | {:>10} | {:>10} | {:<5}",
                i,
                p.name(),
                p.value(),
                p.error(),
                min,
                max,
                if p.is_fixed() { "yes" } else { "" }
            )?;
        }
        Ok(())
    }
}

/// Error type for parameter serialization
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Parameters {
    /// Save parameters to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SerializationError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Serialize parameters to a JSON string
    ///
    /// # Examples
    ///
    /// ```
    /// use minuit_rs::parameters::Parameters;
    ///
    /// let mut params = Parameters::new();
    /// params.add_param_with_bounds("amplitude", 10.0, 0.0, f64::INFINITY).unwrap();
    /// let json = params.to_json().unwrap();
    /// let loaded = Parameters::from_json(&json).unwrap();
    /// assert_eq!(loaded.get("amplitude").unwrap().value(), 10.0);
    /// ```
    pub fn to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load parameters from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, SerializationError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    /// Deserialize parameters from a JSON string
    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Values keyed by parameter name, iterated in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedValues {
    names: Vec<String>,
    values: Vec<f64>,
}

impl NamedValues {
    pub(crate) fn new(names: Vec<String>, values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    /// Look up a value by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.values.clone()
    }

    /// Iterate over `(name, value)` pairs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

impl Index<&str> for NamedValues {
    type Output = f64;

    fn index(&self, name: &str) -> &f64 {
        match self.names.iter().position(|n| n == name) {
            Some(i) => &self.values[i],
            None => panic!("no parameter named '{}'", name),
        }
    }
}

impl Index<usize> for NamedValues {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

impl fmt::Display for NamedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}': {}", name, value)?;
        }
        write!(f, "}}")
    }
}
