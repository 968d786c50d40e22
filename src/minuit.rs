//! # Minuit front end
//!
//! [`Minuit`] owns an objective and its parameters and runs MIGRAD, HESSE
//! and MINOS on them, keeping the latest [`FunctionMinimum`] and MINOS
//! intervals around.
//!
//! ```
//! use minuit_rs::Minuit;
//!
//! let fcn = |p: &[f64]| (p[0] - 2.0).powi(2) + (p[1] - 3.0).powi(2);
//! let mut m = Minuit::new(fcn, &["x", "y"], &[0.0, 0.0]).unwrap();
//! m.migrad(None, 1).unwrap();
//! assert!(m.valid());
//! assert!((m.values()["x"] - 2.0).abs() < 1e-3);
//! ```

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{MinuitError, Result};
use crate::function::{FunctionAdapter, Objective};
use crate::migrad::{Migrad, MigradConfig, Strategy};
use crate::minimum::FunctionMinimum;
use crate::parameters::{NamedValues, Parameters};
use crate::uncertainty::covariance::Covariance;
use crate::uncertainty::hesse::{Hesse, HesseConfig};
use crate::uncertainty::minos::{minos_parallel, Minos, MinosConfig, MinosError};
use crate::uncertainty::profile::{mnprofile, profile, ProfileScan};

/// Settings shared by all runs of a [`Minuit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinuitConfig {
    /// Strategy level 0, 1 or 2. Default: 1
    pub strategy: Strategy,

    /// MIGRAD tolerance. Default: 0.1
    pub tolerance: f64,

    /// Overrides the objective's errordef when set
    pub errordef: Option<f64>,

    /// Value used in place of failed or non-finite evaluations
    pub recovery_value: Option<f64>,

    /// Default MIGRAD call limit
    pub max_calls: Option<usize>,

    /// MIGRAD iteration limit
    pub max_iterations: Option<usize>,
}

impl Default for MinuitConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Default,
            tolerance: 0.1,
            errordef: None,
            recovery_value: None,
            max_calls: None,
            max_iterations: None,
        }
    }
}

impl MinuitConfig {
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_errordef(mut self, errordef: f64) -> Self {
        self.errordef = Some(errordef);
        self
    }

    pub fn with_recovery_value(mut self, value: f64) -> Self {
        self.recovery_value = Some(value);
        self
    }

    pub fn with_max_calls(mut self, max_calls: usize) -> Self {
        self.max_calls = Some(max_calls);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(up) = self.errordef {
            if !(up.is_finite() && up > 0.0) {
                return Err(MinuitError::InvalidConfig(format!(
                    "errordef must be positive, got {}",
                    up
                )));
            }
        }
        if let Some(value) = self.recovery_value {
            if !value.is_finite() {
                return Err(MinuitError::InvalidConfig(
                    "recovery value must be finite".to_string(),
                ));
            }
        }
        self.migrad_config(None).validate()
    }

    fn migrad_config(&self, ncall: Option<usize>) -> MigradConfig {
        MigradConfig {
            strategy: self.strategy,
            tolerance: self.tolerance,
            max_calls: ncall.or(self.max_calls),
            max_iterations: self.max_iterations,
            ..MigradConfig::default()
        }
    }

    /// Save the configuration to a JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load a configuration from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Objective, parameters and the results of the last runs.
pub struct Minuit<O: Objective> {
    fcn: O,
    params: Parameters,
    config: MinuitConfig,
    fmin: Option<FunctionMinimum>,
    merrors: Vec<MinosError>,
    nfcn: usize,
}

impl<O: Objective> Minuit<O> {
    /// Create from an objective and parameter names with starting values.
    pub fn new(fcn: O, names: &[&str], values: &[f64]) -> Result<Self> {
        let params = Parameters::from_names(names, values)?;
        Ok(Self::from_parameters(fcn, params))
    }

    /// Create from an objective and prepared parameters.
    pub fn from_parameters(fcn: O, params: Parameters) -> Self {
        Self {
            fcn,
            params,
            config: MinuitConfig::default(),
            fmin: None,
            merrors: Vec::new(),
            nfcn: 0,
        }
    }

    pub fn with_config(mut self, config: MinuitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MinuitConfig {
        &self.config
    }

    pub fn set_strategy(&mut self, strategy: Strategy) {
        self.config.strategy = strategy;
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.config.tolerance = tolerance;
    }

    pub fn set_errordef(&mut self, errordef: f64) {
        self.config.errordef = Some(errordef);
    }

    pub fn set_recovery_value(&mut self, value: Option<f64>) {
        self.config.recovery_value = value;
    }

    pub fn objective(&self) -> &O {
        &self.fcn
    }

    /// errordef used for the runs: the override, or the objective's own
    pub fn errordef(&self) -> f64 {
        self.config.errordef.unwrap_or_else(|| self.fcn.errordef())
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Current parameter values in declaration order
    pub fn values(&self) -> NamedValues {
        self.params.values()
    }

    /// Current parameter errors in declaration order
    pub fn errors(&self) -> NamedValues {
        self.params.errors()
    }

    pub fn fix(&mut self, name: &str) -> Result<()> {
        Ok(self.params.fix(name)?)
    }

    pub fn release(&mut self, name: &str) -> Result<()> {
        Ok(self.params.release(name)?)
    }

    /// Set the limits of `name`; infinite values leave that side open.
    pub fn set_limits(&mut self, name: &str, min: f64, max: f64) -> Result<()> {
        let param = self.params.require_mut(name)?;
        if min == f64::NEG_INFINITY && max == f64::INFINITY {
            param.clear_bounds();
        } else {
            param.set_bounds(min, max)?;
        }
        Ok(())
    }

    /// Set the starting step of `name`
    pub fn set_error(&mut self, name: &str, error: f64) -> Result<()> {
        Ok(self.params.require_mut(name)?.set_error(error)?)
    }

    pub fn set_value(&mut self, name: &str, value: f64) -> Result<()> {
        Ok(self.params.require_mut(name)?.set_value(value)?)
    }

    /// Run MIGRAD from the current values.
    ///
    /// `ncall` overrides the call limit of each run. MIGRAD is repeated up to
    /// `iterate` times, starting from the previous result, while the minimum
    /// is invalid and the call limit was not hit.
    pub fn migrad(&mut self, ncall: Option<usize>, iterate: usize) -> Result<&FunctionMinimum> {
        self.config.validate()?;
        let config = self.config.migrad_config(ncall);
        let migrad = Migrad::with_config(config);

        let mut result = None;
        for attempt in 0..iterate.max(1) {
            let fcn = adapter(&self.fcn, &self.params, self.errordef(), self.config.recovery_value);
            let fmin = migrad.minimize(&fcn)?;
            self.nfcn += fcn.nfcn();
            self.params = fmin.parameters().clone();

            let done = fmin.is_valid() || fmin.has_reached_call_limit();
            if !done {
                log::info!("MIGRAD attempt {} gave an invalid minimum: {}", attempt + 1, fmin.status());
            }
            result = Some(fmin);
            if done {
                break;
            }
        }

        self.merrors.clear();
        self.fmin = result;
        self.minimum()
    }

    /// Run HESSE at the current values.
    ///
    /// The covariance of the last minimum is refined if the parameters have
    /// not changed since; otherwise a new minimum is built at the current
    /// point.
    pub fn hesse(&mut self, ncall: Option<usize>) -> Result<&FunctionMinimum> {
        self.config.validate()?;
        let hesse = Hesse::with_config(HesseConfig {
            strategy: self.config.strategy,
            max_calls: ncall,
        });

        let fcn = adapter(&self.fcn, &self.params, self.errordef(), self.config.recovery_value);
        let fmin = match &self.fmin {
            Some(fmin) if self.unchanged_since(fmin) => hesse.update(&fcn, fmin)?,
            _ => {
                let edm_goal = self.config.migrad_config(None).edm_goal(self.errordef());
                hesse.at_point(&fcn, edm_goal)?
            }
        };
        self.nfcn += fcn.nfcn();
        if fmin.hesse_failed() {
            log::warn!("HESSE failed, the covariance matrix is not usable");
        }

        self.params = fmin.parameters().clone();
        self.merrors.clear();
        self.fmin = Some(fmin);
        self.minimum()
    }

    /// Run MINOS for `names`, or for all free parameters when empty.
    pub fn minos(&mut self, names: &[&str], cl: f64) -> Result<Vec<MinosError>> {
        let fmin = self.minimum()?;
        let names = self.minos_names(names);
        let minos = Minos::new(&self.fcn, fmin)
            .with_config(self.minos_config())
            .with_recovery(self.config.recovery_value);

        let mut results = Vec::with_capacity(names.len());
        for name in &names {
            results.push(minos.error(name, cl)?);
        }
        self.store_merrors(&results);
        Ok(results)
    }

    /// MINOS intervals for `names` from the last MINOS run
    pub fn merrors(&self) -> &[MinosError] {
        &self.merrors
    }

    pub fn merror(&self, name: &str) -> Option<&MinosError> {
        self.merrors.iter().find(|e| e.name == name)
    }

    /// Scan the objective along `name` with the others at their fit values.
    pub fn profile(&self, name: &str, range: Option<(f64, f64)>, size: usize) -> Result<ProfileScan> {
        profile(&self.fcn, self.minimum()?, name, range, size)
    }

    /// Scan along `name`, minimizing the others at every point.
    pub fn mnprofile(&self, name: &str, range: Option<(f64, f64)>, size: usize) -> Result<ProfileScan> {
        mnprofile(
            &self.fcn,
            self.minimum()?,
            name,
            range,
            size,
            &self.config.migrad_config(None),
            self.config.recovery_value,
        )
    }

    /// Last minimum, if MIGRAD or HESSE has run
    pub fn fmin(&self) -> Option<&FunctionMinimum> {
        self.fmin.as_ref()
    }

    pub fn covariance(&self) -> Option<&Covariance> {
        self.fmin.as_ref().and_then(|f| f.covariance())
    }

    pub fn correlation(&self) -> Option<Array2<f64>> {
        self.covariance().map(|c| c.correlation())
    }

    pub fn fval(&self) -> Option<f64> {
        self.fmin.as_ref().map(|f| f.fval())
    }

    /// Last minimum is valid
    pub fn valid(&self) -> bool {
        self.fmin.as_ref().map_or(false, |f| f.is_valid())
    }

    /// Last minimum has an accurate covariance matrix
    pub fn accurate(&self) -> bool {
        self.fmin.as_ref().map_or(false, |f| f.has_accurate_covar())
    }

    /// Function calls over all runs since creation or the last reset
    pub fn nfcn(&self) -> usize {
        self.nfcn
    }

    /// Restore the starting values and drop all results.
    pub fn reset(&mut self) {
        self.params.reset();
        self.fmin = None;
        self.merrors.clear();
        self.nfcn = 0;
    }

    fn minimum(&self) -> Result<&FunctionMinimum> {
        self.fmin.as_ref().ok_or_else(|| {
            MinuitError::InvalidState("no minimum available, run MIGRAD first".to_string())
        })
    }

    fn minos_config(&self) -> MinosConfig {
        MinosConfig::default()
            .with_strategy(self.config.strategy)
            .with_tolerance(self.config.tolerance)
    }

    fn minos_names(&self, names: &[&str]) -> Vec<String> {
        if names.is_empty() {
            self.params.free_names()
        } else {
            names.iter().map(|n| n.to_string()).collect()
        }
    }

    fn store_merrors(&mut self, results: &[MinosError]) {
        for result in results {
            self.nfcn += result.nfcn;
            match self.merrors.iter_mut().find(|e| e.name == result.name) {
                Some(existing) => *existing = result.clone(),
                None => self.merrors.push(result.clone()),
            }
        }
    }

    /// Values, bounds and fixed flags still match those of `fmin`
    fn unchanged_since(&self, fmin: &FunctionMinimum) -> bool {
        let previous = fmin.parameters();
        previous.len() == self.params.len()
            && previous.iter().zip(self.params.iter()).all(|(a, b)| {
                a.name() == b.name()
                    && a.value() == b.value()
                    && a.is_fixed() == b.is_fixed()
                    && a.min() == b.min()
                    && a.max() == b.max()
            })
    }
}

/// Adapter over a snapshot of `params`, borrowing only the objective.
fn adapter<'a>(
    fcn: &'a dyn Objective,
    params: &Parameters,
    errordef: f64,
    recovery: Option<f64>,
) -> FunctionAdapter<'a> {
    FunctionAdapter::new(fcn, params.clone())
        .with_errordef(errordef)
        .with_recovery(recovery)
}

impl<O: Objective + Sync> Minuit<O> {
    /// Run MINOS for several parameters in parallel.
    pub fn minos_parallel(&mut self, names: &[&str], cl: f64) -> Result<Vec<MinosError>> {
        let fmin = self.minimum()?;
        let names = self.minos_names(names);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let results = minos_parallel(
            &self.fcn,
            fmin,
            &names,
            cl,
            &self.minos_config(),
            self.config.recovery_value,
        )?;
        self.store_merrors(&results);
        Ok(results)
    }
}

impl<O: Objective> fmt::Display for Minuit<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fmin {
            Some(fmin) => write!(f, "{}", fmin)?,
            None => write!(f, "{}", self.params)?,
        }
        for merror in &self.merrors {
            write!(f, "{}", merror)?;
        }
        Ok(())
    }
}
