//! Central parameter trait and built-in parameter types.
//!
//! The [`Parameter`] trait provides a typed way to define a search-space
//! dimension once and suggest it from any [`TrialApi`] implementor, local or
//! remote. Built-in implementations cover floats, integers, categoricals and
//! booleans.
//!
//! # Example
//!
//! ```
//! use optimizer_distributed::prelude::*;
//!
//! let lr = FloatParam::new(1e-5, 1e-1).log_scale().name("lr");
//! let layers = IntParam::new(1, 10).name("layers");
//! let dropout = BoolParam::new().name("dropout");
//!
//! let mut study = Study::new(Direction::Minimize);
//! study
//!     .optimize(3, |trial| {
//!         let lr = lr.suggest(trial)?;
//!         let layers = layers.suggest(trial)?;
//!         let penalty = if dropout.suggest(trial)? { 0.1 } else { 0.0 };
//!         Ok::<_, Error>(lr * layers as f64 + penalty)
//!     })
//!     .unwrap();
//! ```

use core::fmt::Debug;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::distribution::{
    CategoricalDistribution, Distribution, FloatDistribution, IntDistribution,
};
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::trial::{TrialApi, TrialRecord};

static NEXT_PARAM_ID: AtomicU64 = AtomicU64::new(0);

/// A unique identifier for a parameter instance.
///
/// Used to derive a default name for parameters that were never given one.
/// Cloning a parameter copies its `ParamId`, so clones refer to the same
/// logical parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamId(u64);

impl ParamId {
    /// Creates a new unique `ParamId`.
    pub fn new() -> Self {
        Self(NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ParamId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ParamId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "param_{}", self.0)
    }
}

/// A trait for defining parameter types that can be suggested by a trial.
///
/// Implementors specify the distribution to sample from and how to convert
/// the raw [`ParamValue`] back into a typed value.
pub trait Parameter: Debug {
    /// The typed value returned after sampling.
    type Value;

    /// Returns the name under which the parameter is stored.
    fn label(&self) -> String;

    /// Returns the distribution that this parameter samples from.
    fn distribution(&self) -> Distribution;

    /// Converts a raw [`ParamValue`] into the typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the `ParamValue` variant doesn't match what this parameter expects.
    fn cast_param_value(&self, param_value: &ParamValue) -> Result<Self::Value>;

    /// Validates the parameter configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameter configuration is invalid.
    fn validate(&self) -> Result<()> {
        self.distribution().validate()
    }

    /// Suggests a value for this parameter from the given trial.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails, the parameter conflicts with
    /// a previously suggested parameter of the same name, or the trial
    /// cannot reach its study.
    fn suggest<T: TrialApi>(&self, trial: &mut T) -> Result<Self::Value>
    where
        Self: Sized,
    {
        self.validate()?;
        let name = self.label();
        let value = match self.distribution() {
            Distribution::Float(d) => ParamValue::Float(trial.suggest_float_with(&name, d)?),
            Distribution::Int(d) => ParamValue::Int(trial.suggest_int_with(&name, d)?),
            Distribution::Categorical(d) => {
                ParamValue::Categorical(trial.suggest_index(&name, d.n_choices)?)
            }
        };
        self.cast_param_value(&value)
    }
}

impl TrialRecord {
    /// Returns the typed value stored for `param`, if the trial suggested it.
    #[must_use]
    pub fn get<P: Parameter>(&self, param: &P) -> Option<P::Value> {
        self.params
            .get(&param.label())
            .and_then(|v| param.cast_param_value(v).ok())
    }
}

/// A floating-point parameter with optional log-scale and step size.
#[derive(Clone, Debug)]
pub struct FloatParam {
    id: ParamId,
    name: Option<String>,
    low: f64,
    high: f64,
    log_scale: bool,
    step: Option<f64>,
}

impl FloatParam {
    /// Creates a new float parameter with the given bounds.
    #[must_use]
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            id: ParamId::new(),
            name: None,
            low,
            high,
            log_scale: false,
            step: None,
        }
    }

    /// Sets the name the parameter is stored under.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enables log-scale sampling.
    #[must_use]
    pub fn log_scale(mut self) -> Self {
        self.log_scale = true;
        self
    }

    /// Sets a step size for discretized sampling.
    #[must_use]
    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }
}

impl Parameter for FloatParam {
    type Value = f64;

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    fn distribution(&self) -> Distribution {
        Distribution::Float(FloatDistribution {
            low: self.low,
            high: self.high,
            log_scale: self.log_scale,
            step: self.step,
        })
    }

    fn cast_param_value(&self, param_value: &ParamValue) -> Result<f64> {
        match param_value {
            ParamValue::Float(v) => Ok(*v),
            _ => Err(Error::Internal(
                "Float distribution should return Float value",
            )),
        }
    }
}

/// An integer parameter with optional log-scale and step size.
#[derive(Clone, Debug)]
pub struct IntParam {
    id: ParamId,
    name: Option<String>,
    low: i64,
    high: i64,
    log_scale: bool,
    step: Option<i64>,
}

impl IntParam {
    /// Creates a new integer parameter with the given bounds.
    #[must_use]
    pub fn new(low: i64, high: i64) -> Self {
        Self {
            id: ParamId::new(),
            name: None,
            low,
            high,
            log_scale: false,
            step: None,
        }
    }

    /// Sets the name the parameter is stored under.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enables log-scale sampling.
    #[must_use]
    pub fn log_scale(mut self) -> Self {
        self.log_scale = true;
        self
    }

    /// Sets a step size for discretized sampling.
    #[must_use]
    pub fn step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }
}

impl Parameter for IntParam {
    type Value = i64;

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    fn distribution(&self) -> Distribution {
        Distribution::Int(IntDistribution {
            low: self.low,
            high: self.high,
            log_scale: self.log_scale,
            step: self.step,
        })
    }

    fn cast_param_value(&self, param_value: &ParamValue) -> Result<i64> {
        match param_value {
            ParamValue::Int(v) => Ok(*v),
            _ => Err(Error::Internal("Int distribution should return Int value")),
        }
    }
}

/// A categorical parameter that selects from a list of choices.
///
/// Only the choice index crosses the trial boundary; the choices themselves
/// stay with the parameter, so `T` needs no serialization support.
#[derive(Clone, Debug)]
pub struct CategoricalParam<T: Clone> {
    id: ParamId,
    name: Option<String>,
    choices: Vec<T>,
}

impl<T: Clone> CategoricalParam<T> {
    /// Creates a new categorical parameter with the given choices.
    #[must_use]
    pub fn new(choices: Vec<T>) -> Self {
        Self {
            id: ParamId::new(),
            name: None,
            choices,
        }
    }

    /// Sets the name the parameter is stored under.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl<T: Clone + Debug> Parameter for CategoricalParam<T> {
    type Value = T;

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    fn distribution(&self) -> Distribution {
        Distribution::Categorical(CategoricalDistribution {
            n_choices: self.choices.len(),
        })
    }

    fn cast_param_value(&self, param_value: &ParamValue) -> Result<T> {
        match param_value {
            ParamValue::Categorical(index) => self
                .choices
                .get(*index)
                .cloned()
                .ok_or(Error::Internal("categorical index out of range")),
            _ => Err(Error::Internal(
                "Categorical distribution should return Categorical value",
            )),
        }
    }
}

/// A boolean parameter (equivalent to a categorical with `[false, true]`).
#[derive(Clone, Debug)]
pub struct BoolParam {
    id: ParamId,
    name: Option<String>,
}

impl BoolParam {
    /// Creates a new boolean parameter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ParamId::new(),
            name: None,
        }
    }

    /// Sets the name the parameter is stored under.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Default for BoolParam {
    fn default() -> Self {
        Self::new()
    }
}

impl Parameter for BoolParam {
    type Value = bool;

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }

    fn distribution(&self) -> Distribution {
        Distribution::Categorical(CategoricalDistribution { n_choices: 2 })
    }

    fn cast_param_value(&self, param_value: &ParamValue) -> Result<bool> {
        match param_value {
            ParamValue::Categorical(index) => Ok(*index == 1),
            _ => Err(Error::Internal(
                "Categorical distribution should return Categorical value",
            )),
        }
    }
}
