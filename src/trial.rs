//! The trial capability set, the in-process trial handle and trial records.
//!
//! Objective functions are written against [`TrialApi`]. The same objective
//! runs unchanged on the in-process [`Trial`] handed out by
//! [`Study::optimize`](crate::Study::optimize) and on the
//! [`RemoteTrial`](crate::RemoteTrial) proxy used by
//! [`DistributedStudy::optimize`](crate::DistributedStudy::optimize).

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::distribution::{Distribution, FloatDistribution, IntDistribution};
use crate::error::{Error, Result};
use crate::param::{AttrValue, ParamValue};
use crate::study::Study;
use crate::types::TrialState;

/// Operations an objective function may perform on the trial it evaluates.
///
/// Every method maps to one interaction with the optimizer state: a sampler
/// call, a storage write, or a pruner decision.
///
/// # Pruning
///
/// [`should_prune`](TrialApi::should_prune) never hands back `Ok(true)`.
/// When the pruner decides to stop the trial it returns
/// `Err(Error::TrialPruned)`, which the objective propagates with `?`:
///
/// ```
/// use optimizer_distributed::prelude::*;
///
/// fn objective<T: TrialApi>(trial: &mut T) -> Result<f64, Error> {
///     let lr = trial.suggest_float("lr", 1e-4, 1e-1)?;
///     let mut loss = 1.0;
///     for step in 0..10 {
///         loss *= 1.0 - lr;
///         trial.report(loss, step)?;
///         trial.should_prune()?;
///     }
///     Ok(loss)
/// }
///
/// let mut study = Study::new(Direction::Minimize);
/// study.optimize(5, |trial| objective(trial)).unwrap();
/// assert_eq!(study.n_trials(), 5);
/// ```
pub trait TrialApi {
    /// Returns the trial id assigned by storage.
    fn id(&self) -> u64;

    /// Suggests a float from a fully specified distribution.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid distribution, or
    /// `ParameterConflict` if `name` was already suggested differently.
    fn suggest_float_with(&mut self, name: &str, distribution: FloatDistribution) -> Result<f64>;

    /// Suggests an integer from a fully specified distribution.
    ///
    /// # Errors
    ///
    /// Same conditions as [`suggest_float_with`](TrialApi::suggest_float_with).
    fn suggest_int_with(&mut self, name: &str, distribution: IntDistribution) -> Result<i64>;

    /// Suggests an index into a list of `n_choices` categorical choices.
    ///
    /// # Errors
    ///
    /// Returns `EmptyChoices` for `n_choices == 0`, or `ParameterConflict`.
    fn suggest_index(&mut self, name: &str, n_choices: usize) -> Result<usize>;

    /// Reports an intermediate objective value for `step`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trial is no longer running.
    fn report(&mut self, value: f64, step: u64) -> Result<()>;

    /// Asks the pruner whether this trial should stop.
    ///
    /// # Errors
    ///
    /// Returns `Error::TrialPruned` when the trial must abort.
    fn should_prune(&mut self) -> Result<bool>;

    /// Attaches a user attribute to the trial.
    ///
    /// # Errors
    ///
    /// Returns an error if the trial is no longer running.
    fn set_user_attr(&mut self, key: &str, value: AttrValue) -> Result<()>;

    /// Returns the parameters suggested so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the trial record cannot be read.
    fn params(&mut self) -> Result<HashMap<String, ParamValue>>;

    /// Returns the user attributes set so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the trial record cannot be read.
    fn user_attrs(&mut self) -> Result<HashMap<String, AttrValue>>;

    /// Returns the distributions of the parameters suggested so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the trial record cannot be read.
    fn distributions(&mut self) -> Result<HashMap<String, Distribution>>;

    /// Returns when the trial started running.
    ///
    /// # Errors
    ///
    /// Returns an error if the trial record cannot be read.
    fn started_at(&mut self) -> Result<Option<SystemTime>>;

    /// Suggests a float uniformly from `[low, high]`.
    ///
    /// # Errors
    ///
    /// See [`suggest_float_with`](TrialApi::suggest_float_with).
    fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> Result<f64> {
        self.suggest_float_with(name, FloatDistribution::uniform(low, high))
    }

    /// Suggests an integer uniformly from `[low, high]`.
    ///
    /// # Errors
    ///
    /// See [`suggest_int_with`](TrialApi::suggest_int_with).
    fn suggest_int(&mut self, name: &str, low: i64, high: i64) -> Result<i64> {
        self.suggest_int_with(name, IntDistribution::uniform(low, high))
    }

    /// Suggests one of `choices`.
    ///
    /// # Errors
    ///
    /// See [`suggest_index`](TrialApi::suggest_index).
    fn suggest_categorical<T: Clone>(&mut self, name: &str, choices: &[T]) -> Result<T>
    where
        Self: Sized,
    {
        let index = self.suggest_index(name, choices.len())?;
        choices
            .get(index)
            .cloned()
            .ok_or(Error::Internal("categorical index out of range"))
    }

    /// Suggests a boolean.
    ///
    /// # Errors
    ///
    /// See [`suggest_index`](TrialApi::suggest_index).
    fn suggest_bool(&mut self, name: &str) -> Result<bool> {
        Ok(self.suggest_index(name, 2)? == 1)
    }
}

/// A snapshot of a trial as held by storage.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrialRecord {
    /// The unique, strictly increasing trial id.
    pub id: u64,
    /// Lifecycle state.
    pub state: TrialState,
    /// Suggested parameter values, keyed by name.
    pub params: HashMap<String, ParamValue>,
    /// Distributions the parameters were drawn from, keyed by name.
    pub distributions: HashMap<String, Distribution>,
    /// Final objective value; only set for `Complete` trials.
    pub value: Option<f64>,
    /// Intermediate values reported during the trial, in report order.
    pub intermediate_values: Vec<(u64, f64)>,
    /// User-defined attributes stored during the trial.
    pub user_attrs: HashMap<String, AttrValue>,
    /// When the trial started running.
    pub started_at: Option<SystemTime>,
    /// When the trial reached a terminal state.
    pub completed_at: Option<SystemTime>,
}

impl TrialRecord {
    /// Creates a pending record with no parameters.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: TrialState::Pending,
            params: HashMap::new(),
            distributions: HashMap::new(),
            value: None,
            intermediate_values: Vec::new(),
            user_attrs: HashMap::new(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Returns the value reported for `step`, if any.
    #[must_use]
    pub fn intermediate_value(&self, step: u64) -> Option<f64> {
        self.intermediate_values
            .iter()
            .rev()
            .find(|(s, _)| *s == step)
            .map(|(_, v)| *v)
    }

    /// Returns the most recently reported step.
    #[must_use]
    pub fn last_step(&self) -> Option<u64> {
        self.intermediate_values.last().map(|(s, _)| *s)
    }

    /// Gets a user attribute by key.
    #[must_use]
    pub fn user_attr(&self, key: &str) -> Option<&AttrValue> {
        self.user_attrs.get(key)
    }

    /// Wall-clock time between start and completion.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        let start = self.started_at?;
        self.completed_at?.duration_since(start).ok()
    }
}

/// The in-process trial handed to objectives by [`Study::optimize`].
///
/// Holds a mutable borrow of the study for the duration of one evaluation, so
/// every call goes straight to the sampler, pruner and storage.
pub struct Trial<'s> {
    study: &'s mut Study,
    id: u64,
    pruned: bool,
}

impl<'s> Trial<'s> {
    pub(crate) fn new(study: &'s mut Study, id: u64) -> Self {
        Self {
            study,
            id,
            pruned: false,
        }
    }

    /// Returns `true` once the pruner has told this trial to stop.
    pub(crate) fn was_pruned(&self) -> bool {
        self.pruned
    }
}

impl core::fmt::Debug for Trial<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Trial").field("id", &self.id).finish_non_exhaustive()
    }
}

impl TrialApi for Trial<'_> {
    fn id(&self) -> u64 {
        self.id
    }

    fn suggest_float_with(&mut self, name: &str, distribution: FloatDistribution) -> Result<f64> {
        match self
            .study
            .suggest(self.id, name, Distribution::Float(distribution))?
        {
            ParamValue::Float(v) => Ok(v),
            _ => Err(Error::Internal("Float distribution should return Float value")),
        }
    }

    fn suggest_int_with(&mut self, name: &str, distribution: IntDistribution) -> Result<i64> {
        match self
            .study
            .suggest(self.id, name, Distribution::Int(distribution))?
        {
            ParamValue::Int(v) => Ok(v),
            _ => Err(Error::Internal("Int distribution should return Int value")),
        }
    }

    fn suggest_index(&mut self, name: &str, n_choices: usize) -> Result<usize> {
        let distribution =
            Distribution::Categorical(crate::distribution::CategoricalDistribution { n_choices });
        match self.study.suggest(self.id, name, distribution)? {
            ParamValue::Categorical(i) => Ok(i),
            _ => Err(Error::Internal(
                "Categorical distribution should return Categorical value",
            )),
        }
    }

    fn report(&mut self, value: f64, step: u64) -> Result<()> {
        self.study.report(self.id, step, value)
    }

    fn should_prune(&mut self) -> Result<bool> {
        if self.study.should_prune(self.id)? {
            self.pruned = true;
            Err(Error::TrialPruned)
        } else {
            Ok(false)
        }
    }

    fn set_user_attr(&mut self, key: &str, value: AttrValue) -> Result<()> {
        self.study.set_trial_user_attr(self.id, key, value)
    }

    fn params(&mut self) -> Result<HashMap<String, ParamValue>> {
        Ok(self.study.trial(self.id)?.params.clone())
    }

    fn user_attrs(&mut self) -> Result<HashMap<String, AttrValue>> {
        Ok(self.study.trial(self.id)?.user_attrs.clone())
    }

    fn distributions(&mut self) -> Result<HashMap<String, Distribution>> {
        Ok(self.study.trial(self.id)?.distributions.clone())
    }

    fn started_at(&mut self) -> Result<Option<SystemTime>> {
        Ok(self.study.trial(self.id)?.started_at)
    }
}
