//! Study implementation for managing optimization trials.
//!
//! A [`Study`] is the sequential optimizer: it owns the sampler, the pruner
//! and the trial storage, and exposes a trial-id API (`ask`, `suggest`,
//! `report`, `should_prune`, `tell`) that every other part of the crate
//! drives. [`Study::optimize`] runs trials one after another on the calling
//! thread; [`DistributedStudy`](crate::DistributedStudy) runs them
//! concurrently through the same API.

use std::collections::{HashMap, VecDeque};

use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::param::{AttrValue, ParamValue};
use crate::pruner::{NopPruner, Pruner};
use crate::sampler::Sampler;
use crate::sampler::random::RandomSampler;
use crate::storage::{MemoryStorage, Storage};
use crate::trial::TrialRecord;
use crate::types::{Direction, TrialState};

mod analysis;
mod builder;
mod optimize;

pub(crate) use analysis::best_of;
pub(crate) use optimize::trace_finished;
pub use builder::StudyBuilder;

/// How a trial ended, as handed to [`Study::tell`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrialOutcome {
    /// The objective returned a value.
    Complete(f64),
    /// The pruner stopped the trial early.
    Pruned,
    /// The objective, or the machinery around it, failed.
    Failed(String),
}

impl TrialOutcome {
    /// The terminal state this outcome records.
    #[must_use]
    pub fn state(&self) -> TrialState {
        match self {
            TrialOutcome::Complete(_) => TrialState::Complete,
            TrialOutcome::Pruned => TrialState::Pruned,
            TrialOutcome::Failed(_) => TrialState::Failed,
        }
    }
}

/// A study manages the optimization process, tracking trials and their results.
///
/// # Examples
///
/// ```
/// use optimizer_distributed::{Direction, Study};
///
/// // Create a study to minimize an objective function
/// let study = Study::new(Direction::Minimize);
/// assert_eq!(study.direction(), Direction::Minimize);
/// ```
pub struct Study {
    /// The optimization direction.
    pub(crate) direction: Direction,
    /// The sampler used to generate parameter values.
    pub(crate) sampler: Box<dyn Sampler>,
    /// The pruner used to decide whether to stop trials early.
    pub(crate) pruner: Box<dyn Pruner>,
    /// Trial storage backend (default: [`MemoryStorage`]).
    pub(crate) storage: Box<dyn Storage>,
    /// Queue of parameter configurations to evaluate next.
    pub(crate) enqueued_params: VecDeque<HashMap<String, ParamValue>>,
    /// Enqueued configurations already bound to an asked trial.
    pub(crate) fixed_params: HashMap<u64, HashMap<String, ParamValue>>,
    /// Study-level user attributes.
    pub(crate) user_attrs: HashMap<String, AttrValue>,
}

impl core::fmt::Debug for Study {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Study")
            .field("direction", &self.direction)
            .field("n_trials", &self.storage.n_trials())
            .field("n_enqueued", &self.enqueued_params.len())
            .finish_non_exhaustive()
    }
}

impl Study {
    /// Create a new study with the given optimization direction.
    ///
    /// Uses a [`RandomSampler`], no pruning and in-memory storage.
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self::with_sampler(direction, RandomSampler::new())
    }

    /// Return a [`StudyBuilder`] for constructing a study with a fluent API.
    ///
    /// # Examples
    ///
    /// ```
    /// use optimizer_distributed::prelude::*;
    ///
    /// let study = Study::builder()
    ///     .maximize()
    ///     .sampler(RandomSampler::with_seed(7))
    ///     .pruner(NopPruner)
    ///     .build();
    /// assert_eq!(study.direction(), Direction::Maximize);
    /// ```
    #[must_use]
    pub fn builder() -> StudyBuilder {
        StudyBuilder::new()
    }

    /// Create a new study with a custom sampler.
    ///
    /// # Examples
    ///
    /// ```
    /// use optimizer_distributed::sampler::random::RandomSampler;
    /// use optimizer_distributed::{Direction, Study};
    ///
    /// let sampler = RandomSampler::with_seed(42);
    /// let study = Study::with_sampler(Direction::Maximize, sampler);
    /// assert_eq!(study.direction(), Direction::Maximize);
    /// ```
    pub fn with_sampler(direction: Direction, sampler: impl Sampler + 'static) -> Self {
        Self::from_parts(
            direction,
            Box::new(sampler),
            Box::new(NopPruner),
            Box::new(MemoryStorage::new()),
        )
    }

    pub(crate) fn from_parts(
        direction: Direction,
        sampler: Box<dyn Sampler>,
        pruner: Box<dyn Pruner>,
        storage: Box<dyn Storage>,
    ) -> Self {
        Self {
            direction,
            sampler,
            pruner,
            storage,
            enqueued_params: VecDeque::new(),
            fixed_params: HashMap::new(),
            user_attrs: HashMap::new(),
        }
    }

    /// Return the optimization direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Replace the sampler used for future suggestions.
    pub fn set_sampler(&mut self, sampler: impl Sampler + 'static) {
        self.sampler = Box::new(sampler);
    }

    /// Replace the pruner used for future pruning decisions.
    pub fn set_pruner(&mut self, pruner: impl Pruner + 'static) {
        self.pruner = Box::new(pruner);
    }

    /// Enqueue a specific parameter configuration to be evaluated next.
    ///
    /// The next call to [`ask()`](Self::ask) takes the oldest enqueued
    /// configuration. Suggesting a parameter that the configuration names
    /// returns the enqueued value instead of sampling, provided it lies in
    /// the requested distribution; any other parameter falls back to normal
    /// sampling.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::HashMap;
    ///
    /// use optimizer_distributed::prelude::*;
    ///
    /// let mut study = Study::new(Direction::Minimize);
    /// study.enqueue(HashMap::from([("x".to_string(), ParamValue::Float(0.5))]));
    ///
    /// let id = study.ask();
    /// let x = study
    ///     .suggest(id, "x", FloatDistribution::uniform(0.0, 1.0).into())
    ///     .unwrap();
    /// assert_eq!(x, ParamValue::Float(0.5));
    /// ```
    pub fn enqueue(&mut self, params: HashMap<String, ParamValue>) {
        self.enqueued_params.push_back(params);
    }

    /// Return the number of enqueued parameter configurations.
    #[must_use]
    pub fn n_enqueued(&self) -> usize {
        self.enqueued_params.len()
    }

    /// Create a new `Pending` trial and return its id.
    ///
    /// This is the first half of the ask-and-tell interface. Suggest
    /// parameters with [`suggest()`](Self::suggest), evaluate the objective
    /// externally, then record the result with [`tell()`](Self::tell).
    ///
    /// # Examples
    ///
    /// ```
    /// use optimizer_distributed::prelude::*;
    ///
    /// let mut study = Study::new(Direction::Minimize);
    /// let id = study.ask();
    /// let x = study
    ///     .suggest(id, "x", FloatDistribution::uniform(0.0, 10.0).into())
    ///     .unwrap();
    /// let ParamValue::Float(x) = x else { unreachable!() };
    /// study.tell(id, TrialOutcome::Complete(x * x)).unwrap();
    /// assert_eq!(study.n_trials(), 1);
    /// ```
    pub fn ask(&mut self) -> u64 {
        let id = self.storage.create_trial();
        if let Some(params) = self.enqueued_params.pop_front() {
            self.fixed_params.insert(id, params);
        }
        trace_debug!(trial_id = id, "trial created");
        id
    }

    /// Mark a pending trial as running.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound` or `InvalidTransition`.
    pub fn start(&mut self, trial_id: u64) -> Result<()> {
        self.storage.set_state(trial_id, TrialState::Running)
    }

    /// Suggest a value for parameter `name` of trial `trial_id`.
    ///
    /// Re-suggesting a name with the same distribution returns the stored
    /// value; a different distribution is a `ParameterConflict`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an invalid distribution,
    /// `ParameterConflict`, `TrialNotFound`, or `InvalidTransition` if the
    /// trial has finished.
    pub fn suggest(
        &mut self,
        trial_id: u64,
        name: &str,
        distribution: Distribution,
    ) -> Result<ParamValue> {
        distribution.validate()?;
        let record = self.storage.trial(trial_id)?;

        if let Some(existing) = record.params.get(name) {
            return match record.distributions.get(name) {
                Some(previous) if *previous == distribution => Ok(existing.clone()),
                _ => Err(Error::ParameterConflict {
                    name: name.to_owned(),
                    reason: "suggested again with a different distribution".to_owned(),
                }),
            };
        }

        let fixed = self
            .fixed_params
            .get(&trial_id)
            .and_then(|params| params.get(name))
            .filter(|value| distribution.contains(value))
            .cloned();
        let value = match fixed {
            Some(value) => value,
            None => self
                .sampler
                .sample(&distribution, trial_id, self.storage.trials()),
        };

        self.storage
            .set_param(trial_id, name, value.clone(), distribution)?;
        trace_debug!(trial_id, name, value = %value, "parameter suggested");
        Ok(value)
    }

    /// Record an intermediate value of a trial.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound`, or `InvalidTransition` if the trial has finished.
    pub fn report(&mut self, trial_id: u64, step: u64, value: f64) -> Result<()> {
        self.storage.set_intermediate_value(trial_id, step, value)
    }

    /// Ask the pruner whether a trial should stop.
    ///
    /// A trial that has not reported anything is never pruned.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound`, or `InvalidTransition` if the trial has finished.
    pub fn should_prune(&mut self, trial_id: u64) -> Result<bool> {
        let record = self.storage.trial(trial_id)?;
        if record.state.is_finished() {
            return Err(Error::InvalidTransition {
                trial_id,
                from: record.state,
                to: TrialState::Pruned,
            });
        }
        let Some(step) = record.last_step() else {
            return Ok(false);
        };
        Ok(self.pruner.should_prune(
            trial_id,
            step,
            &record.intermediate_values,
            self.storage.trials(),
        ))
    }

    /// Set a user attribute on a trial.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound`, or `InvalidTransition` if the trial has finished.
    pub fn set_trial_user_attr(
        &mut self,
        trial_id: u64,
        key: &str,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        self.storage.set_user_attr(trial_id, key, value.into())
    }

    /// Record how a trial ended and return its finished record.
    ///
    /// A trial still `Pending` (asked but never started) is started first
    /// unless the outcome is a failure.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound`, or `InvalidTransition` if the trial already
    /// finished.
    pub fn tell(&mut self, trial_id: u64, outcome: TrialOutcome) -> Result<TrialRecord> {
        let state = outcome.state();
        if self.storage.trial(trial_id)?.state == TrialState::Pending
            && state != TrialState::Failed
        {
            self.start(trial_id)?;
        }
        let value = match &outcome {
            TrialOutcome::Complete(v) => Some(*v),
            TrialOutcome::Pruned | TrialOutcome::Failed(_) => None,
        };
        let record = self.storage.finish(trial_id, state, value)?;
        self.fixed_params.remove(&trial_id);
        #[cfg(feature = "tracing")]
        if let TrialOutcome::Failed(reason) = &outcome {
            tracing::warn!(trial_id, reason = reason.as_str(), "trial failed");
        }
        Ok(record)
    }

    /// Fail every trial that has not finished yet and return how many there were.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub fn fail_unfinished(&mut self) -> Result<usize> {
        let unfinished: Vec<u64> = self
            .storage
            .trials()
            .iter()
            .filter(|t| !t.state.is_finished())
            .map(|t| t.id)
            .collect();
        for &id in &unfinished {
            self.storage.finish(id, TrialState::Failed, None)?;
            self.fixed_params.remove(&id);
        }
        Ok(unfinished.len())
    }

    /// Return the record of a single trial.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound` if no trial has that id.
    pub fn trial(&self, trial_id: u64) -> Result<&TrialRecord> {
        self.storage.trial(trial_id)
    }

    /// Return every trial, ordered by id, running and pending ones included.
    #[must_use]
    pub fn trials(&self) -> &[TrialRecord] {
        self.storage.trials()
    }

    /// Return clones of the trials whose state is one of `states`.
    #[must_use]
    pub fn get_trials(&self, states: &[TrialState]) -> Vec<TrialRecord> {
        self.storage
            .trials()
            .iter()
            .filter(|t| states.contains(&t.state))
            .cloned()
            .collect()
    }

    /// Return the number of trials ever created.
    #[must_use]
    pub fn n_trials(&self) -> usize {
        self.storage.n_trials()
    }

    /// Return the study-level user attributes.
    #[must_use]
    pub fn user_attrs(&self) -> &HashMap<String, AttrValue> {
        &self.user_attrs
    }

    /// Set a study-level user attribute.
    pub fn set_user_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.user_attrs.insert(key.into(), value.into());
    }
}
