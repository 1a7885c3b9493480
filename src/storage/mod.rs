//! Trial storage backends.
//!
//! The [`Storage`] trait is the record-level store behind a
//! [`Study`](crate::Study): it hands out trial ids, records suggested
//! parameters, intermediate values and attributes, and enforces the trial
//! lifecycle. A study owns its storage exclusively and all writes come from
//! the thread driving the study, so the trait takes `&mut self` for writes
//! and only requires `Send`.
//!
//! # Implementing a custom backend
//!
//! Implement [`Storage`] to plug in your own backend (e.g. a database) and
//! inject it via the builder:
//!
//! ```
//! use optimizer_distributed::prelude::*;
//! use optimizer_distributed::storage::MemoryStorage;
//!
//! let study = Study::builder()
//!     .minimize()
//!     .storage(MemoryStorage::new())
//!     .build();
//! assert_eq!(study.n_trials(), 0);
//! ```

mod memory;
pub use memory::MemoryStorage;

use crate::distribution::Distribution;
use crate::error::Result;
use crate::param::{AttrValue, ParamValue};
use crate::trial::TrialRecord;
use crate::types::TrialState;

/// Trait for storing and retrieving trial records.
///
/// Implementations must reject writes to finished trials and any state
/// change that [`TrialState::can_transition_to`] forbids, returning
/// [`Error::InvalidTransition`](crate::Error::InvalidTransition).
pub trait Storage: Send {
    /// Creates a new `Pending` trial and returns its id.
    ///
    /// Ids are unique and strictly increasing.
    fn create_trial(&mut self) -> u64;

    /// Moves a trial to `state`.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound` or `InvalidTransition`.
    fn set_state(&mut self, trial_id: u64, state: TrialState) -> Result<()>;

    /// Records a suggested parameter value and its distribution.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound`, or `InvalidTransition` if the trial has finished.
    fn set_param(
        &mut self,
        trial_id: u64,
        name: &str,
        value: ParamValue,
        distribution: Distribution,
    ) -> Result<()>;

    /// Records an intermediate value for `step`.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound`, or `InvalidTransition` if the trial has finished.
    fn set_intermediate_value(&mut self, trial_id: u64, step: u64, value: f64) -> Result<()>;

    /// Sets a user attribute on a trial.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound`, or `InvalidTransition` if the trial has finished.
    fn set_user_attr(&mut self, trial_id: u64, key: &str, value: AttrValue) -> Result<()>;

    /// Moves a trial to a terminal state and stores its final value.
    ///
    /// Returns a snapshot of the finished record.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound` or `InvalidTransition`.
    fn finish(&mut self, trial_id: u64, state: TrialState, value: Option<f64>)
    -> Result<TrialRecord>;

    /// Returns the record of a single trial.
    ///
    /// # Errors
    ///
    /// Returns `TrialNotFound` if no trial has that id.
    fn trial(&self, trial_id: u64) -> Result<&TrialRecord>;

    /// Returns every trial, ordered by id.
    fn trials(&self) -> &[TrialRecord];

    /// Returns the number of trials ever created.
    fn n_trials(&self) -> usize {
        self.trials().len()
    }
}
