use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::trial::TrialRecord;
use crate::types::{Direction, TrialState};

use super::Study;

/// Return the best completed trial among `trials`.
///
/// Ties keep the earlier trial and NaN values never beat a number.
pub(crate) fn best_of<'a>(
    trials: impl IntoIterator<Item = &'a TrialRecord>,
    direction: Direction,
) -> Option<&'a TrialRecord> {
    trials
        .into_iter()
        .filter(|t| t.state == TrialState::Complete)
        .filter_map(|t| t.value.map(|v| (t, v)))
        .fold(None, |best: Option<(&TrialRecord, f64)>, (t, v)| match best {
            Some((_, incumbent)) if !direction.is_better(v, incumbent) => best,
            _ => Some((t, v)),
        })
        .map(|(t, _)| t)
}

impl Study {
    /// Return the trial with the best objective value.
    ///
    /// The "best" trial depends on the optimization direction:
    /// - `Direction::Minimize`: Returns the trial with the lowest objective value.
    /// - `Direction::Maximize`: Returns the trial with the highest objective value.
    ///
    /// Only `Complete` trials are considered.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoCompletedTrials` if no trials have been completed.
    ///
    /// # Examples
    ///
    /// ```
    /// use optimizer_distributed::prelude::*;
    ///
    /// let mut study = Study::new(Direction::Minimize);
    ///
    /// // Error when no trials completed
    /// assert!(study.best_trial().is_err());
    ///
    /// for value in [0.8, 0.3] {
    ///     let id = study.ask();
    ///     study.tell(id, TrialOutcome::Complete(value)).unwrap();
    /// }
    ///
    /// let best = study.best_trial().unwrap();
    /// assert_eq!(best.value, Some(0.3)); // Minimize: lower is better
    /// ```
    pub fn best_trial(&self) -> Result<TrialRecord> {
        best_of(self.storage.trials(), self.direction)
            .cloned()
            .ok_or(Error::NoCompletedTrials)
    }

    /// Return the best objective value found so far.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoCompletedTrials` if no trials have been completed.
    pub fn best_value(&self) -> Result<f64> {
        best_of(self.storage.trials(), self.direction)
            .and_then(|t| t.value)
            .ok_or(Error::NoCompletedTrials)
    }

    /// Return the parameters of the best trial.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoCompletedTrials` if no trials have been completed.
    pub fn best_params(&self) -> Result<HashMap<String, ParamValue>> {
        self.best_trial().map(|t| t.params)
    }

    /// Return the top `n` completed trials, best first.
    ///
    /// If fewer than `n` completed trials exist, returns all of them.
    ///
    /// # Examples
    ///
    /// ```
    /// use optimizer_distributed::prelude::*;
    ///
    /// let mut study = Study::new(Direction::Minimize);
    /// for value in [5.0, 1.0, 3.0] {
    ///     let id = study.ask();
    ///     study.tell(id, TrialOutcome::Complete(value)).unwrap();
    /// }
    ///
    /// let top2 = study.top_trials(2);
    /// assert_eq!(top2.len(), 2);
    /// assert_eq!(top2[0].value, Some(1.0));
    /// assert_eq!(top2[1].value, Some(3.0));
    /// ```
    #[must_use]
    pub fn top_trials(&self, n: usize) -> Vec<TrialRecord> {
        let direction = self.direction;
        let mut complete: Vec<(&TrialRecord, f64)> = self
            .storage
            .trials()
            .iter()
            .filter(|t| t.state == TrialState::Complete)
            .filter_map(|t| t.value.map(|v| (t, v)))
            .collect();
        complete.sort_by(|(_, a), (_, b)| {
            if direction.is_better(*a, *b) {
                core::cmp::Ordering::Less
            } else if direction.is_better(*b, *a) {
                core::cmp::Ordering::Greater
            } else {
                core::cmp::Ordering::Equal
            }
        });
        complete.into_iter().take(n).map(|(t, _)| t.clone()).collect()
    }
}
