//! Core types for the optimizer library.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The direction of optimization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Minimize the objective value.
    Minimize,
    /// Maximize the objective value.
    Maximize,
}

impl Direction {
    /// Returns `true` if `candidate` is strictly better than `incumbent`.
    ///
    /// NaN is never better than anything, and nothing is better than
    /// an incumbent only when the candidate is NaN.
    #[must_use]
    pub fn is_better(self, candidate: f64, incumbent: f64) -> bool {
        if candidate.is_nan() {
            return false;
        }
        if incumbent.is_nan() {
            return true;
        }
        match self {
            Direction::Minimize => candidate < incumbent,
            Direction::Maximize => candidate > incumbent,
        }
    }
}

/// The state of a trial in its lifecycle.
///
/// A trial moves `Pending -> Running -> {Complete | Failed | Pruned}` and
/// never revisits a state. A pending trial whose dispatch failed may jump
/// straight to `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrialState {
    /// The trial has an id but has not been handed to a worker yet.
    Pending,
    /// The trial is currently running.
    Running,
    /// The trial completed successfully.
    Complete,
    /// The trial failed with an error.
    Failed,
    /// The trial was stopped early by the pruner.
    Pruned,
}

impl TrialState {
    /// Returns `true` for the terminal states.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            TrialState::Complete | TrialState::Failed | TrialState::Pruned
        )
    }

    /// Returns `true` if the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: TrialState) -> bool {
        match (self, next) {
            (TrialState::Pending, TrialState::Running | TrialState::Failed) => true,
            (TrialState::Running, next) => next.is_finished(),
            _ => false,
        }
    }
}
