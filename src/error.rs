use crate::relay::ErrorKind;
use crate::types::TrialState;

/// Errors produced by studies, the relay channel and the coordinator.
///
/// Errors fall into two scopes. Trial-scoped errors ([`Error::is_trial_scoped`])
/// end a single trial and are recorded in storage; everything else belongs to
/// the execution substrate and aborts the running `optimize` call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when log scale is used with non-positive bounds.
    #[error("invalid log bounds: low must be positive for log scale")]
    InvalidLogBounds,

    /// Returned when step size is not positive.
    #[error("invalid step: step must be positive")]
    InvalidStep,

    /// Returned when categorical choices are empty.
    #[error("categorical choices cannot be empty")]
    EmptyChoices,

    /// Returned when a parameter is suggested with a different configuration.
    #[error("parameter conflict for '{name}': {reason}")]
    ParameterConflict {
        /// The name of the conflicting parameter.
        name: String,
        /// The reason for the conflict.
        reason: String,
    },

    /// Returned when requesting the best trial but no trials have completed.
    #[error("no completed trials available")]
    NoCompletedTrials,

    /// Returned when storage holds no trial with the given id.
    #[error("trial {0} does not exist")]
    TrialNotFound(u64),

    /// Returned when a trial would move backwards or out of a terminal state.
    #[error("trial {trial_id}: illegal state transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// The trial whose state was being changed.
        trial_id: u64,
        /// The current state.
        from: TrialState,
        /// The rejected target state.
        to: TrialState,
    },

    /// Returned when a trial is pruned (stopped early by the pruner).
    #[error("trial was pruned")]
    TrialPruned,

    /// The objective function failed inside a trial.
    #[error("objective failed: {0}")]
    Objective(String),

    /// The coordinator rejected a request and relayed the reason to the worker.
    #[error("coordinator rejected request ({kind:?}): {message}")]
    Remote {
        /// Classification of the coordinator-side failure.
        kind: ErrorKind,
        /// Human readable reason.
        message: String,
    },

    /// The executor could not schedule a trial.
    #[error("worker dispatch failed: {0}")]
    WorkerDispatch(String),

    /// The peer side of a trial channel has gone away.
    #[error("trial channel closed")]
    ChannelClosed,

    /// A message violated the request/response protocol.
    #[error("channel protocol violation: {0}")]
    ChannelProtocol(String),

    /// A worker task panicked.
    #[error("worker task panicked: {0}")]
    TaskPanicked(String),

    /// The sampler, pruner or storage panicked while the coordinator served a
    /// request.
    #[error("study panicked while serving a request: {0}")]
    StudyPanicked(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl Error {
    /// Returns `true` for errors that only end the trial they happened in.
    ///
    /// Substrate errors (dispatch failures, protocol violations) are not
    /// trial-scoped: they abort the whole `optimize` call.
    #[must_use]
    pub fn is_trial_scoped(&self) -> bool {
        !matches!(
            self,
            Self::WorkerDispatch(_)
                | Self::ChannelProtocol(_)
                | Self::StudyPanicked(_)
                | Self::Internal(_)
        )
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Convenience type for signalling a pruned trial from an objective function.
///
/// Implements `Into<Error>` so it can be used with `?` in objectives that
/// return `Result<V, Error>`.
///
/// # Examples
///
/// ```
/// use optimizer_distributed::{Error, TrialPruned};
///
/// fn objective_that_prunes() -> Result<f64, Error> {
///     // ... some computation ...
///     Err(TrialPruned)?
/// }
/// ```
#[derive(Debug)]
pub struct TrialPruned;

impl core::fmt::Display for TrialPruned {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "trial was pruned")
    }
}

impl From<TrialPruned> for Error {
    fn from(_: TrialPruned) -> Self {
        Error::TrialPruned
    }
}

/// Returns `true` if the error represents a pruned trial.
///
/// Checks via `Any` downcasting whether `e` is `Error::TrialPruned` or
/// the standalone `TrialPruned` struct.
pub(crate) fn is_trial_pruned<E: 'static>(e: &E) -> bool {
    let any: &dyn core::any::Any = e;
    if let Some(err) = any.downcast_ref::<Error>() {
        matches!(err, Error::TrialPruned)
    } else {
        any.downcast_ref::<TrialPruned>().is_some()
    }
}
