//! Wire types exchanged between a worker's trial proxy and the coordinator.

use std::collections::HashMap;
use std::time::SystemTime;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::distribution::{Distribution, FloatDistribution, IntDistribution};
use crate::error::Error;
use crate::param::{AttrValue, ParamValue};

/// Identifies one request on a trial channel so its reply can be matched.
///
/// Ids are unique per channel and strictly increasing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CorrelationId(pub(crate) u64);

impl core::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An operation a worker asks the coordinator to perform on its trial.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum Request {
    /// Suggest a float parameter.
    SuggestFloat {
        /// Parameter name.
        name: String,
        /// Distribution to sample from.
        distribution: FloatDistribution,
    },
    /// Suggest an integer parameter.
    SuggestInt {
        /// Parameter name.
        name: String,
        /// Distribution to sample from.
        distribution: IntDistribution,
    },
    /// Suggest the index of a categorical choice.
    SuggestCategorical {
        /// Parameter name.
        name: String,
        /// Number of choices the worker holds.
        n_choices: usize,
    },
    /// Record an intermediate value.
    ReportIntermediate {
        /// Step the value belongs to.
        step: u64,
        /// The intermediate objective value.
        value: f64,
    },
    /// Ask the pruner for a decision.
    ShouldPrune,
    /// Attach a user attribute to the trial.
    SetUserAttr {
        /// Attribute key.
        key: String,
        /// Attribute value.
        value: AttrValue,
    },
    /// Read the parameters suggested so far.
    GetParams,
    /// Read the user attributes set so far.
    GetUserAttrs,
    /// Read the distributions of the parameters suggested so far.
    GetDistributions,
    /// Read when the trial started running.
    GetStartedAt,
}

impl Request {
    /// Short name used in logs and protocol errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Request::SuggestFloat { .. } => "suggest_float",
            Request::SuggestInt { .. } => "suggest_int",
            Request::SuggestCategorical { .. } => "suggest_categorical",
            Request::ReportIntermediate { .. } => "report_intermediate",
            Request::ShouldPrune => "should_prune",
            Request::SetUserAttr { .. } => "set_user_attr",
            Request::GetParams => "get_params",
            Request::GetUserAttrs => "get_user_attrs",
            Request::GetDistributions => "get_distributions",
            Request::GetStartedAt => "get_started_at",
        }
    }
}

/// Classification of a coordinator-side failure relayed back to a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorKind {
    /// The distribution was rejected (bounds, log scale, step, empty choices).
    InvalidParameter,
    /// The parameter was already suggested with a different distribution.
    ParameterConflict,
    /// The trial is no longer writable or does not exist.
    TrialFinished,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Classifies a study error.
    #[must_use]
    pub fn of(error: &Error) -> Self {
        match error {
            Error::InvalidBounds { .. }
            | Error::InvalidLogBounds
            | Error::InvalidStep
            | Error::EmptyChoices => ErrorKind::InvalidParameter,
            Error::ParameterConflict { .. } => ErrorKind::ParameterConflict,
            Error::TrialNotFound(_) | Error::InvalidTransition { .. } => ErrorKind::TrialFinished,
            _ => ErrorKind::Internal,
        }
    }
}

/// The coordinator's answer to one [`Request`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "data", rename_all = "snake_case"))]
pub enum Response {
    /// A suggested parameter value.
    Value(ParamValue),
    /// A pruning decision.
    Bool(bool),
    /// The write was applied.
    Ack,
    /// The trial's parameters.
    Params(HashMap<String, ParamValue>),
    /// The trial's user attributes.
    UserAttrs(HashMap<String, AttrValue>),
    /// The trial's parameter distributions.
    Distributions(HashMap<String, Distribution>),
    /// When the trial started running.
    StartedAt(Option<SystemTime>),
    /// The request failed on the coordinator.
    Error(ErrorKind, String),
}

impl Response {
    /// Wraps a study error so it can travel back to the worker.
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        let message = match error {
            Error::ParameterConflict { reason, .. } => reason.clone(),
            other => other.to_string(),
        };
        Response::Error(ErrorKind::of(error), message)
    }
}

/// A request tagged with its origin, as it travels through the shared inbox.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Envelope {
    /// Trial the request belongs to.
    pub trial_id: u64,
    /// Id the reply must carry.
    pub correlation_id: CorrelationId,
    /// The operation itself.
    pub request: Request,
}

/// A response tagged with the id of the request it answers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reply {
    /// Id of the answered request.
    pub correlation_id: CorrelationId,
    /// The answer.
    pub response: Response,
}
