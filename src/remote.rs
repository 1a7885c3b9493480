//! The trial proxy objectives use when they run on a worker.

use std::collections::HashMap;
use std::time::SystemTime;

use crate::distribution::{CategoricalDistribution, Distribution, FloatDistribution, IntDistribution};
use crate::error::{Error, Result};
use crate::param::{AttrValue, ParamValue};
use crate::relay::{ErrorKind, Request, Response, TrialEndpoint};
use crate::trial::TrialApi;

/// A trial whose every operation is a round trip to the coordinator.
///
/// `RemoteTrial` implements [`TrialApi`], so objectives written against the
/// trait run unchanged on a worker. Distributions are validated locally before
/// anything is sent; only valid requests cost a round trip.
///
/// With the `async` feature every operation also has an `_async` twin that
/// suspends the calling task, not its thread, while the coordinator answers.
///
/// Once [`should_prune`](TrialApi::should_prune) has raised the prune signal
/// the proxy remembers it, and the trial is recorded as pruned even if the
/// objective swallows the error and returns a value.
#[derive(Debug)]
pub struct RemoteTrial {
    id: u64,
    endpoint: TrialEndpoint,
    pruned: bool,
}

impl RemoteTrial {
    pub(crate) fn new(endpoint: TrialEndpoint) -> Self {
        Self {
            id: endpoint.trial_id(),
            endpoint,
            pruned: false,
        }
    }

    /// Returns `true` once the pruner has told this trial to stop.
    #[must_use]
    pub fn was_pruned(&self) -> bool {
        self.pruned
    }

    /// Closes the underlying channel; later operations fail with `ChannelClosed`.
    pub fn close(&mut self) {
        self.endpoint.close();
    }

    fn call(&mut self, request: Request) -> Result<Response> {
        let correlation_id = self.endpoint.send(request)?;
        self.endpoint.await_response(correlation_id)
    }

    fn prune_decision(&mut self, response: Response) -> Result<bool> {
        match response {
            Response::Bool(false) => Ok(false),
            Response::Bool(true) => {
                self.pruned = true;
                Err(Error::TrialPruned)
            }
            other => Err(rejected("", other, "should_prune")),
        }
    }
}

#[cfg(feature = "async")]
impl RemoteTrial {
    async fn call_async(&mut self, request: Request) -> Result<Response> {
        let correlation_id = self.endpoint.send(request)?;
        self.endpoint.await_response_async(correlation_id).await
    }

    /// Async [`suggest_float_with`](TrialApi::suggest_float_with).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn suggest_float_with_async(
        &mut self,
        name: &str,
        distribution: FloatDistribution,
    ) -> Result<f64> {
        let request = float_request(name, distribution)?;
        float_value(name, self.call_async(request).await?)
    }

    /// Async [`suggest_float`](TrialApi::suggest_float).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn suggest_float_async(&mut self, name: &str, low: f64, high: f64) -> Result<f64> {
        self.suggest_float_with_async(name, FloatDistribution::uniform(low, high))
            .await
    }

    /// Async [`suggest_int_with`](TrialApi::suggest_int_with).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn suggest_int_with_async(
        &mut self,
        name: &str,
        distribution: IntDistribution,
    ) -> Result<i64> {
        let request = int_request(name, distribution)?;
        int_value(name, self.call_async(request).await?)
    }

    /// Async [`suggest_int`](TrialApi::suggest_int).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn suggest_int_async(&mut self, name: &str, low: i64, high: i64) -> Result<i64> {
        self.suggest_int_with_async(name, IntDistribution::uniform(low, high))
            .await
    }

    /// Async [`suggest_index`](TrialApi::suggest_index).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn suggest_index_async(&mut self, name: &str, n_choices: usize) -> Result<usize> {
        let request = categorical_request(name, n_choices)?;
        index_value(name, n_choices, self.call_async(request).await?)
    }

    /// Async [`suggest_categorical`](TrialApi::suggest_categorical).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn suggest_categorical_async<T: Clone>(
        &mut self,
        name: &str,
        choices: &[T],
    ) -> Result<T> {
        let index = self.suggest_index_async(name, choices.len()).await?;
        choices
            .get(index)
            .cloned()
            .ok_or(Error::Internal("categorical index out of range"))
    }

    /// Async [`report`](TrialApi::report).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn report_async(&mut self, value: f64, step: u64) -> Result<()> {
        let request = Request::ReportIntermediate { step, value };
        acknowledged(request.kind(), self.call_async(request).await?)
    }

    /// Async [`should_prune`](TrialApi::should_prune).
    ///
    /// # Errors
    ///
    /// Returns `Error::TrialPruned` when the trial must abort.
    pub async fn should_prune_async(&mut self) -> Result<bool> {
        let response = self.call_async(Request::ShouldPrune).await?;
        self.prune_decision(response)
    }

    /// Async [`set_user_attr`](TrialApi::set_user_attr).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn set_user_attr_async(&mut self, key: &str, value: AttrValue) -> Result<()> {
        let request = Request::SetUserAttr {
            key: key.to_owned(),
            value,
        };
        acknowledged(request.kind(), self.call_async(request).await?)
    }

    /// Async [`params`](TrialApi::params).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn params_async(&mut self) -> Result<HashMap<String, ParamValue>> {
        params_of(self.call_async(Request::GetParams).await?)
    }

    /// Async [`distributions`](TrialApi::distributions).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn distributions_async(&mut self) -> Result<HashMap<String, Distribution>> {
        distributions_of(self.call_async(Request::GetDistributions).await?)
    }

    /// Async [`user_attrs`](TrialApi::user_attrs).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn user_attrs_async(&mut self) -> Result<HashMap<String, AttrValue>> {
        user_attrs_of(self.call_async(Request::GetUserAttrs).await?)
    }

    /// Async [`started_at`](TrialApi::started_at).
    ///
    /// # Errors
    ///
    /// As the blocking version.
    pub async fn started_at_async(&mut self) -> Result<Option<SystemTime>> {
        started_at_of(self.call_async(Request::GetStartedAt).await?)
    }
}

fn float_request(name: &str, distribution: FloatDistribution) -> Result<Request> {
    Distribution::Float(distribution.clone()).validate()?;
    Ok(Request::SuggestFloat {
        name: name.to_owned(),
        distribution,
    })
}

fn int_request(name: &str, distribution: IntDistribution) -> Result<Request> {
    Distribution::Int(distribution.clone()).validate()?;
    Ok(Request::SuggestInt {
        name: name.to_owned(),
        distribution,
    })
}

fn categorical_request(name: &str, n_choices: usize) -> Result<Request> {
    Distribution::Categorical(CategoricalDistribution { n_choices }).validate()?;
    Ok(Request::SuggestCategorical {
        name: name.to_owned(),
        n_choices,
    })
}

fn float_value(name: &str, response: Response) -> Result<f64> {
    match response {
        Response::Value(ParamValue::Float(v)) => Ok(v),
        other => Err(rejected(name, other, "suggest_float")),
    }
}

fn int_value(name: &str, response: Response) -> Result<i64> {
    match response {
        Response::Value(ParamValue::Int(v)) => Ok(v),
        other => Err(rejected(name, other, "suggest_int")),
    }
}

fn index_value(name: &str, n_choices: usize, response: Response) -> Result<usize> {
    match response {
        Response::Value(ParamValue::Categorical(index)) if index < n_choices => Ok(index),
        other => Err(rejected(name, other, "suggest_categorical")),
    }
}

fn acknowledged(kind: &str, response: Response) -> Result<()> {
    match response {
        Response::Ack => Ok(()),
        other => Err(rejected("", other, kind)),
    }
}

fn params_of(response: Response) -> Result<HashMap<String, ParamValue>> {
    match response {
        Response::Params(params) => Ok(params),
        other => Err(rejected("", other, "get_params")),
    }
}

fn user_attrs_of(response: Response) -> Result<HashMap<String, AttrValue>> {
    match response {
        Response::UserAttrs(attrs) => Ok(attrs),
        other => Err(rejected("", other, "get_user_attrs")),
    }
}

fn started_at_of(response: Response) -> Result<Option<SystemTime>> {
    match response {
        Response::StartedAt(at) => Ok(at),
        other => Err(rejected("", other, "get_started_at")),
    }
}

fn distributions_of(response: Response) -> Result<HashMap<String, Distribution>> {
    match response {
        Response::Distributions(distributions) => Ok(distributions),
        other => Err(rejected("", other, "get_distributions")),
    }
}

/// Turns a response that does not answer the request into an error.
fn rejected(name: &str, response: Response, request: &str) -> Error {
    match response {
        Response::Error(ErrorKind::ParameterConflict, reason) => Error::ParameterConflict {
            name: name.to_owned(),
            reason,
        },
        Response::Error(kind, message) => Error::Remote { kind, message },
        other => Error::ChannelProtocol(format!("unexpected response {other:?} to {request}")),
    }
}

impl TrialApi for RemoteTrial {
    fn id(&self) -> u64 {
        self.id
    }

    fn suggest_float_with(&mut self, name: &str, distribution: FloatDistribution) -> Result<f64> {
        let request = float_request(name, distribution)?;
        float_value(name, self.call(request)?)
    }

    fn suggest_int_with(&mut self, name: &str, distribution: IntDistribution) -> Result<i64> {
        let request = int_request(name, distribution)?;
        int_value(name, self.call(request)?)
    }

    fn suggest_index(&mut self, name: &str, n_choices: usize) -> Result<usize> {
        let request = categorical_request(name, n_choices)?;
        index_value(name, n_choices, self.call(request)?)
    }

    fn report(&mut self, value: f64, step: u64) -> Result<()> {
        let request = Request::ReportIntermediate { step, value };
        acknowledged(request.kind(), self.call(request)?)
    }

    fn should_prune(&mut self) -> Result<bool> {
        let response = self.call(Request::ShouldPrune)?;
        self.prune_decision(response)
    }

    fn set_user_attr(&mut self, key: &str, value: AttrValue) -> Result<()> {
        let request = Request::SetUserAttr {
            key: key.to_owned(),
            value,
        };
        acknowledged(request.kind(), self.call(request)?)
    }

    fn params(&mut self) -> Result<HashMap<String, ParamValue>> {
        params_of(self.call(Request::GetParams)?)
    }

    fn user_attrs(&mut self) -> Result<HashMap<String, AttrValue>> {
        user_attrs_of(self.call(Request::GetUserAttrs)?)
    }

    fn distributions(&mut self) -> Result<HashMap<String, Distribution>> {
        distributions_of(self.call(Request::GetDistributions)?)
    }

    fn started_at(&mut self) -> Result<Option<SystemTime>> {
        started_at_of(self.call(Request::GetStartedAt)?)
    }
}
