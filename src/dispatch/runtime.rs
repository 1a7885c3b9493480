use core::future::Future;
use core::marker::PhantomData;
use core::pin::Pin;
use std::sync::Arc;

use tokio::runtime::Handle;

use super::{
    DispatchError, Executor, Job, Launch, TaskHandle, TaskOutcome, classify, panic_message,
    task_pair,
};
use crate::error::{Error, Result};
use crate::remote::RemoteTrial;
use crate::trial::TrialApi;

/// Runs jobs on a tokio runtime's blocking thread pool.
///
/// Blocking objectives wait on channel round trips, so they go through
/// [`Handle::spawn_blocking`] rather than onto the async workers. Each of
/// them holds a pool thread until it returns; async objectives run through
/// [`DistributedStudy::optimize_on_runtime`](crate::DistributedStudy::optimize_on_runtime)
/// instead and hold none while they wait.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    /// Creates an executor for the given runtime.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Creates an executor for the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] when called outside a tokio runtime.
    pub fn current() -> core::result::Result<Self, DispatchError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| DispatchError::new("tokio", e.to_string()))
    }
}

impl Executor for TokioExecutor {
    fn spawn(&self, job: Job) -> core::result::Result<(), DispatchError> {
        // Completion is observed through the task handle, not the join handle.
        drop(self.handle.spawn_blocking(job));
        Ok(())
    }

    fn name(&self) -> &str {
        "tokio"
    }
}

/// The future an async objective returns for one trial.
///
/// It borrows the trial for as long as it runs:
///
/// ```
/// use optimizer_distributed::dispatch::TrialFuture;
/// use optimizer_distributed::{Error, RemoteTrial};
///
/// fn objective(trial: &mut RemoteTrial) -> TrialFuture<'_, Error> {
///     Box::pin(async move {
///         let x = trial.suggest_float_async("x", -1.0, 1.0).await?;
///         Ok(x * x)
///     })
/// }
/// ```
pub type TrialFuture<'t, E> =
    Pin<Box<dyn Future<Output = core::result::Result<f64, E>> + Send + 't>>;

/// Runs an async objective against `trial` and classifies the result.
///
/// The objective runs in a task of its own, so a panic inside it is reported
/// as a failure. The trial's channel is closed once the objective returns.
pub async fn run_trial_async<F, E>(objective: Arc<F>, mut trial: RemoteTrial) -> TaskOutcome
where
    F: for<'t> Fn(&'t mut RemoteTrial) -> TrialFuture<'t, E> + Send + Sync + 'static,
    E: ToString + 'static,
{
    let attempt = tokio::spawn(async move {
        let result = objective(&mut trial).await;
        let pruned = trial.was_pruned();
        trial.close();
        classify(result, pruned)
    });
    match attempt.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            TaskOutcome::Failed(Error::TaskPanicked(panic_message(&*e.into_panic())).to_string())
        }
        Err(e) => TaskOutcome::Failed(Error::TaskPanicked(e.to_string()).to_string()),
    }
}

/// Runs an async objective as a task on a tokio runtime.
pub(crate) struct Spawned<F, E> {
    runtime: Handle,
    objective: Arc<F>,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> Spawned<F, E> {
    pub(crate) fn new(runtime: Handle, objective: F) -> Self {
        Self {
            runtime,
            objective: Arc::new(objective),
            _error: PhantomData,
        }
    }
}

impl<F, E> Launch for Spawned<F, E>
where
    F: for<'t> Fn(&'t mut RemoteTrial) -> TrialFuture<'t, E> + Send + Sync + 'static,
    E: ToString + 'static,
{
    fn launch(&self, trial: RemoteTrial) -> Result<TaskHandle> {
        let (handle, completion) = task_pair(trial.id());
        let objective = Arc::clone(&self.objective);
        drop(self.runtime.spawn(async move {
            let outcome = if completion.begin() {
                run_trial_async(objective, trial).await
            } else {
                TaskOutcome::Cancelled
            };
            completion.finish(outcome);
        }));
        Ok(handle)
    }

    fn name(&self) -> &str {
        "tokio-tasks"
    }

    fn parallelism(&self) -> Option<usize> {
        None
    }
}
