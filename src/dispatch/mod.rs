//! Handing trials to workers and observing how they end.
//!
//! An [`Executor`] is the execution substrate: it runs a [`Job`] somewhere,
//! on a thread, a runtime's blocking pool, or a remote cluster. The
//! [`Dispatcher`] wraps every job so that its outcome lands in a
//! [`TaskHandle`] the coordinator can wait on. Executors never limit
//! concurrency; the coordinator does.
//!
//! With the `async` feature, async objectives skip the executor and run as
//! tasks on a tokio runtime (see [`TrialFuture`]).

mod thread;
#[cfg(feature = "async")]
mod runtime;

use core::any::Any;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU8, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};

#[cfg(feature = "async")]
pub(crate) use runtime::Spawned;
#[cfg(feature = "async")]
pub use runtime::{TokioExecutor, TrialFuture, run_trial_async};
pub use thread::ThreadExecutor;

use crate::error::{Error, Result, is_trial_pruned};
use crate::remote::RemoteTrial;
use crate::trial::TrialApi;

/// A unit of work handed to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Returned by an [`Executor`] that could not schedule a job.
#[derive(Debug, thiserror::Error)]
#[error("{executor}: {reason}")]
pub struct DispatchError {
    executor: String,
    reason: String,
}

impl DispatchError {
    /// Creates a dispatch error for `executor`.
    pub fn new(executor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            executor: executor.into(),
            reason: reason.into(),
        }
    }
}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Error::WorkerDispatch(e.to_string())
    }
}

/// Something that can run jobs concurrently.
///
/// Implement this to run trials on a custom substrate. `spawn` must not block
/// until the job finishes.
///
/// # Examples
///
/// ```
/// use optimizer_distributed::dispatch::{DispatchError, Executor, Job};
///
/// /// Refuses everything; useful to exercise failure paths.
/// struct Offline;
///
/// impl Executor for Offline {
///     fn spawn(&self, _job: Job) -> Result<(), DispatchError> {
///         Err(DispatchError::new(self.name(), "cluster unreachable"))
///     }
///
///     fn name(&self) -> &str {
///         "offline"
///     }
/// }
/// ```
pub trait Executor: Send + Sync {
    /// Schedules `job` to run.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] if the job could not be scheduled.
    fn spawn(&self, job: Job) -> core::result::Result<(), DispatchError>;

    /// A short name for logs and errors.
    fn name(&self) -> &str;

    /// How many jobs this executor can usefully run at once, if it knows.
    ///
    /// A known value caps `n_jobs`. Executors that place jobs on other
    /// machines keep the default `None`, and `n_jobs` is honoured as given.
    fn parallelism(&self) -> Option<usize> {
        None
    }
}

/// How a dispatched task ended.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskOutcome {
    /// The objective returned a value.
    Completed(f64),
    /// The trial was pruned.
    Pruned,
    /// The objective returned an error or panicked.
    Failed(String),
    /// The task was cancelled before it started.
    Cancelled,
}

const QUEUED: u8 = 0;
const STARTED: u8 = 1;
const CANCELLED: u8 = 2;

/// Submits tasks to an [`Executor`] and hands back their handles.
#[derive(Clone)]
pub struct Dispatcher {
    executor: Arc<dyn Executor>,
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("executor", &self.executor.name())
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher on top of `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// The executor's name.
    #[must_use]
    pub fn executor_name(&self) -> &str {
        self.executor.name()
    }

    /// The executor's parallelism hint.
    #[must_use]
    pub fn parallelism(&self) -> Option<usize> {
        self.executor.parallelism()
    }

    /// Schedules `task` for `trial_id` and returns the handle its outcome
    /// will arrive on.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkerDispatch` if the executor refused the job.
    pub fn submit<T>(&self, trial_id: u64, task: T) -> Result<TaskHandle>
    where
        T: FnOnce() -> TaskOutcome + Send + 'static,
    {
        let (handle, completion) = task_pair(trial_id);
        let job: Job = Box::new(move || {
            let outcome = if completion.begin() {
                task()
            } else {
                TaskOutcome::Cancelled
            };
            completion.finish(outcome);
        });
        self.executor.spawn(job)?;
        Ok(handle)
    }
}

/// Creates a handle and the completion its task reports through.
fn task_pair(trial_id: u64) -> (TaskHandle, Completion) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let status = Arc::new(AtomicU8::new(QUEUED));
    let handle = TaskHandle {
        trial_id,
        rx,
        status: Arc::clone(&status),
        outcome: None,
    };
    (handle, Completion { tx, status })
}

/// The task side of a [`TaskHandle`].
struct Completion {
    tx: Sender<TaskOutcome>,
    status: Arc<AtomicU8>,
}

impl Completion {
    /// Marks the task started. Returns `false` if it was cancelled first.
    fn begin(&self) -> bool {
        self.status
            .compare_exchange(QUEUED, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish(self, outcome: TaskOutcome) {
        // The handle may already be gone after a fatal abort.
        let _ = self.tx.send(outcome);
    }
}

/// The pending result of one dispatched task.
#[derive(Debug)]
pub struct TaskHandle {
    trial_id: u64,
    rx: Receiver<TaskOutcome>,
    status: Arc<AtomicU8>,
    outcome: Option<TaskOutcome>,
}

impl TaskHandle {
    /// The trial this task runs.
    #[must_use]
    pub fn trial_id(&self) -> u64 {
        self.trial_id
    }

    /// Returns the outcome if the task has ended, without blocking.
    pub fn try_result(&mut self) -> Option<TaskOutcome> {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Disconnected) => self.outcome = Some(vanished()),
                Err(TryRecvError::Empty) => {}
            }
        }
        self.outcome.clone()
    }

    /// Blocks until the task ends.
    pub fn wait(&mut self) -> TaskOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        self.resolve(self.rx.recv())
    }

    /// Blocks up to `timeout` for the task to end.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<TaskOutcome> {
        if self.outcome.is_none() {
            match self.rx.recv_timeout(timeout) {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(RecvTimeoutError::Disconnected) => self.outcome = Some(vanished()),
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        self.outcome.clone()
    }

    /// Returns `true` once the outcome is known.
    pub fn is_resolved(&mut self) -> bool {
        self.try_result().is_some()
    }

    /// Cancels the task if it has not started yet.
    ///
    /// Returns `true` if the task will never run. A running task is left
    /// alone.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self
            .status
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled && self.outcome.is_none() {
            self.outcome = Some(TaskOutcome::Cancelled);
        }
        cancelled
    }

    pub(crate) fn receiver(&self) -> &Receiver<TaskOutcome> {
        &self.rx
    }

    /// Records the result of a receive the caller performed on [`receiver`](Self::receiver).
    pub(crate) fn resolve(
        &mut self,
        received: core::result::Result<TaskOutcome, RecvError>,
    ) -> TaskOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        let outcome = received.unwrap_or_else(|RecvError| vanished());
        self.outcome = Some(outcome.clone());
        outcome
    }
}

fn vanished() -> TaskOutcome {
    TaskOutcome::Failed(
        Error::TaskPanicked("worker exited without reporting an outcome".to_owned()).to_string(),
    )
}

/// Runs `objective` against `trial` and classifies the result.
///
/// Panics are caught and reported as failures. The trial's channel is closed
/// before returning, whatever happened.
pub fn run_trial<F, E>(objective: &F, mut trial: RemoteTrial) -> TaskOutcome
where
    F: Fn(&mut RemoteTrial) -> core::result::Result<f64, E>,
    E: ToString + 'static,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| objective(&mut trial)));
    let pruned = trial.was_pruned();
    trial.close();

    match result {
        Ok(result) => classify(result, pruned),
        Err(payload) => {
            TaskOutcome::Failed(Error::TaskPanicked(panic_message(&*payload)).to_string())
        }
    }
}

/// Maps what an objective returned onto a task outcome. A trial the pruner
/// stopped counts as pruned even if the objective swallowed the signal.
fn classify<E>(result: core::result::Result<f64, E>, pruned: bool) -> TaskOutcome
where
    E: ToString + 'static,
{
    match result {
        Ok(_) if pruned => TaskOutcome::Pruned,
        Ok(value) => TaskOutcome::Completed(value),
        Err(e) if is_trial_pruned(&e) => TaskOutcome::Pruned,
        Err(e) => TaskOutcome::Failed(e.to_string()),
    }
}

/// Starts one trial's objective and hands back the handle its outcome will
/// arrive on.
pub(crate) trait Launch {
    fn launch(&self, trial: RemoteTrial) -> Result<TaskHandle>;

    fn name(&self) -> &str;

    fn parallelism(&self) -> Option<usize>;
}

/// Runs a blocking objective on the dispatcher's executor.
pub(crate) struct Blocking<F, E> {
    dispatcher: Dispatcher,
    objective: Arc<F>,
    _error: PhantomData<fn() -> E>,
}

impl<F, E> Blocking<F, E> {
    pub(crate) fn new(dispatcher: Dispatcher, objective: F) -> Self {
        Self {
            dispatcher,
            objective: Arc::new(objective),
            _error: PhantomData,
        }
    }
}

impl<F, E> Launch for Blocking<F, E>
where
    F: Fn(&mut RemoteTrial) -> core::result::Result<f64, E> + Send + Sync + 'static,
    E: ToString + 'static,
{
    fn launch(&self, trial: RemoteTrial) -> Result<TaskHandle> {
        let objective = Arc::clone(&self.objective);
        self.dispatcher
            .submit(trial.id(), move || run_trial(&*objective, trial))
    }

    fn name(&self) -> &str {
        self.dispatcher.executor_name()
    }

    fn parallelism(&self) -> Option<usize> {
        self.dispatcher.parallelism()
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
