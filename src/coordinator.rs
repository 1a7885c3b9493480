//! The driver loop of a distributed optimization run.
//!
//! The coordinator is the only code that touches the [`Study`]. Workers run
//! objectives against [`RemoteTrial`] proxies whose operations arrive here as
//! requests on one shared [`Inbox`]. The loop waits on that inbox and on every
//! running task's handle at once, so a request and a completion are handled
//! in the order they become ready, one at a time.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvError, Select};

use crate::aggregator::BestTrialCache;
use crate::config::{Catch, OptimizeConfig};
use crate::dispatch::{Launch, TaskHandle, TaskOutcome, panic_message};
use crate::distribution::{CategoricalDistribution, Distribution};
use crate::error::{Error, Result};
use crate::relay::{CorrelationId, Envelope, Inbox, ReplyHandle, Request, Response, trial_channel};
use crate::remote::RemoteTrial;
use crate::study::{Study, TrialOutcome, trace_finished};

/// Upper bound on how long a reply to a closed channel waits for the task's
/// outcome before the run is declared broken.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Counters of one run.
///
/// `running` never exceeds `max_concurrency`, and `dispatched` never exceeds
/// `n_trials`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoordinatorState {
    /// Trials requested for this run.
    pub n_trials: usize,
    /// Trials handed to the executor so far.
    pub dispatched: usize,
    /// Trials currently on a worker.
    pub running: usize,
    /// Trials whose outcome has been recorded.
    pub completed: usize,
    /// Concurrency ceiling of this run.
    pub max_concurrency: usize,
}

impl CoordinatorState {
    fn has_capacity(&self) -> bool {
        self.dispatched < self.n_trials && self.running < self.max_concurrency
    }
}

/// A trial currently running on a worker.
struct WorkerTask {
    trial_id: u64,
    slot: usize,
    replies: ReplyHandle,
    handle: TaskHandle,
}

enum Event {
    Request(core::result::Result<Envelope, RecvError>),
    Resolved(usize, core::result::Result<TaskOutcome, RecvError>),
    Idle,
}

pub(crate) struct Coordinator<'a, L> {
    study: &'a mut Study,
    best: &'a mut BestTrialCache,
    launcher: L,
    catch: Catch,
    heartbeat: Duration,
    deadline: Option<Instant>,
    timed_out: bool,
    inbox: Inbox,
    tasks: Vec<WorkerTask>,
    free_slots: Vec<usize>,
    state: CoordinatorState,
}

impl<'a, L: Launch> Coordinator<'a, L> {
    pub(crate) fn new(
        study: &'a mut Study,
        best: &'a mut BestTrialCache,
        launcher: L,
        n_trials: usize,
        config: &OptimizeConfig,
    ) -> Self {
        let max_concurrency = config.max_concurrency(launcher.parallelism());
        Self {
            study,
            best,
            launcher,
            catch: config.catch.clone(),
            heartbeat: config.heartbeat_interval,
            deadline: config.timeout.map(|t| Instant::now() + t),
            timed_out: false,
            inbox: Inbox::new(),
            tasks: Vec::with_capacity(max_concurrency),
            free_slots: (0..max_concurrency).rev().collect(),
            state: CoordinatorState {
                n_trials,
                max_concurrency,
                ..CoordinatorState::default()
            },
        }
    }

    /// Runs until every trial has finished, or until a fatal error.
    ///
    /// On error every trial still open in the study is marked `Failed`
    /// before the error is returned.
    pub(crate) fn run(mut self) -> Result<CoordinatorState> {
        match self.drive() {
            Ok(()) => Ok(self.state),
            Err(err) => {
                self.abort(&err);
                Err(err)
            }
        }
    }

    fn drive(&mut self) -> Result<()> {
        loop {
            while self.may_dispatch() {
                self.dispatch()?;
            }
            if self.tasks.is_empty() {
                trace_info!(
                    completed = self.state.completed,
                    dispatched = self.state.dispatched,
                    "optimization finished"
                );
                return Ok(());
            }
            match self.next_event() {
                Event::Request(Ok(envelope)) => self.serve(envelope)?,
                Event::Request(Err(RecvError)) => {
                    return Err(Error::Internal("request inbox disconnected"));
                }
                Event::Resolved(index, received) => {
                    let outcome = self.tasks[index].handle.resolve(received);
                    self.finalize(index, outcome)?;
                }
                Event::Idle => self.heartbeat(),
            }
        }
    }

    fn may_dispatch(&mut self) -> bool {
        if !self.state.has_capacity() {
            return false;
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            if !self.timed_out {
                self.timed_out = true;
                trace_info!(
                    dispatched = self.state.dispatched,
                    running = self.state.running,
                    "timeout reached, no new trials"
                );
            }
            return false;
        }
        true
    }

    fn dispatch(&mut self) -> Result<()> {
        let slot = self
            .free_slots
            .pop()
            .ok_or(Error::Internal("no free worker slot"))?;
        let trial_id = self.study.ask();
        let (endpoint, replies) = trial_channel(trial_id, &self.inbox);

        let handle = match self.launcher.launch(RemoteTrial::new(endpoint)) {
            Ok(handle) => handle,
            Err(err) => {
                self.free_slots.push(slot);
                self.study
                    .tell(trial_id, TrialOutcome::Failed(err.to_string()))?;
                return Err(err);
            }
        };
        // Requests from this trial are only read once this returns.
        self.study.start(trial_id)?;

        self.state.dispatched += 1;
        self.state.running += 1;
        self.tasks.push(WorkerTask {
            trial_id,
            slot,
            replies,
            handle,
        });
        trace_debug!(
            trial_id,
            slot,
            executor = self.launcher.name(),
            "trial dispatched"
        );
        Ok(())
    }

    fn next_event(&self) -> Event {
        let mut select = Select::new();
        let inbox = select.recv(self.inbox.receiver());
        for task in &self.tasks {
            select.recv(task.handle.receiver());
        }
        match select.select_timeout(self.heartbeat) {
            Err(_) => Event::Idle,
            Ok(op) if op.index() == inbox => Event::Request(op.recv(self.inbox.receiver())),
            Ok(op) => {
                let index = op.index() - 1;
                Event::Resolved(index, op.recv(self.tasks[index].handle.receiver()))
            }
        }
    }

    fn serve(&mut self, envelope: Envelope) -> Result<()> {
        let Envelope {
            trial_id,
            correlation_id,
            request,
        } = envelope;
        let Some(index) = self.tasks.iter().position(|t| t.trial_id == trial_id) else {
            return Err(Error::ChannelProtocol(format!(
                "request {correlation_id} from trial {trial_id}, which is not running"
            )));
        };
        trace_debug!(trial_id, %correlation_id, request = request.kind(), "serving request");

        // A panicking sampler or pruner must not skip the abort path.
        let response = panic::catch_unwind(AssertUnwindSafe(|| self.answer(trial_id, request)))
            .map_err(|payload| Error::StudyPanicked(panic_message(&*payload)))?;
        match self.tasks[index].replies.reply(correlation_id, response) {
            Err(Error::ChannelClosed) => self.closed_during(index, correlation_id),
            other => other,
        }
    }

    /// The worker dropped its endpoint before reading the reply. That is only
    /// legitimate if its task has ended.
    fn closed_during(&mut self, index: usize, correlation_id: CorrelationId) -> Result<()> {
        let grace = self.heartbeat.min(CLOSE_GRACE);
        match self.tasks[index].handle.wait_timeout(grace) {
            Some(outcome) => self.finalize(index, outcome),
            None => Err(Error::ChannelProtocol(format!(
                "trial {} closed its channel with request {correlation_id} outstanding",
                self.tasks[index].trial_id
            ))),
        }
    }

    /// Maps a request onto the study. Errors become error responses; they are
    /// the objective's to handle.
    fn answer(&mut self, trial_id: u64, request: Request) -> Response {
        let study = &mut *self.study;
        let result = match request {
            Request::SuggestFloat { name, distribution } => study
                .suggest(trial_id, &name, Distribution::Float(distribution))
                .map(Response::Value),
            Request::SuggestInt { name, distribution } => study
                .suggest(trial_id, &name, Distribution::Int(distribution))
                .map(Response::Value),
            Request::SuggestCategorical { name, n_choices } => study
                .suggest(
                    trial_id,
                    &name,
                    Distribution::Categorical(CategoricalDistribution { n_choices }),
                )
                .map(Response::Value),
            Request::ReportIntermediate { step, value } => study
                .report(trial_id, step, value)
                .map(|()| Response::Ack),
            Request::ShouldPrune => study.should_prune(trial_id).map(Response::Bool),
            Request::SetUserAttr { key, value } => study
                .set_trial_user_attr(trial_id, &key, value)
                .map(|()| Response::Ack),
            Request::GetParams => study.trial(trial_id).map(|t| Response::Params(t.params.clone())),
            Request::GetUserAttrs => study
                .trial(trial_id)
                .map(|t| Response::UserAttrs(t.user_attrs.clone())),
            Request::GetDistributions => study
                .trial(trial_id)
                .map(|t| Response::Distributions(t.distributions.clone())),
            Request::GetStartedAt => study.trial(trial_id).map(|t| Response::StartedAt(t.started_at)),
        };
        result.unwrap_or_else(|err| Response::from_error(&err))
    }

    fn finalize(&mut self, index: usize, outcome: TaskOutcome) -> Result<()> {
        let task = self.tasks.swap_remove(index);
        self.free_slots.push(task.slot);
        self.state.running -= 1;
        self.state.completed += 1;

        let (trial_outcome, failure) = match outcome {
            TaskOutcome::Completed(value) => (TrialOutcome::Complete(value), None),
            TaskOutcome::Pruned => (TrialOutcome::Pruned, None),
            TaskOutcome::Failed(message) => (TrialOutcome::Failed(message.clone()), Some(message)),
            TaskOutcome::Cancelled => (TrialOutcome::Failed("cancelled before start".into()), None),
        };
        let record = self.study.tell(task.trial_id, trial_outcome)?;
        self.best.observe(&record);
        trace_finished(&record, self.best.best(self.study));

        if let Some(message) = failure
            && !self.catch.absorbs(&message)
        {
            return Err(Error::Objective(message));
        }
        Ok(())
    }

    fn heartbeat(&self) {
        #[cfg(feature = "tracing")]
        {
            let running: Vec<u64> = self.tasks.iter().map(|t| t.trial_id).collect();
            tracing::debug!(
                ?running,
                completed = self.state.completed,
                "waiting on running trials"
            );
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn abort(&mut self, err: &Error) {
        for task in &mut self.tasks {
            task.handle.cancel();
        }
        let running = self.tasks.len();
        // Dropping the reply handles unblocks workers waiting on a response.
        self.tasks.clear();
        self.state.running = 0;
        let failed = self.study.fail_unfinished().unwrap_or_default();
        trace_warn!(error = %err, running, failed, "optimization aborted");
    }
}
