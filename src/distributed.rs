//! Running a study's trials concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::aggregator::BestTrialCache;
use crate::config::OptimizeConfig;
use crate::coordinator::{Coordinator, CoordinatorState};
#[cfg(feature = "async")]
use crate::dispatch::{Spawned, TrialFuture};
use crate::dispatch::{Blocking, Dispatcher, Executor, Launch, ThreadExecutor};
use crate::error::{Error, Result};
use crate::param::{AttrValue, ParamValue};
use crate::remote::RemoteTrial;
use crate::study::{Study, TrialOutcome};
use crate::trial::TrialRecord;
use crate::types::{Direction, TrialState};

/// A [`Study`] whose trials run concurrently on an [`Executor`].
///
/// The wrapped study keeps its sampler, pruner and storage. Only the
/// coordinator inside [`optimize`](Self::optimize) touches it while trials
/// run; objectives see a [`RemoteTrial`] whose operations are relayed to the
/// coordinator and served one at a time. Samplers, pruners and storage
/// therefore never need to be thread-safe.
///
/// # Examples
///
/// ```
/// use optimizer_distributed::prelude::*;
///
/// let study = Study::builder()
///     .minimize()
///     .sampler(RandomSampler::with_seed(3))
///     .build();
/// let mut study = DistributedStudy::from_study(study, None);
///
/// study
///     .optimize(20, 4, |trial: &mut RemoteTrial| {
///         let x = trial.suggest_float("x", -10.0, 10.0)?;
///         Ok::<_, Error>(x * x)
///     })
///     .unwrap();
///
/// assert_eq!(study.trials().len(), 20);
/// assert!(study.best_value().unwrap() >= 0.0);
/// ```
pub struct DistributedStudy {
    study: Study,
    dispatcher: Dispatcher,
    best: Mutex<BestTrialCache>,
    last_run: Option<CoordinatorState>,
}

impl core::fmt::Debug for DistributedStudy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DistributedStudy")
            .field("study", &self.study)
            .field("executor", &self.dispatcher.executor_name())
            .field("last_run", &self.last_run)
            .finish_non_exhaustive()
    }
}

impl DistributedStudy {
    /// Wraps `study`. Trials run on `executor`, or on one OS thread each when
    /// `None`.
    #[must_use]
    pub fn from_study(study: Study, executor: Option<Arc<dyn Executor>>) -> Self {
        let executor = executor.unwrap_or_else(|| Arc::new(ThreadExecutor::new()));
        let mut best = BestTrialCache::new(study.direction());
        best.best(&study);
        Self {
            study,
            dispatcher: Dispatcher::new(executor),
            best: Mutex::new(best),
            last_run: None,
        }
    }

    /// Runs `n_trials` trials with at most `n_jobs` of them at once.
    ///
    /// `n_jobs == 0` uses one job per available CPU. Objective failures are
    /// absorbed; see [`optimize_with`](Self::optimize_with) for other
    /// policies.
    ///
    /// # Errors
    ///
    /// Returns `WorkerDispatch` if the executor refuses a trial, and
    /// `ChannelProtocol` if a worker breaks the request protocol. Every
    /// unfinished trial is marked `Failed` first.
    pub fn optimize<F, E>(&mut self, n_trials: usize, n_jobs: usize, objective: F) -> Result<()>
    where
        F: Fn(&mut RemoteTrial) -> core::result::Result<f64, E> + Send + Sync + 'static,
        E: ToString + 'static,
    {
        self.optimize_with(n_trials, &OptimizeConfig::new().n_jobs(n_jobs), objective)
    }

    /// Runs `n_trials` trials as configured by `config`.
    ///
    /// # Errors
    ///
    /// As [`optimize`](Self::optimize), plus `Objective` for a failure the
    /// configured [`Catch`](crate::Catch) policy does not absorb. That trial is
    /// recorded as `Failed` before the error is returned.
    pub fn optimize_with<F, E>(
        &mut self,
        n_trials: usize,
        config: &OptimizeConfig,
        objective: F,
    ) -> Result<()>
    where
        F: Fn(&mut RemoteTrial) -> core::result::Result<f64, E> + Send + Sync + 'static,
        E: ToString + 'static,
    {
        let launcher = Blocking::new(self.dispatcher.clone(), objective);
        self.run(n_trials, config, launcher)
    }

    /// Runs `n_trials` async objectives as tasks on `runtime`.
    ///
    /// A trial waiting for the coordinator suspends its task and holds no
    /// thread, so `n_jobs` may exceed the runtime's thread count. The
    /// executor given to [`from_study`](Self::from_study) is not used, and
    /// `n_jobs == 0` means one job per available CPU.
    ///
    /// The calling thread runs the coordinator and blocks until the run
    /// ends. Call it from outside the runtime, or from
    /// [`spawn_blocking`](tokio::task::spawn_blocking).
    ///
    /// # Examples
    ///
    /// ```
    /// use optimizer_distributed::prelude::*;
    ///
    /// let runtime = tokio::runtime::Builder::new_multi_thread()
    ///     .worker_threads(1)
    ///     .build()
    ///     .unwrap();
    /// let mut study = DistributedStudy::from_study(Study::new(Direction::Minimize), None);
    ///
    /// study
    ///     .optimize_on_runtime(
    ///         runtime.handle(),
    ///         8,
    ///         &OptimizeConfig::new().n_jobs(8),
    ///         |trial: &mut RemoteTrial| {
    ///             Box::pin(async move {
    ///                 let x = trial.suggest_float_async("x", -2.0, 2.0).await?;
    ///                 Ok::<_, Error>(x * x)
    ///             })
    ///         },
    ///     )
    ///     .unwrap();
    ///
    /// assert_eq!(study.trials().len(), 8);
    /// ```
    ///
    /// # Errors
    ///
    /// As [`optimize_with`](Self::optimize_with).
    #[cfg(feature = "async")]
    pub fn optimize_on_runtime<F, E>(
        &mut self,
        runtime: &tokio::runtime::Handle,
        n_trials: usize,
        config: &OptimizeConfig,
        objective: F,
    ) -> Result<()>
    where
        F: for<'t> Fn(&'t mut RemoteTrial) -> TrialFuture<'t, E> + Send + Sync + 'static,
        E: ToString + 'static,
    {
        let launcher = Spawned::new(runtime.clone(), objective);
        self.run(n_trials, config, launcher)
    }

    fn run<L: Launch>(&mut self, n_trials: usize, config: &OptimizeConfig, launcher: L) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "optimize",
            n_trials,
            n_jobs = config.max_concurrency(launcher.parallelism()),
            executor = launcher.name()
        )
        .entered();

        let best = self.best.get_mut();
        let coordinator = Coordinator::new(&mut self.study, best, launcher, n_trials, config);
        let result = coordinator.run();
        if result.is_err() {
            self.best.get_mut().invalidate();
        }
        self.last_run = Some(result?);
        Ok(())
    }

    /// Counters of the last successful [`optimize`](Self::optimize) call.
    #[must_use]
    pub fn last_run(&self) -> Option<CoordinatorState> {
        self.last_run
    }

    /// Return the optimization direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.study.direction()
    }

    /// Return the completed trial with the best value.
    ///
    /// # Errors
    ///
    /// Returns `NoCompletedTrials` if no trial has completed.
    pub fn best_trial(&self) -> Result<TrialRecord> {
        let (id, _) = self.best_entry()?;
        self.study.trial(id).cloned()
    }

    /// Return the best objective value.
    ///
    /// # Errors
    ///
    /// Returns `NoCompletedTrials` if no trial has completed.
    pub fn best_value(&self) -> Result<f64> {
        self.best_entry().map(|(_, value)| value)
    }

    /// Return the parameters of the best trial.
    ///
    /// # Errors
    ///
    /// Returns `NoCompletedTrials` if no trial has completed.
    pub fn best_params(&self) -> Result<HashMap<String, ParamValue>> {
        self.best_trial().map(|t| t.params)
    }

    fn best_entry(&self) -> Result<(u64, f64)> {
        self.best
            .lock()
            .best(&self.study)
            .ok_or(Error::NoCompletedTrials)
    }

    /// Return every finished trial, ordered by id.
    #[must_use]
    pub fn trials(&self) -> Vec<TrialRecord> {
        self.study
            .trials()
            .iter()
            .filter(|t| t.state.is_finished())
            .cloned()
            .collect()
    }

    /// Return the trials whose state is one of `states`.
    #[must_use]
    pub fn get_trials(&self, states: &[TrialState]) -> Vec<TrialRecord> {
        self.study.get_trials(states)
    }

    /// Return the study-level user attributes.
    #[must_use]
    pub fn user_attrs(&self) -> &HashMap<String, AttrValue> {
        self.study.user_attrs()
    }

    /// Set a study-level user attribute.
    pub fn set_user_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.study.set_user_attr(key, value);
    }

    /// Create a trial outside of [`optimize`](Self::optimize). See [`Study::ask`].
    pub fn ask(&mut self) -> u64 {
        self.study.ask()
    }

    /// Record a trial created with [`ask`](Self::ask). See [`Study::tell`].
    ///
    /// # Errors
    ///
    /// As [`Study::tell`].
    pub fn tell(&mut self, trial_id: u64, outcome: TrialOutcome) -> Result<TrialRecord> {
        let record = self.study.tell(trial_id, outcome)?;
        self.best.get_mut().invalidate();
        Ok(record)
    }

    /// Enqueue a parameter configuration. See [`Study::enqueue`].
    pub fn enqueue(&mut self, params: HashMap<String, ParamValue>) {
        self.study.enqueue(params);
    }

    /// The wrapped study.
    #[must_use]
    pub fn study(&self) -> &Study {
        &self.study
    }

    /// Unwraps the study.
    #[must_use]
    pub fn into_study(self) -> Study {
        self.study
    }
}
