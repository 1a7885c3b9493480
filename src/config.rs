//! Options for [`DistributedStudy::optimize_with`](crate::DistributedStudy::optimize_with).

use std::sync::Arc;
use std::time::Duration;

/// Which objective failures the optimization absorbs.
///
/// An absorbed failure marks its trial `Failed` and the run goes on. Any
/// other failure is still recorded as `Failed`, then aborts the run with
/// [`Error::Objective`](crate::Error::Objective).
#[derive(Clone, Default)]
pub enum Catch {
    /// Absorb every objective failure.
    #[default]
    All,
    /// Absorb nothing; the first failure aborts the run.
    None,
    /// Absorb failures whose message satisfies the predicate.
    Matching(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl Catch {
    /// Builds a [`Catch::Matching`] policy from a predicate.
    pub fn matching(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Catch::Matching(Arc::new(predicate))
    }

    /// Returns `true` if a failure with `message` should be absorbed.
    #[must_use]
    pub fn absorbs(&self, message: &str) -> bool {
        match self {
            Catch::All => true,
            Catch::None => false,
            Catch::Matching(predicate) => predicate(message),
        }
    }
}

impl core::fmt::Debug for Catch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Catch::All => f.write_str("All"),
            Catch::None => f.write_str("None"),
            Catch::Matching(_) => f.write_str("Matching(..)"),
        }
    }
}

/// Configuration of one distributed optimization run.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use optimizer_distributed::{Catch, OptimizeConfig};
///
/// let config = OptimizeConfig::new()
///     .n_jobs(4)
///     .catch(Catch::matching(|msg| msg.contains("diverged")))
///     .timeout(Duration::from_secs(30));
/// assert_eq!(config.n_jobs, 4);
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct OptimizeConfig {
    /// Maximum number of trials running at once. `0` means one per job the
    /// executor can run in parallel, or one per available CPU when the
    /// executor does not say.
    pub n_jobs: usize,
    /// Which objective failures to absorb.
    pub catch: Catch,
    /// Stop dispatching new trials after this long; running trials finish.
    pub timeout: Option<Duration>,
    /// How long the coordinator waits in silence before logging the trials
    /// it is still waiting on.
    pub heartbeat_interval: Duration,
}

impl OptimizeConfig {
    /// Default heartbeat interval.
    pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(60);

    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            n_jobs: 0,
            catch: Catch::All,
            timeout: None,
            heartbeat_interval: Self::DEFAULT_HEARTBEAT,
        }
    }

    /// Sets the maximum number of concurrently running trials.
    pub fn n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    /// Sets which objective failures to absorb.
    pub fn catch(mut self, catch: Catch) -> Self {
        self.catch = catch;
        self
    }

    /// Stops dispatching new trials after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the heartbeat interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// The concurrency ceiling `n_jobs` resolves to on an executor with the
    /// given [`parallelism`](crate::dispatch::Executor::parallelism).
    ///
    /// A known parallelism caps `n_jobs`. Without one, `n_jobs` is taken as
    /// given and only `0` falls back to the local CPU count.
    #[must_use]
    pub fn max_concurrency(&self, parallelism: Option<usize>) -> usize {
        match (self.n_jobs, parallelism) {
            (0, Some(cap)) => cap.max(1),
            (0, None) => std::thread::available_parallelism().map_or(1, usize::from),
            (n_jobs, Some(cap)) => n_jobs.min(cap.max(1)),
            (n_jobs, None) => n_jobs,
        }
    }
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self::new()
    }
}
