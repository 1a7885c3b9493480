use core::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::{DispatchError, Executor, Job};

/// Runs every job on its own named OS thread.
///
/// This is the default executor of
/// [`DistributedStudy`](crate::DistributedStudy). Threads are detached from
/// the caller; the executor only keeps their join handles to report how many
/// are still alive.
///
/// [`new`](Self::new) reports the local CPU count as its parallelism, so
/// `n_jobs` is capped to it. Executors built with
/// [`with_name`](Self::with_name) report none unless
/// [`max_parallelism`](Self::max_parallelism) sets one.
#[derive(Debug)]
pub struct ThreadExecutor {
    name: String,
    stack_size: Option<usize>,
    parallelism: Option<usize>,
    spawned: AtomicU64,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadExecutor {
    /// Creates an executor whose threads are named `optimizer-worker-<n>`,
    /// capped to the available CPUs.
    #[must_use]
    pub fn new() -> Self {
        let cpus = thread::available_parallelism().map_or(1, usize::from);
        Self::with_name("optimizer-worker").max_parallelism(cpus)
    }

    /// Creates an executor whose threads are named `<name>-<n>`.
    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stack_size: None,
            parallelism: None,
            spawned: AtomicU64::new(0),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Sets the stack size of worker threads, in bytes.
    #[must_use]
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Caps the number of trials run at once to `n`.
    #[must_use]
    pub fn max_parallelism(mut self, n: usize) -> Self {
        self.parallelism = Some(n);
        self
    }

    /// Number of worker threads that have not exited yet.
    #[must_use]
    pub fn active(&self) -> usize {
        let mut threads = self.threads.lock();
        threads.retain(|handle| !handle.is_finished());
        threads.len()
    }

    /// Number of jobs spawned so far.
    #[must_use]
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for ThreadExecutor {
    fn spawn(&self, job: Job) -> Result<(), DispatchError> {
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);
        let mut builder = thread::Builder::new().name(format!("{}-{n}", self.name));
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        let handle = builder
            .spawn(job)
            .map_err(|e| DispatchError::new(&self.name, format!("failed to spawn thread: {e}")))?;

        let mut threads = self.threads.lock();
        threads.retain(|handle| !handle.is_finished());
        threads.push(handle);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn parallelism(&self) -> Option<usize> {
        self.parallelism
    }
}
