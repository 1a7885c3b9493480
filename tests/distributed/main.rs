//! Integration tests for running a study's trials concurrently.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]

use std::sync::Arc;

use optimizer_distributed::dispatch::{DispatchError, Executor, Job, ThreadExecutor};
use optimizer_distributed::prelude::*;

mod concurrency;
mod failures;
mod mutual_exclusion;
mod pass_through;
mod pruning;
mod timeout;

/// A seeded minimizing study wrapped for concurrent runs.
fn minimizing(seed: u64) -> DistributedStudy {
    let study = Study::builder()
        .minimize()
        .sampler(RandomSampler::with_seed(seed))
        .build();
    DistributedStudy::from_study(study, None)
}

/// Prints coordinator events when a test is run with `--nocapture`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("optimizer_distributed=debug")
        .with_test_writer()
        .try_init();
}

/// Runs jobs on threads until `limit` jobs were accepted, then refuses.
struct FlakyExecutor {
    inner: ThreadExecutor,
    limit: u64,
}

impl FlakyExecutor {
    fn new(limit: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: ThreadExecutor::with_name("flaky"),
            limit,
        })
    }
}

impl Executor for FlakyExecutor {
    fn spawn(&self, job: Job) -> Result<(), DispatchError> {
        if self.inner.spawned() >= self.limit {
            return Err(DispatchError::new(self.name(), "node lost"));
        }
        self.inner.spawn(job)
    }

    fn name(&self) -> &str {
        "flaky"
    }
}
