use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use optimizer_distributed::distribution::Distribution;
use optimizer_distributed::storage::{MemoryStorage, Storage};
use proptest::prelude::*;

use super::*;

/// Counts overlapping calls into the wrapped storage.
struct GuardedStorage {
    inner: MemoryStorage,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
}

impl GuardedStorage {
    fn enter(&self) -> Guard {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        Guard(Arc::clone(&self.busy))
    }
}

struct Guard(Arc<AtomicBool>);

impl Drop for Guard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Storage for GuardedStorage {
    fn create_trial(&mut self) -> u64 {
        let _guard = self.enter();
        self.inner.create_trial()
    }

    fn set_state(&mut self, trial_id: u64, state: TrialState) -> optimizer_distributed::Result<()> {
        let _guard = self.enter();
        self.inner.set_state(trial_id, state)
    }

    fn set_param(
        &mut self,
        trial_id: u64,
        name: &str,
        value: ParamValue,
        distribution: Distribution,
    ) -> optimizer_distributed::Result<()> {
        let _guard = self.enter();
        self.inner.set_param(trial_id, name, value, distribution)
    }

    fn set_intermediate_value(
        &mut self,
        trial_id: u64,
        step: u64,
        value: f64,
    ) -> optimizer_distributed::Result<()> {
        let _guard = self.enter();
        self.inner.set_intermediate_value(trial_id, step, value)
    }

    fn set_user_attr(
        &mut self,
        trial_id: u64,
        key: &str,
        value: AttrValue,
    ) -> optimizer_distributed::Result<()> {
        let _guard = self.enter();
        self.inner.set_user_attr(trial_id, key, value)
    }

    fn finish(
        &mut self,
        trial_id: u64,
        state: TrialState,
        value: Option<f64>,
    ) -> optimizer_distributed::Result<TrialRecord> {
        let _guard = self.enter();
        self.inner.finish(trial_id, state, value)
    }

    fn trial(&self, trial_id: u64) -> optimizer_distributed::Result<&TrialRecord> {
        let _guard = self.enter();
        self.inner.trial(trial_id)
    }

    fn trials(&self) -> &[TrialRecord] {
        let _guard = self.enter();
        self.inner.trials()
    }
}

/// A study over guarded storage, run on threads with no parallelism cap.
fn guarded_study(overlaps: &Arc<AtomicUsize>) -> DistributedStudy {
    let storage = GuardedStorage {
        inner: MemoryStorage::new(),
        busy: Arc::new(AtomicBool::new(false)),
        overlaps: Arc::clone(overlaps),
    };
    let study = Study::builder()
        .maximize()
        .pruner(MedianPruner::new(Direction::Maximize))
        .storage(storage)
        .build();
    DistributedStudy::from_study(study, Some(Arc::new(ThreadExecutor::with_name("guarded"))))
}

#[test]
fn storage_is_never_entered_while_trials_overlap() {
    let overlaps = Arc::new(AtomicUsize::new(0));
    let mut study = guarded_study(&overlaps);
    let rendezvous = Arc::new(Barrier::new(4));
    let r = Arc::clone(&rendezvous);

    study
        .optimize(12, 4, move |trial: &mut RemoteTrial| {
            let x = trial.suggest_float("x", 0.0, 1.0)?;
            // Every request below arrives while three other trials are live.
            r.wait();
            for step in 0..5 {
                trial.report(x * step as f64, step)?;
                trial.should_prune()?;
            }
            trial.set_user_attr("x", AttrValue::Float(x))?;
            Ok::<_, Error>(x)
        })
        .unwrap();

    assert_eq!(study.last_run().unwrap().max_concurrency, 4);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(study.trials().len(), 12);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn storage_is_never_entered_concurrently(
        n_trials in 1usize..24,
        n_jobs in 1usize..6,
        delays in proptest::collection::vec(0u64..300, 24),
    ) {
        let overlaps = Arc::new(AtomicUsize::new(0));
        let mut study = guarded_study(&overlaps);

        study
            .optimize(n_trials, n_jobs, move |trial: &mut RemoteTrial| {
                let pause = Duration::from_micros(delays[trial.id() as usize % delays.len()]);
                let x = trial.suggest_float("x", 0.0, 1.0)?;
                thread::sleep(pause);
                trial.report(x, 0)?;
                trial.should_prune()?;
                trial.set_user_attr("pause", AttrValue::Int(pause.as_micros() as i64))?;
                let _ = trial.params()?;
                Ok::<_, Error>(x)
            })
            .unwrap();

        prop_assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        prop_assert_eq!(study.trials().len(), n_trials);
    }
}
