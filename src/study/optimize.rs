use crate::error::{Error, Result, is_trial_pruned};
use crate::trial::{Trial, TrialRecord};
use crate::types::TrialState;

use super::{Study, TrialOutcome};

impl Study {
    /// Run optimization with an objective, one trial after another.
    ///
    /// Each trial is evaluated on the calling thread with an in-process
    /// [`Trial`]. An objective error marks the trial `Failed`, a
    /// [`TrialPruned`](crate::TrialPruned) signal marks it `Pruned`, and the
    /// loop continues with the next trial.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoCompletedTrials` if no trials completed successfully,
    /// or a storage error if the trial lifecycle could not be recorded.
    ///
    /// # Examples
    ///
    /// ```
    /// use optimizer_distributed::prelude::*;
    ///
    /// let mut study = Study::with_sampler(Direction::Minimize, RandomSampler::with_seed(42));
    /// let x_param = FloatParam::new(-10.0, 10.0);
    ///
    /// study
    ///     .optimize(10, |trial| {
    ///         let x = x_param.suggest(trial)?;
    ///         Ok::<_, Error>(x * x)
    ///     })
    ///     .unwrap();
    ///
    /// assert_eq!(study.n_trials(), 10);
    /// assert!(study.best_value().unwrap() >= 0.0);
    /// ```
    pub fn optimize<F, E>(&mut self, n_trials: usize, mut objective: F) -> Result<()>
    where
        F: FnMut(&mut Trial<'_>) -> core::result::Result<f64, E>,
        E: ToString + 'static,
    {
        #[cfg(feature = "tracing")]
        let _span =
            tracing::info_span!("optimize", n_trials, direction = ?self.direction).entered();

        for _ in 0..n_trials {
            let id = self.ask();
            self.start(id)?;

            let mut trial = Trial::new(self, id);
            let result = objective(&mut trial);
            let pruned = trial.was_pruned();

            let outcome = match result {
                Ok(_) if pruned => TrialOutcome::Pruned,
                Ok(value) => TrialOutcome::Complete(value),
                Err(e) if is_trial_pruned(&e) => TrialOutcome::Pruned,
                Err(e) => TrialOutcome::Failed(e.to_string()),
            };
            let record = self.tell(id, outcome)?;
            let best = super::analysis::best_of(self.storage.trials(), self.direction)
                .and_then(|t| t.value.map(|v| (t.id, v)));
            trace_finished(&record, best);
        }

        if !self
            .storage
            .trials()
            .iter()
            .any(|t| t.state == TrialState::Complete)
        {
            return Err(Error::NoCompletedTrials);
        }

        Ok(())
    }
}

/// Emit the per-trial summary event for a finished trial.
///
/// `best` is the `(trial id, value)` of the best trial after this one was
/// recorded. Failed trials are logged when they are told, so they are
/// skipped here.
#[cfg(feature = "tracing")]
pub(crate) fn trace_finished(record: &TrialRecord, best: Option<(u64, f64)>) {
    match record.state {
        TrialState::Complete => {
            let mut params: Vec<String> = record
                .params
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            params.sort_unstable();
            tracing::info!(
                trial_id = record.id,
                value = ?record.value,
                params = %params.join(", "),
                best_trial = ?best.map(|(id, _)| id),
                best_value = ?best.map(|(_, v)| v),
                "trial finished"
            );
        }
        TrialState::Pruned => {
            tracing::info!(trial_id = record.id, step = ?record.last_step(), "trial pruned");
        }
        _ => {}
    }
}

#[cfg(not(feature = "tracing"))]
pub(crate) fn trace_finished(_record: &TrialRecord, _best: Option<(u64, f64)>) {}
