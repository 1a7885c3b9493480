use std::time::SystemTime;

use super::Storage;
use crate::distribution::Distribution;
use crate::error::{Error, Result};
use crate::param::{AttrValue, ParamValue};
use crate::trial::TrialRecord;
use crate::types::TrialState;

/// In-memory trial storage (the default).
///
/// Trials live in a `Vec` indexed by id, so lookups are O(1).
#[derive(Debug, Default)]
pub struct MemoryStorage {
    trials: Vec<TrialRecord>,
}

impl MemoryStorage {
    /// Creates a new, empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self { trials: Vec::new() }
    }

    fn get_mut(&mut self, trial_id: u64) -> Result<&mut TrialRecord> {
        usize::try_from(trial_id)
            .ok()
            .and_then(|index| self.trials.get_mut(index))
            .ok_or(Error::TrialNotFound(trial_id))
    }

    /// Returns the trial if it can still be written to.
    fn get_unfinished(&mut self, trial_id: u64) -> Result<&mut TrialRecord> {
        let record = self.get_mut(trial_id)?;
        if record.state.is_finished() {
            return Err(Error::InvalidTransition {
                trial_id,
                from: record.state,
                to: record.state,
            });
        }
        Ok(record)
    }
}

fn transition(record: &mut TrialRecord, to: TrialState) -> Result<()> {
    if !record.state.can_transition_to(to) {
        return Err(Error::InvalidTransition {
            trial_id: record.id,
            from: record.state,
            to,
        });
    }
    match to {
        TrialState::Running => record.started_at = Some(SystemTime::now()),
        s if s.is_finished() => record.completed_at = Some(SystemTime::now()),
        _ => {}
    }
    record.state = to;
    Ok(())
}

impl Storage for MemoryStorage {
    fn create_trial(&mut self) -> u64 {
        let id = self.trials.len() as u64;
        self.trials.push(TrialRecord::new(id));
        id
    }

    fn set_state(&mut self, trial_id: u64, state: TrialState) -> Result<()> {
        transition(self.get_mut(trial_id)?, state)
    }

    fn set_param(
        &mut self,
        trial_id: u64,
        name: &str,
        value: ParamValue,
        distribution: Distribution,
    ) -> Result<()> {
        let record = self.get_unfinished(trial_id)?;
        record.params.insert(name.to_owned(), value);
        record.distributions.insert(name.to_owned(), distribution);
        Ok(())
    }

    fn set_intermediate_value(&mut self, trial_id: u64, step: u64, value: f64) -> Result<()> {
        let record = self.get_unfinished(trial_id)?;
        record.intermediate_values.retain(|(s, _)| *s != step);
        record.intermediate_values.push((step, value));
        Ok(())
    }

    fn set_user_attr(&mut self, trial_id: u64, key: &str, value: AttrValue) -> Result<()> {
        let record = self.get_unfinished(trial_id)?;
        record.user_attrs.insert(key.to_owned(), value);
        Ok(())
    }

    fn finish(
        &mut self,
        trial_id: u64,
        state: TrialState,
        value: Option<f64>,
    ) -> Result<TrialRecord> {
        let record = self.get_mut(trial_id)?;
        if !state.is_finished() {
            return Err(Error::InvalidTransition {
                trial_id,
                from: record.state,
                to: state,
            });
        }
        transition(record, state)?;
        record.value = if state == TrialState::Complete { value } else { None };
        Ok(record.clone())
    }

    fn trial(&self, trial_id: u64) -> Result<&TrialRecord> {
        usize::try_from(trial_id)
            .ok()
            .and_then(|index| self.trials.get(index))
            .ok_or(Error::TrialNotFound(trial_id))
    }

    fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }
}
