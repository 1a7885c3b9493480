//! Incremental best-trial tracking for distributed runs.

use crate::study::{Study, best_of};
use crate::trial::TrialRecord;
use crate::types::{Direction, TrialState};

/// Remembers the best completed trial seen while a run finalizes trials.
///
/// The cache is an accelerator only. [`best`](Self::best) checks the cached
/// entry against storage, and storage wins whenever the two disagree.
#[derive(Clone, Debug)]
pub struct BestTrialCache {
    direction: Direction,
    best: Option<(u64, f64)>,
}

impl BestTrialCache {
    /// Creates an empty cache for `direction`.
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            best: None,
        }
    }

    /// Takes a finished trial into account.
    ///
    /// Only `Complete` trials with a value can become the best; NaN never does
    /// unless nothing else is known.
    pub fn observe(&mut self, record: &TrialRecord) {
        if record.state != TrialState::Complete {
            return;
        }
        let Some(value) = record.value else {
            return;
        };
        match self.best {
            Some((_, incumbent)) if !self.direction.is_better(value, incumbent) => {}
            _ => self.best = Some((record.id, value)),
        }
    }

    /// The cached `(trial id, value)` without consulting storage.
    #[must_use]
    pub fn peek(&self) -> Option<(u64, f64)> {
        self.best
    }

    /// Returns the best `(trial id, value)`, validated against `study`.
    ///
    /// If the cached trial is missing from storage, no longer complete, or
    /// carries a different value, the cache is rebuilt from storage.
    pub fn best(&mut self, study: &Study) -> Option<(u64, f64)> {
        let consistent = self.best.is_some_and(|(id, value)| {
            study.trial(id).is_ok_and(|t| {
                t.state == TrialState::Complete
                    && t.value.is_some_and(|v| v.to_bits() == value.to_bits())
            })
        });
        if !consistent {
            self.best =
                best_of(study.trials(), self.direction).and_then(|t| t.value.map(|v| (t.id, v)));
        }
        self.best
    }

    /// Forgets the cached entry; the next [`best`](Self::best) reads storage.
    pub fn invalidate(&mut self) {
        self.best = None;
    }
}
