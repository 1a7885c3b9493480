use super::Pruner;
use crate::trial::TrialRecord;
use crate::types::{Direction, TrialState};

/// Prune trials that are performing worse than the median of completed trials
/// at the same step.
///
/// This is the most commonly used pruner. It compares the current trial's
/// intermediate value at each step with the median of all completed trials'
/// values at that same step.
///
/// # Examples
///
/// ```
/// use optimizer_distributed::Direction;
/// use optimizer_distributed::pruner::MedianPruner;
///
/// // Prune trials worse than median when minimizing, after 5 warmup steps
/// let pruner = MedianPruner::new(Direction::Minimize)
///     .n_warmup_steps(5)
///     .n_min_trials(3);
/// ```
#[derive(Debug, Clone)]
pub struct MedianPruner {
    /// The optimization direction.
    direction: Direction,
    /// Don't prune in the first N steps (let the trial warm up).
    n_warmup_steps: u64,
    /// Require at least N completed trials before pruning.
    n_min_trials: usize,
}

impl MedianPruner {
    /// Create a new `MedianPruner` for the given optimization direction.
    ///
    /// By default, `n_warmup_steps` is 0 and `n_min_trials` is 1.
    #[must_use]
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            n_warmup_steps: 0,
            n_min_trials: 1,
        }
    }

    /// Set the number of warmup steps. No pruning occurs before this step.
    #[must_use]
    pub fn n_warmup_steps(mut self, n: u64) -> Self {
        self.n_warmup_steps = n;
        self
    }

    /// Set the minimum number of completed trials required before pruning.
    #[must_use]
    pub fn n_min_trials(mut self, n: usize) -> Self {
        self.n_min_trials = n;
        self
    }
}

impl Pruner for MedianPruner {
    fn should_prune(
        &mut self,
        trial_id: u64,
        step: u64,
        intermediate_values: &[(u64, f64)],
        history: &[TrialRecord],
    ) -> bool {
        if step < self.n_warmup_steps {
            return false;
        }

        let Some(&(_, current_value)) = intermediate_values.last() else {
            return false;
        };

        // Only completed trials set the bar; pruned ones stopped early by definition.
        let mut values_at_step: Vec<f64> = history
            .iter()
            .filter(|t| t.id != trial_id && t.state == TrialState::Complete)
            .filter_map(|t| t.intermediate_value(step))
            .filter(|v| !v.is_nan())
            .collect();

        if values_at_step.is_empty() || values_at_step.len() < self.n_min_trials {
            return false;
        }

        let median = compute_median(&mut values_at_step);

        match self.direction {
            Direction::Minimize => current_value > median,
            Direction::Maximize => current_value < median,
        }
    }
}

/// Compute the median of a non-empty slice. Sorts the slice in place.
fn compute_median(values: &mut [f64]) -> f64 {
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal));
    let len = values.len();
    if len % 2 == 1 {
        values[len / 2]
    } else {
        f64::midpoint(values[len / 2 - 1], values[len / 2])
    }
}
