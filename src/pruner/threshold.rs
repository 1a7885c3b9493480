use super::Pruner;
use crate::trial::TrialRecord;

/// Prune trials whose latest intermediate value leaves a fixed band.
///
/// A value strictly above `upper` or strictly below `lower` prunes the trial.
/// NaN values are pruned unless [`ThresholdPruner::keep_nan`] is set.
///
/// # Examples
///
/// ```
/// use optimizer_distributed::pruner::{Pruner, ThresholdPruner};
///
/// let mut pruner = ThresholdPruner::new().upper(10.0).n_warmup_steps(2);
/// assert!(!pruner.should_prune(0, 1, &[(0, 3.0), (1, 50.0)], &[]));
/// assert!(pruner.should_prune(0, 2, &[(2, 50.0)], &[]));
/// ```
#[derive(Debug, Clone)]
pub struct ThresholdPruner {
    lower: Option<f64>,
    upper: Option<f64>,
    n_warmup_steps: u64,
    prune_nan: bool,
}

impl ThresholdPruner {
    /// Creates a pruner with no bounds; it only prunes NaN values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lower: None,
            upper: None,
            n_warmup_steps: 0,
            prune_nan: true,
        }
    }

    /// Prune when the latest value is strictly below `lower`.
    #[must_use]
    pub fn lower(mut self, lower: f64) -> Self {
        self.lower = Some(lower);
        self
    }

    /// Prune when the latest value is strictly above `upper`.
    #[must_use]
    pub fn upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }

    /// Never prune before this step.
    #[must_use]
    pub fn n_warmup_steps(mut self, n: u64) -> Self {
        self.n_warmup_steps = n;
        self
    }

    /// Let NaN intermediate values through instead of pruning them.
    #[must_use]
    pub fn keep_nan(mut self) -> Self {
        self.prune_nan = false;
        self
    }
}

impl Default for ThresholdPruner {
    fn default() -> Self {
        Self::new()
    }
}

impl Pruner for ThresholdPruner {
    fn should_prune(
        &mut self,
        _trial_id: u64,
        step: u64,
        intermediate_values: &[(u64, f64)],
        _history: &[TrialRecord],
    ) -> bool {
        if step < self.n_warmup_steps {
            return false;
        }
        let Some(&(_, value)) = intermediate_values.last() else {
            return false;
        };
        if value.is_nan() {
            return self.prune_nan;
        }
        self.upper.is_some_and(|upper| value > upper) || self.lower.is_some_and(|lower| value < lower)
    }
}
