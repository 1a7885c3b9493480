//! Pruner trait and implementations for trial pruning.
//!
//! Pruners decide whether to stop (prune) a trial early based on its
//! intermediate values compared to other trials. This is useful for
//! discarding unpromising trials before they complete, saving compute.

mod median;
mod nop;
mod threshold;

pub use median::MedianPruner;
pub use nop::NopPruner;
pub use threshold::ThresholdPruner;

use crate::trial::TrialRecord;

/// Trait for pluggable trial pruning strategies.
///
/// Pruners are consulted whenever a running trial asks whether it should
/// stop. Like samplers, a pruner belongs to a single study and is driven
/// from one thread at a time, so it takes `&mut self` and only needs `Send`.
///
/// # Implementing a custom pruner
///
/// ```
/// use optimizer_distributed::pruner::Pruner;
/// use optimizer_distributed::TrialRecord;
///
/// struct MyPruner {
///     threshold: f64,
/// }
///
/// impl Pruner for MyPruner {
///     fn should_prune(
///         &mut self,
///         _trial_id: u64,
///         _step: u64,
///         intermediate_values: &[(u64, f64)],
///         _history: &[TrialRecord],
///     ) -> bool {
///         // Prune if the latest value exceeds the threshold
///         intermediate_values
///             .last()
///             .is_some_and(|&(_, v)| v > self.threshold)
///     }
/// }
/// ```
pub trait Pruner: Send {
    /// Decide whether to prune a trial at the given step.
    ///
    /// # Arguments
    ///
    /// * `trial_id` - The current trial's ID.
    /// * `step` - The most recently reported step.
    /// * `intermediate_values` - All `(step, value)` pairs reported so far for this trial.
    /// * `history` - Every trial in storage, running ones included.
    fn should_prune(
        &mut self,
        trial_id: u64,
        step: u64,
        intermediate_values: &[(u64, f64)],
        history: &[TrialRecord],
    ) -> bool;
}
