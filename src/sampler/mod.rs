//! Sampler trait and the baseline random sampler.

pub mod random;

use crate::distribution::Distribution;
use crate::param::ParamValue;
use crate::trial::TrialRecord;

/// Trait for pluggable parameter sampling strategies.
///
/// Samplers are responsible for generating parameter values based on the
/// distribution and historical trial data. A sampler is owned by exactly one
/// [`Study`](crate::Study) and is only ever driven from the thread that owns
/// the study, so it takes `&mut self` and needs `Send` but not `Sync`.
///
/// # Implementing a custom sampler
///
/// ```
/// use optimizer_distributed::distribution::Distribution;
/// use optimizer_distributed::sampler::Sampler;
/// use optimizer_distributed::{ParamValue, TrialRecord};
///
/// /// Always picks the lower bound.
/// struct LowSampler;
///
/// impl Sampler for LowSampler {
///     fn sample(
///         &mut self,
///         distribution: &Distribution,
///         _trial_id: u64,
///         _history: &[TrialRecord],
///     ) -> ParamValue {
///         match distribution {
///             Distribution::Float(d) => ParamValue::Float(d.low),
///             Distribution::Int(d) => ParamValue::Int(d.low),
///             Distribution::Categorical(_) => ParamValue::Categorical(0),
///         }
///     }
/// }
/// ```
pub trait Sampler: Send {
    /// Samples a parameter value from the given distribution.
    ///
    /// # Arguments
    ///
    /// * `distribution` - The parameter distribution to sample from.
    /// * `trial_id` - The unique ID of the trial being sampled for.
    /// * `history` - Every trial in storage, running ones included.
    fn sample(
        &mut self,
        distribution: &Distribution,
        trial_id: u64,
        history: &[TrialRecord],
    ) -> ParamValue;
}
