//! Random sampler implementation.

use crate::distribution::Distribution;
use crate::param::ParamValue;
use crate::rng_util;
use crate::sampler::Sampler;
use crate::trial::TrialRecord;

/// A simple random sampler that samples uniformly from distributions.
///
/// This sampler ignores the trial history and samples uniformly at random,
/// respecting log scale and step size constraints. It is the default sampler
/// of every [`Study`](crate::Study).
///
/// # Examples
///
/// ```
/// use optimizer_distributed::sampler::random::RandomSampler;
///
/// // Create with default RNG
/// let sampler = RandomSampler::new();
///
/// // Create with a fixed seed for reproducibility
/// let sampler = RandomSampler::with_seed(42);
/// ```
#[derive(Debug)]
pub struct RandomSampler {
    rng: fastrand::Rng,
}

impl RandomSampler {
    /// Creates a new random sampler with a default random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: fastrand::Rng::new(),
        }
    }

    /// Creates a new random sampler with a fixed seed for reproducibility.
    ///
    /// Using the same seed will produce the same sequence of sampled values.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl Default for RandomSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for RandomSampler {
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn sample(
        &mut self,
        distribution: &Distribution,
        _trial_id: u64,
        _history: &[TrialRecord],
    ) -> ParamValue {
        let rng = &mut self.rng;

        match distribution {
            Distribution::Float(d) => {
                let value = if d.log_scale {
                    let log_value = rng_util::f64_range(rng, d.low.ln(), d.high.ln());
                    log_value.exp().clamp(d.low, d.high)
                } else if let Some(step) = d.step {
                    let n_steps = ((d.high - d.low) / step).floor() as i64;
                    let k = rng.i64(0..=n_steps);
                    d.low + (k as f64) * step
                } else {
                    rng_util::f64_range(rng, d.low, d.high)
                };
                ParamValue::Float(value)
            }
            Distribution::Int(d) => {
                let value = if d.log_scale {
                    let log_low = (d.low as f64).ln();
                    let log_high = (d.high as f64).ln();
                    let raw = rng_util::f64_range(rng, log_low, log_high).exp().round() as i64;
                    // rounding may step outside the bounds
                    raw.clamp(d.low, d.high)
                } else if let Some(step) = d.step {
                    // The span of a valid range may not fit in an i64.
                    let step = step.unsigned_abs();
                    let k = rng.u64(0..=d.high.abs_diff(d.low) / step);
                    d.low.wrapping_add_unsigned(k * step)
                } else {
                    rng.i64(d.low..=d.high)
                };
                ParamValue::Int(value)
            }
            Distribution::Categorical(d) => ParamValue::Categorical(rng.usize(0..d.n_choices)),
        }
    }
}
