use crate::pruner::{NopPruner, Pruner};
use crate::sampler::Sampler;
use crate::sampler::random::RandomSampler;
use crate::storage::{MemoryStorage, Storage};
use crate::types::Direction;

use super::Study;

/// A builder for constructing [`Study`] instances with a fluent API.
///
/// Created via [`Study::builder()`]. Collects sampler, pruner, direction,
/// and storage options before constructing the study.
///
/// # Defaults
///
/// - Direction: [`Minimize`](Direction::Minimize)
/// - Sampler: [`RandomSampler`] (seeded if [`seed`](Self::seed) is set)
/// - Pruner: [`NopPruner`]
/// - Storage: [`MemoryStorage`]
///
/// # Examples
///
/// ```
/// use optimizer_distributed::prelude::*;
///
/// let study = Study::builder()
///     .maximize()
///     .seed(42)
///     .pruner(MedianPruner::new(Direction::Maximize).n_warmup_steps(5))
///     .build();
///
/// assert_eq!(study.direction(), Direction::Maximize);
/// ```
#[must_use]
pub struct StudyBuilder {
    direction: Direction,
    sampler: Option<Box<dyn Sampler>>,
    pruner: Option<Box<dyn Pruner>>,
    storage: Option<Box<dyn Storage>>,
    seed: Option<u64>,
}

impl StudyBuilder {
    /// Create a new builder with default settings.
    pub(super) fn new() -> Self {
        Self {
            direction: Direction::Minimize,
            sampler: None,
            pruner: None,
            storage: None,
            seed: None,
        }
    }

    /// Set the optimization direction to minimize (the default).
    pub fn minimize(mut self) -> Self {
        self.direction = Direction::Minimize;
        self
    }

    /// Set the optimization direction to maximize.
    pub fn maximize(mut self) -> Self {
        self.direction = Direction::Maximize;
        self
    }

    /// Set the optimization direction explicitly.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the sampler used for parameter suggestions.
    ///
    /// Defaults to [`RandomSampler`] if not specified.
    pub fn sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Some(Box::new(sampler));
        self
    }

    /// Set the pruner used for early stopping of trials.
    ///
    /// Defaults to [`NopPruner`] (no pruning) if not specified.
    pub fn pruner(mut self, pruner: impl Pruner + 'static) -> Self {
        self.pruner = Some(Box::new(pruner));
        self
    }

    /// Set a custom storage backend.
    ///
    /// Defaults to [`MemoryStorage`] if not specified.
    pub fn storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Some(Box::new(storage));
        self
    }

    /// Seed the default [`RandomSampler`].
    ///
    /// Ignored when an explicit sampler is set.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the [`Study`] with the configured options.
    pub fn build(self) -> Study {
        let seed = self.seed;
        let sampler = self.sampler.unwrap_or_else(|| match seed {
            Some(seed) => Box::new(RandomSampler::with_seed(seed)),
            None => Box::new(RandomSampler::new()),
        });
        let pruner = self.pruner.unwrap_or_else(|| Box::new(NopPruner));
        let storage = self
            .storage
            .unwrap_or_else(|| Box::new(MemoryStorage::new()));

        Study::from_parts(self.direction, sampler, pruner, storage)
    }
}

impl core::fmt::Debug for StudyBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StudyBuilder")
            .field("direction", &self.direction)
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}
