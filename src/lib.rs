#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Run an Optuna-like study's trials concurrently while a single coordinator
//! owns the optimizer state.
//!
//! A [`Study`] is a sequential optimizer: its sampler, pruner and storage are
//! plain `&mut self` objects. [`DistributedStudy`] runs the study's trials on
//! many workers anyway. Each objective receives a [`RemoteTrial`] whose
//! operations are relayed to the coordinator over channels, served one at a
//! time against the study, and answered. Only the coordinator ever touches
//! the study.
//!
//! # Getting Started
//!
//! ```
//! use optimizer_distributed::prelude::*;
//!
//! let study = Study::builder().minimize().build();
//! let mut study = DistributedStudy::from_study(study, None);
//! let x = FloatParam::new(-10.0, 10.0).name("x");
//!
//! study
//!     .optimize(40, 4, move |trial: &mut RemoteTrial| {
//!         let v = x.suggest(trial)?;
//!         Ok::<_, Error>((v - 3.0).powi(2))
//!     })
//!     .unwrap();
//!
//! let best = study.best_trial().unwrap();
//! println!("f(x) = {:.4}, params = {:?}", best.value.unwrap(), best.params);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Study`] | The sequential optimizer: trial-id API (`ask`, `suggest`, `report`, `should_prune`, `tell`) over a sampler, a pruner and storage. |
//! | [`TrialApi`] | What objectives program against; implemented by the local [`Trial`] and by [`RemoteTrial`]. |
//! | [`DistributedStudy`] | Runs a study's trials concurrently and serves their requests. |
//! | [`Executor`](dispatch::Executor) | Where trials run: [`ThreadExecutor`](dispatch::ThreadExecutor), `TokioExecutor` (`async`), or your own. |
//! | [`OptimizeConfig`] | `n_jobs`, failure [`Catch`] policy, timeout and heartbeat of one run. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events through the `tracing` crate | on |
//! | `async` | [`TokioExecutor`](dispatch::TokioExecutor), running trials on a tokio blocking pool | off |
//! | `serde` | `Serialize`/`Deserialize` on relay messages and trial records | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

mod aggregator;
mod config;
mod coordinator;
pub mod dispatch;
mod distributed;
pub mod distribution;
mod error;
mod param;
pub mod parameter;
pub mod pruner;
pub mod relay;
mod remote;
mod rng_util;
pub mod sampler;
pub mod storage;
mod study;
mod trial;
mod types;

pub use aggregator::BestTrialCache;
pub use config::{Catch, OptimizeConfig};
pub use coordinator::CoordinatorState;
pub use distributed::DistributedStudy;
pub use error::{Error, Result, TrialPruned};
pub use param::{AttrValue, ParamValue};
pub use remote::RemoteTrial;
pub use study::{Study, StudyBuilder, TrialOutcome};
pub use trial::{Trial, TrialApi, TrialRecord};
pub use types::{Direction, TrialState};

/// Convenient imports for common usage.
///
/// ```
/// use optimizer_distributed::prelude::*;
/// ```
pub mod prelude {
    pub use crate::distribution::{CategoricalDistribution, FloatDistribution, IntDistribution};
    pub use crate::parameter::{BoolParam, CategoricalParam, FloatParam, IntParam, Parameter};
    pub use crate::pruner::{MedianPruner, NopPruner, ThresholdPruner};
    pub use crate::sampler::random::RandomSampler;
    pub use crate::{
        AttrValue, Catch, DistributedStudy, Direction, Error, OptimizeConfig, ParamValue,
        RemoteTrial, Study, Trial, TrialApi, TrialOutcome, TrialRecord, TrialState,
    };
}
