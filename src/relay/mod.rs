//! Message channel between workers and the coordinator.
//!
//! A worker never touches the study. Every operation it performs on its trial
//! becomes a [`Request`] posted to the coordinator's [`Inbox`], and the
//! worker blocks on its private [`TrialEndpoint`] until the matching
//! [`Response`] comes back through the trial's [`ReplyHandle`].

mod channel;
mod message;

pub use channel::{Inbox, ReplyHandle, TrialEndpoint, trial_channel};
pub use message::{CorrelationId, Envelope, ErrorKind, Reply, Request, Response};
