//! The per-trial request/response channel.
//!
//! Every trial gets a private [`TrialEndpoint`] on the worker side and a
//! matching [`ReplyHandle`] on the coordinator side. Requests from all trials
//! share one [`Inbox`]; replies travel on a bounded channel owned by the
//! trial, so a reply can only ever reach the worker that asked.
//!
//! With the `async` feature an endpoint can also wait for a reply without
//! blocking its thread: every reply, and the drop of the reply handle, wakes
//! a shared [`Notify`](tokio::sync::Notify).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "async")]
use crossbeam_channel::TryRecvError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
#[cfg(feature = "async")]
use tokio::sync::Notify;

use super::message::{CorrelationId, Envelope, Reply, Request, Response};
use crate::error::{Error, Result};

/// Replies are answered one at a time, so one slot is enough.
const REPLY_CAPACITY: usize = 1;

/// The coordinator's receiving end for requests from every trial.
///
/// Arrival order on the inbox is the order requests are served in.
#[derive(Debug)]
pub struct Inbox {
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
}

impl Inbox {
    /// Creates an empty inbox.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    /// Blocks until a request arrives.
    ///
    /// # Errors
    ///
    /// Never fails while the inbox is alive; the `Result` mirrors the other
    /// channel operations.
    pub fn recv(&self) -> Result<Envelope> {
        self.rx.recv().map_err(|_| Error::ChannelClosed)
    }

    /// Returns a waiting request without blocking.
    #[must_use]
    pub fn try_recv(&self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    /// Waits up to `timeout` for a request.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Envelope> {
        match self.rx.recv_timeout(timeout) {
            Ok(envelope) => Some(envelope),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of requests waiting to be served.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns `true` if no request is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub(crate) fn receiver(&self) -> &Receiver<Envelope> {
        &self.rx
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the two ends of a trial's channel.
///
/// The endpoint goes to the worker running trial `trial_id`; the reply handle
/// stays with the coordinator.
#[must_use]
pub fn trial_channel(trial_id: u64, inbox: &Inbox) -> (TrialEndpoint, ReplyHandle) {
    let (reply_tx, reply_rx) = crossbeam_channel::bounded(REPLY_CAPACITY);
    let in_flight = Arc::new(Mutex::new(None));
    #[cfg(feature = "async")]
    let notify = Arc::new(Notify::new());
    let endpoint = TrialEndpoint {
        trial_id,
        requests: Some(inbox.tx.clone()),
        replies: Some(reply_rx),
        in_flight: Arc::clone(&in_flight),
        awaiting: None,
        stash: HashMap::new(),
        next_id: 0,
        #[cfg(feature = "async")]
        notify: Arc::clone(&notify),
    };
    let handle = ReplyHandle {
        trial_id,
        tx: reply_tx,
        in_flight,
        #[cfg(feature = "async")]
        wake: WakeOnDrop(notify),
    };
    (endpoint, handle)
}

/// The worker side of a trial channel.
///
/// At most one request may be outstanding: [`send`](Self::send) refuses a new
/// request until the reply to the previous one was taken with
/// [`await_response`](Self::await_response).
#[derive(Debug)]
pub struct TrialEndpoint {
    trial_id: u64,
    requests: Option<Sender<Envelope>>,
    replies: Option<Receiver<Reply>>,
    /// The request the coordinator has not answered yet.
    in_flight: Arc<Mutex<Option<CorrelationId>>>,
    /// The request whose reply this endpoint has not consumed yet.
    awaiting: Option<CorrelationId>,
    stash: HashMap<CorrelationId, Response>,
    next_id: u64,
    #[cfg(feature = "async")]
    notify: Arc<Notify>,
}

impl TrialEndpoint {
    /// The trial this endpoint belongs to.
    #[must_use]
    pub fn trial_id(&self) -> u64 {
        self.trial_id
    }

    /// Posts a request without waiting for its reply.
    ///
    /// # Errors
    ///
    /// Returns `ChannelProtocol` if a request is already outstanding, and
    /// `ChannelClosed` if the endpoint was closed or the coordinator is gone.
    pub fn send(&mut self, request: Request) -> Result<CorrelationId> {
        if let Some(outstanding) = self.awaiting {
            return Err(Error::ChannelProtocol(format!(
                "trial {}: {} sent while request {outstanding} is outstanding",
                self.trial_id,
                request.kind()
            )));
        }
        let requests = self.requests.as_ref().ok_or(Error::ChannelClosed)?;

        let correlation_id = CorrelationId(self.next_id);
        self.next_id += 1;
        *self.in_flight.lock() = Some(correlation_id);

        let envelope = Envelope {
            trial_id: self.trial_id,
            correlation_id,
            request,
        };
        if requests.send(envelope).is_err() {
            *self.in_flight.lock() = None;
            return Err(Error::ChannelClosed);
        }
        self.awaiting = Some(correlation_id);
        Ok(correlation_id)
    }

    /// Blocks until the reply to `correlation_id` arrives.
    ///
    /// Replies to other requests that arrive first are kept and handed out
    /// when their own id is awaited.
    ///
    /// # Errors
    ///
    /// Returns `ChannelProtocol` for an id this endpoint is not waiting on,
    /// and `ChannelClosed` if the coordinator went away first.
    pub fn await_response(&mut self, correlation_id: CorrelationId) -> Result<Response> {
        if let Some(response) = self.take_stashed(correlation_id)? {
            return Ok(response);
        }
        let replies = self.replies.as_ref().ok_or(Error::ChannelClosed)?;
        loop {
            let reply = replies.recv().map_err(|_| Error::ChannelClosed)?;
            if reply.correlation_id == correlation_id {
                self.clear_awaiting(correlation_id);
                return Ok(reply.response);
            }
            self.stash.insert(reply.correlation_id, reply.response);
        }
    }

    /// Waits for the reply to `correlation_id` without blocking the thread.
    ///
    /// Behaves like [`await_response`](Self::await_response), but suspends
    /// the calling task instead.
    ///
    /// # Errors
    ///
    /// As [`await_response`](Self::await_response).
    #[cfg(feature = "async")]
    pub async fn await_response_async(&mut self, correlation_id: CorrelationId) -> Result<Response> {
        if let Some(response) = self.take_stashed(correlation_id)? {
            return Ok(response);
        }
        let replies = self.replies.as_ref().ok_or(Error::ChannelClosed)?;
        loop {
            match replies.try_recv() {
                Ok(reply) if reply.correlation_id == correlation_id => {
                    self.clear_awaiting(correlation_id);
                    return Ok(reply.response);
                }
                Ok(reply) => {
                    self.stash.insert(reply.correlation_id, reply.response);
                }
                Err(TryRecvError::Disconnected) => return Err(Error::ChannelClosed),
                // A reply landing after the empty check leaves a permit behind.
                Err(TryRecvError::Empty) => self.notify.notified().await,
            }
        }
    }

    /// Hands out a stashed reply, or checks that `correlation_id` is the
    /// request still waiting for one.
    fn take_stashed(&mut self, correlation_id: CorrelationId) -> Result<Option<Response>> {
        if let Some(response) = self.stash.remove(&correlation_id) {
            self.clear_awaiting(correlation_id);
            return Ok(Some(response));
        }
        if self.awaiting != Some(correlation_id) {
            return Err(Error::ChannelProtocol(format!(
                "trial {}: no request {correlation_id} is outstanding",
                self.trial_id
            )));
        }
        Ok(None)
    }

    /// Closes both directions. Later sends fail with `ChannelClosed`.
    pub fn close(&mut self) {
        self.requests = None;
        self.replies = None;
        self.awaiting = None;
    }

    /// Returns `true` once [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.requests.is_none()
    }

    fn clear_awaiting(&mut self, correlation_id: CorrelationId) {
        if self.awaiting == Some(correlation_id) {
            self.awaiting = None;
        }
    }
}

/// The coordinator side of a trial channel.
#[derive(Debug)]
pub struct ReplyHandle {
    trial_id: u64,
    tx: Sender<Reply>,
    in_flight: Arc<Mutex<Option<CorrelationId>>>,
    /// Dropped after `tx`, so a woken endpoint sees the disconnect.
    #[cfg(feature = "async")]
    wake: WakeOnDrop,
}

impl ReplyHandle {
    /// The trial this handle answers.
    #[must_use]
    pub fn trial_id(&self) -> u64 {
        self.trial_id
    }

    /// Answers the outstanding request `correlation_id`.
    ///
    /// # Errors
    ///
    /// Returns `ChannelProtocol` if `correlation_id` is not the outstanding
    /// request of this trial, and `ChannelClosed` if the worker dropped its
    /// endpoint.
    pub fn reply(&self, correlation_id: CorrelationId, response: Response) -> Result<()> {
        let mut in_flight = self.in_flight.lock();
        if *in_flight != Some(correlation_id) {
            return Err(Error::ChannelProtocol(format!(
                "trial {}: reply to {correlation_id} matches no outstanding request",
                self.trial_id
            )));
        }
        let reply = Reply {
            correlation_id,
            response,
        };
        match self.tx.try_send(reply) {
            Ok(()) => {
                *in_flight = None;
                #[cfg(feature = "async")]
                self.wake.0.notify_one();
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::ChannelClosed),
            Err(TrySendError::Full(_)) => Err(Error::ChannelProtocol(format!(
                "trial {}: previous reply was never consumed",
                self.trial_id
            ))),
        }
    }
}

/// Wakes the endpoint when the coordinator side goes away.
#[cfg(feature = "async")]
#[derive(Debug)]
struct WakeOnDrop(Arc<Notify>);

#[cfg(feature = "async")]
impl Drop for WakeOnDrop {
    fn drop(&mut self) {
        self.0.notify_one();
    }
}
