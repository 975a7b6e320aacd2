//! Correlation registry: which outbound message a caller is waiting on.
//!
//! Each entry pairs a reply hand-off with a one-shot stop signal. The reply
//! channel has a single slot, so a producer handing over a second delta waits
//! until the consumer took the first one (bounded by the hand-off timeout).
//! The hand-off is buffered, not a rendezvous: [`Resolution::Delivered`]
//! means the payload sits in the slot, and a consumer that is dropped before
//! reading it discards it. The producer is never more than one payload ahead.
//! The stop signal never waits: it is sent once, after the entry has been
//! removed, which makes a second terminal event for the same id a no-op.

use std::{sync::Arc, time::Duration};

use {
    botbridge_common::{ReplyKind, ReplyPayload},
    dashmap::{DashMap, mapref::entry::Entry},
    tokio::sync::{
        mpsc::{self, error::SendTimeoutError},
        oneshot,
    },
    tracing::{debug, warn},
};

use crate::{Error, Result};

/// How long a producer waits for a consumer to take a reply.
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The bot finished its answer.
    Completed,
    /// The exchange was cut short (our own echo or an author-less update).
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSignal {
    pub channel_id: String,
    pub reason: StopReason,
}

/// Result of handing a payload to a waiting caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The payload is in the consumer's slot; it may not have been read yet.
    Delivered,
    /// Nobody is waiting on this id.
    Unknown,
    /// The payload shape differs from the registered destination.
    KindMismatch,
    /// The consumer did not take the payload in time; it was dropped.
    TimedOut,
    /// The consumer went away; the entry has been removed.
    ConsumerGone,
}

struct PendingRequest {
    kind: ReplyKind,
    reply_tx: mpsc::Sender<ReplyPayload>,
    stop_tx: oneshot::Sender<StopSignal>,
}

pub struct CorrelationRegistry {
    entries: DashMap<String, PendingRequest>,
    handoff_timeout: Duration,
}

impl CorrelationRegistry {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_handoff_timeout(DEFAULT_HANDOFF_TIMEOUT)
    }

    #[must_use]
    pub fn with_handoff_timeout(handoff_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            handoff_timeout,
        })
    }

    /// Starts waiting on `correlation_id`.
    ///
    /// A second registration for an id that is still pending is rejected;
    /// the first caller keeps its entry.
    pub fn register(
        self: &Arc<Self>,
        correlation_id: impl Into<String>,
        channel_id: impl Into<String>,
        kind: ReplyKind,
    ) -> Result<PendingReply> {
        let correlation_id = correlation_id.into();
        let (reply_tx, replies) = mpsc::channel(1);
        let (stop_tx, stop) = oneshot::channel();

        match self.entries.entry(correlation_id.clone()) {
            Entry::Occupied(_) => return Err(Error::AlreadyRegistered { correlation_id }),
            Entry::Vacant(vacant) => {
                vacant.insert(PendingRequest {
                    kind,
                    reply_tx,
                    stop_tx,
                });
            },
        }
        debug!(correlation_id, ?kind, "registered pending request");

        Ok(PendingReply {
            correlation_id,
            channel_id: channel_id.into(),
            replies,
            stop: Some(stop),
            parked: None,
            registry: Arc::clone(self),
        })
    }

    /// Destination kind registered for `correlation_id`, if any.
    #[must_use]
    pub fn kind_of(&self, correlation_id: &str) -> Option<ReplyKind> {
        self.entries.get(correlation_id).map(|entry| entry.kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hands `payload` to the caller waiting on `correlation_id`.
    pub async fn resolve_reply(&self, correlation_id: &str, payload: ReplyPayload) -> Resolution {
        let reply_tx = {
            let Some(entry) = self.entries.get(correlation_id) else {
                return Resolution::Unknown;
            };
            if entry.kind != payload.kind() {
                warn!(
                    correlation_id,
                    expected = ?entry.kind,
                    got = ?payload.kind(),
                    "reply kind does not match the pending request"
                );
                return Resolution::KindMismatch;
            }
            entry.reply_tx.clone()
        };

        match reply_tx.send_timeout(payload, self.handoff_timeout).await {
            Ok(()) => Resolution::Delivered,
            Err(SendTimeoutError::Timeout(_)) => {
                warn!(
                    correlation_id,
                    timeout_ms = self.handoff_timeout.as_millis() as u64,
                    "no consumer took the reply in time, dropping it"
                );
                Resolution::TimedOut
            },
            Err(SendTimeoutError::Closed(_)) => {
                debug!(correlation_id, "consumer is gone, removing pending request");
                self.unregister(correlation_id);
                Resolution::ConsumerGone
            },
        }
    }

    /// Removes the entry and notifies its caller that the exchange ended.
    ///
    /// Returns `false` when no entry was pending or its caller already left.
    pub fn signal_stop(&self, correlation_id: &str, signal: StopSignal) -> bool {
        let Some((_, pending)) = self.entries.remove(correlation_id) else {
            return false;
        };
        debug!(correlation_id, reason = ?signal.reason, "stopping pending request");
        pending.stop_tx.send(signal).is_ok()
    }

    /// Drops the entry without notifying anyone. Returns whether one existed.
    pub fn unregister(&self, correlation_id: &str) -> bool {
        self.entries.remove(correlation_id).is_some()
    }
}

/// What a waiting caller observes.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    Reply(ReplyPayload),
    Stopped(StopSignal),
}

/// Consumer side of a registration. Dropping it unregisters the id.
pub struct PendingReply {
    correlation_id: String,
    channel_id: String,
    replies: mpsc::Receiver<ReplyPayload>,
    stop: Option<oneshot::Receiver<StopSignal>>,
    /// Stop that arrived together with a still-buffered reply.
    parked: Option<StopSignal>,
    registry: Arc<CorrelationRegistry>,
}

impl PendingReply {
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    #[must_use]
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Next reply or the stop signal.
    ///
    /// Replies already handed over are always returned before the stop.
    /// Returns `None` after the stop was observed, or when the request was
    /// unregistered without one.
    pub async fn recv(&mut self) -> Option<ReplyEvent> {
        if let Ok(payload) = self.replies.try_recv() {
            return Some(ReplyEvent::Reply(payload));
        }
        if let Some(signal) = self.parked.take() {
            return Some(ReplyEvent::Stopped(signal));
        }
        let stop = self.stop.as_mut()?;

        tokio::select! {
            biased;
            Some(payload) = self.replies.recv() => Some(ReplyEvent::Reply(payload)),
            signal = stop => {
                self.stop = None;
                let signal = signal.ok()?;
                match self.replies.try_recv() {
                    Ok(payload) => {
                        self.parked = Some(signal);
                        Some(ReplyEvent::Reply(payload))
                    },
                    Err(_) => Some(ReplyEvent::Stopped(signal)),
                }
            },
        }
    }

    /// [`recv`](Self::recv) bounded by `timeout`.
    pub async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<ReplyEvent>, tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, self.recv()).await
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if self.registry.unregister(&self.correlation_id) {
            debug!(correlation_id = %self.correlation_id, "pending request abandoned");
        }
    }
}
