//! Message Envelopes
//!
//! An [`Envelope`] carries one message through a mailbox together with its
//! origin, an optional reply channel and the retry counter maintained by the
//! Retry supervisor strategy.
//!
//! Payloads are shared behind `Arc` so snapshots can record the mailbox
//! without copying messages. Reply channels are shared the same way: every
//! clone of an envelope points at the same one-shot slot, and whichever side
//! settles it first wins.

use crate::registry::ActorId;
use crate::{ActorError, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Type-erased reply as it travels back to the asker
pub type ReplyValue = Box<dyn Any + Send>;

type ReplyResult = Result<ReplyValue>;

/// Who sent a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Sent through the actor system API
    System,
    /// Sent by another actor
    Actor(ActorId),
}

/// One-shot reply slot shared by all clones of an envelope
#[derive(Clone)]
pub struct ReplyTo {
    slot: Arc<Mutex<Option<oneshot::Sender<ReplyResult>>>>,
}

impl ReplyTo {
    /// Create a reply slot and the pending result its asker awaits
    pub fn channel<R: Send + 'static>(from: ActorId) -> (Self, PendingReply<R>) {
        let (tx, rx) = oneshot::channel();
        let reply_to = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (reply_to, PendingReply::new(from, rx))
    }

    /// Answer the asker; ignored if already settled
    pub fn fulfill(&self, value: ReplyValue) -> bool {
        self.settle(Ok(value))
    }

    /// Fail the asker; ignored if already settled
    pub fn reject(&self, error: ActorError) -> bool {
        self.settle(Err(error))
    }

    /// Whether the asker is still waiting
    pub fn is_pending(&self) -> bool {
        self.slot.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn settle(&self, result: ReplyResult) -> bool {
        match self.slot.lock().take() {
            // Asker may have given up waiting
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

impl fmt::Debug for ReplyTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyTo")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// A queued message
pub struct Envelope<M> {
    origin: Origin,
    message: Arc<M>,
    reply_to: Option<ReplyTo>,
    retries: u32,
}

impl<M> Envelope<M> {
    /// Fire-and-forget envelope
    pub fn new(origin: Origin, message: M) -> Self {
        Self::from_shared(origin, Arc::new(message), None)
    }

    /// Envelope whose outcome settles `reply_to`
    pub fn with_reply(origin: Origin, message: M, reply_to: ReplyTo) -> Self {
        Self::from_shared(origin, Arc::new(message), Some(reply_to))
    }

    pub(crate) fn from_shared(origin: Origin, message: Arc<M>, reply_to: Option<ReplyTo>) -> Self {
        Self {
            origin,
            message,
            reply_to,
            retries: 0,
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn message(&self) -> &M {
        &self.message
    }

    pub(crate) fn shared_message(&self) -> Arc<M> {
        Arc::clone(&self.message)
    }

    pub fn reply_to(&self) -> Option<&ReplyTo> {
        self.reply_to.as_ref()
    }

    /// Times this message has been re-queued by the Retry strategy
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Copy of this envelope with the retry counter bumped
    pub(crate) fn retried(&self) -> Self {
        Self {
            retries: self.retries + 1,
            ..self.clone()
        }
    }

    /// Observer-facing description of this envelope
    pub fn meta(&self) -> MessageMeta {
        MessageMeta {
            origin: self.origin.clone(),
            retries: self.retries,
            expects_reply: self.reply_to.is_some(),
            message_type: std::any::type_name::<M>(),
        }
    }
}

impl<M> Clone for Envelope<M> {
    fn clone(&self) -> Self {
        Self {
            origin: self.origin.clone(),
            message: Arc::clone(&self.message),
            reply_to: self.reply_to.clone(),
            retries: self.retries,
        }
    }
}

impl<M: fmt::Debug> fmt::Debug for Envelope<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("origin", &self.origin)
            .field("message", &self.message)
            .field("expects_reply", &self.reply_to.is_some())
            .field("retries", &self.retries)
            .finish()
    }
}

/// Envelope as seen by lifecycle hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    pub origin: Origin,
    pub retries: u32,
    pub expects_reply: bool,
    pub message_type: &'static str,
}

/// Reply of an `ask`, settled when the asked message completes or fails
#[must_use = "an ask reply does nothing unless awaited"]
pub struct PendingReply<R> {
    from: ActorId,
    rx: oneshot::Receiver<ReplyResult>,
    _phantom: PhantomData<fn() -> R>,
}

impl<R: Send + 'static> PendingReply<R> {
    fn new(from: ActorId, rx: oneshot::Receiver<ReplyResult>) -> Self {
        Self {
            from,
            rx,
            _phantom: PhantomData,
        }
    }

    /// Reply that has already failed, e.g. because delivery was refused
    pub fn failed(from: ActorId, error: ActorError) -> Self {
        let (reply_to, pending) = ReplyTo::channel(from);
        reply_to.reject(error);
        pending
    }

    /// Actor this reply is expected from
    pub fn from(&self) -> &ActorId {
        &self.from
    }
}

impl<R: Send + 'static> Future for PendingReply<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let settled = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(settled) => settled,
        };

        let result = match settled {
            Ok(Ok(value)) => value.downcast::<R>().map(|boxed| *boxed).map_err(|_| {
                ActorError::ReplyTypeMismatch {
                    actor: self.from.clone(),
                    expected: std::any::type_name::<R>(),
                }
            }),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(ActorError::ReplyDropped),
        };
        Poll::Ready(result)
    }
}

impl<R> fmt::Debug for PendingReply<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReply")
            .field("from", &self.from)
            .field("reply_type", &std::any::type_name::<R>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_settles_once() {
        let (reply_to, pending) = ReplyTo::channel::<u32>(ActorId::from("counter"));
        let copy = reply_to.clone();

        assert!(reply_to.fulfill(Box::new(7u32)));
        assert!(!copy.reject(ActorError::ReplyDropped));
        assert!(!copy.is_pending());

        assert_eq!(pending.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_reply_type_mismatch() {
        let (reply_to, pending) = ReplyTo::channel::<String>(ActorId::from("counter"));
        reply_to.fulfill(Box::new(7u32));

        let err = pending.await.unwrap_err();
        assert!(matches!(err, ActorError::ReplyTypeMismatch { .. }));
    }

    #[tokio::test]
    async fn test_dropped_reply_slot() {
        let (reply_to, pending) = ReplyTo::channel::<u32>(ActorId::from("gone"));
        drop(reply_to);

        assert!(matches!(pending.await, Err(ActorError::ReplyDropped)));
    }

    #[test]
    fn test_retried_keeps_payload_and_reply() {
        let (reply_to, _pending) = ReplyTo::channel::<()>(ActorId::from("a"));
        let envelope = Envelope::with_reply(Origin::System, "A", reply_to);
        let retried = envelope.retried().retried();

        assert_eq!(retried.retries(), 2);
        assert_eq!(envelope.retries(), 0);
        assert_eq!(*retried.message(), "A");
        assert!(retried.meta().expects_reply);
        assert_eq!(retried.meta().message_type, "&str");
    }
}
