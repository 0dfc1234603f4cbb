//! Lifecycle Hooks
//!
//! A [`Materializer`] observes actor lifecycle and message flow. Every hook is
//! optional. Several materializers compose into a [`MaterializerChain`], which
//! invokes each hook on every member in registration order.
//!
//! A failing hook, whether it returns an error or panics, is logged and
//! skipped. It never changes the outcome of the message being processed and
//! never prevents later materializers from running.

use crate::envelope::MessageMeta;
use crate::registry::ActorId;
use crate::ActorError;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;

/// Observer of actor lifecycle events
pub trait Materializer: Send + Sync + 'static {
    /// Actor was registered in a system
    fn on_activate(&self, _actor: &ActorId) -> anyhow::Result<()> {
        Ok(())
    }

    /// Actor was killed
    fn on_deactivate(&self, _actor: &ActorId) -> anyhow::Result<()> {
        Ok(())
    }

    /// Message was appended to the actor's mailbox
    fn on_receive_message(&self, _actor: &ActorId, _message: &MessageMeta) -> anyhow::Result<()> {
        Ok(())
    }

    /// Head message is about to be handled
    fn on_before_pulling_message(
        &self,
        _actor: &ActorId,
        _message: &MessageMeta,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Head message was handled and its snapshot committed
    fn on_after_message_processed(
        &self,
        _actor: &ActorId,
        _message: &MessageMeta,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handler failed for the head message
    fn on_error(
        &self,
        _actor: &ActorId,
        _message: &MessageMeta,
        _error: &ActorError,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Actor subscribed to an event bus topic
    fn on_subscribe(&self, _actor: &ActorId, _topic: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// Actor unsubscribed from an event bus topic
    fn on_unsubscribe(&self, _actor: &ActorId, _topic: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Ordered composition of materializers
#[derive(Clone, Default)]
pub struct MaterializerChain {
    members: Vec<Arc<dyn Materializer>>,
}

impl MaterializerChain {
    /// Chain that observes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(members: Vec<Arc<dyn Materializer>>) -> Self {
        Self { members }
    }

    /// Append a materializer after the existing ones
    pub fn push(&mut self, member: Arc<dyn Materializer>) {
        self.members.push(member);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn each<F>(&self, hook: &'static str, actor: &ActorId, call: F)
    where
        F: Fn(&dyn Materializer) -> anyhow::Result<()>,
    {
        for (position, member) in self.members.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| call(member.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(
                        actor_id = %actor,
                        hook,
                        materializer = position,
                        error = %e,
                        "Materializer hook failed"
                    );
                }
                Err(_) => {
                    error!(
                        actor_id = %actor,
                        hook,
                        materializer = position,
                        "Materializer hook panicked"
                    );
                }
            }
        }
    }
}

impl Materializer for MaterializerChain {
    fn on_activate(&self, actor: &ActorId) -> anyhow::Result<()> {
        self.each("on_activate", actor, |m| m.on_activate(actor));
        Ok(())
    }

    fn on_deactivate(&self, actor: &ActorId) -> anyhow::Result<()> {
        self.each("on_deactivate", actor, |m| m.on_deactivate(actor));
        Ok(())
    }

    fn on_receive_message(&self, actor: &ActorId, message: &MessageMeta) -> anyhow::Result<()> {
        self.each("on_receive_message", actor, |m| m.on_receive_message(actor, message));
        Ok(())
    }

    fn on_before_pulling_message(
        &self,
        actor: &ActorId,
        message: &MessageMeta,
    ) -> anyhow::Result<()> {
        self.each("on_before_pulling_message", actor, |m| {
            m.on_before_pulling_message(actor, message)
        });
        Ok(())
    }

    fn on_after_message_processed(
        &self,
        actor: &ActorId,
        message: &MessageMeta,
    ) -> anyhow::Result<()> {
        self.each("on_after_message_processed", actor, |m| {
            m.on_after_message_processed(actor, message)
        });
        Ok(())
    }

    fn on_error(
        &self,
        actor: &ActorId,
        message: &MessageMeta,
        error: &ActorError,
    ) -> anyhow::Result<()> {
        self.each("on_error", actor, |m| m.on_error(actor, message, error));
        Ok(())
    }

    fn on_subscribe(&self, actor: &ActorId, topic: &str) -> anyhow::Result<()> {
        self.each("on_subscribe", actor, |m| m.on_subscribe(actor, topic));
        Ok(())
    }

    fn on_unsubscribe(&self, actor: &ActorId, topic: &str) -> anyhow::Result<()> {
        self.each("on_unsubscribe", actor, |m| m.on_unsubscribe(actor, topic));
        Ok(())
    }
}

impl fmt::Debug for MaterializerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializerChain")
            .field("members", &self.members.len())
            .finish()
    }
}
