//! Actors
//!
//! An [`Actor`] owns a piece of state, a FIFO [`Mailbox`] and a [`TimeMachine`]
//! of the snapshots it committed. Its [`Behavior`] is a pure transition from
//! `(state, message)` to a new state plus an optional reply; the actor only
//! installs the new state once the handler succeeds.
//!
//! # Pull protocol
//!
//! 1. Peek the mailbox head (it stays queued while the handler runs)
//! 2. `on_before_pulling_message`
//! 3. Await the handler
//! 4. Success: dequeue, install state, record snapshot,
//!    `on_after_message_processed`, answer the asker
//! 5. Failure: leave mailbox and history untouched, `on_error`, fail the
//!    asker, hand the error back for supervision
//!
//! Pulls of one actor are serialized by an async lock that is also held while
//! the supervisor repairs the actor after a failure.
//!
//! # Lock Ordering
//!
//! `pull_lock` (async) may be held while taking `inner`. `inner` is never held
//! across an `.await`, a hook call, or a call into the actor system.

use crate::envelope::{Envelope, Origin, PendingReply, ReplyTo};
use crate::event_bus::{EventBus, InMemoryEventBus};
use crate::mailbox::Mailbox;
use crate::materializer::{Materializer, MaterializerChain};
use crate::registry::{ActorId, ActorTarget};
use crate::system::{ActorSystem, SystemCore};
use crate::time_machine::{Snapshot, TimeMachine};
use crate::{ActorError, Result};

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

/// Message handling logic of an actor
#[async_trait]
pub trait Behavior: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;
    type Message: Send + Sync + 'static;
    type Reply: Send + 'static;

    /// Compute the state that follows `message`.
    ///
    /// Returning `Err` (or panicking) fails the message: the actor keeps its
    /// previous state and the supervisor decides what happens next.
    async fn handle(
        &self,
        state: Self::State,
        message: &Self::Message,
        ctx: &Context,
    ) -> anyhow::Result<Transition<Self::State, Self::Reply>>;
}

/// Result of a successful handler run
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<S, R> {
    pub state: S,
    pub reply: Option<R>,
}

impl<S, R> Transition<S, R> {
    /// Move to `state` without replying
    pub fn to(state: S) -> Self {
        Self { state, reply: None }
    }

    /// Move to `state` and answer the asker with `reply`
    pub fn reply(state: S, reply: R) -> Self {
        Self {
            state,
            reply: Some(reply),
        }
    }
}

/// Outcome of a single pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Mailbox was empty
    Idle,
    /// Head message was processed and committed
    Processed,
    /// Handler failed and a supervisor strategy was applied
    Failed,
}

/// What a handler can do besides computing its next state
#[derive(Clone)]
pub struct Context {
    actor: ActorId,
    system: Weak<SystemCore>,
    event_bus: Arc<dyn EventBus>,
    materializer: Arc<MaterializerChain>,
}

impl Context {
    /// Id of the actor handling the message
    pub fn id(&self) -> &ActorId {
        &self.actor
    }

    /// Owning actor system, if the actor is registered in one that is alive
    pub fn system(&self) -> Option<ActorSystem> {
        self.system.upgrade().map(ActorSystem::from_core)
    }

    pub fn event_bus(&self) -> &Arc<dyn EventBus> {
        &self.event_bus
    }

    /// Send a message on behalf of this actor
    pub fn tell<T, M>(&self, target: T, message: M) -> Result<()>
    where
        T: ActorTarget,
        M: Send + Sync + 'static,
    {
        self.attached()?.deliver(
            Origin::Actor(self.actor.clone()),
            target.actor_id(),
            Box::new(message),
            None,
        )
    }

    /// Ask another actor on behalf of this actor.
    ///
    /// Awaiting an ask addressed to the asking actor itself never resolves,
    /// since its own pull is still in progress.
    pub fn ask<T, M, R>(&self, target: T, message: M) -> PendingReply<R>
    where
        T: ActorTarget,
        M: Send + Sync + 'static,
        R: Send + 'static,
    {
        let target = target.actor_id();
        match self.attached() {
            Ok(system) => system.ask_from(Origin::Actor(self.actor.clone()), target, message),
            Err(error) => PendingReply::failed(target, error),
        }
    }

    /// Tell every subscriber of `topic`, returning how many accepted it
    pub fn publish<M>(&self, topic: &str, message: M) -> Result<usize>
    where
        M: Clone + Send + Sync + 'static,
    {
        Ok(self
            .attached()?
            .publish_from(Origin::Actor(self.actor.clone()), topic, message))
    }

    pub fn subscribe(&self, topic: &str) -> bool {
        let added = self.event_bus.subscribe(topic, &self.actor);
        if added {
            self.materializer.on_subscribe(&self.actor, topic).ok();
        }
        added
    }

    pub fn unsubscribe(&self, topic: &str) -> bool {
        let removed = self.event_bus.unsubscribe(topic, &self.actor);
        if removed {
            self.materializer.on_unsubscribe(&self.actor, topic).ok();
        }
        removed
    }

    fn attached(&self) -> Result<ActorSystem> {
        self.system()
            .ok_or_else(|| ActorError::Detached(self.actor.clone()))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("actor", &self.actor)
            .field("attached", &(self.system.strong_count() > 0))
            .finish()
    }
}

/// Supervisor's view of a failed actor
///
/// Every method takes the actor's internal lock for its own duration only.
/// Strategies run while the actor's pull lock is held, so no pull can
/// interleave with them.
pub trait Supervised: Send + Sync {
    fn id(&self) -> &ActorId;

    fn is_alive(&self) -> bool;

    fn history_len(&self) -> usize;

    fn mailbox_len(&self) -> usize;

    /// Retry counter of the mailbox head
    fn head_retries(&self) -> Option<u32>;

    /// Reset state, mailbox and history to snapshot `index`; a negative index
    /// goes back to before the first message
    fn navigate_to(&self, index: isize) -> Result<()>;

    /// Reset state and history to snapshot `index` but keep the live mailbox
    fn rewind(&self, index: isize) -> Result<()>;

    /// Remove the mailbox head
    fn discard_head(&self) -> bool;

    /// Put the mailbox head back with its retry counter incremented,
    /// returning the new counter
    fn retry_head(&self) -> Option<u32>;
}

/// Type-erased actor as stored in the registry
#[async_trait]
pub trait AnyActor: Supervised {
    /// Refuse new mail; queued mail is still drained
    fn kill(&self);

    /// Whether a pull currently holds the actor
    fn is_pulling(&self) -> bool;

    /// Name of the message type this actor accepts
    fn message_type(&self) -> &'static str;

    /// Process the mailbox head without supervision
    async fn pull(&self) -> Result<PullOutcome>;

    /// Process the mailbox head, letting the system's supervisor repair the
    /// actor if the handler fails. `Err` means the supervisor itself failed.
    async fn pull_supervised(&self, system: &ActorSystem) -> Result<PullOutcome>;

    /// Enqueue a payload whose type is only known at runtime
    fn deliver(
        &self,
        origin: Origin,
        message: Box<dyn Any + Send>,
        reply_to: Option<ReplyTo>,
    ) -> Result<()>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

struct Inner<B: Behavior> {
    state: B::State,
    initial_state: B::State,
    mailbox: Mailbox<B::Message>,
    history: TimeMachine<B::State, B::Message>,
}

/// An actor: behavior plus the state, mailbox and history it owns
pub struct Actor<B: Behavior> {
    id: ActorId,
    behavior: B,
    inner: Mutex<Inner<B>>,
    alive: AtomicBool,
    pull_lock: tokio::sync::Mutex<()>,
    materializer: Arc<MaterializerChain>,
    event_bus: Arc<dyn EventBus>,
    system: Weak<SystemCore>,
}

impl<B: Behavior> Actor<B> {
    /// Standalone actor, not registered in any system
    pub fn new(id: impl Into<ActorId>, behavior: B, initial_state: B::State) -> Self {
        Self::build(
            id.into(),
            behavior,
            initial_state,
            Arc::new(MaterializerChain::empty()),
            Arc::new(InMemoryEventBus::new()),
            Weak::new(),
        )
    }

    /// Actor wired to `system`; registration is up to the caller
    pub(crate) fn attached(
        id: ActorId,
        behavior: B,
        initial_state: B::State,
        system: &ActorSystem,
    ) -> Self {
        Self::build(
            id,
            behavior,
            initial_state,
            system.materializer(),
            system.event_bus(),
            system.downgrade(),
        )
    }

    fn build(
        id: ActorId,
        behavior: B,
        initial_state: B::State,
        materializer: Arc<MaterializerChain>,
        event_bus: Arc<dyn EventBus>,
        system: Weak<SystemCore>,
    ) -> Self {
        Self {
            id,
            behavior,
            inner: Mutex::new(Inner {
                state: initial_state.clone(),
                initial_state,
                mailbox: Mailbox::new(),
                history: TimeMachine::new(),
            }),
            alive: AtomicBool::new(true),
            pull_lock: tokio::sync::Mutex::new(()),
            materializer,
            event_bus,
            system,
        }
    }

    /// Add an observer to this actor's hook chain
    pub fn with_materializer(mut self, materializer: Arc<dyn Materializer>) -> Self {
        Arc::make_mut(&mut self.materializer).push(materializer);
        self
    }

    /// Start from a recorded history; the current state becomes the latest
    /// snapshot's state
    pub fn with_history(self, snapshots: Vec<Snapshot<B::State, B::Message>>) -> Self {
        {
            let mut inner = self.inner.lock();
            if let Some(latest) = snapshots.last() {
                inner.state = latest.state.clone();
            }
            inner.history = TimeMachine::with_history(snapshots);
        }
        self
    }

    /// Start with messages already queued
    pub fn with_mailbox(self, envelopes: Vec<Envelope<B::Message>>) -> Self {
        self.inner.lock().mailbox = Mailbox::from(envelopes);
        self
    }

    pub fn id(&self) -> &ActorId {
        &self.id
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Current state
    pub fn state(&self) -> B::State {
        self.inner.lock().state.clone()
    }

    /// Copy of the queued envelopes, head first
    pub fn mailbox(&self) -> Vec<Envelope<B::Message>> {
        self.inner.lock().mailbox.to_vec()
    }

    pub fn mailbox_len(&self) -> usize {
        self.inner.lock().mailbox.len()
    }

    /// Recorded snapshots, oldest first
    pub fn history(&self) -> Vec<Snapshot<B::State, B::Message>> {
        self.inner.lock().history.snapshots().to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }

    /// Context handed to this actor's handler
    pub fn context(&self) -> Context {
        Context {
            actor: self.id.clone(),
            system: self.system.clone(),
            event_bus: Arc::clone(&self.event_bus),
            materializer: Arc::clone(&self.materializer),
        }
    }

    fn system(&self) -> Option<ActorSystem> {
        self.system.upgrade().map(ActorSystem::from_core)
    }

    /// Append to the mailbox tail and ask the owning system for time.
    ///
    /// Dead actors refuse the envelope and fail its asker.
    pub fn receive_message(&self, envelope: Envelope<B::Message>) -> Result<()> {
        if !self.is_alive() {
            let error = ActorError::ActorNotAlive(self.id.clone());
            warn!(actor_id = %self.id, "Rejecting message for dead actor");
            if let Some(reply_to) = envelope.reply_to() {
                reply_to.reject(error.clone());
            }
            return Err(error);
        }

        let meta = envelope.meta();
        self.inner.lock().mailbox.push_back(envelope);
        self.materializer.on_receive_message(&self.id, &meta).ok();

        if let Some(system) = self.system() {
            system.request_time(&self.id);
        }
        Ok(())
    }

    /// Fire-and-forget message to `target` from this actor
    pub fn tell<T: Behavior>(&self, target: &Actor<T>, message: T::Message) -> Result<()> {
        target.receive_message(Envelope::new(Origin::Actor(self.id.clone()), message))
    }

    /// Message to `target` from this actor whose reply can be awaited
    pub fn ask<T: Behavior>(
        &self,
        target: &Actor<T>,
        message: T::Message,
    ) -> PendingReply<T::Reply> {
        let (reply_to, pending) = ReplyTo::channel(target.id().clone());
        let envelope = Envelope::with_reply(Origin::Actor(self.id.clone()), message, reply_to);
        if let Err(e) = target.receive_message(envelope) {
            debug!(actor_id = %self.id, target = %target.id(), error = %e, "Ask was refused");
        }
        pending
    }

    /// Handle the mailbox head, if any
    pub async fn pull(&self) -> Result<PullOutcome> {
        let _guard = self.pull_lock.lock().await;
        self.pull_locked().await
    }

    async fn pull_locked(&self) -> Result<PullOutcome> {
        let (envelope, state) = {
            let inner = self.inner.lock();
            match inner.mailbox.front() {
                Some(head) => (head.clone(), inner.state.clone()),
                None => return Ok(PullOutcome::Idle),
            }
        };

        let meta = envelope.meta();
        self.materializer
            .on_before_pulling_message(&self.id, &meta)
            .ok();

        let ctx = self.context();
        let message = envelope.shared_message();
        let outcome = AssertUnwindSafe(self.behavior.handle(state, &message, &ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(anyhow::anyhow!("handler panicked: {}", panic_message(panic.as_ref())))
            });

        match outcome {
            Ok(Transition { state, reply }) => {
                {
                    let mut inner = self.inner.lock();
                    inner.mailbox.pop_front();
                    inner.state = state.clone();
                    let mailbox = inner.mailbox.to_vec();
                    inner.history.push(Snapshot { state, mailbox });
                }

                self.materializer
                    .on_after_message_processed(&self.id, &meta)
                    .ok();

                if let Some(reply_to) = envelope.reply_to() {
                    match reply {
                        Some(value) => reply_to.fulfill(Box::new(value)),
                        None => reply_to.reject(ActorError::NoReply(self.id.clone())),
                    };
                }
                Ok(PullOutcome::Processed)
            }
            Err(cause) => {
                let error = ActorError::handler(self.id.clone(), cause);
                error!(
                    actor_id = %self.id,
                    error = %error,
                    retries = meta.retries,
                    "Actor message processing failed"
                );

                self.materializer.on_error(&self.id, &meta, &error).ok();

                if let Some(reply_to) = envelope.reply_to() {
                    reply_to.reject(error.clone());
                }
                Err(error)
            }
        }
    }

    /// Stop accepting new mail. Queued mail is kept and still drained.
    pub fn kill(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            debug!(actor_id = %self.id, "Actor killed");
            self.materializer.on_deactivate(&self.id).ok();
        }
    }

    /// Reset state, mailbox and history to snapshot `index`.
    ///
    /// Meant for supervisor strategies: calling it while a pull is in flight
    /// corrupts that pull's commit.
    pub fn navigate_to(&self, index: isize) -> Result<()> {
        let mut inner = self.inner.lock();
        let (state, mailbox) = match inner.history.navigate_to(index)? {
            Some(snapshot) => (snapshot.state, Mailbox::from(snapshot.mailbox)),
            None => (inner.initial_state.clone(), Mailbox::new()),
        };
        inner.state = state;
        inner.mailbox = mailbox;
        Ok(())
    }

    fn rewind_state(&self, index: isize) -> Result<()> {
        let mut inner = self.inner.lock();
        let state = match inner.history.navigate_to(index)? {
            Some(snapshot) => snapshot.state,
            None => inner.initial_state.clone(),
        };
        inner.state = state;
        Ok(())
    }
}

impl<B: Behavior> Supervised for Actor<B> {
    fn id(&self) -> &ActorId {
        &self.id
    }

    fn is_alive(&self) -> bool {
        Actor::is_alive(self)
    }

    fn history_len(&self) -> usize {
        Actor::history_len(self)
    }

    fn mailbox_len(&self) -> usize {
        Actor::mailbox_len(self)
    }

    fn head_retries(&self) -> Option<u32> {
        self.inner.lock().mailbox.front().map(Envelope::retries)
    }

    fn navigate_to(&self, index: isize) -> Result<()> {
        Actor::navigate_to(self, index)
    }

    fn rewind(&self, index: isize) -> Result<()> {
        self.rewind_state(index)
    }

    fn discard_head(&self) -> bool {
        self.inner.lock().mailbox.pop_front().is_some()
    }

    fn retry_head(&self) -> Option<u32> {
        let mut inner = self.inner.lock();
        let head = inner.mailbox.pop_front()?;
        let retried = head.retried();
        let retries = retried.retries();
        inner.mailbox.push_front(retried);
        Some(retries)
    }
}

#[async_trait]
impl<B: Behavior> AnyActor for Actor<B> {
    fn kill(&self) {
        Actor::kill(self)
    }

    fn is_pulling(&self) -> bool {
        self.pull_lock.try_lock().is_err()
    }

    fn message_type(&self) -> &'static str {
        std::any::type_name::<B::Message>()
    }

    async fn pull(&self) -> Result<PullOutcome> {
        Actor::pull(self).await
    }

    async fn pull_supervised(&self, system: &ActorSystem) -> Result<PullOutcome> {
        let _guard = self.pull_lock.lock().await;
        match self.pull_locked().await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                system.supervise(self, &error)?;
                Ok(PullOutcome::Failed)
            }
        }
    }

    fn deliver(
        &self,
        origin: Origin,
        message: Box<dyn Any + Send>,
        reply_to: Option<ReplyTo>,
    ) -> Result<()> {
        match message.downcast::<B::Message>() {
            Ok(message) => {
                let envelope = Envelope::from_shared(origin, Arc::from(message), reply_to);
                self.receive_message(envelope)
            }
            Err(_) => {
                let error = ActorError::MessageTypeMismatch {
                    actor: self.id.clone(),
                    expected: std::any::type_name::<B::Message>(),
                };
                warn!(actor_id = %self.id, error = %error, "Rejecting message of wrong type");
                if let Some(reply_to) = reply_to {
                    reply_to.reject(error.clone());
                }
                Err(error)
            }
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<B: Behavior> ActorTarget for Actor<B> {
    fn actor_id(&self) -> ActorId {
        self.id.clone()
    }
}

impl<B: Behavior> fmt::Debug for Actor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .field("mailbox_len", &inner.mailbox.len())
            .field("history_len", &inner.history.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
