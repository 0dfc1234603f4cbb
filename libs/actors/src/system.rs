//! Actor System Core
//!
//! Registry of actors plus the scheduling loop that gives them time to pull.
//!
//! # Scheduling
//!
//! Delivering a message marks its actor *hot* and makes sure the scheduler is
//! running. Every tick drains the hot set and spawns one pull task per hot
//! actor. An actor whose previous pull is still in flight is deferred to the
//! next tick instead, so pulls of one actor never overlap.
//!
//! A tick that finds nothing hot counts as idle. After more than
//! [`IDLE_TICKS_BEFORE_STOP`] consecutive idle ticks the scheduler stops
//! itself; the next delivery starts it again.
//!
//! # Shutdown
//!
//! [`ActorSystem::stop`] kills every actor, stops the scheduler and then keeps
//! forcing pulls of every registered actor until all mailboxes are empty.
//! Killed actors refuse new mail, so the drain terminates as long as the
//! supervisor eventually drops each failing message.
//!
//! # Lock Ordering
//!
//! When acquiring multiple locks, ALWAYS follow this order:
//! 1. `registry` (read or write)
//! 2. `schedule`
//! 3. scheduler trigger slot
//!
//! No lock is held across an `.await`.

use crate::actor::{Actor, AnyActor, Behavior, PullOutcome, Supervised};
use crate::config::SystemConfig;
use crate::envelope::{Origin, PendingReply, ReplyTo};
use crate::event_bus::{EventBus, InMemoryEventBus};
use crate::materializer::{Materializer, MaterializerChain};
use crate::metrics::{SystemMetrics, SystemStats};
use crate::registry::{ActorId, ActorRegistry, ActorTarget};
use crate::scheduler::Scheduler;
use crate::supervisor::{DropSupervisor, Supervisor};
use crate::{ActorError, Result};

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Consecutive idle ticks tolerated before the scheduler stops itself
pub const IDLE_TICKS_BEFORE_STOP: u32 = 2;

/// Upper bound on one wait of the shutdown drain; pulls started outside the
/// scheduler do not signal progress
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
struct ScheduleState {
    hot: HashSet<ActorId>,
    idle_ticks: u32,
}

pub(crate) struct SystemCore {
    system_id: String,
    registry: ActorRegistry,
    schedule: Mutex<ScheduleState>,
    scheduler: Scheduler,
    supervisor: Arc<dyn Supervisor>,
    materializer: Arc<MaterializerChain>,
    event_bus: Arc<dyn EventBus>,
    metrics: Arc<SystemMetrics>,
    /// Set while `stop` drains; keeps deliveries from restarting the scheduler
    stopping: AtomicBool,
    /// Signalled after every scheduled pull completes
    progress: Notify,
}

/// Core actor system managing actor lifecycles and scheduling
///
/// Cloning is cheap; all clones share the same system.
#[derive(Clone)]
pub struct ActorSystem {
    core: Arc<SystemCore>,
}

impl ActorSystem {
    /// System with a continuous scheduler, the Drop supervisor, no
    /// materializers and an in-memory event bus
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ActorSystemBuilder {
        ActorSystemBuilder::new()
    }

    pub(crate) fn from_core(core: Arc<SystemCore>) -> Self {
        Self { core }
    }

    pub(crate) fn downgrade(&self) -> Weak<SystemCore> {
        Arc::downgrade(&self.core)
    }

    pub(crate) fn materializer(&self) -> Arc<MaterializerChain> {
        Arc::clone(&self.core.materializer)
    }

    pub fn system_id(&self) -> &str {
        &self.core.system_id
    }

    pub fn event_bus(&self) -> Arc<dyn EventBus> {
        Arc::clone(&self.core.event_bus)
    }

    pub fn metrics(&self) -> Arc<SystemMetrics> {
        Arc::clone(&self.core.metrics)
    }

    pub fn stats(&self) -> SystemStats {
        self.core.metrics.stats()
    }

    /// Whether the scheduler is currently ticking
    pub fn is_running(&self) -> bool {
        self.core.scheduler.is_running()
    }

    /// Create and register an actor
    pub fn spawn<B: Behavior>(
        &self,
        id: impl Into<ActorId>,
        behavior: B,
        initial_state: B::State,
    ) -> Result<Arc<Actor<B>>> {
        let actor = Arc::new(Actor::attached(id.into(), behavior, initial_state, self));
        self.core.registry.register(actor.clone())?;

        self.core.metrics.record_actor_spawned();
        self.core.materializer.on_activate(actor.id()).ok();
        debug!(
            actor_id = %actor.id(),
            system_id = %self.core.system_id,
            behavior = std::any::type_name::<B>(),
            "Actor spawned"
        );
        Ok(actor)
    }

    pub fn get_actor<T: ActorTarget>(&self, target: T) -> Option<Arc<dyn AnyActor>> {
        self.core.registry.get(&target.actor_id())
    }

    /// Registered actor with its concrete behavior type
    pub fn get_typed<B: Behavior, T: ActorTarget>(&self, target: T) -> Option<Arc<Actor<B>>> {
        self.get_actor(target)?.into_any().downcast::<Actor<B>>().ok()
    }

    pub fn actor_ids(&self) -> Vec<ActorId> {
        self.core.registry.ids()
    }

    /// Kill an actor and remove it from the system.
    ///
    /// An in-flight pull still commits and settles its reply. Queued mail stays
    /// with the actor: a caller holding the `Arc` from `spawn` can keep pulling
    /// it, otherwise it goes with the last reference and pending asks settle
    /// with `ReplyDropped`.
    pub fn kill_actor<T: ActorTarget>(&self, target: T) -> Result<()> {
        let id = target.actor_id();
        let actor = self
            .core
            .registry
            .unregister(&id)
            .ok_or_else(|| ActorError::ActorNotFound(id.clone()))?;

        actor.kill();
        let queued = actor.mailbox_len();
        self.core.event_bus.unsubscribe_all(&id);
        self.core.schedule.lock().hot.remove(&id);
        self.core.metrics.record_actor_killed();

        debug!(
            actor_id = %id,
            system_id = %self.core.system_id,
            queued,
            "Actor killed and unregistered"
        );
        Ok(())
    }

    /// Start the scheduler
    pub fn start(&self) {
        self.core.stopping.store(false, Ordering::Release);
        self.core.schedule.lock().idle_ticks = 0;
        if self.core.scheduler.start() {
            info!(system_id = %self.core.system_id, "Actor system started");
        }
    }

    /// Kill every actor, stop the scheduler and drain all mailboxes.
    ///
    /// Actors stay registered. Resolves once every mailbox is empty.
    pub async fn stop(&self) {
        info!(system_id = %self.core.system_id, "Stopping actor system");
        self.core.stopping.store(true, Ordering::Release);

        for actor in self.core.registry.actors() {
            actor.kill();
        }
        self.core.scheduler.stop();

        loop {
            let progress = self.core.progress.notified();
            if self.is_drained() {
                break;
            }
            self.pull_all_actor_mailboxes(true);
            let _ = tokio::time::timeout(DRAIN_POLL_INTERVAL, progress).await;
        }

        info!(system_id = %self.core.system_id, "Actor system drained");
    }

    fn is_drained(&self) -> bool {
        self.core
            .registry
            .actors()
            .iter()
            .all(|actor| actor.mailbox_len() == 0)
    }

    /// Mark an actor hot and make sure the scheduler is running
    pub fn request_time(&self, id: &ActorId) {
        let mut schedule = self.core.schedule.lock();
        schedule.idle_ticks = 0;
        schedule.hot.insert(id.clone());

        if !self.core.stopping.load(Ordering::Acquire) {
            self.core.scheduler.start();
        }
    }

    /// One scheduling tick: pull every hot actor, or every registered actor
    /// when `force_all` is set
    pub fn pull_all_actor_mailboxes(&self, force_all: bool) {
        self.core.metrics.record_tick();

        let hot: Vec<ActorId> = {
            let mut schedule = self.core.schedule.lock();
            if schedule.hot.is_empty() && !force_all {
                schedule.idle_ticks += 1;
                self.core.metrics.record_idle_tick();

                if schedule.idle_ticks > IDLE_TICKS_BEFORE_STOP {
                    if self.core.scheduler.stop() {
                        self.core.metrics.record_idle_stop();
                        debug!(system_id = %self.core.system_id, "Scheduler idle, stopping");
                    }
                }
                return;
            }
            schedule.hot.drain().collect()
        };

        let selected = if force_all {
            self.core.registry.ids()
        } else {
            hot
        };

        for id in selected {
            self.spawn_pull(id);
        }
    }

    fn spawn_pull(&self, id: ActorId) {
        let Some(actor) = self.core.registry.get(&id) else {
            debug!(actor_id = %id, "Skipping pull for unregistered actor");
            return;
        };

        if actor.is_pulling() {
            debug!(actor_id = %id, "Actor busy, deferring to next tick");
            self.core.schedule.lock().hot.insert(id);
            return;
        }

        let system = self.clone();
        tokio::spawn(async move {
            system.run_pull(actor).await;
        });
    }

    async fn run_pull(&self, actor: Arc<dyn AnyActor>) {
        let started = Instant::now();
        match actor.pull_supervised(self).await {
            Ok(PullOutcome::Processed) => {
                self.core
                    .metrics
                    .record_message_processed(started.elapsed());
            }
            Ok(PullOutcome::Idle | PullOutcome::Failed) => {}
            Err(e) => {
                error!(
                    actor_id = %actor.id(),
                    system_id = %self.core.system_id,
                    error = %e,
                    "Supervisor failed to recover actor"
                );
                self.core.metrics.record_supervisor_failure();
            }
        }

        if actor.mailbox_len() > 0 {
            self.request_time(actor.id());
        }
        self.core.progress.notify_waiters();
    }

    /// Apply the supervisor's strategy to a failed actor
    pub(crate) fn supervise(&self, actor: &dyn Supervised, error: &ActorError) -> Result<()> {
        let strategy = self.core.supervisor.classify(self, actor, error);
        self.core.metrics.record_strategy(&strategy);
        warn!(
            actor_id = %actor.id(),
            strategy = strategy.name(),
            retries = ?actor.head_retries(),
            "Applying supervisor strategy"
        );
        strategy.apply(self, actor)
    }

    /// Fire-and-forget message from outside any actor
    pub fn tell<T, M>(&self, target: T, message: M) -> Result<()>
    where
        T: ActorTarget,
        M: Send + Sync + 'static,
    {
        self.deliver(Origin::System, target.actor_id(), Box::new(message), None)
    }

    /// Message from outside any actor whose reply can be awaited
    pub fn ask<T, M, R>(&self, target: T, message: M) -> PendingReply<R>
    where
        T: ActorTarget,
        M: Send + Sync + 'static,
        R: Send + 'static,
    {
        self.ask_from(Origin::System, target.actor_id(), message)
    }

    /// Tell every subscriber of `topic`, returning how many accepted it
    pub fn publish<M>(&self, topic: &str, message: M) -> usize
    where
        M: Clone + Send + Sync + 'static,
    {
        self.publish_from(Origin::System, topic, message)
    }

    pub(crate) fn ask_from<M, R>(
        &self,
        origin: Origin,
        target: ActorId,
        message: M,
    ) -> PendingReply<R>
    where
        M: Send + Sync + 'static,
        R: Send + 'static,
    {
        let (reply_to, pending) = ReplyTo::channel(target.clone());
        if let Err(e) = self.deliver(origin, target, Box::new(message), Some(reply_to)) {
            debug!(error = %e, "Ask was refused");
        }
        pending
    }

    pub(crate) fn publish_from<M>(&self, origin: Origin, topic: &str, message: M) -> usize
    where
        M: Clone + Send + Sync + 'static,
    {
        let mut delivered = 0;
        for subscriber in self.core.event_bus.subscribers(topic) {
            match self.deliver(origin.clone(), subscriber, Box::new(message.clone()), None) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(topic, error = %e, "Skipping subscriber"),
            }
        }
        delivered
    }

    /// Route an erased payload to a registered actor; failures also reject
    /// `reply_to`
    pub(crate) fn deliver(
        &self,
        origin: Origin,
        target: ActorId,
        message: Box<dyn Any + Send>,
        reply_to: Option<ReplyTo>,
    ) -> Result<()> {
        match self.core.registry.get(&target) {
            Some(actor) => actor.deliver(origin, message, reply_to),
            None => {
                let error = ActorError::ActorNotFound(target);
                warn!(error = %error, "Rejecting message for unknown actor");
                if let Some(reply_to) = reply_to {
                    reply_to.reject(error.clone());
                }
                Err(error)
            }
        }
    }
}

impl Default for ActorSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("system_id", &self.core.system_id)
            .field("actors", &self.core.registry.len())
            .field("scheduler", &self.core.scheduler)
            .finish()
    }
}

/// Builder for [`ActorSystem`]
#[derive(Default)]
pub struct ActorSystemBuilder {
    scheduler_interval: Duration,
    supervisor: Option<Arc<dyn Supervisor>>,
    materializers: Vec<Arc<dyn Materializer>>,
    event_bus: Option<Arc<dyn EventBus>>,
}

impl ActorSystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time between ticks; zero ticks continuously
    pub fn with_scheduler_interval(mut self, interval: Duration) -> Self {
        self.scheduler_interval = interval;
        self
    }

    pub fn with_supervisor<S: Supervisor>(mut self, supervisor: S) -> Self {
        self.supervisor = Some(Arc::new(supervisor));
        self
    }

    /// Add a materializer; hooks run in the order materializers were added
    pub fn with_materializer<M: Materializer>(mut self, materializer: M) -> Self {
        self.materializers.push(Arc::new(materializer));
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Apply scheduler interval and supervisor policy from configuration
    pub fn with_config(mut self, config: &SystemConfig) -> Self {
        self.scheduler_interval = config.scheduler_interval();
        self.supervisor = Some(config.supervisor.build());
        self
    }

    pub fn build(self) -> ActorSystem {
        let system_id = format!("system-{}", Uuid::new_v4().simple());
        let interval = self.scheduler_interval;

        let core = Arc::new_cyclic(|weak: &Weak<SystemCore>| {
            let weak = weak.clone();
            SystemCore {
                system_id: system_id.clone(),
                registry: ActorRegistry::new(),
                schedule: Mutex::new(ScheduleState::default()),
                scheduler: Scheduler::new(interval, move || {
                    if let Some(core) = weak.upgrade() {
                        ActorSystem::from_core(core).pull_all_actor_mailboxes(false);
                    }
                }),
                supervisor: self.supervisor.unwrap_or_else(|| Arc::new(DropSupervisor)),
                materializer: Arc::new(MaterializerChain::new(self.materializers)),
                event_bus: self
                    .event_bus
                    .unwrap_or_else(|| Arc::new(InMemoryEventBus::new())),
                metrics: Arc::new(SystemMetrics::default()),
                stopping: AtomicBool::new(false),
                progress: Notify::new(),
            }
        });

        info!(
            system_id = %system_id,
            scheduler_interval_ms = interval.as_millis() as u64,
            "Created actor system"
        );
        ActorSystem { core }
    }
}

impl fmt::Debug for ActorSystemBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystemBuilder")
            .field("scheduler_interval", &self.scheduler_interval)
            .field("custom_supervisor", &self.supervisor.is_some())
            .field("materializers", &self.materializers.len())
            .finish()
    }
}
