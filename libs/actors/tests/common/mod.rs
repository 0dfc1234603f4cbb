//! Shared fixtures for actor system integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rewind_actors::{ActorError, ActorId, Behavior, Context, Materializer, MessageMeta, Transition};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Initialize tracing for tests (safe to call from every test)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Append a value, reply with the new length
    Push(u32),
    /// Always fails
    Poison,
    /// Fails while the ledger still has failures left, then appends
    Flaky(u32),
    /// Subscribe this actor to a topic
    Subscribe(&'static str),
    /// Succeeds without a reply
    Silent,
}

/// Append-only list of values
#[derive(Default)]
pub struct Ledger {
    failures_left: AtomicU32,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger whose next `failures` flaky messages fail
    pub fn flaky(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl Behavior for Ledger {
    type State = Vec<u32>;
    type Message = Op;
    type Reply = usize;

    async fn handle(
        &self,
        mut state: Vec<u32>,
        message: &Op,
        ctx: &Context,
    ) -> anyhow::Result<Transition<Vec<u32>, usize>> {
        match message {
            Op::Push(value) => {
                state.push(*value);
            }
            Op::Poison => anyhow::bail!("poisoned message"),
            Op::Flaky(value) => {
                let remaining = self.failures_left.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.failures_left.store(remaining - 1, Ordering::SeqCst);
                    anyhow::bail!("flaky failure, {} left", remaining - 1);
                }
                state.push(*value);
            }
            Op::Subscribe(topic) => {
                ctx.subscribe(topic);
            }
            Op::Silent => return Ok(Transition::to(state)),
        }
        let len = state.len();
        Ok(Transition::reply(state, len))
    }
}

/// Appends each value after a fixed delay, replying with the new length
pub struct Slow {
    delay: Duration,
}

impl Slow {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Behavior for Slow {
    type State = Vec<u32>;
    type Message = u32;
    type Reply = usize;

    async fn handle(
        &self,
        mut state: Vec<u32>,
        value: &u32,
        _ctx: &Context,
    ) -> anyhow::Result<Transition<Vec<u32>, usize>> {
        tokio::time::sleep(self.delay).await;
        state.push(*value);
        let len = state.len();
        Ok(Transition::reply(state, len))
    }
}

/// Records every hook call as `hook:actor`
#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(&self, hook: &str, actor: &ActorId) -> anyhow::Result<()> {
        self.events.lock().push(format!("{}:{}", hook, actor));
        Ok(())
    }
}

impl Materializer for Recorder {
    fn on_activate(&self, actor: &ActorId) -> anyhow::Result<()> {
        self.record("activate", actor)
    }

    fn on_deactivate(&self, actor: &ActorId) -> anyhow::Result<()> {
        self.record("deactivate", actor)
    }

    fn on_receive_message(&self, actor: &ActorId, _message: &MessageMeta) -> anyhow::Result<()> {
        self.record("receive", actor)
    }

    fn on_before_pulling_message(
        &self,
        actor: &ActorId,
        _message: &MessageMeta,
    ) -> anyhow::Result<()> {
        self.record("before", actor)
    }

    fn on_after_message_processed(
        &self,
        actor: &ActorId,
        _message: &MessageMeta,
    ) -> anyhow::Result<()> {
        self.record("after", actor)
    }

    fn on_error(
        &self,
        actor: &ActorId,
        _message: &MessageMeta,
        _error: &ActorError,
    ) -> anyhow::Result<()> {
        self.record("error", actor)
    }

    fn on_subscribe(&self, actor: &ActorId, topic: &str) -> anyhow::Result<()> {
        self.record(&format!("subscribe[{}]", topic), actor)
    }
}

/// Fails every hook it implements
pub struct Broken;

impl Materializer for Broken {
    fn on_receive_message(&self, _actor: &ActorId, _message: &MessageMeta) -> anyhow::Result<()> {
        anyhow::bail!("materializer offline")
    }

    fn on_after_message_processed(
        &self,
        _actor: &ActorId,
        _message: &MessageMeta,
    ) -> anyhow::Result<()> {
        panic!("materializer exploded")
    }
}
