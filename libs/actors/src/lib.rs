//! In-Process Actor Runtime with Rewindable History
//!
//! Actors own a state, a FIFO mailbox and a time machine of the snapshots they
//! committed. Handlers are pure transitions; when one fails, a supervisor
//! strategy rewinds the actor's history and drops or retries the failed
//! message.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     ActorSystem                      │
//! │                                                      │
//! │  tell/ask ──► registry ──► Actor.receive_message     │
//! │                               │ request_time         │
//! │                               ▼                      │
//! │  Scheduler tick ──► hot set ──► pull task per actor  │
//! │                                   │                  │
//! │                     ok ◄──────────┴──────► failure   │
//! │              snapshot + reply          Supervisor    │
//! │                                     (Drop / Retry)   │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use rewind_actors::{ActorSystem, Behavior, Context, Transition};
//!
//! struct Counter;
//!
//! #[async_trait]
//! impl Behavior for Counter {
//!     type State = u64;
//!     type Message = u64;
//!     type Reply = u64;
//!
//!     async fn handle(
//!         &self,
//!         state: u64,
//!         add: &u64,
//!         _ctx: &Context,
//!     ) -> anyhow::Result<Transition<u64, u64>> {
//!         Ok(Transition::reply(state + add, state + add))
//!     }
//! }
//!
//! # async fn run() -> rewind_actors::Result<()> {
//! let system = ActorSystem::new();
//! system.spawn("counter", Counter, 0)?;
//!
//! let total: u64 = system.ask("counter", 5u64).await?;
//! assert_eq!(total, 5);
//!
//! system.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod envelope;
pub mod error;
pub mod event_bus;
pub mod mailbox;
pub mod materializer;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod supervisor;
pub mod system;
pub mod time_machine;

pub use actor::{Actor, AnyActor, Behavior, Context, PullOutcome, Supervised, Transition};
pub use config::{SupervisorPolicy, SystemConfig};
pub use envelope::{Envelope, MessageMeta, Origin, PendingReply, ReplyTo};
pub use error::{ActorError, Result};
pub use event_bus::{EventBus, EventBusStats, InMemoryEventBus};
pub use mailbox::Mailbox;
pub use materializer::{Materializer, MaterializerChain};
pub use metrics::{SystemMetrics, SystemStats};
pub use registry::{ActorId, ActorRegistry, ActorTarget};
pub use scheduler::Scheduler;
pub use supervisor::{
    drop_failed, retry_failed, supervisor_fn, BoundedRetry, DropSupervisor, Strategy, Supervisor,
};
pub use system::{ActorSystem, ActorSystemBuilder, IDLE_TICKS_BEFORE_STOP};
pub use time_machine::{Snapshot, TimeMachine};
