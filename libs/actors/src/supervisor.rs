//! Supervision
//!
//! After a failed pull the system asks its [`Supervisor`] to classify the
//! failure into a [`Strategy`] and applies it to the failed actor while the
//! actor's pull lock is still held.
//!
//! Both built-in strategies rewind the actor to snapshot `history_len - 2`,
//! one commit before the latest, and keep the live mailbox:
//!
//! - **Drop** removes the failed head message
//! - **Retry** puts it back at the head with its retry counter incremented
//!
//! With a single recorded snapshot (or none) the rewind lands before the first
//! message and restores the initial state.

use crate::actor::Supervised;
use crate::system::ActorSystem;
use crate::{ActorError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Recovery action for a failed actor
pub type CustomStrategy = Arc<dyn Fn(&ActorSystem, &dyn Supervised) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub enum Strategy {
    /// Rewind and discard the failed message
    Drop,
    /// Rewind and re-queue the failed message at the head
    Retry,
    /// Arbitrary recovery; an error is reported as a supervisor failure
    Custom(CustomStrategy),
}

impl Strategy {
    pub fn custom<F>(recover: F) -> Self
    where
        F: Fn(&ActorSystem, &dyn Supervised) -> Result<()> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(recover))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Retry => "retry",
            Self::Custom(_) => "custom",
        }
    }

    pub fn apply(&self, system: &ActorSystem, actor: &dyn Supervised) -> Result<()> {
        match self {
            Self::Drop => drop_failed(actor),
            Self::Retry => retry_failed(actor),
            Self::Custom(recover) => recover(system, actor).map_err(|e| match e {
                ActorError::Supervisor { .. } => e,
                other => ActorError::Supervisor {
                    actor: actor.id().clone(),
                    reason: other.to_string(),
                },
            }),
        }
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn rewind_index(actor: &dyn Supervised) -> isize {
    actor.history_len() as isize - 2
}

/// Rewind the actor and discard its failed head message
pub fn drop_failed(actor: &dyn Supervised) -> Result<()> {
    actor.rewind(rewind_index(actor))?;
    let dropped = actor.discard_head();
    debug!(actor_id = %actor.id(), dropped, "Dropped failed message");
    Ok(())
}

/// Rewind the actor and re-queue its failed head message
pub fn retry_failed(actor: &dyn Supervised) -> Result<()> {
    actor.rewind(rewind_index(actor))?;
    let retries = actor.retry_head();
    debug!(actor_id = %actor.id(), ?retries, "Re-queued failed message");
    Ok(())
}

/// Chooses the recovery strategy for a failed message
pub trait Supervisor: Send + Sync + 'static {
    fn classify(
        &self,
        system: &ActorSystem,
        actor: &dyn Supervised,
        error: &ActorError,
    ) -> Strategy;
}

/// Always drops; the default supervisor
#[derive(Debug, Clone, Copy, Default)]
pub struct DropSupervisor;

impl Supervisor for DropSupervisor {
    fn classify(
        &self,
        _system: &ActorSystem,
        _actor: &dyn Supervised,
        _error: &ActorError,
    ) -> Strategy {
        Strategy::Drop
    }
}

/// Retries a failing message up to `max_retries` times, then drops it
#[derive(Debug, Clone, Copy)]
pub struct BoundedRetry {
    max_retries: u32,
}

impl BoundedRetry {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Supervisor for BoundedRetry {
    fn classify(
        &self,
        _system: &ActorSystem,
        actor: &dyn Supervised,
        _error: &ActorError,
    ) -> Strategy {
        match actor.head_retries() {
            Some(retries) if retries < self.max_retries => Strategy::Retry,
            _ => Strategy::Drop,
        }
    }
}

/// Supervisor backed by a closure
pub struct FnSupervisor<F> {
    classify: F,
}

/// Build a supervisor from a classification closure
///
/// ```ignore
/// let supervisor = supervisor_fn(|_system, _actor, error| match error.handler_cause() {
///     Some(cause) if cause.is::<Timeout>() => Strategy::Retry,
///     _ => Strategy::Drop,
/// });
/// ```
pub fn supervisor_fn<F>(classify: F) -> FnSupervisor<F>
where
    F: Fn(&ActorSystem, &dyn Supervised, &ActorError) -> Strategy + Send + Sync + 'static,
{
    FnSupervisor { classify }
}

impl<F> Supervisor for FnSupervisor<F>
where
    F: Fn(&ActorSystem, &dyn Supervised, &ActorError) -> Strategy + Send + Sync + 'static,
{
    fn classify(
        &self,
        system: &ActorSystem,
        actor: &dyn Supervised,
        error: &ActorError,
    ) -> Strategy {
        (self.classify)(system, actor, error)
    }
}

impl<F> fmt::Debug for FnSupervisor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSupervisor").finish_non_exhaustive()
    }
}

/// Any classification function is a supervisor. Unannotated closures need
/// [`supervisor_fn`] to infer their argument lifetimes.
impl<F> Supervisor for F
where
    F: Fn(&ActorSystem, &dyn Supervised, &ActorError) -> Strategy + Send + Sync + 'static,
{
    fn classify(
        &self,
        system: &ActorSystem,
        actor: &dyn Supervised,
        error: &ActorError,
    ) -> Strategy {
        self(system, actor, error)
    }
}
