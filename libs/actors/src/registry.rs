//! Actor Registry
//!
//! Flat id → actor map owned by the actor system.

use crate::actor::AnyActor;
use crate::{ActorError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique actor identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId {
    id: Arc<str>,
}

impl ActorId {
    /// Create a random actor ID
    pub fn new() -> Self {
        Self::from(format!("actor-{}", Uuid::new_v4().simple()))
    }

    /// Id as string slice
    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self { id: Arc::from(id) }
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        Self { id: Arc::from(id) }
    }
}

impl From<&ActorId> for ActorId {
    fn from(id: &ActorId) -> Self {
        id.clone()
    }
}

/// Anything that names an actor: an id, a string, or an actor handle
pub trait ActorTarget {
    fn actor_id(&self) -> ActorId;
}

impl ActorTarget for ActorId {
    fn actor_id(&self) -> ActorId {
        self.clone()
    }
}

impl ActorTarget for str {
    fn actor_id(&self) -> ActorId {
        ActorId::from(self)
    }
}

impl ActorTarget for String {
    fn actor_id(&self) -> ActorId {
        ActorId::from(self.as_str())
    }
}

impl ActorTarget for dyn AnyActor {
    fn actor_id(&self) -> ActorId {
        self.id().clone()
    }
}

impl<T: ActorTarget + ?Sized> ActorTarget for &T {
    fn actor_id(&self) -> ActorId {
        (**self).actor_id()
    }
}

impl<T: ActorTarget + ?Sized> ActorTarget for Arc<T> {
    fn actor_id(&self) -> ActorId {
        (**self).actor_id()
    }
}

/// Registry of live actors, exclusively owned by one system
#[derive(Default)]
pub struct ActorRegistry {
    actors: RwLock<HashMap<ActorId, Arc<dyn AnyActor>>>,
}

impl ActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register actor, refusing ids already in use
    pub fn register(&self, actor: Arc<dyn AnyActor>) -> Result<()> {
        let id = actor.id().clone();
        let mut actors = self.actors.write();
        if actors.contains_key(&id) {
            tracing::warn!(actor_id = %id, "Refusing to register duplicate actor id");
            return Err(ActorError::DuplicateActor(id));
        }
        tracing::debug!(actor_id = %id, "Registering actor");
        actors.insert(id, actor);
        Ok(())
    }

    /// Remove actor, returning it if it was registered
    pub fn unregister(&self, id: &ActorId) -> Option<Arc<dyn AnyActor>> {
        let removed = self.actors.write().remove(id);
        if removed.is_none() {
            tracing::warn!(actor_id = %id, "Attempted to unregister unknown actor");
        }
        removed
    }

    /// Find actor by id
    pub fn get(&self, id: &ActorId) -> Option<Arc<dyn AnyActor>> {
        self.actors.read().get(id).cloned()
    }

    pub fn contains(&self, id: &ActorId) -> bool {
        self.actors.read().contains_key(id)
    }

    /// Ids of all registered actors
    pub fn ids(&self) -> Vec<ActorId> {
        self.actors.read().keys().cloned().collect()
    }

    /// All registered actors
    pub fn actors(&self) -> Vec<Arc<dyn AnyActor>> {
        self.actors.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.actors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.read().is_empty()
    }
}

impl fmt::Debug for ActorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRegistry")
            .field("actors", &self.ids())
            .finish()
    }
}
