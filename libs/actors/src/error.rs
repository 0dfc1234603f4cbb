//! Actor Runtime Error Types
//!
//! One error type covers handler failures, supervisor failures and the
//! routing/API errors of the system. It is `Clone` because a single handler
//! failure is delivered both to a waiting `ask` caller and to the supervisor.

use crate::registry::ActorId;
use std::sync::Arc;
use thiserror::Error;

/// Actor runtime errors
#[derive(Error, Debug, Clone)]
pub enum ActorError {
    /// Handler returned an error or panicked while processing a message
    #[error("actor {actor} failed to handle message: {cause}")]
    Handler {
        actor: ActorId,
        cause: Arc<anyhow::Error>,
    },

    /// A custom supervisor strategy failed while recovering an actor
    #[error("supervisor failed to recover actor {actor}: {reason}")]
    Supervisor { actor: ActorId, reason: String },

    /// No actor registered under this id
    #[error("actor {0} not found")]
    ActorNotFound(ActorId),

    /// Actor was killed and refuses new mail
    #[error("actor {0} is not alive and refuses new messages")]
    ActorNotAlive(ActorId),

    /// Id already taken by a registered actor
    #[error("actor {0} is already registered")]
    DuplicateActor(ActorId),

    /// Payload type is not the message type of the target actor
    #[error("actor {actor} expects messages of type {expected}")]
    MessageTypeMismatch {
        actor: ActorId,
        expected: &'static str,
    },

    /// Reply could not be downcast to the type the asker expected
    #[error("reply from actor {actor} is not of type {expected}")]
    ReplyTypeMismatch {
        actor: ActorId,
        expected: &'static str,
    },

    /// Handler succeeded but produced no reply for an ask
    #[error("actor {0} processed the message without replying")]
    NoReply(ActorId),

    /// Reply channel was dropped before the message was settled
    #[error("reply channel dropped before the message was processed")]
    ReplyDropped,

    /// History index past the end of the time machine
    #[error("cannot navigate to snapshot {index}: history has {len} entries")]
    InvalidRewind { index: isize, len: usize },

    /// Context used outside of a running actor system
    #[error("actor {0} is not attached to an actor system")]
    Detached(ActorId),

    /// Configuration loading or validation failed
    #[error("configuration error: {message}")]
    Config {
        message: String,
        field: Option<String>,
    },
}

impl ActorError {
    /// Wrap a handler failure
    pub fn handler(actor: ActorId, cause: anyhow::Error) -> Self {
        Self::Handler {
            actor,
            cause: Arc::new(cause),
        }
    }

    /// Configuration error with optional offending field
    pub fn configuration(message: &str, field: Option<&str>) -> Self {
        Self::Config {
            message: message.to_string(),
            field: field.map(str::to_string),
        }
    }

    /// Underlying handler error, if this is a handler failure
    ///
    /// Supervisors use this to route by error type:
    /// `error.handler_cause().and_then(|e| e.downcast_ref::<MyError>())`.
    pub fn handler_cause(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Handler { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }

    /// Short category label for structured logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Handler { .. } => "handler",
            Self::Supervisor { .. } => "supervisor",
            Self::ActorNotFound(_)
            | Self::ActorNotAlive(_)
            | Self::DuplicateActor(_)
            | Self::Detached(_) => "routing",
            Self::MessageTypeMismatch { .. } | Self::ReplyTypeMismatch { .. } => "type",
            Self::NoReply(_) | Self::ReplyDropped => "reply",
            Self::InvalidRewind { .. } => "history",
            Self::Config { .. } => "config",
        }
    }
}

/// Result type for actor runtime operations
pub type Result<T, E = ActorError> = std::result::Result<T, E>;
