//! Time Machine
//!
//! Append-only log of the snapshots an actor commits after each successfully
//! processed message. The only other mutation is a destructive rewind, used by
//! supervisor strategies to roll an actor back after a failure. There is no way
//! forward again once the tail has been discarded.

use crate::envelope::Envelope;
use crate::{ActorError, Result};
use std::fmt;

/// State and mailbox recorded right after a message was processed
pub struct Snapshot<S, M> {
    pub state: S,
    pub mailbox: Vec<Envelope<M>>,
}

impl<S: Clone, M> Clone for Snapshot<S, M> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            mailbox: self.mailbox.clone(),
        }
    }
}

impl<S: fmt::Debug, M: fmt::Debug> fmt::Debug for Snapshot<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("state", &self.state)
            .field("mailbox", &self.mailbox)
            .finish()
    }
}

pub struct TimeMachine<S, M> {
    snapshots: Vec<Snapshot<S, M>>,
}

impl<S: Clone, M> TimeMachine<S, M> {
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }

    /// Start from an existing history
    pub fn with_history(snapshots: Vec<Snapshot<S, M>>) -> Self {
        Self { snapshots }
    }

    pub fn push(&mut self, snapshot: Snapshot<S, M>) {
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&Snapshot<S, M>> {
        self.snapshots.last()
    }

    pub fn snapshots(&self) -> &[Snapshot<S, M>] {
        &self.snapshots
    }

    /// Rewind to `index`, discarding every later snapshot.
    ///
    /// A negative index clears the whole history and yields `None`, meaning
    /// "before the first message". Indices at or past the end are rejected.
    pub fn navigate_to(&mut self, index: isize) -> Result<Option<Snapshot<S, M>>> {
        if index < 0 {
            self.snapshots.clear();
            return Ok(None);
        }

        let position = index as usize;
        if position >= self.snapshots.len() {
            return Err(ActorError::InvalidRewind {
                index,
                len: self.snapshots.len(),
            });
        }

        self.snapshots.truncate(position + 1);
        Ok(self.snapshots.last().cloned())
    }
}

impl<S: Clone, M> Default for TimeMachine<S, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: fmt::Debug, M: fmt::Debug> fmt::Debug for TimeMachine<S, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.snapshots.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: u32) -> Snapshot<u32, ()> {
        Snapshot {
            state,
            mailbox: Vec::new(),
        }
    }

    fn states(machine: &TimeMachine<u32, ()>) -> Vec<u32> {
        machine.snapshots().iter().map(|s| s.state).collect()
    }

    #[test]
    fn test_push_appends_in_order() {
        let mut machine = TimeMachine::new();
        machine.push(snapshot(1));
        machine.push(snapshot(2));

        assert_eq!(states(&machine), vec![1, 2]);
        assert_eq!(machine.latest().unwrap().state, 2);
    }

    #[test]
    fn test_navigate_truncates_tail() {
        let mut machine = TimeMachine::with_history(vec![snapshot(1), snapshot(2), snapshot(3)]);

        let target = machine.navigate_to(1).unwrap().unwrap();

        assert_eq!(target.state, 2);
        assert_eq!(states(&machine), vec![1, 2]);
    }

    #[test]
    fn test_navigate_before_history_clears() {
        let mut machine = TimeMachine::with_history(vec![snapshot(1)]);

        assert!(machine.navigate_to(-1).unwrap().is_none());
        assert!(machine.is_empty());
    }

    #[test]
    fn test_cannot_navigate_forward() {
        let mut machine = TimeMachine::with_history(vec![snapshot(1), snapshot(2)]);
        machine.navigate_to(0).unwrap();

        let err = machine.navigate_to(1).unwrap_err();
        assert!(matches!(err, ActorError::InvalidRewind { index: 1, len: 1 }));
        assert_eq!(states(&machine), vec![1]);
    }
}
