//! Actor Mailbox
//!
//! Strict FIFO queue of envelopes. Messages enter at the tail through
//! `receive_message`, leave from the head after a successful pull, and only
//! supervisor strategies touch the head otherwise.

use crate::envelope::Envelope;
use std::collections::VecDeque;
use std::fmt;

/// FIFO queue of envelopes owned by one actor
pub struct Mailbox<M> {
    queue: VecDeque<Envelope<M>>,
}

impl<M> Mailbox<M> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Append at the tail
    pub fn push_back(&mut self, envelope: Envelope<M>) {
        self.queue.push_back(envelope);
    }

    /// Put an envelope back at the head
    pub fn push_front(&mut self, envelope: Envelope<M>) {
        self.queue.push_front(envelope);
    }

    /// Peek the head without removing it
    pub fn front(&self) -> Option<&Envelope<M>> {
        self.queue.front()
    }

    /// Remove the head
    pub fn pop_front(&mut self) -> Option<Envelope<M>> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope<M>> {
        self.queue.iter()
    }

    /// Copy of the queue in FIFO order
    pub fn to_vec(&self) -> Vec<Envelope<M>> {
        self.queue.iter().cloned().collect()
    }
}

impl<M> Default for Mailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<M> From<Vec<Envelope<M>>> for Mailbox<M> {
    fn from(envelopes: Vec<Envelope<M>>) -> Self {
        Self {
            queue: envelopes.into(),
        }
    }
}

impl<M: fmt::Debug> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.queue.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Origin;

    fn payloads(mailbox: &Mailbox<&'static str>) -> Vec<&'static str> {
        mailbox.iter().map(|e| *e.message()).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut mailbox = Mailbox::new();
        mailbox.push_back(Envelope::new(Origin::System, "A"));
        mailbox.push_back(Envelope::new(Origin::System, "B"));
        mailbox.push_back(Envelope::new(Origin::System, "C"));

        assert_eq!(*mailbox.front().unwrap().message(), "A");
        assert_eq!(*mailbox.pop_front().unwrap().message(), "A");
        assert_eq!(payloads(&mailbox), vec!["B", "C"]);
    }

    #[test]
    fn test_push_front_reinserts_head() {
        let mut mailbox = Mailbox::from(vec![
            Envelope::new(Origin::System, "A"),
            Envelope::new(Origin::System, "B"),
        ]);

        let head = mailbox.pop_front().unwrap();
        mailbox.push_front(head.retried());

        assert_eq!(payloads(&mailbox), vec!["A", "B"]);
        assert_eq!(mailbox.front().unwrap().retries(), 1);
    }

    #[test]
    fn test_to_vec_is_a_copy() {
        let mut mailbox = Mailbox::new();
        mailbox.push_back(Envelope::new(Origin::System, "A"));

        let copy = mailbox.to_vec();
        mailbox.pop_front();

        assert!(mailbox.is_empty());
        assert_eq!(copy.len(), 1);
    }
}
