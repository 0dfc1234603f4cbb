//! Event Bus
//!
//! Topic subscriptions for pub/sub between actors. The actor system only needs
//! to know who is subscribed to what; delivery goes through the normal
//! `tell` path so published events land in mailboxes like any other message.

use crate::registry::ActorId;
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

/// Topic subscription store shared by a system and its actors
pub trait EventBus: Send + Sync + 'static {
    /// Subscribe an actor; false if it was already subscribed
    fn subscribe(&self, topic: &str, subscriber: &ActorId) -> bool;

    /// Unsubscribe an actor; false if it was not subscribed
    fn unsubscribe(&self, topic: &str, subscriber: &ActorId) -> bool;

    /// Drop every subscription of an actor, returning how many were removed
    fn unsubscribe_all(&self, subscriber: &ActorId) -> usize;

    /// Current subscribers of a topic
    fn subscribers(&self, topic: &str) -> Vec<ActorId>;
}

/// In-memory event bus used when none is configured
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    /// Topic to subscribers
    topics: DashMap<String, HashSet<ActorId>>,
    /// Reverse mapping: subscriber to topics
    subscriptions: DashMap<ActorId, HashSet<String>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Topics an actor is subscribed to
    pub fn topics_of(&self, subscriber: &ActorId) -> Vec<String> {
        self.subscriptions
            .get(subscriber)
            .map(|topics| topics.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            total_topics: self.topics.len(),
            total_subscribers: self.subscriptions.len(),
            total_subscriptions: self
                .subscriptions
                .iter()
                .map(|entry| entry.value().len())
                .sum(),
        }
    }
}

impl EventBus for InMemoryEventBus {
    fn subscribe(&self, topic: &str, subscriber: &ActorId) -> bool {
        let added = self
            .topics
            .entry(topic.to_string())
            .or_default()
            .insert(subscriber.clone());

        if added {
            self.subscriptions
                .entry(subscriber.clone())
                .or_default()
                .insert(topic.to_string());
            debug!(actor_id = %subscriber, topic, "Actor subscribed to topic");
        }
        added
    }

    fn unsubscribe(&self, topic: &str, subscriber: &ActorId) -> bool {
        let removed = self
            .topics
            .get_mut(topic)
            .map(|mut subscribers| subscribers.remove(subscriber))
            .unwrap_or(false);

        if removed {
            if let Some(mut topics) = self.subscriptions.get_mut(subscriber) {
                topics.remove(topic);
            }
            self.subscriptions.remove_if(subscriber, |_, topics| topics.is_empty());
            self.topics.remove_if(topic, |_, subscribers| subscribers.is_empty());
            debug!(actor_id = %subscriber, topic, "Actor unsubscribed from topic");
        }
        removed
    }

    fn unsubscribe_all(&self, subscriber: &ActorId) -> usize {
        let Some((_, topics)) = self.subscriptions.remove(subscriber) else {
            return 0;
        };

        for topic in &topics {
            if let Some(mut subscribers) = self.topics.get_mut(topic) {
                subscribers.remove(subscriber);
            }
            self.topics.remove_if(topic, |_, subscribers| subscribers.is_empty());
        }
        debug!(actor_id = %subscriber, count = topics.len(), "Actor unsubscribed from all topics");
        topics.len()
    }

    fn subscribers(&self, topic: &str) -> Vec<ActorId> {
        let mut subscribers: Vec<ActorId> = self
            .topics
            .get(topic)
            .map(|subscribers| subscribers.iter().cloned().collect())
            .unwrap_or_default();
        subscribers.sort();
        subscribers
    }
}

/// Event bus statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBusStats {
    pub total_topics: usize,
    pub total_subscribers: usize,
    pub total_subscriptions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_subscription() {
        let bus = InMemoryEventBus::new();
        let alice = ActorId::from("alice");
        let bob = ActorId::from("bob");

        assert!(bus.subscribe("prices", &alice));
        assert!(!bus.subscribe("prices", &alice));
        assert!(bus.subscribe("prices", &bob));
        assert!(bus.subscribe("orders", &alice));

        assert_eq!(bus.subscribers("prices"), vec![alice.clone(), bob.clone()]);
        assert_eq!(bus.topics_of(&alice).len(), 2);

        assert!(bus.unsubscribe("prices", &alice));
        assert!(!bus.unsubscribe("prices", &alice));
        assert_eq!(bus.subscribers("prices"), vec![bob.clone()]);

        assert_eq!(bus.unsubscribe_all(&alice), 1);
        assert!(bus.subscribers("orders").is_empty());
        assert_eq!(
            bus.stats(),
            EventBusStats {
                total_topics: 1,
                total_subscribers: 1,
                total_subscriptions: 1,
            }
        );
    }

    #[test]
    fn test_unknown_topic_has_no_subscribers() {
        let bus = InMemoryEventBus::new();
        assert!(bus.subscribers("nothing").is_empty());
        assert_eq!(bus.unsubscribe_all(&ActorId::from("ghost")), 0);
    }
}
