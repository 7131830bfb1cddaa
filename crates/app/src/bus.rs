//! In-process event bus — named topics, synchronous in-order delivery.
//!
//! `publish` returns once every handler registered on the topic has run.
//! There is no queueing, no persistence, and no replay: a late subscriber
//! misses everything published before it subscribed. A failing handler is
//! logged and isolated; the remaining handlers still run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use hearth_domain::error::HearthError;

use crate::message::BusMessage;

/// Handler invoked once per publish on its topic.
pub type Handler = dyn Fn(&BusMessage) -> Result<(), HearthError> + Send + Sync;

/// Identifies one subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    handler: Arc<Handler>,
}

/// Process-wide named-topic publish/subscribe transport.
#[derive(Default)]
pub struct EventBus {
    topics: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every future publish on `topic`.
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&BusMessage) -> Result<(), HearthError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        topics.entry(topic.to_string()).or_default().push(Subscriber {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Drop one subscription. Returns whether it existed.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = topics.get_mut(topic) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        before != subscribers.len()
    }

    /// Whether at least one subscriber is registered on `topic`. Used to
    /// short-circuit expensive snapshot work when no one is listening.
    #[must_use]
    pub fn has(&self, topic: &str) -> bool {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.get(topic).is_some_and(|subs| !subs.is_empty())
    }

    /// Deliver `message` to every current subscriber of `topic`, in
    /// subscription order. Handlers run synchronously; a handler may
    /// itself publish (the subscriber list is snapshotted outside the
    /// lock).
    pub fn publish(&self, topic: &str, message: &BusMessage) {
        let handlers: Vec<Arc<Handler>> = {
            let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
            topics
                .get(topic)
                .map(|subs| subs.iter().map(|s| Arc::clone(&s.handler)).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            if let Err(error) = handler(message) {
                tracing::warn!(topic, %error, "bus handler failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::topic;
    use std::sync::Mutex;

    fn collect(bus: &EventBus, topic: &str) -> Arc<Mutex<Vec<BusMessage>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(topic, move |message| {
            sink.lock().unwrap().push(message.clone());
            Ok(())
        });
        seen
    }

    #[test]
    fn should_deliver_to_every_subscriber_once() {
        let bus = EventBus::new();
        let first = collect(&bus, topic::ACTORS);
        let second = collect(&bus, topic::ACTORS);

        bus.publish(topic::ACTORS, &BusMessage::Ping);

        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn should_deliver_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            bus.subscribe(topic::ACTORS, move |_| {
                order.lock().unwrap().push(tag);
                Ok(())
            });
        }

        bus.publish(topic::ACTORS, &BusMessage::Ping);

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn should_not_deliver_across_topics() {
        let bus = EventBus::new();
        let seen = collect(&bus, topic::TELEMETRY_EGRESS);

        bus.publish(topic::ACTORS, &BusMessage::Ping);

        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn should_isolate_failing_handlers() {
        let bus = EventBus::new();
        bus.subscribe(topic::ACTORS, |_| {
            Err(hearth_domain::error::ValidationError::EmptyName.into())
        });
        let seen = collect(&bus, topic::ACTORS);

        bus.publish(topic::ACTORS, &BusMessage::Ping);

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn should_miss_publishes_before_subscription() {
        let bus = EventBus::new();
        bus.publish(topic::ACTORS, &BusMessage::Ping);

        let seen = collect(&bus, topic::ACTORS);
        bus.publish(topic::ACTORS, &BusMessage::Attention);

        assert_eq!(*seen.lock().unwrap(), vec![BusMessage::Attention]);
    }

    #[test]
    fn should_report_subscriber_presence() {
        let bus = EventBus::new();
        assert!(!bus.has(topic::ACTORS));

        let id = bus.subscribe(topic::ACTORS, |_| Ok(()));
        assert!(bus.has(topic::ACTORS));

        assert!(bus.unsubscribe(topic::ACTORS, id));
        assert!(!bus.has(topic::ACTORS));
        assert!(!bus.unsubscribe(topic::ACTORS, id));
    }

    #[test]
    fn should_allow_publishing_from_within_a_handler() {
        let bus = Arc::new(EventBus::new());
        let seen = collect(&bus, topic::TELEMETRY_EGRESS);

        let inner = Arc::clone(&bus);
        bus.subscribe(topic::ACTORS, move |_| {
            inner.publish(
                topic::TELEMETRY_EGRESS,
                &BusMessage::Updates(serde_json::Value::Null),
            );
            Ok(())
        });

        bus.publish(topic::ACTORS, &BusMessage::Ping);

        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
