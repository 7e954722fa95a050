use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

use crate::event::{DomainEvent, Event};
use crate::registry::SubscriberRegistry;

/// Per-publish delivery counts. Never surfaced to publishers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// Fan-out of events to every registered mailbox.
///
/// Holds no state beyond a handle to the registry; cloning is cheap.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Push an event to all subscribers. Fire-and-forget: never blocks and
    /// never fails, slow subscribers just miss it.
    pub fn publish(&self, kind: impl Into<String>, payload: impl Serialize) {
        let event = Event::new(kind, payload);
        let report = self.broadcast(&event);
        debug!(
            kind = event.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            "event published"
        );
    }

    /// Announce a domain change with an empty payload.
    pub fn notify(&self, change: DomainEvent) {
        self.publish(change.kind(), json!({}));
    }

    /// Try-enqueue `event` into every mailbox under the registry lock.
    pub fn broadcast(&self, event: &Event) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        self.registry
            .for_each_mailbox(|id, tx| match tx.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    trace!(subscriber = %id, kind = event.kind(), "mailbox full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    report.dropped += 1;
                    trace!(subscriber = %id, kind = event.kind(), "mailbox closed, event dropped");
                }
            });
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_without_subscribers_is_noop() {
        let broadcaster = Broadcaster::new(Arc::new(SubscriberRegistry::default()));
        broadcaster.publish("test_event", json!({ "foo": "bar" }));
        let report = broadcaster.broadcast(&Event::new("test_event", json!({})));
        assert_eq!(report, DeliveryReport::default());
    }

    #[test]
    fn notify_sends_empty_object() {
        let registry = Arc::new(SubscriberRegistry::default());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let mut sub = registry.register();

        broadcaster.notify(DomainEvent::LocationsUpdated);

        let ev = sub.try_recv().expect("event delivered");
        assert_eq!(ev.kind(), "locations_updated");
        assert_eq!(ev.payload(), &json!({}));
    }

    #[test]
    fn full_mailbox_counts_as_dropped() {
        let registry = Arc::new(SubscriberRegistry::new(1));
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let _sub = registry.register();

        let first = broadcaster.broadcast(&Event::new("a", 1));
        let second = broadcaster.broadcast(&Event::new("b", 2));
        assert_eq!(first, DeliveryReport { delivered: 1, dropped: 0 });
        assert_eq!(second, DeliveryReport { delivered: 0, dropped: 1 });
    }
}
