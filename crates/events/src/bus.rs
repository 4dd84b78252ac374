use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};

use crate::{EventEnvelope, EventHandler, EventType};

/// Outcome of one `publish` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that completed successfully.
    pub delivered: usize,
    /// Names of the handlers that failed, in invocation order.
    pub failed: Vec<&'static str>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Subscription counts of a bus.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// Subscriptions summed over every event type.
    pub subscriber_count: usize,
    /// Event types with at least one subscriber.
    pub event_types: usize,
}

/// In-process publish/subscribe registry.
///
/// Subscriptions are made during wiring (`&mut self`); the bus is then
/// shared behind an `Arc` and only published to.
#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<EventType, Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for every future publish of `event_type`.
    ///
    /// Several handlers may subscribe to the same type; they run in the
    /// order they were registered.
    pub fn subscribe(&mut self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        tracing::debug!(%event_type, handler = handler.name(), "subscribed");
        self.subscribers.entry(event_type).or_default().push(handler);
    }

    /// Subscribes `handler` to every event type.
    pub fn subscribe_all(&mut self, handler: Arc<dyn EventHandler>) {
        for event_type in EventType::ALL {
            self.subscribe(event_type, handler.clone());
        }
    }

    /// Number of handlers subscribed to `event_type`.
    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.subscribers.get(&event_type).map_or(0, Vec::len)
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            subscriber_count: self.subscribers.values().map(Vec::len).sum(),
            event_types: self.subscribers.values().filter(|h| !h.is_empty()).count(),
        }
    }

    /// Delivers `envelope` to every handler subscribed to its type, one at a
    /// time, in subscription order.
    ///
    /// A handler that returns an error or panics is logged and skipped; the
    /// remaining handlers still run and nothing is propagated to the caller.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            event_type = %envelope.event_type(),
            entity_id = %envelope.entity_id(),
            version = %envelope.version
        )
    )]
    pub async fn publish(&self, envelope: &EventEnvelope) -> PublishReport {
        let event_type = envelope.event_type();
        metrics::counter!("event_bus_published_total", "event_type" => event_type.as_str())
            .increment(1);

        let mut report = PublishReport::default();
        let Some(handlers) = self.subscribers.get(&event_type) else {
            tracing::trace!("no subscribers");
            return report;
        };

        for handler in handlers {
            let outcome = AssertUnwindSafe(handler.handle(envelope))
                .catch_unwind()
                .await;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some("handler panicked".to_string()),
            };
            match failure {
                None => report.delivered += 1,
                Some(error) => {
                    tracing::error!(handler = handler.name(), %error, "event handler failed");
                    metrics::counter!(
                        "event_bus_handler_failures_total",
                        "event_type" => event_type.as_str(),
                        "handler" => handler.name()
                    )
                    .increment(1);
                    report.failed.push(handler.name());
                }
            }
        }
        report
    }

    /// Publishes several envelopes in order; each is fully delivered before
    /// the next begins.
    pub async fn publish_all(&self, envelopes: &[EventEnvelope]) -> PublishReport {
        let mut total = PublishReport::default();
        for envelope in envelopes {
            let report = self.publish(envelope).await;
            total.delivered += report.delivered;
            total.failed.extend(report.failed);
        }
        total
    }
}
