//! Handlers bound to the mediator's tags.

mod auth;
mod diagnostics;
mod inventory;
mod products;
mod reads;

use std::sync::Arc;
use std::time::Duration;

use common::Version;
use events::{DomainEvent, EventBus, EventEnvelope};
use store::UnitOfWork;

pub use auth::{LogoutHandler, TokenBlacklist};
pub use diagnostics::DiagnosticsQueryHandler;
pub use inventory::InventoryCommandHandler;
pub use products::ProductCommandHandler;
pub use reads::{ReadModelQueryHandler, WriteModelQueryHandler};

/// What every write handler needs: transactions, a deadline for them, and
/// the bus committed changes are announced on.
#[derive(Clone)]
pub struct WriteContext {
    pub uow: UnitOfWork,
    pub bus: Arc<EventBus>,
    pub deadline: Duration,
}

impl WriteContext {
    /// Announces a committed change. Subscriber failures stay on the bus.
    async fn publish(&self, event: DomainEvent, version: Version) {
        let envelope = EventEnvelope::new(event, version);
        let report = self.bus.publish(&envelope).await;
        tracing::debug!(
            event_type = %envelope.event_type(),
            entity_id = %envelope.entity_id(),
            delivered = report.delivered,
            "event published"
        );
    }
}
