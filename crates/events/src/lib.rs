//! Domain events and the in-process bus that delivers them to projectors.
//!
//! Events are published strictly after the originating write commits.
//! Delivery is synchronous and in subscription order; a failing subscriber
//! is logged and counted, never reported to the publisher.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod event;
pub mod handler;

pub use bus::{BusStats, EventBus, PublishReport};
pub use envelope::{EventEnvelope, EventEnvelopeBuilder, EventId};
pub use error::HandlerError;
pub use event::{
    DeletedEntity, DomainEvent, EntityChanges, EntityCreated, EntityDeleted, EntitySnapshot,
    EntityUpdated, EventType, InventorySnapshot, ProductChanges, ProductRevision, ProductSnapshot,
    StockChange, StockLevel, StockLevelChanged,
};
pub use handler::EventHandler;
