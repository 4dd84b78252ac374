//! Projection error types.

use common::EntityId;
use events::EventType;
use thiserror::Error;

/// An event could not be applied because the record it targets is missing
/// from the read store. The read model stays stale for that entity until the
/// next resync.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("projection gap: {event_type} for {entity_id} found no read record for product {product_id}")]
pub struct ProjectionGapError {
    pub event_type: EventType,
    pub entity_id: EntityId,
    pub product_id: EntityId,
}

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Gap(#[from] ProjectionGapError),

    /// The read store failed.
    #[error("Read store error: {0}")]
    ReadStore(String),

    /// Reading the write store failed during a resync.
    #[error("Write store error: {0}")]
    WriteStore(#[from] domain::DomainError),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
