//! Caller-facing error taxonomy.

use common::EntityId;
use domain::{DomainError, InventoryError, ProductError};
use projections::ProjectionError;
use store::StoreError;
use thiserror::Error;

/// A command or query rejected before it reached its handler.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {reason}")]
    Field { field: &'static str, reason: String },

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

impl ValidationError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A second handler was registered for a tag that is already bound.
    #[error("a {kind} handler is already registered for {tag}")]
    DuplicateRegistration { kind: &'static str, tag: &'static str },

    #[error("no {kind} handler registered for {tag}")]
    HandlerNotFound { kind: &'static str, tag: &'static str },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: EntityId },

    /// A product business rule rejected the request.
    #[error(transparent)]
    Product(ProductError),

    /// An inventory business rule rejected the request.
    #[error(transparent)]
    Inventory(InventoryError),

    #[error("transaction could not start: {0}")]
    TransactionStart(#[source] StoreError),

    /// The write store rejected the commit; nothing was persisted.
    #[error("commit failed: {0}")]
    Commit(#[source] StoreError),

    #[error("transaction timed out: {0}")]
    Timeout(#[source] StoreError),

    #[error("write store error: {0}")]
    Store(#[source] StoreError),

    #[error("read store error: {0}")]
    ReadStore(#[from] ProjectionError),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: &EntityId) -> Self {
        Self::NotFound {
            entity,
            id: id.clone(),
        }
    }

    /// True for faults that may succeed when the request is retried as a whole.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::TransactionStart(e)
            | AppError::Commit(e)
            | AppError::Timeout(e)
            | AppError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TransactionStart(_) => AppError::TransactionStart(e),
            StoreError::Commit { .. } => AppError::Commit(e),
            StoreError::DeadlineExceeded { .. } => AppError::Timeout(e),
            other => AppError::Store(other),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Product(e) => AppError::Product(e),
            DomainError::Inventory(e) => AppError::Inventory(e),
            DomainError::NotFound { entity, id } => AppError::NotFound { entity, id },
            DomainError::Store(e) => e.into(),
            DomainError::Serialization(e) => AppError::Store(StoreError::Serialization(e)),
        }
    }
}

impl From<ProductError> for AppError {
    fn from(e: ProductError) -> Self {
        AppError::Product(e)
    }
}

impl From<InventoryError> for AppError {
    fn from(e: InventoryError) -> Self {
        AppError::Inventory(e)
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
