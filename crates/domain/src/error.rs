//! Domain error types.

use common::EntityId;
use store::StoreError;
use thiserror::Error;

use crate::{InventoryError, ProductError};

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Product(#[from] ProductError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: EntityId },

    /// An error occurred in the write store.
    #[error("Write store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn product_not_found(id: &EntityId) -> Self {
        DomainError::NotFound {
            entity: "Product",
            id: id.clone(),
        }
    }

    pub fn inventory_not_found(id: &EntityId) -> Self {
        DomainError::NotFound {
            entity: "Inventory",
            id: id.clone(),
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
