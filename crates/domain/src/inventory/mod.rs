//! Stock records per product and warehouse.

mod entity;
mod repository;

pub use entity::{Adjustment, AdjustmentKind, Inventory, InventoryUpdate, NewInventory};
pub use repository::{InventoryQuery, InventoryRepository};

use common::EntityId;
use thiserror::Error;

pub const LOCATION_LEN: std::ops::RangeInclusive<usize> = 2..=100;

/// Business rule violations for inventory records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("Quantity must be positive")]
    NonPositiveQuantity,

    #[error("Insufficient available stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    #[error("Cannot release {requested} units; only {reserved} reserved")]
    ReleaseExceedsReserved { requested: u32, reserved: u32 },

    #[error("Location must be between 2 and 100 characters")]
    InvalidLocation,

    #[error("Warehouse ID is required")]
    MissingWarehouse,

    #[error("Maximum stock ({maximum}) must be greater than minimum stock ({minimum})")]
    InvalidStockLevels { minimum: u32, maximum: u32 },

    #[error("Unit cost cannot be negative")]
    NegativeUnitCost,

    #[error("Inventory for product {product_id} already exists in warehouse {warehouse_id}")]
    AlreadyExists {
        product_id: EntityId,
        warehouse_id: String,
    },

    #[error("Product {0} does not exist")]
    UnknownProduct(EntityId),

    #[error("Cannot delete inventory with {reserved} reserved unit(s)")]
    HasReservations { reserved: u32 },

    #[error("Update contains no changes")]
    EmptyUpdate,
}

impl InventoryError {
    /// True for failures caused by the requested quantity exceeding what is on hand.
    pub fn is_insufficient_stock(&self) -> bool {
        matches!(
            self,
            InventoryError::InsufficientStock { .. } | InventoryError::ReleaseExceedsReserved { .. }
        )
    }
}

pub(crate) fn check_location(location: &str) -> Result<(), InventoryError> {
    if LOCATION_LEN.contains(&location.trim().chars().count()) {
        Ok(())
    } else {
        Err(InventoryError::InvalidLocation)
    }
}

pub(crate) fn check_levels(minimum: u32, maximum: Option<u32>) -> Result<(), InventoryError> {
    match maximum {
        Some(maximum) if maximum <= minimum => {
            Err(InventoryError::InvalidStockLevels { minimum, maximum })
        }
        _ => Ok(()),
    }
}
