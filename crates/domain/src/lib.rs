//! Write model for the catalogue: products, inventory records, and the
//! repositories that read and write them through a [`store::Backend`].
//!
//! Every repository write takes a [`store::TxContext`], so which operations
//! are transactional is visible in each signature.

pub mod error;
pub mod inventory;
pub mod product;
pub mod schema;

pub use error::{DomainError, DomainResult};
pub use inventory::{
    Adjustment, AdjustmentKind, Inventory, InventoryError, InventoryQuery, InventoryRepository,
    InventoryUpdate, NewInventory,
};
pub use product::{
    NewProduct, Product, ProductError, ProductQuery, ProductRepository, ProductSortKey,
    ProductUpdate,
};
pub use schema::{INVENTORY, PRODUCTS, unique_indexes};
