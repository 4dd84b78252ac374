//! Write-store collections and the unique indexes the backend must enforce.

use store::{Collection, Record, UniqueIndex};

use crate::DomainError;

pub const PRODUCTS: Collection = Collection::new("products");
pub const INVENTORY: Collection = Collection::new("inventory");

/// One product per SKU.
pub const PRODUCT_SKU: UniqueIndex = UniqueIndex {
    name: "products_sku",
    collection: PRODUCTS,
    fields: &["sku"],
};

/// One inventory record per (product, warehouse).
pub const INVENTORY_PRODUCT_WAREHOUSE: UniqueIndex = UniqueIndex {
    name: "inventory_product_warehouse",
    collection: INVENTORY,
    fields: &["product_id", "warehouse_id"],
};

/// Every index a backend serving this domain must enforce.
pub fn unique_indexes() -> [UniqueIndex; 2] {
    [PRODUCT_SKU, INVENTORY_PRODUCT_WAREHOUSE]
}

/// Entities stored as JSON records whose version lives on the record.
pub(crate) trait Stored: serde::de::DeserializeOwned + serde::Serialize {
    fn set_version(&mut self, version: common::Version);

    fn from_record(record: Record) -> Result<Self, DomainError> {
        let mut entity: Self = record.decode()?;
        entity.set_version(record.version);
        Ok(entity)
    }

    fn to_body(&self) -> Result<serde_json::Value, DomainError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Stored for crate::Product {
    fn set_version(&mut self, version: common::Version) {
        self.version = version;
    }
}

impl Stored for crate::Inventory {
    fn set_version(&mut self, version: common::Version) {
        self.stamp_version(version);
    }
}
