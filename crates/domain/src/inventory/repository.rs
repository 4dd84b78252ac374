use std::sync::Arc;

use common::{EntityId, Page, PageRequest, Version};
use serde::{Deserialize, Serialize};
use store::{Backend, TxContext};

use crate::schema::{INVENTORY, Stored};
use crate::{DomainResult, Inventory};

/// Filters for listing inventory from the write store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryQuery {
    pub product_id: Option<EntityId>,
    pub warehouse_id: Option<String>,
    /// Case-insensitive substring of the location.
    pub location: Option<String>,
    pub low_stock: Option<bool>,
    pub over_stock: Option<bool>,
    pub min_quantity: Option<u32>,
    pub max_quantity: Option<u32>,
}

impl InventoryQuery {
    pub fn matches(&self, inventory: &Inventory) -> bool {
        self.product_id
            .as_ref()
            .is_none_or(|p| inventory.product_id() == p)
            && self
                .warehouse_id
                .as_deref()
                .is_none_or(|w| inventory.warehouse_id() == w)
            && self.location.as_deref().is_none_or(|l| {
                inventory
                    .location()
                    .to_lowercase()
                    .contains(&l.to_lowercase())
            })
            && self.low_stock.is_none_or(|low| inventory.is_low_stock() == low)
            && self.over_stock.is_none_or(|over| inventory.is_over_stock() == over)
            && self.min_quantity.is_none_or(|min| inventory.quantity() >= min)
            && self.max_quantity.is_none_or(|max| inventory.quantity() <= max)
    }
}

/// Typed access to the `inventory` collection.
#[derive(Clone)]
pub struct InventoryRepository {
    backend: Arc<dyn Backend>,
}

impl InventoryRepository {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn find_by_id(&self, id: &EntityId) -> DomainResult<Option<Inventory>> {
        self.backend
            .get(INVENTORY, id)
            .await?
            .map(Inventory::from_record)
            .transpose()
    }

    pub async fn list_all(&self) -> DomainResult<Vec<Inventory>> {
        self.backend
            .scan(INVENTORY)
            .await?
            .into_iter()
            .map(Inventory::from_record)
            .collect()
    }

    /// Matching records, most recently updated first.
    pub async fn find_all(
        &self,
        query: &InventoryQuery,
        page: PageRequest,
    ) -> DomainResult<Page<Inventory>> {
        let mut records: Vec<Inventory> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|i| query.matches(i))
            .collect();
        records.sort_by(|a, b| {
            b.updated_at()
                .cmp(&a.updated_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(Page::from_sorted(records, page))
    }

    pub async fn find_in(
        &self,
        ctx: &mut TxContext,
        id: &EntityId,
    ) -> DomainResult<Option<Inventory>> {
        self.backend
            .get_in(ctx, INVENTORY, id)
            .await?
            .map(Inventory::from_record)
            .transpose()
    }

    /// Reads a record and holds its row lock until the transaction ends.
    pub async fn lock_in(
        &self,
        ctx: &mut TxContext,
        id: &EntityId,
    ) -> DomainResult<Option<Inventory>> {
        self.backend
            .lock_in(ctx, INVENTORY, id)
            .await?
            .map(Inventory::from_record)
            .transpose()
    }

    pub async fn find_by_product_in(
        &self,
        ctx: &mut TxContext,
        product_id: &EntityId,
    ) -> DomainResult<Vec<Inventory>> {
        let mut found = Vec::new();
        for record in self.backend.scan_in(ctx, INVENTORY).await? {
            let inventory = Inventory::from_record(record)?;
            if inventory.product_id() == product_id {
                found.push(inventory);
            }
        }
        Ok(found)
    }

    pub async fn find_by_product_and_warehouse_in(
        &self,
        ctx: &mut TxContext,
        product_id: &EntityId,
        warehouse_id: &str,
    ) -> DomainResult<Option<Inventory>> {
        Ok(self
            .find_by_product_in(ctx, product_id)
            .await?
            .into_iter()
            .find(|i| i.warehouse_id() == warehouse_id))
    }

    pub async fn insert(
        &self,
        ctx: &mut TxContext,
        inventory: &Inventory,
    ) -> DomainResult<Version> {
        Ok(self
            .backend
            .insert(ctx, INVENTORY, inventory.id(), inventory.to_body()?)
            .await?)
    }

    pub async fn update(
        &self,
        ctx: &mut TxContext,
        inventory: &Inventory,
    ) -> DomainResult<Version> {
        Ok(self
            .backend
            .update(ctx, INVENTORY, inventory.id(), inventory.to_body()?)
            .await?)
    }

    pub async fn delete(&self, ctx: &mut TxContext, id: &EntityId) -> DomainResult<bool> {
        Ok(self.backend.delete(ctx, INVENTORY, id).await?)
    }
}
