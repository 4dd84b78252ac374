//! Denormalized product record served by the fast read path.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Currency, EntityId, Money, Version};
use events::{InventorySnapshot, ProductSnapshot};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;

/// Stock held for the product at one inventory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationStock {
    pub warehouse_id: String,
    pub location: String,
    pub quantity: u32,
    pub reserved_quantity: u32,
    pub available_quantity: u32,
    pub minimum_stock: u32,
    pub maximum_stock: Option<u32>,
    pub is_low_stock: bool,
    /// False once the inventory record has been deleted.
    pub active: bool,
    /// Write-store version of the inventory record last applied.
    pub version: Version,
    pub updated_at: DateTime<Utc>,
}

impl LocationStock {
    pub fn from_snapshot(snapshot: &InventorySnapshot, version: Version) -> Self {
        let available = snapshot.available_quantity();
        Self {
            warehouse_id: snapshot.warehouse_id.clone(),
            location: snapshot.location.clone(),
            quantity: snapshot.quantity,
            reserved_quantity: snapshot.reserved_quantity,
            available_quantity: available,
            minimum_stock: snapshot.minimum_stock,
            maximum_stock: snapshot.maximum_stock,
            is_low_stock: available <= snapshot.minimum_stock,
            active: true,
            version,
            updated_at: snapshot.updated_at,
        }
    }
}

/// Stock aggregated over every active location of a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_quantity: u32,
    pub available_quantity: u32,
    pub reserved_quantity: u32,
    pub is_low_stock: bool,
    /// Keyed by inventory record id.
    pub locations: BTreeMap<EntityId, LocationStock>,
}

impl InventorySummary {
    /// Recomputes the totals from the active locations.
    pub fn recompute(&mut self) {
        let (mut total, mut reserved, mut available, mut low) = (0u32, 0u32, 0u32, false);
        for stock in self.locations.values().filter(|l| l.active) {
            total = total.saturating_add(stock.quantity);
            reserved = reserved.saturating_add(stock.reserved_quantity);
            available = available.saturating_add(stock.available_quantity);
            low |= stock.is_low_stock;
        }
        self.total_quantity = total;
        self.reserved_quantity = reserved;
        self.available_quantity = available;
        self.is_low_stock = low;
    }

    pub fn active_locations(&self) -> impl Iterator<Item = (&EntityId, &LocationStock)> {
        self.locations.iter().filter(|(_, l)| l.active)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesStats {
    pub total_sold: u64,
    pub revenue: Money,
    pub average_rating: f64,
    pub review_count: u32,
}

/// Read-side projection of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub price: Money,
    pub currency: Currency,
    pub category: String,
    pub tags: Vec<String>,
    pub specifications: BTreeMap<String, String>,
    pub is_active: bool,
    pub inventory: InventorySummary,
    pub sales_stats: SalesStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_sync_at: DateTime<Utc>,
    /// Write-store version of the product last applied.
    pub version: Version,
}

impl ProductView {
    /// A new view with zeroed inventory and sales aggregates.
    pub fn from_snapshot(id: EntityId, snapshot: &ProductSnapshot, version: Version) -> Self {
        Self {
            id,
            name: snapshot.name.clone(),
            description: snapshot.description.clone(),
            sku: snapshot.sku.clone(),
            price: snapshot.price,
            currency: snapshot.currency,
            category: snapshot.category.clone(),
            tags: snapshot.tags.clone(),
            specifications: snapshot.specifications.clone(),
            is_active: snapshot.is_active,
            inventory: InventorySummary::default(),
            sales_stats: SalesStats::default(),
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            last_sync_at: Utc::now(),
            version,
        }
    }

    /// Overwrites the product fields, keeping inventory and sales aggregates.
    pub fn replace_product_fields(&mut self, snapshot: &ProductSnapshot, version: Version) {
        let aggregates = (
            std::mem::take(&mut self.inventory),
            std::mem::take(&mut self.sales_stats),
        );
        *self = Self::from_snapshot(self.id.clone(), snapshot, version);
        (self.inventory, self.sales_stats) = aggregates;
    }

    /// Inserts or replaces the stock of one inventory record.
    pub fn upsert_location(&mut self, inventory_id: EntityId, stock: LocationStock) {
        self.inventory.locations.insert(inventory_id, stock);
        self.inventory.recompute();
        self.last_sync_at = Utc::now();
    }

    pub(crate) fn touch(&mut self, version: Version) {
        self.version = version;
        self.last_sync_at = Utc::now();
    }
}

/// Accessor for the read store holding product projections.
#[async_trait]
pub trait ReadStore: Send + Sync {
    async fn get(&self, id: &EntityId) -> Result<Option<ProductView>>;

    async fn put(&self, view: ProductView) -> Result<()>;

    /// Every stored view, in no particular order.
    async fn list(&self) -> Result<Vec<ProductView>>;

    /// Replaces the whole store contents.
    async fn replace_all(&self, views: Vec<ProductView>) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}

/// Process-local read store.
#[derive(Clone, Default)]
pub struct InMemoryReadStore {
    views: Arc<RwLock<HashMap<EntityId, ProductView>>>,
}

impl InMemoryReadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadStore for InMemoryReadStore {
    async fn get(&self, id: &EntityId) -> Result<Option<ProductView>> {
        Ok(self.views.read().await.get(id).cloned())
    }

    async fn put(&self, view: ProductView) -> Result<()> {
        self.views.write().await.insert(view.id.clone(), view);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProductView>> {
        Ok(self.views.read().await.values().cloned().collect())
    }

    async fn replace_all(&self, views: Vec<ProductView>) -> Result<()> {
        let mut guard = self.views.write().await;
        guard.clear();
        guard.extend(views.into_iter().map(|v| (v.id.clone(), v)));
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.views.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ProductSnapshot {
        ProductSnapshot {
            name: "Widget".into(),
            description: None,
            sku: "WID-1".into(),
            price: Money::from_cents(1000),
            currency: Currency::Usd,
            category: "Tools".into(),
            tags: vec![],
            specifications: BTreeMap::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn location(quantity: u32, reserved: u32, minimum: u32) -> LocationStock {
        LocationStock::from_snapshot(
            &InventorySnapshot {
                product_id: EntityId::new("P1"),
                warehouse_id: "W1".into(),
                location: "A1".into(),
                quantity,
                reserved_quantity: reserved,
                minimum_stock: minimum,
                maximum_stock: None,
                unit_cost: Money::zero(),
                updated_at: Utc::now(),
            },
            Version::first(),
        )
    }

    #[test]
    fn new_view_has_zeroed_aggregates() {
        let view = ProductView::from_snapshot(EntityId::new("P1"), &snapshot(), Version::first());
        assert_eq!(view.inventory, InventorySummary::default());
        assert_eq!(view.sales_stats, SalesStats::default());
    }

    #[test]
    fn totals_skip_inactive_locations() {
        let mut view =
            ProductView::from_snapshot(EntityId::new("P1"), &snapshot(), Version::first());
        view.upsert_location(EntityId::new("I1"), location(10, 2, 1));
        let mut gone = location(5, 0, 10);
        gone.active = false;
        view.upsert_location(EntityId::new("I2"), gone);

        assert_eq!(view.inventory.total_quantity, 10);
        assert_eq!(view.inventory.available_quantity, 8);
        assert_eq!(view.inventory.reserved_quantity, 2);
        assert!(!view.inventory.is_low_stock);
        assert_eq!(view.inventory.active_locations().count(), 1);
    }

    #[test]
    fn replacing_product_fields_keeps_aggregates() {
        let mut view =
            ProductView::from_snapshot(EntityId::new("P1"), &snapshot(), Version::first());
        view.upsert_location(EntityId::new("I1"), location(10, 0, 1));
        view.sales_stats.total_sold = 3;

        let mut renamed = snapshot();
        renamed.name = "Gadget".into();
        view.replace_product_fields(&renamed, Version::new(2));

        assert_eq!(view.name, "Gadget");
        assert_eq!(view.version, Version::new(2));
        assert_eq!(view.inventory.total_quantity, 10);
        assert_eq!(view.sales_stats.total_sold, 3);
    }

    #[tokio::test]
    async fn in_memory_store_replace_all() {
        let store = InMemoryReadStore::new();
        store
            .put(ProductView::from_snapshot(EntityId::new("OLD"), &snapshot(), Version::first()))
            .await
            .unwrap();
        store
            .replace_all(vec![ProductView::from_snapshot(
                EntityId::new("NEW"),
                &snapshot(),
                Version::first(),
            )])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get(&EntityId::new("OLD")).await.unwrap().is_none());
    }
}
