//! Event taxonomy.
//!
//! Every event carries `{ event_type, entity_id, data }`. The `data` payload
//! is a tagged enum per entity kind, so consumers dispatch on types instead
//! of inspecting payload shapes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Currency, EntityId, Money};
use serde::{Deserialize, Serialize};

/// Discriminant used for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    EntityCreated,
    EntityUpdated,
    EntityDeleted,
    StockLevelChanged,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::EntityCreated,
        EventType::EntityUpdated,
        EventType::EntityDeleted,
        EventType::StockLevelChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::EntityCreated => "EntityCreated",
            EventType::EntityUpdated => "EntityUpdated",
            EventType::EntityDeleted => "EntityDeleted",
            EventType::StockLevelChanged => "StockLevelChanged",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fact describing a committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum DomainEvent {
    EntityCreated(EntityCreated),
    EntityUpdated(EntityUpdated),
    EntityDeleted(EntityDeleted),
    StockLevelChanged(StockLevelChanged),
}

impl DomainEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            DomainEvent::EntityCreated(_) => EventType::EntityCreated,
            DomainEvent::EntityUpdated(_) => EventType::EntityUpdated,
            DomainEvent::EntityDeleted(_) => EventType::EntityDeleted,
            DomainEvent::StockLevelChanged(_) => EventType::StockLevelChanged,
        }
    }

    /// The write-side entity this event describes.
    pub fn entity_id(&self) -> &EntityId {
        match self {
            DomainEvent::EntityCreated(e) => &e.entity_id,
            DomainEvent::EntityUpdated(e) => &e.entity_id,
            DomainEvent::EntityDeleted(e) => &e.entity_id,
            DomainEvent::StockLevelChanged(e) => &e.entity_id,
        }
    }

    pub fn created(entity_id: EntityId, data: impl Into<EntitySnapshot>) -> Self {
        DomainEvent::EntityCreated(EntityCreated {
            entity_id,
            data: data.into(),
        })
    }

    pub fn updated(entity_id: EntityId, data: impl Into<EntityChanges>) -> Self {
        DomainEvent::EntityUpdated(EntityUpdated {
            entity_id,
            data: data.into(),
        })
    }

    pub fn deleted(entity_id: EntityId, data: DeletedEntity) -> Self {
        DomainEvent::EntityDeleted(EntityDeleted { entity_id, data })
    }

    pub fn stock_level_changed(entity_id: EntityId, data: StockLevel) -> Self {
        DomainEvent::StockLevelChanged(StockLevelChanged { entity_id, data })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCreated {
    pub entity_id: EntityId,
    pub data: EntitySnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdated {
    pub entity_id: EntityId,
    pub data: EntityChanges,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDeleted {
    pub entity_id: EntityId,
    pub data: DeletedEntity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevelChanged {
    pub entity_id: EntityId,
    pub data: StockLevel,
}

/// Full state of a newly created entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum EntitySnapshot {
    Product(ProductSnapshot),
    Inventory(InventorySnapshot),
}

/// Changes applied to an existing entity.
///
/// Both kinds carry the record's full post-commit state, so a consumer can
/// apply whichever version is newest regardless of arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum EntityChanges {
    Product(ProductRevision),
    Inventory(InventorySnapshot),
}

/// A product update: the fields that changed and the resulting state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRevision {
    pub changes: ProductChanges,
    pub snapshot: ProductSnapshot,
}

/// Which kind of entity was deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum DeletedEntity {
    Product,
    Inventory { product_id: EntityId },
}

impl From<ProductSnapshot> for EntitySnapshot {
    fn from(snapshot: ProductSnapshot) -> Self {
        EntitySnapshot::Product(snapshot)
    }
}

impl From<InventorySnapshot> for EntitySnapshot {
    fn from(snapshot: InventorySnapshot) -> Self {
        EntitySnapshot::Inventory(snapshot)
    }
}

impl From<ProductRevision> for EntityChanges {
    fn from(revision: ProductRevision) -> Self {
        EntityChanges::Product(revision)
    }
}

impl From<InventorySnapshot> for EntityChanges {
    fn from(snapshot: InventorySnapshot) -> Self {
        EntityChanges::Inventory(snapshot)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub price: Money,
    pub currency: Currency,
    pub category: String,
    pub tags: Vec<String>,
    pub specifications: BTreeMap<String, String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field-level product changes. `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub product_id: EntityId,
    pub warehouse_id: String,
    pub location: String,
    pub quantity: u32,
    pub reserved_quantity: u32,
    pub minimum_stock: u32,
    pub maximum_stock: Option<u32>,
    pub unit_cost: Money,
    pub updated_at: DateTime<Utc>,
}

impl InventorySnapshot {
    pub fn available_quantity(&self) -> u32 {
        self.quantity.saturating_sub(self.reserved_quantity)
    }
}

/// What caused a stock level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockChange {
    Adjusted,
    Reserved,
    Released,
}

/// Stock counters of one inventory record after a quantity change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLevel {
    pub product_id: EntityId,
    pub warehouse_id: String,
    pub change: StockChange,
    pub previous_quantity: u32,
    pub previous_reserved: u32,
    pub inventory: InventorySnapshot,
}
