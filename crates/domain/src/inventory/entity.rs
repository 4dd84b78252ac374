use chrono::{DateTime, Utc};
use common::{EntityId, Money, Version};
use events::{InventorySnapshot, StockChange, StockLevel};
use serde::{Deserialize, Serialize};

use super::{InventoryError, check_levels, check_location};

/// Input for creating an inventory record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInventory {
    pub product_id: EntityId,
    pub warehouse_id: String,
    pub location: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub minimum_stock: u32,
    #[serde(default)]
    pub maximum_stock: Option<u32>,
    #[serde(default)]
    pub unit_cost: Money,
}

impl NewInventory {
    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.warehouse_id.trim().is_empty() {
            return Err(InventoryError::MissingWarehouse);
        }
        check_location(&self.location)?;
        check_levels(self.minimum_stock, self.maximum_stock)?;
        if self.unit_cost.cents() < 0 {
            return Err(InventoryError::NegativeUnitCost);
        }
        Ok(())
    }
}

/// Partial update of non-quantity inventory attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub location: Option<String>,
    pub warehouse_id: Option<String>,
    pub minimum_stock: Option<u32>,
    pub maximum_stock: Option<u32>,
    pub unit_cost: Option<Money>,
}

impl InventoryUpdate {
    pub fn is_empty(&self) -> bool {
        *self == InventoryUpdate::default()
    }

    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.is_empty() {
            return Err(InventoryError::EmptyUpdate);
        }
        if let Some(location) = &self.location {
            check_location(location)?;
        }
        if self
            .warehouse_id
            .as_deref()
            .is_some_and(|w| w.trim().is_empty())
        {
            return Err(InventoryError::MissingWarehouse);
        }
        if self.unit_cost.is_some_and(|c| c.cents() < 0) {
            return Err(InventoryError::NegativeUnitCost);
        }
        Ok(())
    }
}

/// How an adjustment changes the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustmentKind {
    /// Increase on-hand quantity.
    Add,
    /// Decrease on-hand quantity, floored at zero.
    Subtract,
    /// Replace on-hand quantity.
    Set,
    /// Reserve available units.
    Reserve,
    /// Release reserved units, floored at zero.
    Unreserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    #[serde(rename = "adjustment_type")]
    pub kind: AdjustmentKind,
    pub quantity: u32,
}

impl Adjustment {
    pub fn new(kind: AdjustmentKind, quantity: u32) -> Self {
        Self { kind, quantity }
    }

    pub fn validate(&self) -> Result<(), InventoryError> {
        if self.quantity == 0 && self.kind != AdjustmentKind::Set {
            return Err(InventoryError::NonPositiveQuantity);
        }
        Ok(())
    }
}

/// Stock held for one product in one warehouse.
///
/// Invariant: `reserved_quantity <= quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    id: EntityId,
    #[serde(skip)]
    version: Version,
    product_id: EntityId,
    warehouse_id: String,
    location: String,
    quantity: u32,
    reserved_quantity: u32,
    minimum_stock: u32,
    maximum_stock: Option<u32>,
    unit_cost: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Inventory {
    pub fn create(id: EntityId, input: NewInventory) -> Result<Self, InventoryError> {
        input.validate()?;
        let now = Utc::now();
        Ok(Self {
            id,
            version: Version::initial(),
            product_id: input.product_id,
            warehouse_id: input.warehouse_id.trim().to_string(),
            location: input.location.trim().to_string(),
            quantity: input.quantity,
            reserved_quantity: 0,
            minimum_stock: input.minimum_stock,
            maximum_stock: input.maximum_stock,
            unit_cost: input.unit_cost,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Records the version a staged write will commit at.
    pub fn stamp_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn product_id(&self) -> &EntityId {
        &self.product_id
    }

    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn reserved_quantity(&self) -> u32 {
        self.reserved_quantity
    }

    pub fn minimum_stock(&self) -> u32 {
        self.minimum_stock
    }

    pub fn maximum_stock(&self) -> Option<u32> {
        self.maximum_stock
    }

    pub fn unit_cost(&self) -> Money {
        self.unit_cost
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn available_quantity(&self) -> u32 {
        self.quantity - self.reserved_quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.available_quantity() <= self.minimum_stock
    }

    pub fn is_over_stock(&self) -> bool {
        self.maximum_stock.is_some_and(|max| self.quantity >= max)
    }

    /// Units needed to bring available stock back to the minimum.
    pub fn shortage(&self) -> u32 {
        self.minimum_stock.saturating_sub(self.available_quantity())
    }

    /// Shortage as a percentage of the minimum stock, rounded to two decimals.
    pub fn shortage_percentage(&self) -> f64 {
        if self.minimum_stock == 0 {
            return 0.0;
        }
        let pct = f64::from(self.shortage()) / f64::from(self.minimum_stock) * 100.0;
        (pct * 100.0).round() / 100.0
    }

    /// Total value of on-hand stock at unit cost.
    pub fn stock_value(&self) -> Money {
        self.unit_cost.times(self.quantity)
    }

    pub fn add_stock(
        &mut self,
        quantity: u32,
        unit_cost: Option<Money>,
    ) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::NonPositiveQuantity);
        }
        self.quantity = self.quantity.saturating_add(quantity);
        if let Some(cost) = unit_cost {
            self.unit_cost = cost;
        }
        self.touch();
        Ok(())
    }

    pub fn remove_stock(&mut self, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::NonPositiveQuantity);
        }
        let available = self.available_quantity();
        if quantity > available {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available,
            });
        }
        self.quantity -= quantity;
        self.touch();
        Ok(())
    }

    /// Moves `quantity` units from available to reserved.
    pub fn reserve(&mut self, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::NonPositiveQuantity);
        }
        let available = self.available_quantity();
        if quantity > available {
            return Err(InventoryError::InsufficientStock {
                requested: quantity,
                available,
            });
        }
        self.reserved_quantity += quantity;
        self.touch();
        Ok(())
    }

    /// Returns `quantity` reserved units to available stock.
    pub fn release(&mut self, quantity: u32) -> Result<(), InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::NonPositiveQuantity);
        }
        if quantity > self.reserved_quantity {
            return Err(InventoryError::ReleaseExceedsReserved {
                requested: quantity,
                reserved: self.reserved_quantity,
            });
        }
        self.reserved_quantity -= quantity;
        self.touch();
        Ok(())
    }

    /// Applies a stock adjustment.
    ///
    /// `Subtract` and `Set` shrink the reservation when the new quantity
    /// falls below it; `Unreserve` never drops below zero.
    pub fn adjust(&mut self, adjustment: Adjustment) -> Result<(), InventoryError> {
        adjustment.validate()?;
        let Adjustment { kind, quantity } = adjustment;
        match kind {
            AdjustmentKind::Add => {
                self.quantity = self.quantity.saturating_add(quantity);
            }
            AdjustmentKind::Subtract => {
                self.quantity = self.quantity.saturating_sub(quantity);
                self.reserved_quantity = self.reserved_quantity.min(self.quantity);
            }
            AdjustmentKind::Set => {
                self.quantity = quantity;
                self.reserved_quantity = self.reserved_quantity.min(self.quantity);
            }
            AdjustmentKind::Reserve => return self.reserve(quantity),
            AdjustmentKind::Unreserve => {
                self.reserved_quantity = self.reserved_quantity.saturating_sub(quantity);
            }
        }
        self.touch();
        Ok(())
    }

    /// Updates location, warehouse, stock thresholds and unit cost.
    pub fn apply(&mut self, update: InventoryUpdate) -> Result<(), InventoryError> {
        update.validate()?;
        let minimum = update.minimum_stock.unwrap_or(self.minimum_stock);
        let maximum = update.maximum_stock.or(self.maximum_stock);
        check_levels(minimum, maximum)?;

        if let Some(location) = update.location {
            self.location = location.trim().to_string();
        }
        if let Some(warehouse_id) = update.warehouse_id {
            self.warehouse_id = warehouse_id.trim().to_string();
        }
        if let Some(cost) = update.unit_cost {
            self.unit_cost = cost;
        }
        self.minimum_stock = minimum;
        self.maximum_stock = maximum;
        self.touch();
        Ok(())
    }

    /// Fails unless the record may be deleted.
    pub fn ensure_deletable(&self) -> Result<(), InventoryError> {
        if self.reserved_quantity > 0 {
            return Err(InventoryError::HasReservations {
                reserved: self.reserved_quantity,
            });
        }
        Ok(())
    }

    /// Event payload describing the full record.
    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            product_id: self.product_id.clone(),
            warehouse_id: self.warehouse_id.clone(),
            location: self.location.clone(),
            quantity: self.quantity,
            reserved_quantity: self.reserved_quantity,
            minimum_stock: self.minimum_stock,
            maximum_stock: self.maximum_stock,
            unit_cost: self.unit_cost,
            updated_at: self.updated_at,
        }
    }

    /// Event payload for a quantity change from `(previous_quantity, previous_reserved)`.
    pub fn stock_level(
        &self,
        change: StockChange,
        previous_quantity: u32,
        previous_reserved: u32,
    ) -> StockLevel {
        StockLevel {
            product_id: self.product_id.clone(),
            warehouse_id: self.warehouse_id.clone(),
            change,
            previous_quantity,
            previous_reserved,
            inventory: self.snapshot(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(quantity: u32) -> Inventory {
        Inventory::create(
            EntityId::new("I1"),
            NewInventory {
                product_id: EntityId::new("P1"),
                warehouse_id: "W1".into(),
                location: "A1".into(),
                quantity,
                minimum_stock: 2,
                maximum_stock: Some(100),
                unit_cost: Money::from_cents(250),
            },
        )
        .unwrap()
    }

    #[test]
    fn reserve_and_release() {
        let mut inventory = stock(5);
        inventory.reserve(4).unwrap();
        assert_eq!(inventory.available_quantity(), 1);
        assert_eq!(inventory.reserved_quantity(), 4);

        let err = inventory.reserve(4).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InsufficientStock {
                requested: 4,
                available: 1
            }
        );
        assert!(err.is_insufficient_stock());

        inventory.release(3).unwrap();
        assert_eq!(inventory.available_quantity(), 4);
        assert!(matches!(
            inventory.release(2),
            Err(InventoryError::ReleaseExceedsReserved { .. })
        ));
    }

    #[test]
    fn remove_stock_respects_reservations() {
        let mut inventory = stock(10);
        inventory.reserve(6).unwrap();
        assert!(inventory.remove_stock(5).is_err());
        inventory.remove_stock(4).unwrap();
        assert_eq!(inventory.quantity(), 6);
    }

    #[test]
    fn subtract_and_set_clamp_reservation() {
        let mut inventory = stock(10);
        inventory.reserve(8).unwrap();

        inventory
            .adjust(Adjustment::new(AdjustmentKind::Subtract, 15))
            .unwrap();
        assert_eq!(inventory.quantity(), 0);
        assert_eq!(inventory.reserved_quantity(), 0);

        inventory.adjust(Adjustment::new(AdjustmentKind::Add, 7)).unwrap();
        inventory.reserve(5).unwrap();
        inventory.adjust(Adjustment::new(AdjustmentKind::Set, 3)).unwrap();
        assert_eq!(inventory.quantity(), 3);
        assert_eq!(inventory.reserved_quantity(), 3);

        inventory
            .adjust(Adjustment::new(AdjustmentKind::Unreserve, 10))
            .unwrap();
        assert_eq!(inventory.reserved_quantity(), 0);
    }

    #[test]
    fn zero_quantity_adjustment_only_allowed_for_set() {
        let mut inventory = stock(10);
        assert_eq!(
            inventory.adjust(Adjustment::new(AdjustmentKind::Add, 0)),
            Err(InventoryError::NonPositiveQuantity)
        );
        inventory.adjust(Adjustment::new(AdjustmentKind::Set, 0)).unwrap();
        assert_eq!(inventory.quantity(), 0);
    }

    #[test]
    fn stock_flags_and_shortage() {
        let mut inventory = stock(3);
        assert!(!inventory.is_low_stock());
        inventory.reserve(2).unwrap();
        assert!(inventory.is_low_stock());
        assert_eq!(inventory.shortage(), 1);
        assert_eq!(inventory.shortage_percentage(), 50.0);

        inventory.adjust(Adjustment::new(AdjustmentKind::Set, 100)).unwrap();
        assert!(inventory.is_over_stock());
        assert_eq!(inventory.stock_value(), Money::from_cents(25_000));
    }

    #[test]
    fn create_validation() {
        let input = NewInventory {
            product_id: EntityId::new("P1"),
            warehouse_id: "W1".into(),
            location: "A".into(),
            quantity: 0,
            minimum_stock: 0,
            maximum_stock: None,
            unit_cost: Money::zero(),
        };
        assert_eq!(input.validate(), Err(InventoryError::InvalidLocation));

        let input = NewInventory {
            location: "A1".into(),
            minimum_stock: 10,
            maximum_stock: Some(10),
            ..input
        };
        assert_eq!(
            input.validate(),
            Err(InventoryError::InvalidStockLevels {
                minimum: 10,
                maximum: 10
            })
        );
    }

    #[test]
    fn update_checks_combined_levels() {
        let mut inventory = stock(10);
        let err = inventory
            .apply(InventoryUpdate {
                minimum_stock: Some(200),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, InventoryError::InvalidStockLevels { .. }));

        inventory
            .apply(InventoryUpdate {
                location: Some("B7".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(inventory.location(), "B7");
    }

    #[test]
    fn delete_refused_while_reserved() {
        let mut inventory = stock(10);
        inventory.reserve(1).unwrap();
        assert_eq!(
            inventory.ensure_deletable(),
            Err(InventoryError::HasReservations { reserved: 1 })
        );
    }

    #[test]
    fn stock_level_payload_carries_previous_counters() {
        let mut inventory = stock(5);
        inventory.reserve(4).unwrap();
        let level = inventory.stock_level(StockChange::Reserved, 5, 0);
        assert_eq!(level.previous_reserved, 0);
        assert_eq!(level.inventory.reserved_quantity, 4);
        assert_eq!(level.product_id, EntityId::new("P1"));
    }
}
