//! Read-side messages.
//!
//! The `Get*` queries read the write store and are consistent with the last
//! commit. The `Fast*`, top-selling, and analytics queries read the
//! projections through the cache and may lag behind it. The performance and
//! health queries report on the two read paths themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{EntityId, PageRequest};
use domain::{Inventory, InventoryQuery, ProductQuery};
use events::BusStats;
use projections::ProductFilter;
use serde::{Deserialize, Serialize};

use crate::ValidationError;
use crate::mediator::Validate;

pub const MAX_TOP_SELLING: usize = 100;

fn require_id(id: &EntityId) -> Result<(), ValidationError> {
    if id.is_blank() {
        return Err(ValidationError::field("id", "must not be empty"));
    }
    Ok(())
}

fn ordered_range<T: PartialOrd>(
    field: &'static str,
    min: Option<T>,
    max: Option<T>,
) -> Result<(), ValidationError> {
    match (min, max) {
        (Some(min), Some(max)) if min > max => {
            Err(ValidationError::field(field, "minimum exceeds maximum"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct GetProductByIdQuery {
    pub id: EntityId,
}

#[async_trait]
impl Validate for GetProductByIdQuery {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id(&self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetProductsQuery {
    pub filter: ProductQuery,
    pub page: PageRequest,
}

#[async_trait]
impl Validate for GetProductsQuery {
    async fn validate(&self) -> Result<(), ValidationError> {
        ordered_range("price", self.filter.min_price, self.filter.max_price)
    }
}

#[derive(Debug, Clone)]
pub struct GetInventoryByIdQuery {
    pub id: EntityId,
}

#[async_trait]
impl Validate for GetInventoryByIdQuery {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id(&self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetInventoryQuery {
    pub filter: InventoryQuery,
    pub page: PageRequest,
}

#[async_trait]
impl Validate for GetInventoryQuery {
    async fn validate(&self) -> Result<(), ValidationError> {
        ordered_range("quantity", self.filter.min_quantity, self.filter.max_quantity)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetLowStockItemsQuery {
    pub warehouse_id: Option<String>,
    pub page: PageRequest,
}

#[async_trait]
impl Validate for GetLowStockItemsQuery {}

/// An inventory record below its minimum, with how far below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockItem {
    pub inventory: Inventory,
    pub available_quantity: u32,
    pub shortage_amount: u32,
    pub shortage_percentage: f64,
}

impl From<Inventory> for LowStockItem {
    fn from(inventory: Inventory) -> Self {
        Self {
            available_quantity: inventory.available_quantity(),
            shortage_amount: inventory.shortage(),
            shortage_percentage: inventory.shortage_percentage(),
            inventory,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FastGetProductByIdQuery {
    pub id: EntityId,
    pub use_cache: bool,
}

impl FastGetProductByIdQuery {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            use_cache: true,
        }
    }
}

#[async_trait]
impl Validate for FastGetProductByIdQuery {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id(&self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FastGetProductsQuery {
    pub filter: ProductFilter,
    pub page: PageRequest,
}

#[async_trait]
impl Validate for FastGetProductsQuery {
    async fn validate(&self) -> Result<(), ValidationError> {
        ordered_range("price", self.filter.min_price, self.filter.max_price)
    }
}

#[derive(Debug, Clone)]
pub struct GetTopSellingProductsQuery {
    pub limit: usize,
}

impl Default for GetTopSellingProductsQuery {
    fn default() -> Self {
        Self { limit: 10 }
    }
}

#[async_trait]
impl Validate for GetTopSellingProductsQuery {
    async fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=MAX_TOP_SELLING).contains(&self.limit) {
            return Err(ValidationError::field(
                "limit",
                format!("must be between 1 and {MAX_TOP_SELLING}"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GetProductAnalyticsQuery {
    pub id: EntityId,
}

#[async_trait]
impl Validate for GetProductAnalyticsQuery {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id(&self.id)
    }
}

/// Runs the same active-product listing against both stores and times them.
#[derive(Debug, Clone, Default)]
pub struct ComparePerformanceQuery {
    pub category: Option<String>,
}

#[async_trait]
impl Validate for ComparePerformanceQuery {}

/// Timing of one side of a [`ComparePerformanceQuery`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTiming {
    pub execution_time_ms: f64,
    pub total_results: usize,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceComparison {
    pub read_model: ModelTiming,
    pub write_model: ModelTiming,
    /// Write-model time over read-model time; absent when the read side
    /// finished too fast to measure.
    pub speedup_ratio: Option<f64>,
    pub read_model_faster: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetSystemHealthQuery;

#[async_trait]
impl Validate for GetSystemHealthQuery {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Whether committed writes currently reach the read store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadStoreHealth {
    pub status: HealthStatus,
    pub records: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqrsStatus {
    pub status: HealthStatus,
    pub read_model_sync: SyncState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub read_store: ReadStoreHealth,
    pub event_bus: BusStats,
    pub cqrs: CqrsStatus,
    pub checked_at: DateTime<Utc>,
}
