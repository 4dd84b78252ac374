use std::sync::Arc;

use async_trait::async_trait;
use common::Page;
use domain::{Inventory, InventoryQuery, InventoryRepository, Product, ProductRepository};
use projections::{ProductAnalytics, ProductReadRepository, ProductView};
use store::Backend;

use crate::mediator::QueryHandler;
use crate::queries::{
    FastGetProductByIdQuery, FastGetProductsQuery, GetInventoryByIdQuery, GetInventoryQuery,
    GetLowStockItemsQuery, GetProductAnalyticsQuery, GetProductByIdQuery, GetProductsQuery,
    GetTopSellingProductsQuery, LowStockItem,
};
use crate::{AppError, AppResult};

/// Consistency-critical reads served from the write store.
pub struct WriteModelQueryHandler {
    products: ProductRepository,
    inventory: InventoryRepository,
}

impl WriteModelQueryHandler {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            products: ProductRepository::new(backend.clone()),
            inventory: InventoryRepository::new(backend),
        }
    }
}

#[async_trait]
impl QueryHandler<GetProductByIdQuery> for WriteModelQueryHandler {
    async fn handle(&self, query: GetProductByIdQuery) -> AppResult<Product> {
        self.products
            .find_by_id(&query.id)
            .await?
            .ok_or_else(|| AppError::not_found("Product", &query.id))
    }
}

#[async_trait]
impl QueryHandler<GetProductsQuery> for WriteModelQueryHandler {
    #[tracing::instrument(skip_all, fields(page = query.page.page, limit = query.page.limit))]
    async fn handle(&self, query: GetProductsQuery) -> AppResult<Page<Product>> {
        Ok(self.products.find_all(&query.filter, query.page).await?)
    }
}

#[async_trait]
impl QueryHandler<GetInventoryByIdQuery> for WriteModelQueryHandler {
    async fn handle(&self, query: GetInventoryByIdQuery) -> AppResult<Inventory> {
        self.inventory
            .find_by_id(&query.id)
            .await?
            .ok_or_else(|| AppError::not_found("Inventory", &query.id))
    }
}

#[async_trait]
impl QueryHandler<GetInventoryQuery> for WriteModelQueryHandler {
    #[tracing::instrument(skip_all, fields(page = query.page.page, limit = query.page.limit))]
    async fn handle(&self, query: GetInventoryQuery) -> AppResult<Page<Inventory>> {
        Ok(self.inventory.find_all(&query.filter, query.page).await?)
    }
}

#[async_trait]
impl QueryHandler<GetLowStockItemsQuery> for WriteModelQueryHandler {
    // Most critical shortage first.
    #[tracing::instrument(skip_all, fields(warehouse_id = ?query.warehouse_id))]
    async fn handle(&self, query: GetLowStockItemsQuery) -> AppResult<Page<LowStockItem>> {
        let filter = InventoryQuery {
            warehouse_id: query.warehouse_id,
            low_stock: Some(true),
            ..Default::default()
        };
        let mut items: Vec<LowStockItem> = self
            .inventory
            .list_all()
            .await?
            .into_iter()
            .filter(|i| filter.matches(i))
            .map(LowStockItem::from)
            .collect();
        items.sort_by(|a, b| {
            b.shortage_percentage
                .total_cmp(&a.shortage_percentage)
                .then_with(|| a.inventory.id().cmp(b.inventory.id()))
        });
        tracing::info!(count = items.len(), "low stock items found");
        Ok(Page::from_sorted(items, query.page))
    }
}

/// Latency-critical reads served from the projections and the cache.
pub struct ReadModelQueryHandler {
    reads: ProductReadRepository,
}

impl ReadModelQueryHandler {
    pub fn new(reads: ProductReadRepository) -> Self {
        Self { reads }
    }
}

#[async_trait]
impl QueryHandler<FastGetProductByIdQuery> for ReadModelQueryHandler {
    async fn handle(&self, query: FastGetProductByIdQuery) -> AppResult<ProductView> {
        self.reads
            .find_by_id(&query.id, query.use_cache)
            .await?
            .ok_or_else(|| AppError::not_found("Product", &query.id))
    }
}

#[async_trait]
impl QueryHandler<FastGetProductsQuery> for ReadModelQueryHandler {
    #[tracing::instrument(skip_all, fields(page = query.page.page, limit = query.page.limit))]
    async fn handle(&self, query: FastGetProductsQuery) -> AppResult<Page<ProductView>> {
        Ok(self.reads.find_all(&query.filter, query.page).await?)
    }
}

#[async_trait]
impl QueryHandler<GetTopSellingProductsQuery> for ReadModelQueryHandler {
    async fn handle(&self, query: GetTopSellingProductsQuery) -> AppResult<Vec<ProductView>> {
        Ok(self.reads.find_top_selling(query.limit).await?)
    }
}

#[async_trait]
impl QueryHandler<GetProductAnalyticsQuery> for ReadModelQueryHandler {
    async fn handle(&self, query: GetProductAnalyticsQuery) -> AppResult<ProductAnalytics> {
        self.reads
            .analytics(&query.id)
            .await?
            .ok_or_else(|| AppError::not_found("Product", &query.id))
    }
}
