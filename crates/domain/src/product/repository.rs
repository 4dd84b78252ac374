use std::sync::Arc;

use common::{Currency, EntityId, Money, Page, PageRequest, SortDirection, Version};
use serde::{Deserialize, Serialize};
use store::{Backend, TxContext};

use crate::schema::{PRODUCTS, Stored};
use crate::{DomainResult, Product};

/// Sort keys accepted by product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortKey {
    Name,
    Price,
    #[default]
    CreatedAt,
    UpdatedAt,
}

/// Filters for listing products from the write store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub currency: Option<Currency>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: ProductSortKey,
    #[serde(default)]
    pub sort_order: SortDirection,
}

impl ProductQuery {
    pub fn matches(&self, product: &Product) -> bool {
        self.category
            .as_ref()
            .is_none_or(|c| product.category.eq_ignore_ascii_case(c))
            && self.is_active.is_none_or(|a| product.is_active == a)
            && self.currency.is_none_or(|c| product.currency == c)
            && self.min_price.is_none_or(|min| product.price >= min)
            && self.max_price.is_none_or(|max| product.price <= max)
            && self
                .search
                .as_deref()
                .is_none_or(|needle| product.matches_text(needle))
    }

    fn compare(&self, a: &Product, b: &Product) -> std::cmp::Ordering {
        let ordering = match self.sort_by {
            ProductSortKey::Name => a.name.cmp(&b.name),
            ProductSortKey::Price => a.price.cmp(&b.price),
            ProductSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            ProductSortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        self.sort_order.apply(ordering.then_with(|| a.id.cmp(&b.id)))
    }
}

/// Typed access to the `products` collection.
///
/// Methods taking a [`TxContext`] are part of a unit of work; the others read
/// committed state only.
#[derive(Clone)]
pub struct ProductRepository {
    backend: Arc<dyn Backend>,
}

impl ProductRepository {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn find_by_id(&self, id: &EntityId) -> DomainResult<Option<Product>> {
        self.backend
            .get(PRODUCTS, id)
            .await?
            .map(Product::from_record)
            .transpose()
    }

    /// Every committed product, ordered by id.
    pub async fn list_all(&self) -> DomainResult<Vec<Product>> {
        self.backend
            .scan(PRODUCTS)
            .await?
            .into_iter()
            .map(Product::from_record)
            .collect()
    }

    pub async fn find_all(
        &self,
        query: &ProductQuery,
        page: PageRequest,
    ) -> DomainResult<Page<Product>> {
        let mut products: Vec<Product> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|p| query.matches(p))
            .collect();
        products.sort_by(|a, b| query.compare(a, b));
        Ok(Page::from_sorted(products, page))
    }

    pub async fn find_in(
        &self,
        ctx: &mut TxContext,
        id: &EntityId,
    ) -> DomainResult<Option<Product>> {
        self.backend
            .get_in(ctx, PRODUCTS, id)
            .await?
            .map(Product::from_record)
            .transpose()
    }

    /// Looks up a product by SKU as seen by `ctx`.
    pub async fn find_by_sku_in(
        &self,
        ctx: &mut TxContext,
        sku: &str,
    ) -> DomainResult<Option<Product>> {
        for record in self.backend.scan_in(ctx, PRODUCTS).await? {
            if record.body.get("sku").and_then(|v| v.as_str()) == Some(sku) {
                return Product::from_record(record).map(Some);
            }
        }
        Ok(None)
    }

    /// Stages `product` for insertion and returns its committed version.
    pub async fn insert(&self, ctx: &mut TxContext, product: &Product) -> DomainResult<Version> {
        Ok(self
            .backend
            .insert(ctx, PRODUCTS, &product.id, product.to_body()?)
            .await?)
    }

    pub async fn update(&self, ctx: &mut TxContext, product: &Product) -> DomainResult<Version> {
        Ok(self
            .backend
            .update(ctx, PRODUCTS, &product.id, product.to_body()?)
            .await?)
    }

    pub async fn delete(&self, ctx: &mut TxContext, id: &EntityId) -> DomainResult<bool> {
        Ok(self.backend.delete(ctx, PRODUCTS, id).await?)
    }
}
