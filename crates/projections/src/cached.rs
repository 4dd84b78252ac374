//! Cache entries shared by the projector and the read repository.

use std::sync::Arc;

use cache::Cache;
use common::EntityId;

use crate::ProductView;

/// Values stored in the read cache.
#[derive(Debug, Clone)]
pub enum CachedRead {
    Product(Arc<ProductView>),
    Products(Arc<Vec<ProductView>>),
}

pub type ReadCache = Cache<CachedRead>;

/// Cache key of a single product projection.
pub fn product_key(id: &EntityId) -> String {
    format!("product_read:{id}")
}

/// Cache key of a top-selling listing.
pub fn top_selling_key(limit: usize) -> String {
    format!("products_read:top_selling:{limit}")
}
