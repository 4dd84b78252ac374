//! Latency-oriented reads served from the read model and its cache.

use axum::Json;
use axum::extract::{Path, Query, State};
use application::{
    ComparePerformanceQuery, FastGetProductByIdQuery, FastGetProductsQuery,
    GetProductAnalyticsQuery, GetTopSellingProductsQuery, PerformanceComparison,
};
use common::{Currency, EntityId, Money, Page, SortDirection};
use projections::{ProductAnalytics, ProductFilter, ProductView, ReadSortKey};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::{PageParams, split_list};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    /// Comma-separated; matches products carrying any of them.
    pub tags: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub currency: Option<Currency>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub is_low_stock: Option<bool>,
    pub sort_by: Option<ReadSortKey>,
    pub sort_order: Option<SortDirection>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListParams {
    fn into_query(self) -> FastGetProductsQuery {
        let defaults = ProductFilter::default();
        let page = PageParams {
            page: self.page,
            limit: self.limit,
        };
        FastGetProductsQuery {
            filter: ProductFilter {
                category: self.category,
                tags: split_list(self.tags.as_deref()),
                min_price: self.min_price.map(Money::from_cents),
                max_price: self.max_price.map(Money::from_cents),
                currency: self.currency,
                search: self.search,
                is_active: self.is_active.or(defaults.is_active),
                is_low_stock: self.is_low_stock,
                sort_by: self.sort_by.unwrap_or(defaults.sort_by),
                sort_order: self.sort_order.unwrap_or(defaults.sort_order),
            },
            page: page.request(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GetParams {
    pub use_cache: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct TopSellingParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub category: Option<String>,
}

/// GET /fast/products
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<ProductView>>, ApiError> {
    Ok(Json(state.mediator.query(params.into_query()).await?))
}

/// GET /fast/products/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<GetParams>,
) -> Result<Json<ProductView>, ApiError> {
    let query = FastGetProductByIdQuery {
        id: EntityId::new(id),
        use_cache: params.use_cache.unwrap_or(true),
    };
    Ok(Json(state.mediator.query(query).await?))
}

/// GET /fast/products/top-selling
#[tracing::instrument(skip(state))]
pub async fn top_selling(
    State(state): State<AppState>,
    Query(params): Query<TopSellingParams>,
) -> Result<Json<Vec<ProductView>>, ApiError> {
    let query = params
        .limit
        .map(|limit| GetTopSellingProductsQuery { limit })
        .unwrap_or_default();
    Ok(Json(state.mediator.query(query).await?))
}

/// GET /fast/products/{id}/analytics
#[tracing::instrument(skip(state))]
pub async fn analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductAnalytics>, ApiError> {
    let query = GetProductAnalyticsQuery {
        id: EntityId::new(id),
    };
    Ok(Json(state.mediator.query(query).await?))
}

/// GET /fast/performance/compare
#[tracing::instrument(skip(state))]
pub async fn compare_performance(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> Result<Json<PerformanceComparison>, ApiError> {
    let query = ComparePerformanceQuery {
        category: params.category,
    };
    Ok(Json(state.mediator.query(query).await?))
}
