//! Product endpoints served from the write store.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use application::{
    CreateProductCommand, DeleteProductCommand, GetProductByIdQuery, GetProductsQuery,
    UpdateProductCommand,
};
use common::{Currency, EntityId, Money, Page, SortDirection};
use domain::{NewProduct, Product, ProductQuery, ProductSortKey, ProductUpdate};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::PageParams;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub currency: Option<Currency>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub search: Option<String>,
    pub sort_by: Option<ProductSortKey>,
    pub sort_order: Option<SortDirection>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListParams {
    fn into_query(self) -> GetProductsQuery {
        let page = PageParams {
            page: self.page,
            limit: self.limit,
        };
        GetProductsQuery {
            filter: ProductQuery {
                category: self.category,
                is_active: self.is_active,
                currency: self.currency,
                min_price: self.min_price.map(Money::from_cents),
                max_price: self.max_price.map(Money::from_cents),
                search: self.search,
                sort_by: self.sort_by.unwrap_or_default(),
                sort_order: self.sort_order.unwrap_or_default(),
            },
            page: page.request(),
        }
    }
}

/// POST /products
#[tracing::instrument(skip(state, body), fields(sku = %body.sku))]
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state
        .mediator
        .send(CreateProductCommand::new(body))
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Product>>, ApiError> {
    let page = state.mediator.query(params.into_query()).await?;
    Ok(Json(page))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .mediator
        .query(GetProductByIdQuery {
            id: EntityId::new(id),
        })
        .await?;
    Ok(Json(product))
}

/// PUT /products/{id}
#[tracing::instrument(skip(state, update))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>, ApiError> {
    let product = state
        .mediator
        .send(UpdateProductCommand {
            id: EntityId::new(id),
            update,
        })
        .await?;
    Ok(Json(product))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .mediator
        .send(DeleteProductCommand {
            id: EntityId::new(id),
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
