//! Inventory endpoints served from the write store.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use application::{
    AdjustInventoryCommand, CreateInventoryCommand, DeleteInventoryCommand, GetInventoryByIdQuery,
    GetInventoryQuery, GetLowStockItemsQuery, LowStockItem, ReleaseReservationCommand,
    ReserveInventoryCommand, UpdateInventoryCommand,
};
use common::{EntityId, Page};
use domain::{Adjustment, Inventory, InventoryQuery, InventoryUpdate, NewInventory};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::PageParams;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub product_id: Option<String>,
    pub warehouse_id: Option<String>,
    pub location: Option<String>,
    pub low_stock: Option<bool>,
    pub over_stock: Option<bool>,
    pub min_quantity: Option<u32>,
    pub max_quantity: Option<u32>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockParams {
    pub warehouse_id: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    #[serde(flatten)]
    pub adjustment: Adjustment,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// POST /inventory
#[tracing::instrument(skip(state, body), fields(product_id = %body.product_id))]
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewInventory>,
) -> Result<(StatusCode, Json<Inventory>), ApiError> {
    let record = state
        .mediator
        .send(CreateInventoryCommand::new(body))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /inventory
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Inventory>>, ApiError> {
    let page = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let query = GetInventoryQuery {
        filter: InventoryQuery {
            product_id: params.product_id.map(EntityId::new),
            warehouse_id: params.warehouse_id,
            location: params.location,
            low_stock: params.low_stock,
            over_stock: params.over_stock,
            min_quantity: params.min_quantity,
            max_quantity: params.max_quantity,
        },
        page: page.request(),
    };
    Ok(Json(state.mediator.query(query).await?))
}

/// GET /inventory/low-stock
#[tracing::instrument(skip(state))]
pub async fn low_stock(
    State(state): State<AppState>,
    Query(params): Query<LowStockParams>,
) -> Result<Json<Page<LowStockItem>>, ApiError> {
    let page = PageParams {
        page: params.page,
        limit: params.limit,
    };
    let query = GetLowStockItemsQuery {
        warehouse_id: params.warehouse_id,
        page: page.request(),
    };
    Ok(Json(state.mediator.query(query).await?))
}

/// GET /inventory/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Inventory>, ApiError> {
    let record = state
        .mediator
        .query(GetInventoryByIdQuery {
            id: EntityId::new(id),
        })
        .await?;
    Ok(Json(record))
}

/// PUT /inventory/{id}
#[tracing::instrument(skip(state, update))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<InventoryUpdate>,
) -> Result<Json<Inventory>, ApiError> {
    let record = state
        .mediator
        .send(UpdateInventoryCommand {
            id: EntityId::new(id),
            update,
        })
        .await?;
    Ok(Json(record))
}

/// DELETE /inventory/{id}
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .mediator
        .send(DeleteInventoryCommand {
            id: EntityId::new(id),
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /inventory/{id}/adjust
#[tracing::instrument(skip(state, body))]
pub async fn adjust(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AdjustRequest>,
) -> Result<Json<Inventory>, ApiError> {
    let record = state
        .mediator
        .send(AdjustInventoryCommand {
            id: EntityId::new(id),
            adjustment: body.adjustment,
            reason: body.reason,
        })
        .await?;
    Ok(Json(record))
}

/// POST /inventory/{id}/reserve
#[tracing::instrument(skip(state, body), fields(quantity = body.quantity))]
pub async fn reserve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<Inventory>, ApiError> {
    let record = state
        .mediator
        .send(ReserveInventoryCommand::new(id, body.quantity))
        .await?;
    Ok(Json(record))
}

/// POST /inventory/{id}/release
#[tracing::instrument(skip(state, body), fields(quantity = body.quantity))]
pub async fn release(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<QuantityRequest>,
) -> Result<Json<Inventory>, ApiError> {
    let record = state
        .mediator
        .send(ReleaseReservationCommand {
            id: EntityId::new(id),
            quantity: body.quantity,
        })
        .await?;
    Ok(Json(record))
}
