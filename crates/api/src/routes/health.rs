//! Health check endpoints.

use application::{GetSystemHealthQuery, SystemHealth};
use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Tags with no handler bound; empty on a correctly wired server.
    pub unbound: Vec<&'static str>,
}

/// GET /health: returns system health status.
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let unbound = state.mediator.unbound();
    let status = if unbound.is_empty() { "ok" } else { "degraded" };
    Json(HealthResponse { status, unbound })
}

/// GET /fast/health/cqrs: read store, event bus, and projection feed.
pub async fn cqrs(State(state): State<AppState>) -> Result<Json<SystemHealth>, ApiError> {
    Ok(Json(state.mediator.query(GetSystemHealthQuery).await?))
}
