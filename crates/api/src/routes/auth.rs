//! Session endpoints.

use axum::Json;
use axum::extract::State;
use application::LogoutCommand;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct LogoutResponse {
    pub revoked: usize,
}

/// POST /auth/logout: blacklists the presented tokens until they expire.
#[tracing::instrument(skip(state, body), fields(user_id = %body.user_id))]
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<LogoutCommand>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let revoked = state.mediator.send(body).await?;
    Ok(Json(LogoutResponse { revoked }))
}
