//! API error types with HTTP response mapping.

use application::AppError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{InventoryError, ProductError};
use store::{CommitError, StoreError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be interpreted.
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    App(#[from] AppError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::App(err) => app_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("http_errors_total", "status" => status.as_u16().to_string())
            .increment(1);
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

fn app_status(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Product(e) => product_status(e),
        AppError::Inventory(e) => inventory_status(e),
        AppError::TransactionStart(_) | AppError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Commit(StoreError::Commit { cause, .. }) => match cause {
            CommitError::Conflict { .. } | CommitError::ConstraintViolation { .. } => {
                StatusCode::CONFLICT
            }
            CommitError::Rejected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        AppError::Store(StoreError::RecordNotFound { .. }) => StatusCode::NOT_FOUND,
        AppError::DuplicateRegistration { .. }
        | AppError::HandlerNotFound { .. }
        | AppError::Commit(_)
        | AppError::Store(_)
        | AppError::ReadStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn product_status(err: &ProductError) -> StatusCode {
    match err {
        ProductError::DuplicateSku { .. } | ProductError::HasInventory { .. } => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

fn inventory_status(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::InsufficientStock { .. }
        | InventoryError::ReleaseExceedsReserved { .. }
        | InventoryError::AlreadyExists { .. }
        | InventoryError::HasReservations { .. } => StatusCode::CONFLICT,
        InventoryError::UnknownProduct(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    }
}
