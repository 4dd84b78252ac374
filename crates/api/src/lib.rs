//! HTTP surface for the catalogue CQRS core.
//!
//! Every route translates its input into a command or query and sends it
//! through the mediator. Structured logging comes from `tracing`, metrics are
//! exported in Prometheus format.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use application::{AppResult, Application};
use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub type AppState = Arc<Application>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/products",
            post(routes::products::create).get(routes::products::list),
        )
        .route(
            "/products/{id}",
            get(routes::products::get)
                .put(routes::products::update)
                .delete(routes::products::delete),
        )
        .route(
            "/inventory",
            post(routes::inventory::create).get(routes::inventory::list),
        )
        .route("/inventory/low-stock", get(routes::inventory::low_stock))
        .route(
            "/inventory/{id}",
            get(routes::inventory::get)
                .put(routes::inventory::update)
                .delete(routes::inventory::delete),
        )
        .route("/inventory/{id}/adjust", post(routes::inventory::adjust))
        .route("/inventory/{id}/reserve", post(routes::inventory::reserve))
        .route("/inventory/{id}/release", post(routes::inventory::release))
        .route("/fast/products", get(routes::fast::list))
        .route("/fast/products/top-selling", get(routes::fast::top_selling))
        .route("/fast/products/{id}", get(routes::fast::get))
        .route("/fast/products/{id}/analytics", get(routes::fast::analytics))
        .route(
            "/fast/performance/compare",
            get(routes::fast::compare_performance),
        )
        .route("/fast/health/cqrs", get(routes::health::cqrs))
        .route("/auth/logout", post(routes::auth::logout))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the core with the tunables from `config`.
pub fn create_state(config: &Config) -> AppResult<AppState> {
    Ok(Arc::new(Application::build(&config.settings())?))
}
