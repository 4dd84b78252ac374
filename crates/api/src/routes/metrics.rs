//! Prometheus metrics endpoint and metric descriptions.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the metrics emitted by the core. Call once after
/// the recorder is installed.
pub fn describe() {
    describe_counter!("mediator_commands_total", "Commands dispatched, by tag and outcome");
    describe_counter!("mediator_queries_total", "Queries dispatched, by tag and outcome");
    describe_counter!(
        "mediator_validation_failures_total",
        "Messages rejected before reaching a handler"
    );
    describe_histogram!(
        "mediator_command_duration_seconds",
        Unit::Seconds,
        "Command handler latency"
    );
    describe_counter!("uow_commits_total", "Committed write-store transactions");
    describe_counter!("uow_rollbacks_total", "Rolled back write-store transactions");
    describe_counter!("uow_commit_failures_total", "Commits rejected by the write store");
    describe_counter!("event_bus_published_total", "Events published on the bus");
    describe_counter!(
        "event_bus_handler_failures_total",
        "Subscriber failures contained by the bus"
    );
    describe_counter!("projector_events_applied_total", "Events applied to the read model");
    describe_counter!("projector_gap_total", "Events that found no read record to update");
    describe_counter!("projector_resyncs_total", "Full read-model rebuilds");
    describe_counter!("cache_hits_total", "Cache lookups served from memory");
    describe_counter!("cache_misses_total", "Cache lookups that found nothing live");
    describe_counter!("cache_evictions_total", "Cache entries removed on expiry");
    describe_counter!("http_errors_total", "Error responses, by status code");
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
