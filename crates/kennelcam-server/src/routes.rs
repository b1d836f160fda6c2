//! HTTP routes.

use axum::middleware;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::{get_object, health, list_objects};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_logging};
use crate::state::AppState;
use crate::stream::mjpeg_stream;

/// Create the server router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let object_routes = Router::new()
        .route("/objects", get(list_objects))
        .route("/objects/:id", get(get_object));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/", get(mjpeg_stream))
        .route("/health", get(health))
        .merge(object_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging))
        .layer(cors)
        .with_state(state)
}
