//! Prometheus metrics for the streaming server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use kennelcam_vision::PassKind;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use crate::error::{ServerError, ServerResult};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> ServerResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::internal(format!("failed to install Prometheus recorder: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "kennelcam_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "kennelcam_http_request_duration_seconds";

    // Stream metrics
    pub const STREAM_CLIENTS_ACTIVE: &str = "kennelcam_stream_clients_active";
    pub const STREAM_CLIENTS_TOTAL: &str = "kennelcam_stream_clients_total";

    // Pipeline metrics
    pub const FRAMES_PROCESSED_TOTAL: &str = "kennelcam_frames_processed_total";
    pub const FRAME_DURATION_SECONDS: &str = "kennelcam_frame_duration_seconds";
    pub const FRAME_SOURCE_ERRORS_TOTAL: &str = "kennelcam_frame_source_errors_total";
    pub const DETECTIONS_KEPT_TOTAL: &str = "kennelcam_detections_kept_total";
    pub const DETECTOR_UNAVAILABLE_TOTAL: &str = "kennelcam_detector_unavailable_total";
    pub const ACTIVE_TRACKERS: &str = "kennelcam_active_trackers";

    // Export metrics
    pub const SNAPSHOTS_EXPORTED_TOTAL: &str = "kennelcam_snapshots_exported_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a processed frame.
pub fn record_frame(pass: PassKind, duration_secs: f64) {
    let labels = [("pass", pass.as_str().to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(1);
    histogram!(names::FRAME_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a failed frame capture.
pub fn record_frame_source_error() {
    counter!(names::FRAME_SOURCE_ERRORS_TOTAL).increment(1);
}

/// Record detections surviving filtering and deduplication.
pub fn record_detections_kept(count: usize) {
    counter!(names::DETECTIONS_KEPT_TOTAL).increment(count as u64);
}

/// Record a detection frame on which the detector was unavailable.
pub fn record_detector_unavailable() {
    counter!(names::DETECTOR_UNAVAILABLE_TOTAL).increment(1);
}

/// Update the live tracker gauge.
pub fn set_active_trackers(count: usize) {
    gauge!(names::ACTIVE_TRACKERS).set(count as f64);
}

/// Record a stream client connecting.
pub fn record_stream_client_connected() {
    counter!(names::STREAM_CLIENTS_TOTAL).increment(1);
    gauge!(names::STREAM_CLIENTS_ACTIVE).increment(1.0);
}

/// Record a stream client going away.
pub fn record_stream_client_disconnected() {
    gauge!(names::STREAM_CLIENTS_ACTIVE).decrement(1.0);
}

/// Record written snapshots.
pub fn record_snapshots_exported(category: &str, count: usize) {
    let labels = [("category", category.to_string())];
    counter!(names::SNAPSHOTS_EXPORTED_TOTAL, &labels).increment(count as u64);
}

/// Sanitize path for metrics labels (replace numeric ids).
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/objects/42"), "/objects/:id");
        assert_eq!(sanitize_path("/objects"), "/objects");
        assert_eq!(sanitize_path("/"), "/");
    }
}
