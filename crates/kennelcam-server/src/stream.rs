//! MJPEG streaming endpoint.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use crate::metrics;
use crate::state::AppState;

const BOUNDARY: &str = "frame";

/// Wrap one JPEG as a multipart part.
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        jpeg.len()
    );
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Tracks one connected client for the lifetime of its stream.
struct ClientGuard;

impl ClientGuard {
    fn new() -> Self {
        metrics::record_stream_client_connected();
        info!("Stream client connected");
        Self
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        metrics::record_stream_client_disconnected();
        info!("Stream client disconnected");
    }
}

/// `GET /`: annotated frames as `multipart/x-mixed-replace`.
///
/// Clients that fall behind skip frames rather than slowing the pipeline.
pub async fn mjpeg_stream(State(state): State<AppState>) -> Response {
    let receiver = state.frames.subscribe();
    let body = Body::from_stream(frame_parts(receiver));

    (
        [
            (
                header::CONTENT_TYPE,
                format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
            ),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        body,
    )
        .into_response()
}

fn frame_parts(
    receiver: broadcast::Receiver<Bytes>,
) -> impl futures_util::Stream<Item = Result<Bytes, std::convert::Infallible>> {
    stream::unfold(
        (receiver, ClientGuard::new()),
        |(mut receiver, guard)| async move {
            loop {
                match receiver.recv().await {
                    Ok(jpeg) => return Some((Ok(multipart_part(&jpeg)), (receiver, guard))),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Stream client lagging, frames skipped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        },
    )
}
