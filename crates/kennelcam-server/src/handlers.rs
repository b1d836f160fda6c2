//! Request handlers.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use kennelcam_models::{TrackId, TrackedObjectSnapshot};
use serde::Serialize;

use crate::error::{ServerError, ServerResult};
use crate::state::{AppState, ObjectsView};

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    /// Frames processed so far
    pub frames: u64,
    pub detector_available: bool,
    pub stream_clients: usize,
}

/// Health check endpoint (liveness probe).
///
/// Reports `degraded` while the detector is unavailable; tracking and
/// streaming keep running in that state.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (frames, detector_available) = {
        let view = state.objects.borrow();
        let frames = if view.updated_at.is_some() {
            view.frame_index + 1
        } else {
            0
        };
        (frames, view.detector_available)
    };

    Json(HealthResponse {
        status: if detector_available { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        frames,
        detector_available,
        stream_clients: state.frames.receiver_count(),
    })
}

/// One tracked object with its display label.
#[derive(Serialize)]
pub struct ObjectResponse {
    #[serde(flatten)]
    pub object: TrackedObjectSnapshot,
    pub label: String,
}

impl From<TrackedObjectSnapshot> for ObjectResponse {
    fn from(object: TrackedObjectSnapshot) -> Self {
        let label = object.label();
        Self { object, label }
    }
}

/// Object listing response.
#[derive(Serialize)]
pub struct ObjectsResponse {
    pub frame_index: u64,
    pub objects: Vec<ObjectResponse>,
    pub groups: std::collections::BTreeMap<String, usize>,
    pub detector_available: bool,
}

impl From<ObjectsView> for ObjectsResponse {
    fn from(view: ObjectsView) -> Self {
        Self {
            frame_index: view.frame_index,
            objects: view.objects.into_iter().map(ObjectResponse::from).collect(),
            groups: view.groups,
            detector_available: view.detector_available,
        }
    }
}

/// `GET /objects`: objects tracked on the latest frame.
pub async fn list_objects(State(state): State<AppState>) -> Json<ObjectsResponse> {
    let view = state.objects.borrow().clone();
    Json(view.into())
}

/// `GET /objects/:id`: one tracked object.
pub async fn get_object(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ServerResult<Json<ObjectResponse>> {
    let id = TrackId(id);
    let object = state
        .objects
        .borrow()
        .objects
        .iter()
        .find(|o| o.id == id)
        .cloned()
        .ok_or_else(|| ServerError::not_found(format!("object {} is not tracked", id)))?;

    Ok(Json(object.into()))
}
