//! Application state.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use kennelcam_models::TrackedObjectSnapshot;
use kennelcam_vision::CycleReport;
use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::config::ServerConfig;

/// Latest view of the tracked objects, published once per frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectsView {
    pub frame_index: u64,
    pub objects: Vec<TrackedObjectSnapshot>,
    /// Object count per plural category, e.g. `{"dogs": 2, "owners": 1}`
    pub groups: BTreeMap<String, usize>,
    pub detector_available: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ObjectsView {
    pub fn from_report(report: &CycleReport, now: DateTime<Utc>) -> Self {
        let objects: Vec<TrackedObjectSnapshot> = report.objects.values().cloned().collect();
        let mut groups = BTreeMap::new();
        for object in &objects {
            *groups.entry(object.category.plural()).or_insert(0) += 1;
        }

        Self {
            frame_index: report.frame_index,
            objects,
            groups,
            detector_available: report.detector_available,
            updated_at: Some(now),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Encoded, annotated frames
    pub frames: broadcast::Sender<Bytes>,
    pub objects: watch::Receiver<ObjectsView>,
}

/// Sending halves kept by the pipeline.
pub struct PipelineChannels {
    pub frames: broadcast::Sender<Bytes>,
    pub objects: watch::Sender<ObjectsView>,
}

impl AppState {
    /// Create state plus the channels the pipeline publishes on.
    pub fn new(config: ServerConfig) -> (Self, PipelineChannels) {
        let (frames, _) = broadcast::channel(config.stream_buffer.max(1));
        let (objects_tx, objects_rx) = watch::channel(ObjectsView {
            detector_available: true,
            ..Default::default()
        });

        let state = Self {
            config: Arc::new(config),
            frames: frames.clone(),
            objects: objects_rx,
        };
        let channels = PipelineChannels {
            frames,
            objects: objects_tx,
        };
        (state, channels)
    }
}
