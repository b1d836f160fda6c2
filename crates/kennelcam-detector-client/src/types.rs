//! Detector service request/response types.

use kennelcam_models::RawDetection;
use serde::{Deserialize, Serialize};

/// Response from `POST /detect`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectResponse {
    /// Raw detections for the submitted frame, in model output order
    #[serde(default)]
    pub detections: Vec<RawDetection>,
    /// Server-side inference time, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_ms: Option<f64>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
    /// Name of the loaded model, if reported
    #[serde(default)]
    pub model: Option<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" || self.status == "ok"
    }
}
