//! Remote detector adapter for the frame cycle.

use async_trait::async_trait;
use kennelcam_detector_client::DetectorClient;
use kennelcam_vision::{DetectionOutcome, Detector, Frame};
use tracing::debug;

use crate::overlay::encode_jpeg;

/// Runs detection through the remote inference service.
///
/// Any failure, including frame encoding, is reported as
/// [`DetectionOutcome::Unavailable`].
pub struct RemoteDetector {
    client: DetectorClient,
    jpeg_quality: u8,
}

impl RemoteDetector {
    pub fn new(client: DetectorClient, jpeg_quality: u8) -> Self {
        Self {
            client,
            jpeg_quality,
        }
    }
}

#[async_trait]
impl Detector for RemoteDetector {
    async fn infer(&self, frame: &Frame) -> DetectionOutcome {
        let jpeg = match encode_jpeg(frame.rgb(), self.jpeg_quality) {
            Ok(jpeg) => jpeg,
            Err(e) => return DetectionOutcome::unavailable(format!("frame encoding failed: {}", e)),
        };

        match self.client.detect(&jpeg).await {
            Ok(detections) => {
                debug!(count = detections.len(), "Remote detections received");
                DetectionOutcome::Detections(detections)
            }
            Err(e) => DetectionOutcome::unavailable(e.to_string()),
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
