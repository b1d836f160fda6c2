//! Client for the remote object detection service.
//!
//! The service receives one JPEG-encoded frame per request and answers with
//! the raw detections for that frame. Model loading and inference live
//! entirely on the service side.

pub mod client;
pub mod error;
pub mod types;

pub use client::{DetectorClient, DetectorClientConfig};
pub use error::{DetectorError, DetectorResult};
pub use types::{DetectResponse, HealthResponse};
