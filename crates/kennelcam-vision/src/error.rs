//! Error types for vision operations.
//!
//! Per-object tracking failures and bad geometry are not errors; they show
//! up as retired tracks. These variants cover the edges only.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors that can occur around the tracking core.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame source failed: {0}")]
    FrameSource(String),

    #[error("No frames found in {0}")]
    NoFrames(PathBuf),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a frame source failure error.
    pub fn frame_source(message: impl Into<String>) -> Self {
        Self::FrameSource(message.into())
    }
}
