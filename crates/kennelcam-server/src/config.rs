//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Streaming server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Directory replayed as the camera feed
    pub frame_source_dir: PathBuf,
    /// Capture width in pixels
    pub capture_width: u32,
    /// Capture height in pixels
    pub capture_height: u32,
    /// Frames processed per second
    pub target_fps: u32,
    /// JPEG quality for the stream and the detector (1-100)
    pub jpeg_quality: u8,
    /// Where object snapshots are written; export is off when unset
    pub export_dir: Option<PathBuf>,
    /// Minimum time between two snapshots of the same object
    pub export_cooldown: Duration,
    /// Serve Prometheus metrics at /metrics
    pub metrics_enabled: bool,
    /// Encoded frames buffered per stream client before it starts skipping
    pub stream_buffer: usize,
    /// Font for object labels and the frame rate readout; boxes only when unset
    pub font_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            frame_source_dir: PathBuf::from("frames"),
            capture_width: 640,
            capture_height: 480,
            target_fps: 15,
            jpeg_quality: 80,
            export_dir: None,
            export_cooldown: Duration::from_secs(10),
            metrics_enabled: true,
            stream_buffer: 4,
            font_path: None,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("STREAM_HOST").unwrap_or(defaults.host),
            port: std::env::var("STREAM_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            frame_source_dir: std::env::var("FRAME_SOURCE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.frame_source_dir),
            capture_width: std::env::var("CAPTURE_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.capture_width),
            capture_height: std::env::var("CAPTURE_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.capture_height),
            target_fps: std::env::var("TARGET_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|fps| *fps > 0)
                .unwrap_or(defaults.target_fps),
            jpeg_quality: std::env::var("JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse::<u8>().ok())
                .map(|q| q.clamp(1, 100))
                .unwrap_or(defaults.jpeg_quality),
            export_dir: std::env::var("EXPORT_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            export_cooldown: std::env::var("EXPORT_COOLDOWN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.export_cooldown),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
            stream_buffer: defaults.stream_buffer,
            font_path: std::env::var("FONT_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Time between two pipeline ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.target_fps.max(1) as u64)
    }
}
