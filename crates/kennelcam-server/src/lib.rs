//! Kennelcam streaming server.
//!
//! This crate provides:
//! - The capture-track-stream pipeline task
//! - A remote detector adapter over the inference service client
//! - Annotated MJPEG streaming and a JSON view of tracked objects
//! - Snapshot export of tracked objects and a registry of exported dogs
//! - Prometheus metrics

pub mod config;
pub mod detector;
pub mod error;
pub mod export;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod overlay;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod state;
pub mod stream;

pub use config::ServerConfig;
pub use detector::RemoteDetector;
pub use error::{ServerError, ServerResult};
pub use export::SnapshotExporter;
pub use overlay::{load_font, Overlay};
pub use pipeline::Pipeline;
pub use registry::{DogRecord, DogRegistry};
pub use routes::create_router;
pub use state::{AppState, ObjectsView};
