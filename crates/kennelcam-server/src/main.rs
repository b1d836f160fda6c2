//! Kennelcam streaming server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kennelcam_detector_client::DetectorClient;
use kennelcam_server::{
    create_router, metrics, load_font, AppState, Overlay, Pipeline, RemoteDetector, ServerConfig,
    SnapshotExporter,
};
use kennelcam_vision::{
    FrameCycle, ImageSequenceSource, SystemClock, TemplateTrackerFactory,
    TrackingConfig,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting kennelcam-server");

    if let Err(e) = run().await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    // Load configuration
    let config = ServerConfig::from_env();
    let tracking = TrackingConfig::from_env();
    tracking.validate()?;
    info!(
        host = %config.host,
        port = config.port,
        source = %config.frame_source_dir.display(),
        every_n = tracking.detect_every_n_frames,
        iou_threshold = tracking.iou_threshold,
        "Server config loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let client = DetectorClient::from_env()?;
    match client.health_check().await {
        Ok(true) => info!(url = %client.base_url(), "Detector service is healthy"),
        Ok(false) => {
            warn!(url = %client.base_url(), "Detector service not ready, tracking will continue without it")
        }
        Err(e) => {
            warn!(url = %client.base_url(), error = %e, "Detector health check failed, tracking will continue without it")
        }
    }
    let detector = Arc::new(RemoteDetector::new(client, config.jpeg_quality));

    let source = ImageSequenceSource::open(
        &config.frame_source_dir,
        config.capture_width,
        config.capture_height,
    )
    .with_context(|| format!("opening frame source {}", config.frame_source_dir.display()))?;

    let clock = Arc::new(SystemClock);
    let cycle = FrameCycle::new(
        Arc::new(TemplateTrackerFactory::default()),
        detector,
        tracking,
    )?
    .with_clock(clock.clone());

    let exporter = match config.export_dir.as_ref() {
        Some(dir) => {
            info!(dir = %dir.display(), "Snapshot export enabled");
            Some(
                SnapshotExporter::new(dir, config.export_cooldown, config.jpeg_quality)
                    .with_context(|| format!("opening export directory {}", dir.display()))?,
            )
        }
        None => None,
    };

    let overlay = match config.font_path.as_ref() {
        Some(path) => {
            let font = load_font(path)
                .with_context(|| format!("loading font {}", path.display()))?;
            info!(font = %path.display(), "Frame labels enabled");
            Overlay::new(Some(font))
        }
        None => {
            info!("FONT_PATH not set, frames carry boxes only");
            Overlay::default()
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    let frame_interval = config.frame_interval();
    let jpeg_quality = config.jpeg_quality;

    let (state, channels) = AppState::new(config);
    let pipeline = Pipeline::new(
        Box::new(source),
        cycle,
        exporter,
        clock,
        channels,
        jpeg_quality,
        frame_interval,
    )
    .with_overlay(overlay);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let pipeline_task = tokio::spawn(pipeline.run(async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    }));

    // Create router
    let app = create_router(state, metrics_handle);

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    pipeline_task.await?;
    Ok(())
}

async fn shutdown_signal(pipeline: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {}", e);
    }
    info!("Received shutdown signal");
    let _ = pipeline.send(true);
}
