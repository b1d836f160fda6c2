//! Capture-track-stream loop.
//!
//! A single task owns the frame source and the [`FrameCycle`], so the
//! tracked object pool is only ever touched from here. Clients see the
//! results through the broadcast and watch channels.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use kennelcam_vision::{Clock, CycleReport, FrameCycle, FrameSource, PassKind};
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::ServerResult;
use crate::export::SnapshotExporter;
use crate::metrics;
use crate::overlay::{encode_jpeg, Overlay};
use crate::state::{ObjectsView, PipelineChannels};

/// How often the measured frame rate is logged.
const FPS_LOG_INTERVAL: Duration = Duration::from_secs(10);

pub struct Pipeline {
    source: Box<dyn FrameSource>,
    cycle: FrameCycle,
    exporter: Option<SnapshotExporter>,
    clock: Arc<dyn Clock>,
    frames: broadcast::Sender<Bytes>,
    objects: watch::Sender<ObjectsView>,
    jpeg_quality: u8,
    frame_interval: Duration,
    overlay: Overlay,
    /// When the previous frame finished, for the on-frame rate readout
    last_frame_at: Option<Instant>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Box<dyn FrameSource>,
        cycle: FrameCycle,
        exporter: Option<SnapshotExporter>,
        clock: Arc<dyn Clock>,
        channels: PipelineChannels,
        jpeg_quality: u8,
        frame_interval: Duration,
    ) -> Self {
        Self {
            source,
            cycle,
            exporter,
            clock,
            frames: channels.frames,
            objects: channels.objects,
            jpeg_quality,
            frame_interval,
            overlay: Overlay::default(),
            last_frame_at: None,
        }
    }

    /// Replace the frame annotation, e.g. to add text labels.
    pub fn with_overlay(mut self, overlay: Overlay) -> Self {
        self.overlay = overlay;
        self
    }

    /// Run until `shutdown` resolves.
    pub async fn run(mut self, shutdown: impl std::future::Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            interval_ms = self.frame_interval.as_millis() as u64,
            every_n = self.cycle.config().detect_every_n_frames,
            "Pipeline started"
        );

        let mut window_start = Instant::now();
        let mut window_frames: u64 = 0;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {}
            }

            match self.step().await {
                Ok(Some(_)) => window_frames += 1,
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Frame dropped"),
            }

            let elapsed = window_start.elapsed();
            if elapsed >= FPS_LOG_INTERVAL {
                let fps = window_frames as f64 / elapsed.as_secs_f64();
                debug!(fps = %format_args!("{:.1}", fps), "Pipeline frame rate");
                window_start = Instant::now();
                window_frames = 0;
            }
        }

        info!(frames = self.cycle.frame_index(), "Pipeline stopped");
    }

    /// Process one frame. Returns `None` when no frame could be captured.
    pub async fn step(&mut self) -> ServerResult<Option<CycleReport>> {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                metrics::record_frame_source_error();
                warn!(error = %e, "Frame capture failed");
                return Ok(None);
            }
        };

        let started = Instant::now();
        let report = self.cycle.process_frame(&frame).await;
        let now = self.clock.now();

        metrics::record_frame(report.pass, started.elapsed().as_secs_f64());
        metrics::set_active_trackers(report.objects.len());
        match report.pass {
            PassKind::Detection => metrics::record_detections_kept(report.detections_kept),
            PassKind::DetectorFallback => metrics::record_detector_unavailable(),
            PassKind::TrackOnly => {}
        }

        let view = ObjectsView::from_report(&report, now);

        if let Some(exporter) = self.exporter.as_mut() {
            if let Err(e) = exporter.export(&frame, &view.objects, now) {
                warn!(error = %e, "Snapshot export failed");
            }
        }

        let finished = Instant::now();
        let fps = self
            .last_frame_at
            .replace(finished)
            .map(|previous| finished.duration_since(previous).as_secs_f64())
            .filter(|elapsed| *elapsed > 0.0)
            .map(|elapsed| 1.0 / elapsed);

        let mut image = frame.into_rgb();
        self.overlay.draw(&mut image, &view.objects, fps);
        let jpeg = encode_jpeg(&image, self.jpeg_quality)?;

        // No receivers just means nobody is watching
        let _ = self.frames.send(Bytes::from(jpeg));
        self.objects.send_replace(view);

        Ok(Some(report))
    }
}
