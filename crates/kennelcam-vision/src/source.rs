//! Frame sources.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::{debug, info};

use crate::error::{VisionError, VisionResult};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Produces frames in capture order.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> VisionResult<Frame>;
}

/// Replays the images of a directory in name order, looping forever.
#[derive(Debug)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    position: usize,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    /// Scan `dir` for images. Frames are resized to `width` x `height`.
    pub fn open(dir: impl AsRef<Path>, width: u32, height: u32) -> VisionResult<Self> {
        let dir = dir.as_ref();
        if width == 0 || height == 0 {
            return Err(VisionError::invalid_config(format!(
                "capture size must be non-zero, got {}x{}",
                width, height
            )));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(VisionError::NoFrames(dir.to_path_buf()));
        }
        paths.sort();

        info!(dir = %dir.display(), frames = paths.len(), "Image sequence loaded");
        Ok(Self {
            paths,
            position: 0,
            width,
            height,
        })
    }

    /// Number of distinct frames in one loop.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> VisionResult<Frame> {
        let path = &self.paths[self.position % self.paths.len()];
        self.position = (self.position + 1) % self.paths.len();

        let rgb = image::open(path)
            .map_err(|e| VisionError::frame_source(format!("{}: {}", path.display(), e)))?
            .to_rgb8();

        let rgb = if rgb.dimensions() == (self.width, self.height) {
            rgb
        } else {
            debug!(
                path = %path.display(),
                from_width = rgb.width(),
                from_height = rgb.height(),
                "Resizing frame"
            );
            image::imageops::resize(&rgb, self.width, self.height, FilterType::Triangle)
        };

        Ok(Frame::new(rgb))
    }
}
