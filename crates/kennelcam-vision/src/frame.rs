//! Captured frames.

use image::{GrayImage, RgbImage};

/// A captured RGB frame with its luma plane.
///
/// The grayscale plane is computed once at construction because every
/// visual tracker reads it on every frame.
#[derive(Debug, Clone)]
pub struct Frame {
    rgb: RgbImage,
    luma: GrayImage,
}

impl Frame {
    /// Wrap an RGB image.
    pub fn new(rgb: RgbImage) -> Self {
        let luma = image::imageops::grayscale(&rgb);
        Self { rgb, luma }
    }

    /// Uniformly colored frame, mostly useful for tests and warm-up.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb(color)))
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn luma(&self) -> &GrayImage {
        &self.luma
    }

    /// Take the RGB image back, e.g. to draw overlays on it.
    pub fn into_rgb(self) -> RgbImage {
        self.rgb
    }
}

impl From<RgbImage> for Frame {
    fn from(rgb: RgbImage) -> Self {
        Frame::new(rgb)
    }
}
