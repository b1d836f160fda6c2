//! Frame annotation and encoding.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use kennelcam_models::TrackedObjectSnapshot;
use rusttype::{Font, Scale};

use crate::error::{ServerError, ServerResult};

const DOG_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const OTHER_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const FPS_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const THICKNESS: u32 = 2;
const LABEL_SCALE: f32 = 18.0;
const FPS_SCALE: f32 = 24.0;
/// Gap between a label and the top of its box
const LABEL_MARGIN: i32 = 4;

/// Load a TrueType or OpenType font for frame labels.
pub fn load_font(path: &Path) -> ServerResult<Font<'static>> {
    let data = std::fs::read(path)?;
    Font::try_from_vec(data)
        .ok_or_else(|| ServerError::internal(format!("{} is not a usable font", path.display())))
}

/// Box outlines, plus labels and a frame rate readout when a font is loaded.
#[derive(Default)]
pub struct Overlay {
    font: Option<Font<'static>>,
}

impl Overlay {
    pub fn new(font: Option<Font<'static>>) -> Self {
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Annotate one streamed frame.
    pub fn draw(&self, image: &mut RgbImage, objects: &[TrackedObjectSnapshot], fps: Option<f64>) {
        draw_objects(image, objects);

        let Some(font) = self.font.as_ref() else {
            return;
        };
        draw_labels(image, objects, font);
        if let Some(fps) = fps {
            draw_text_mut(
                image,
                FPS_COLOR,
                10,
                10,
                Scale::uniform(FPS_SCALE),
                font,
                &format!("FPS: {:.2}", fps),
            );
        }
    }
}

fn color_for(object: &TrackedObjectSnapshot) -> Rgb<u8> {
    if object.category.is_dog() {
        DOG_COLOR
    } else {
        OTHER_COLOR
    }
}

/// Write each object's label just above its box.
fn draw_labels(image: &mut RgbImage, objects: &[TrackedObjectSnapshot], font: &Font<'_>) {
    let scale = Scale::uniform(LABEL_SCALE);
    for object in objects {
        let Some(visible) = object.bbox.clip_to(image.width(), image.height()) else {
            continue;
        };
        let label = object.label();
        let (_, height) = text_size(scale, font, &label);

        let x = visible.x.round() as i32;
        let y = (visible.y.round() as i32 - height - LABEL_MARGIN).max(0);
        draw_text_mut(image, color_for(object), x, y, scale, font, &label);
    }
}

/// Outline every tracked object on the image.
pub fn draw_objects(image: &mut RgbImage, objects: &[TrackedObjectSnapshot]) {
    for object in objects {
        let Some(visible) = object.bbox.clip_to(image.width(), image.height()) else {
            continue;
        };
        let color = color_for(object);

        let x = visible.x.round() as i32;
        let y = visible.y.round() as i32;
        let width = visible.width.round() as u32;
        let height = visible.height.round() as u32;

        for inset in 0..THICKNESS {
            let w = width.saturating_sub(2 * inset);
            let h = height.saturating_sub(2 * inset);
            // Rect::of_size panics on zero
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(w, h);
            draw_hollow_rect_mut(image, rect, color);
        }
    }
}

/// JPEG-encode an RGB image.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> ServerResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality).encode(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgb8,
    )?;
    Ok(buf)
}
