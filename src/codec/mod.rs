//! Frame codec: raw RGB decode, detection overlay, JPEG encode
//!
//! Frames travel through the pipes as packed RGB24 buffers
//! (width * height * 3 bytes). Overlays are drawn directly on the pixel
//! buffer; labels use a small built-in 5x7 glyph set so no font files are
//! needed at runtime. Decode and encode failures are frame-skip conditions
//! for the caller, never fatal.

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use crate::detect::DetectionBox;
use crate::error::{EngineError, Result};

mod glyphs;

use glyphs::glyph_bits;

/// Box outline color
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Label text color
const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Label background color
const LABEL_BG: Rgb<u8> = Rgb([0, 0, 0]);

/// Reassemble a raw RGB24 buffer into an image
///
/// Returns `None` when the buffer length does not match the expected
/// frame geometry.
#[must_use]
pub fn decode_rgb_frame(raw: &[u8], width: u32, height: u32) -> Option<RgbImage> {
    if raw.len() != (width as usize) * (height as usize) * 3 {
        return None;
    }
    RgbImage::from_raw(width, height, raw.to_vec())
}

/// Draw every detection box, with its label, onto the frame
pub fn draw_detections(frame: &mut RgbImage, boxes: &[DetectionBox]) {
    for b in boxes {
        draw_rectangle(frame, b.x1, b.y1, b.x2, b.y2, BOX_COLOR);
        // 2px outline
        draw_rectangle(frame, b.x1 + 1, b.y1 + 1, b.x2 - 1, b.y2 - 1, BOX_COLOR);

        let text = format!("{} {:.0}%", b.label, b.conf * 100.0);
        let label_x = b.x1;
        let label_y = (b.y1 - 10).max(0);
        let text_width = text.chars().count() as i32 * 6;
        fill_rect(
            frame,
            label_x,
            label_y,
            label_x + text_width,
            label_y + 8,
            LABEL_BG,
        );
        draw_label(frame, label_x + 1, label_y + 1, &text, LABEL_COLOR);
    }
}

/// Encode a frame as JPEG for the detection backend
///
/// # Errors
/// Returns error if the JPEG encoder fails
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(frame)
        .map_err(|e| EngineError::detect(format!("JPEG encode failed: {e}")))?;
    Ok(buffer)
}

fn draw_rectangle(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.clamp(0, width.saturating_sub(1));
    let right = right.clamp(0, width.saturating_sub(1));
    let top = top.clamp(0, height.saturating_sub(1));
    let bottom = bottom.clamp(0, height.saturating_sub(1));

    for x in left..=right {
        *image.get_pixel_mut(x as u32, top as u32) = color;
        *image.get_pixel_mut(x as u32, bottom as u32) = color;
    }
    for y in top..=bottom {
        *image.get_pixel_mut(left as u32, y as u32) = color;
        *image.get_pixel_mut(right as u32, y as u32) = color;
    }
}

fn fill_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.clamp(0, width.saturating_sub(1));
    let right = right.clamp(0, width.saturating_sub(1));
    let top = top.clamp(0, height.saturating_sub(1));
    let bottom = bottom.clamp(0, height.saturating_sub(1));

    for y in top..=bottom {
        for x in left..=right {
            *image.get_pixel_mut(x as u32, y as u32) = color;
        }
    }
}

fn draw_label(image: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                let py = y + row as i32;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        let px = x + col;
                        if px >= 0 && px < width {
                            *image.get_pixel_mut(px as u32, py as u32) = color;
                        }
                    }
                }
            }
        }
        x += 6;
    }
}
