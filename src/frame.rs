//! Decoded video frames and annotation drawing.
//!
//! `Frame` wraps an RGB8 pixel buffer. The pipeline annotates a copy of each
//! processed frame (track boxes plus burned-in labels) for the status surface
//! and for saved detection images. Drawing writes pixels directly; labels use
//! a small built-in 5x7 glyph set (digits, uppercase letters and `:./%-`),
//! which covers everything the overlay renders.

use std::path::Path;

use anyhow::{Context, Result};
use image::RgbImage;

use crate::geometry::BoundingBox;

pub type Color = [u8; 3];

pub const COLOR_KNOWN: Color = [0, 200, 0];
pub const COLOR_UNKNOWN: Color = [220, 0, 0];
pub const COLOR_PENDING: Color = [230, 200, 0];
pub const COLOR_TEXT: Color = [255, 255, 255];

const GLYPH_W: u32 = 5;
const GLYPH_H: u32 = 7;

#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Total pixel count, the denominator for the detection area floor.
    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Copy out the region under `bbox`, clamped to the frame.
    ///
    /// Returns `None` when the clamped region is empty, which callers treat
    /// the same as a failed hash: never a reason to abort the frame.
    pub fn crop(&self, bbox: &BoundingBox) -> Option<Frame> {
        let clamped = bbox.clamped(self.width(), self.height())?;
        let mut out = RgbImage::new(clamped.width() as u32, clamped.height() as u32);
        for y in 0..clamped.height() as u32 {
            for x in 0..clamped.width() as u32 {
                let px = self
                    .image
                    .get_pixel(clamped.x1 as u32 + x, clamped.y1 as u32 + y);
                out.put_pixel(x, y, *px);
            }
        }
        Some(Frame::new(out))
    }

    fn put_pixel_checked(&mut self, x: i32, y: i32, color: Color) {
        if x < 0 || y < 0 || x >= self.width() as i32 || y >= self.height() as i32 {
            return;
        }
        self.image.put_pixel(x as u32, y as u32, image::Rgb(color));
    }

    /// Draw a rectangle outline of the given thickness, clipped to the frame.
    pub fn draw_box(&mut self, bbox: &BoundingBox, color: Color, thickness: i32) {
        for t in 0..thickness {
            let (x1, y1) = (bbox.x1 + t, bbox.y1 + t);
            let (x2, y2) = (bbox.x2 - 1 - t, bbox.y2 - 1 - t);
            if x2 <= x1 || y2 <= y1 {
                break;
            }
            for x in x1..=x2 {
                self.put_pixel_checked(x, y1, color);
                self.put_pixel_checked(x, y2, color);
            }
            for y in y1..=y2 {
                self.put_pixel_checked(x1, y, color);
                self.put_pixel_checked(x2, y, color);
            }
        }
    }

    /// Burn a text label in at `(x, y)` (top-left of the first glyph).
    ///
    /// Characters without a glyph render as blanks. `scale` multiplies the
    /// 5x7 cell size.
    pub fn draw_text(&mut self, text: &str, x: i32, y: i32, color: Color, scale: i32) {
        let scale = scale.max(1);
        let mut cursor = x;
        for ch in text.chars() {
            if let Some(rows) = glyph(ch.to_ascii_uppercase()) {
                for (row, bits) in rows.iter().enumerate() {
                    for col in 0..GLYPH_W {
                        if bits & (1 << (GLYPH_W - 1 - col)) == 0 {
                            continue;
                        }
                        for dy in 0..scale {
                            for dx in 0..scale {
                                self.put_pixel_checked(
                                    cursor + col as i32 * scale + dx,
                                    y + row as i32 * scale + dy,
                                    color,
                                );
                            }
                        }
                    }
                }
            }
            cursor += (GLYPH_W as i32 + 1) * scale;
        }
    }

    /// Label height in pixels for a given scale, used to place labels above
    /// boxes without clipping.
    pub fn text_height(scale: i32) -> i32 {
        GLYPH_H as i32 * scale.max(1)
    }

    pub fn save_jpeg(&self, path: &Path) -> Result<()> {
        self.image
            .save(path)
            .with_context(|| format!("write jpeg {}", path.display()))
    }
}

fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '/' => [0x01, 0x01, 0x02, 0x04, 0x08, 0x10, 0x10],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        ' ' => [0x00; 7],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_clamps_to_frame() {
        let frame = Frame::blank(100, 80);
        let crop = frame
            .crop(&BoundingBox::new(-10, -10, 50, 50))
            .expect("partially in-frame crop");
        assert_eq!(crop.width(), 50);
        assert_eq!(crop.height(), 50);
    }

    #[test]
    fn crop_of_empty_region_is_none() {
        let frame = Frame::blank(100, 80);
        assert!(frame.crop(&BoundingBox::new(200, 200, 300, 300)).is_none());
        assert!(frame.crop(&BoundingBox::new(10, 10, 10, 40)).is_none());
    }

    #[test]
    fn draw_box_writes_outline_pixels() {
        let mut frame = Frame::blank(32, 32);
        let bbox = BoundingBox::new(4, 4, 12, 12);
        frame.draw_box(&bbox, COLOR_UNKNOWN, 1);
        assert_eq!(frame.image().get_pixel(4, 4).0, COLOR_UNKNOWN);
        assert_eq!(frame.image().get_pixel(11, 11).0, COLOR_UNKNOWN);
        // interior untouched
        assert_eq!(frame.image().get_pixel(8, 8).0, [0, 0, 0]);
    }

    #[test]
    fn draw_text_is_clipped_not_panicking() {
        let mut frame = Frame::blank(16, 8);
        frame.draw_text("UNKNOWN: 0.92", -3, -2, COLOR_TEXT, 2);
    }
}
