//! Frame container and annotation.
//!
//! - `Frame`: packed RGB24 pixels with dimensions and a per-source sequence number
//! - `annotate`: draws detection boxes colored by label class
//! - `save_jpeg`: snapshot encoding

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use std::path::Path;

use crate::detect::Detection;
use crate::tools::LabelSets;

/// Box outline thickness in pixels.
pub const BOX_THICKNESS: u32 = 2;

/// A single captured frame in packed RGB24.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Sequence number assigned by the source (1-based).
    pub sequence: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    pub fn from_image(image: RgbImage, sequence: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.into_raw(),
            width,
            height,
            sequence,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    pub fn to_image(&self) -> Result<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", self.width, self.height))
    }

    /// Encode to JPEG bytes (dashboard frame endpoint).
    pub fn encode_jpeg(&self) -> Result<Vec<u8>> {
        let image = self.to_image()?;
        let mut out = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut out, ImageFormat::Jpeg)
            .context("encode frame as JPEG")?;
        Ok(out.into_inner())
    }

    pub fn save_jpeg(&self, path: &Path) -> Result<()> {
        let image = self.to_image()?;
        image
            .save_with_format(path, ImageFormat::Jpeg)
            .with_context(|| format!("write frame to {}", path.display()))
    }

    fn put_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        self.data[idx..idx + 3].copy_from_slice(&color);
    }

    fn draw_rect(&mut self, x1: u32, y1: u32, x2: u32, y2: u32, color: [u8; 3]) {
        for t in 0..BOX_THICKNESS {
            let top = y1.saturating_add(t).min(y2);
            let bottom = y2.saturating_sub(t).max(y1);
            for x in x1..=x2 {
                self.put_pixel(x, top, color);
                self.put_pixel(x, bottom, color);
            }
            let left = x1.saturating_add(t).min(x2);
            let right = x2.saturating_sub(t).max(x1);
            for y in y1..=y2 {
                self.put_pixel(left, y, color);
                self.put_pixel(right, y, color);
            }
        }
    }
}

fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

/// Caption shown next to a detection box, e.g. `battery_in (0.87)`.
pub fn caption(detection: &Detection) -> String {
    format!("{} ({:.2})", detection.label, detection.confidence)
}

/// Copy `frame` and outline every detection in its label-class color.
///
/// Boxes are clamped to the frame; boxes entirely outside it are skipped.
pub fn annotate(frame: &Frame, detections: &[Detection], labels: &LabelSets) -> Frame {
    let mut annotated = frame.clone();
    if frame.width == 0 || frame.height == 0 {
        return annotated;
    }
    let max_x = (frame.width - 1) as f32;
    let max_y = (frame.height - 1) as f32;
    for detection in detections {
        let b = &detection.bbox;
        if b.x2 < 0.0 || b.y2 < 0.0 || b.x1 > max_x || b.y1 > max_y {
            continue;
        }
        let x1 = b.x1.clamp(0.0, max_x) as u32;
        let y1 = b.y1.clamp(0.0, max_y) as u32;
        let x2 = b.x2.clamp(0.0, max_x) as u32;
        let y2 = b.y2.clamp(0.0, max_y) as u32;
        if x2 < x1 || y2 < y1 {
            continue;
        }
        let color = labels.classify(&detection.label).color();
        annotated.draw_rect(x1, y1, x2, y2, color);
    }
    annotated
}
