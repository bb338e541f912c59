//! Activation-map style overlay from percentage-based hot spots.
//!
//! Each region is a radial gradient (red → orange → yellow → transparent,
//! scaled by intensity) screen-blended over the scan at native size. Screen
//! with alpha over an opaque backdrop reduces to
//! `out = 1 - (1 - base) * Π(1 - αᵢ·cᵢ)`, so the per-channel products are
//! accumulated first and applied once; the result does not depend on region
//! order.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use thiserror::Error;

use super::intake::{decode_data_url, read_as_data_url, IntakeError};
use crate::models::HeatmapRegion;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HeatmapError {
    #[error("Invalid image payload: {0}")]
    Payload(#[from] IntakeError),

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Could not encode heatmap: {0}")]
    Encode(String),
}

/// Gradient stops: (offset, RGB, alpha at full intensity).
const STOPS: [(f32, [f32; 3], f32); 4] = [
    (0.0, [255.0, 0.0, 0.0], 0.7),
    (0.3, [255.0, 100.0, 0.0], 0.5),
    (0.6, [255.0, 200.0, 0.0], 0.3),
    (1.0, [255.0, 255.0, 0.0], 0.0),
];

/// Composite regions over a data-URL image, returning a PNG data URL.
pub fn composite_data_url(image: &str, regions: &[HeatmapRegion]) -> Result<String, HeatmapError> {
    let decoded = decode_data_url(image)?;
    let png = composite(&decoded.bytes, regions)?;
    Ok(read_as_data_url(&png, "image/png"))
}

/// Composite regions over encoded image bytes, returning PNG bytes.
/// No regions means a plain PNG re-encode of the source.
pub fn composite(image_bytes: &[u8], regions: &[HeatmapRegion]) -> Result<Vec<u8>, HeatmapError> {
    let base = image::load_from_memory(image_bytes)
        .map_err(|e| HeatmapError::Decode(e.to_string()))?
        .to_rgb8();
    let out = overlay_regions(&base, regions);
    tracing::debug!(
        width = out.width(),
        height = out.height(),
        regions = regions.len(),
        "Heatmap composited"
    );
    encode_png(out)
}

/// Pixel-level compositor.
pub fn overlay_regions(base: &RgbImage, regions: &[HeatmapRegion]) -> RgbImage {
    if regions.is_empty() {
        return base.clone();
    }

    let (w, h) = base.dimensions();
    // Per-channel transmittance Π(1 - α·c), 1.0 = untouched
    let mut transmit = vec![[1.0f32; 3]; (w as usize) * (h as usize)];

    for region in regions {
        let cx = region.x_percent / 100.0 * w as f32;
        let cy = region.y_percent / 100.0 * h as f32;
        let radius = region.size / 100.0 * w.min(h) as f32;
        if radius <= 0.0 || region.intensity <= 0.0 {
            continue;
        }

        let x0 = (cx - radius).floor().max(0.0) as u32;
        let y0 = (cy - radius).floor().max(0.0) as u32;
        let x1 = ((cx + radius).ceil().max(0.0) as u32).min(w);
        let y1 = ((cy + radius).ceil().max(0.0) as u32).min(h);

        for y in y0..y1 {
            for x in x0..x1 {
                // Sample at pixel centres, as a canvas fill does
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let t = (dx * dx + dy * dy).sqrt() / radius;
                if t >= 1.0 {
                    continue;
                }
                let (color, alpha) = gradient_at(t);
                let alpha = alpha * region.intensity;
                let cell = &mut transmit[(y * w + x) as usize];
                for c in 0..3 {
                    cell[c] *= 1.0 - alpha * color[c] / 255.0;
                }
            }
        }
    }

    let mut out = base.clone();
    for (i, px) in out.pixels_mut().enumerate() {
        let t = transmit[i];
        let Rgb(channels) = *px;
        let mut blended = [0u8; 3];
        for c in 0..3 {
            let inv = 1.0 - f32::from(channels[c]) / 255.0;
            blended[c] = ((1.0 - inv * t[c]) * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        *px = Rgb(blended);
    }
    out
}

/// Linear interpolation between the two stops around `t`.
fn gradient_at(t: f32) -> ([f32; 3], f32) {
    for pair in STOPS.windows(2) {
        let (o0, c0, a0) = pair[0];
        let (o1, c1, a1) = pair[1];
        if t <= o1 {
            let f = if o1 > o0 { (t - o0) / (o1 - o0) } else { 0.0 };
            let lerp = |a: f32, b: f32| a + (b - a) * f;
            return (
                [lerp(c0[0], c1[0]), lerp(c0[1], c1[1]), lerp(c0[2], c1[2])],
                lerp(a0, a1),
            );
        }
    }
    let (_, c, a) = STOPS[STOPS.len() - 1];
    (c, a)
}

fn encode_png(img: RgbImage) -> Result<Vec<u8>, HeatmapError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| HeatmapError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}
