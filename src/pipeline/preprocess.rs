//! Scan normalisation before upload to the analysis service.
//!
//! Steps: EXIF orientation -> fit inside a square -> pad onto a black
//! canvas, centred -> luminance grayscale -> linear contrast stretch ->
//! JPEG re-encode. Identical input bytes always give identical output.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, Rgb, RgbImage};
use thiserror::Error;
use tracing::debug;

use super::intake::read_as_data_url;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessError {
    #[error("Could not decode image: {0}")]
    ImageDecode(String),

    #[error("Could not encode image: {0}")]
    Encode(String),
}

// ═══════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════

/// Canvas and tone settings for the normalised scan.
#[derive(Debug, Clone)]
pub struct ScanInputConfig {
    /// Side of the square output canvas.
    pub target_size: u32,
    /// Letterbox colour (RGB).
    pub padding_color: [u8; 3],
    /// Contrast gain applied around `contrast_pivot`.
    pub contrast_gain: f32,
    pub contrast_pivot: f32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for ScanInputConfig {
    fn default() -> Self {
        Self {
            target_size: 1024,
            padding_color: [0, 0, 0],
            contrast_gain: 1.2,
            contrast_pivot: 128.0,
            jpeg_quality: 95,
        }
    }
}

/// A normalised scan ready to send.
#[derive(Debug, Clone)]
pub struct PreparedScan {
    pub jpeg_bytes: Vec<u8>,
    pub original_width: u32,
    pub original_height: u32,
    pub content_width: u32,
    pub content_height: u32,
}

impl PreparedScan {
    pub fn to_data_url(&self) -> String {
        read_as_data_url(&self.jpeg_bytes, "image/jpeg")
    }
}

// ═══════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════

/// Run the full normalisation on raw image bytes.
pub fn preprocess(bytes: &[u8], config: &ScanInputConfig) -> Result<PreparedScan, PreprocessError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PreprocessError::ImageDecode(e.to_string()))?;
    let oriented = apply_orientation(decoded, read_exif_orientation(bytes));
    let rgb = oriented.to_rgb8();
    let (orig_w, orig_h) = rgb.dimensions();

    let target = config.target_size;
    let (content_w, content_h) = compute_scaled_dimensions(orig_w, orig_h, target);
    let resized = image::imageops::resize(&rgb, content_w, content_h, FilterType::CatmullRom);

    let [r, g, b] = config.padding_color;
    let mut canvas = RgbImage::from_pixel(target, target, Rgb([r, g, b]));
    let offset_x = i64::from((target - content_w) / 2);
    let offset_y = i64::from((target - content_h) / 2);
    image::imageops::overlay(&mut canvas, &resized, offset_x, offset_y);

    let gray = enhance_grayscale(&canvas, config.contrast_gain, config.contrast_pivot);
    let jpeg_bytes = encode_jpeg(gray, config.jpeg_quality)?;

    debug!(
        from = format!("{orig_w}x{orig_h}"),
        content = format!("{content_w}x{content_h}"),
        out_bytes = jpeg_bytes.len(),
        "Scan preprocessed"
    );

    Ok(PreparedScan {
        jpeg_bytes,
        original_width: orig_w,
        original_height: orig_h,
        content_width: content_w,
        content_height: content_h,
    })
}

/// Uniform scale so the image fits the square. Small scans are scaled up.
pub fn compute_scaled_dimensions(width: u32, height: u32, target_size: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (1, 1);
    }

    let scale = (target_size as f32 / width as f32).min(target_size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, target_size);
    (new_w, new_h)
}

/// Luminance (0.299/0.587/0.114) then `(g - pivot) * gain + pivot`, clamped.
pub fn enhance_grayscale(rgb: &RgbImage, gain: f32, pivot: f32) -> GrayImage {
    let (w, h) = rgb.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
        Luma([stretch_luma(r, g, b, gain, pivot)])
    })
}

fn stretch_luma(r: u8, g: u8, b: u8, gain: f32, pivot: f32) -> u8 {
    let gray = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    ((gray - pivot) * gain + pivot).clamp(0.0, 255.0).round() as u8
}

fn encode_jpeg(gray: GrayImage, quality: u8) -> Result<Vec<u8>, PreprocessError> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(gray)
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))
        .map_err(|e| PreprocessError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

// ── Orientation ───────────────────────────────────────────

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let Ok(reader) = exif::Reader::new().read_from_container(&mut cursor) else {
        return 1;
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Rotate/flip per EXIF orientation (1-8). Unknown values leave the image as is.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(img: RgbImage) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn output_is_square_target() {
        let bytes = png_bytes(RgbImage::from_pixel(400, 200, Rgb([200, 200, 200])));
        let scan = preprocess(&bytes, &ScanInputConfig::default()).unwrap();
        assert_eq!((scan.original_width, scan.original_height), (400, 200));
        assert_eq!((scan.content_width, scan.content_height), (1024, 512));

        let out = image::load_from_memory(&scan.jpeg_bytes).unwrap();
        assert_eq!((out.width(), out.height()), (1024, 1024));
    }

    #[test]
    fn letterbox_stays_black_and_content_is_centred() {
        let bytes = png_bytes(RgbImage::from_pixel(400, 200, Rgb([255, 255, 255])));
        let scan = preprocess(&bytes, &ScanInputConfig::default()).unwrap();
        let out = image::load_from_memory(&scan.jpeg_bytes).unwrap().to_luma8();
        // Top band is padding, middle row is content
        assert!(out.get_pixel(512, 10)[0] < 10);
        assert!(out.get_pixel(512, 512)[0] > 245);
        assert!(out.get_pixel(512, 1013)[0] < 10);
    }

    #[test]
    fn deterministic_for_identical_input() {
        let bytes = png_bytes(RgbImage::from_fn(120, 90, |x, y| {
            Rgb([(x * 2) as u8, (y * 2) as u8, 90])
        }));
        let config = ScanInputConfig::default();
        let a = preprocess(&bytes, &config).unwrap();
        let b = preprocess(&bytes, &config).unwrap();
        assert_eq!(a.jpeg_bytes, b.jpeg_bytes);
        assert!(a.to_data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn decode_failure_is_reported() {
        let err = preprocess(b"definitely not an image", &ScanInputConfig::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::ImageDecode(_)));
    }

    #[test]
    fn scaled_dimensions_upscale_small_images() {
        assert_eq!(compute_scaled_dimensions(512, 512, 1024), (1024, 1024));
        assert_eq!(compute_scaled_dimensions(2048, 1024, 1024), (1024, 512));
        assert_eq!(compute_scaled_dimensions(300, 900, 1024), (341, 1024));
        assert_eq!(compute_scaled_dimensions(0, 10, 1024), (1, 1));
    }

    #[test]
    fn contrast_stretch_pivots_on_mid_gray() {
        assert_eq!(stretch_luma(128, 128, 128, 1.2, 128.0), 128);
        assert_eq!(stretch_luma(0, 0, 0, 1.2, 128.0), 0);
        assert_eq!(stretch_luma(255, 255, 255, 1.2, 128.0), 255);
        // 200 -> (200-128)*1.2+128 = 214.4
        assert_eq!(stretch_luma(200, 200, 200, 1.2, 128.0), 214);
        // Pure red: 0.299*255 = 76.245 -> 66.29
        assert_eq!(stretch_luma(255, 0, 0, 1.2, 128.0), 66);
    }

    #[test]
    fn orientation_6_rotates_clockwise() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 10));
        let rotated = apply_orientation(img, 6);
        assert_eq!((rotated.width(), rotated.height()), (10, 40));
    }

    #[test]
    fn no_exif_means_normal_orientation() {
        let bytes = png_bytes(RgbImage::new(4, 4));
        assert_eq!(read_exif_orientation(&bytes), 1);
    }
}
