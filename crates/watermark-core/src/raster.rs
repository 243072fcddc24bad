//! Image decoding, resizing and encoding

use crate::{Result, WatermarkError};
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;

/// Image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Detect the container format from magic bytes
pub fn detect_format(data: &[u8]) -> Result<ImageFormat> {
    image::guess_format(data).map_err(|e| WatermarkError::UnsupportedFormat(e.to_string()))
}

/// Get image dimensions without fully decoding
///
/// # Arguments
/// * `data` - Image file bytes
pub fn get_dimensions(data: &[u8]) -> Result<ImageDimensions> {
    let format = detect_format(data)?;
    let (width, height) = ImageReader::with_format(Cursor::new(data), format)
        .into_dimensions()
        .map_err(|e| WatermarkError::Decode(e.to_string()))?;

    Ok(ImageDimensions { width, height })
}

/// Scale proportionally to a target width
///
/// # Arguments
/// * `original_width` - Original image width in pixels
/// * `original_height` - Original image height in pixels
/// * `target_width` - Target width in pixels
///
/// # Returns
/// (width, height) in pixels, never smaller than 1x1
pub fn scaled_to_width(original_width: u32, original_height: u32, target_width: u32) -> (u32, u32) {
    let width = target_width.max(1);
    if original_width == 0 {
        return (width, original_height.max(1));
    }

    let aspect = f64::from(original_height) / f64::from(original_width);
    let height = (f64::from(width) * aspect).round().max(1.0) as u32;
    (width, height)
}

/// Decode an image in a known format
pub(crate) fn decode(data: &[u8], format: ImageFormat) -> Result<DynamicImage> {
    image::load_from_memory_with_format(data, format)
        .map_err(|e| WatermarkError::Decode(e.to_string()))
}

/// Decode an image, guessing its format
pub(crate) fn decode_any(data: &[u8]) -> Result<DynamicImage> {
    let format = detect_format(data)?;
    decode(data, format)
}

/// Resize an image to `target_width`, preserving the aspect ratio
pub(crate) fn resize_to_width(image: &DynamicImage, target_width: u32) -> RgbaImage {
    let (width, height) = scaled_to_width(image.width(), image.height(), target_width);
    if (width, height) == (image.width(), image.height()) {
        return image.to_rgba8();
    }
    image
        .resize_exact(width, height, FilterType::Lanczos3)
        .into_rgba8()
}

/// Whether `color` stores more than 8 bits per channel
pub(crate) fn is_high_depth(color: ColorType) -> bool {
    color.bytes_per_pixel() > color.channel_count()
}

/// Convert a composited image back to the base image's color type
fn restore_color(image: DynamicImage, color: ColorType) -> DynamicImage {
    match color {
        ColorType::L8 => DynamicImage::ImageLuma8(image.into_luma8()),
        ColorType::La8 => DynamicImage::ImageLumaA8(image.into_luma_alpha8()),
        ColorType::Rgb8 => DynamicImage::ImageRgb8(image.into_rgb8()),
        ColorType::Rgba8 => DynamicImage::ImageRgba8(image.into_rgba8()),
        ColorType::L16 => DynamicImage::ImageLuma16(image.into_luma16()),
        ColorType::La16 => DynamicImage::ImageLumaA16(image.into_luma_alpha16()),
        ColorType::Rgb16 => DynamicImage::ImageRgb16(image.into_rgb16()),
        ColorType::Rgba16 => DynamicImage::ImageRgba16(image.into_rgba16()),
        ColorType::Rgb32F => DynamicImage::ImageRgb32F(image.into_rgb32f()),
        ColorType::Rgba32F => DynamicImage::ImageRgba32F(image.into_rgba32f()),
        _ => image,
    }
}

/// Encode a composited image in the base image's container format
///
/// # Arguments
/// * `image` - Composited pixels
/// * `format` - Container format of the base image
/// * `color` - Color type of the decoded base image
///
/// The pixels are converted back to `color` first. When the encoder cannot
/// store that type, `write_to` falls back to the closest one it supports.
pub(crate) fn encode(image: DynamicImage, format: ImageFormat, color: ColorType) -> Result<Vec<u8>> {
    let image = restore_color(image, color);

    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, format)
        .map_err(|e| WatermarkError::Encode(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// Encode a bitmap as PNG
pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| WatermarkError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}
