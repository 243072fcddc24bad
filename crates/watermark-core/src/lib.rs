//! Watermark Core - text and image watermarks for photos
//!
//! This crate provides functionality for:
//! - Normalizing loosely-typed watermark settings into a validated config
//! - Rendering a text label into a transparent bitmap overlay
//! - Loading and resizing an image asset relative to the photo width
//! - Compositing the overlay onto the photo at one of nine anchors
//! - Re-encoding the result in the photo's original container format
//!
//! # Example
//!
//! ```ignore
//! use bytes::Bytes;
//! use watermark_core::{Anchor, WatermarkConfig, Watermarker};
//!
//! let watermarker = Watermarker::new();
//! let config = WatermarkConfig::text("© 2024")
//!     .with_anchor(Anchor::BottomRight)
//!     .with_opacity(0.7)
//!     .with_font_size(40.0);
//!
//! let photo = Bytes::from(std::fs::read("photo.jpg")?);
//! let output = watermarker.apply(photo, &config).await?;
//! std::fs::write("photo-watermarked.jpg", &output)?;
//! ```

mod anchor;
mod color;
mod config;
mod raster;
mod text;
mod watermark;

pub use anchor::{Anchor, Gravity, ANCHOR_GRAVITY};
pub use color::{parse_hex_color, Rgb};
pub use config::{
    resolve_opacity, resolve_scale, WatermarkConfig, WatermarkKind, WatermarkSettings,
    DEFAULT_FONT_SIZE, DEFAULT_OFFSET, DEFAULT_OPACITY, DEFAULT_SCALE, MIN_SCALE,
};
pub use raster::{detect_format, get_dimensions, scaled_to_width, ImageDimensions};
pub use text::{text_markup, text_surface_size, TextStyle};
pub use watermark::{add_watermark, composite, Overlay, Watermark, Watermarker};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while generating or compositing a watermark
#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to render text overlay: {0}")]
    Render(String),

    #[error("Failed to read watermark asset {}: {source}", path.display())]
    Asset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for watermark operations
pub type Result<T> = std::result::Result<T, WatermarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WatermarkError::Decode("bad header".to_string());
        assert_eq!(err.to_string(), "Failed to decode image: bad header");

        let err = WatermarkError::Asset {
            path: PathBuf::from("/tmp/logo.png"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to read watermark asset /tmp/logo.png: denied"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: WatermarkError = io.into();
        assert!(matches!(err, WatermarkError::IoError(_)));
    }
}
