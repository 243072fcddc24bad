//! Text overlay rendering
//!
//! The overlay is described as a one-run SVG document and rasterized with
//! resvg. Its surface size is a monospace estimate rather than real glyph
//! metrics; the bitmap is produced at exactly that declared size.

use crate::color::Rgb;
use crate::{Result, WatermarkError};
use image::RgbaImage;
use std::sync::Arc;
use usvg::fontdb;

/// Horizontal advance per character, relative to the font size
const CHAR_WIDTH_FACTOR: f64 = 0.6;

/// Left padding plus right padding of the text surface
const HORIZONTAL_PADDING: f64 = 40.0;

/// X coordinate of the text origin
const TEXT_ORIGIN_X: f64 = 20.0;

/// Resolved styling for a text overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Font size in pixels
    pub font_size: f32,
    /// Fill color
    pub color: Rgb,
    /// Fill opacity (0.0 - 1.0)
    pub opacity: f32,
}

/// Size of the surface a text run is rendered on
///
/// # Arguments
/// * `text` - Text to render; its length is counted in characters
/// * `font_size` - Font size in pixels
///
/// # Returns
/// (width, height) where width = `chars * font_size * 0.6 + 40`
/// and height = `font_size * 2`
pub fn text_surface_size(text: &str, font_size: f32) -> (f64, f64) {
    let size = f64::from(font_size);
    let chars = text.chars().count() as f64;
    (
        chars * size * CHAR_WIDTH_FACTOR + HORIZONTAL_PADDING,
        size * 2.0,
    )
}

/// Whole-pixel surface size, rounded up
pub(crate) fn pixel_size(width: f64, height: f64) -> (u32, u32) {
    let px = |v: f64| v.ceil().max(1.0) as u32;
    (px(width), px(height))
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Build the SVG markup for a text overlay
///
/// A single text run at `(20, font_size + 10)` in a generic sans-serif
/// family, sized by [`text_surface_size`].
pub fn text_markup(text: &str, style: &TextStyle) -> String {
    let (width, height) = text_surface_size(text, style.font_size);
    let baseline = f64::from(style.font_size) + 10.0;

    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">"#,
            r#"<text x="{x}" y="{y}" font-size="{size}" font-family="Arial, sans-serif" "#,
            r#"fill="{fill}" fill-opacity="{opacity}">{text}</text>"#,
            "</svg>"
        ),
        width = width,
        height = height,
        x = TEXT_ORIGIN_X,
        y = baseline,
        size = style.font_size,
        fill = style.color.css(),
        opacity = style.opacity,
        text = escape_xml(text),
    )
}

/// Rasterize SVG markup into a straight-alpha RGBA bitmap
///
/// # Arguments
/// * `markup` - SVG document
/// * `width`, `height` - Output size in pixels
/// * `fonts` - Font database used to resolve the text run
pub(crate) fn rasterize(
    markup: &str,
    width: u32,
    height: u32,
    fonts: Arc<fontdb::Database>,
) -> Result<RgbaImage> {
    let mut options = usvg::Options::default();
    options.fontdb = fonts;

    let tree = usvg::Tree::from_str(markup, &options)
        .map_err(|e| WatermarkError::Render(e.to_string()))?;

    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        WatermarkError::Render(format!("cannot allocate {width}x{height} surface"))
    })?;

    resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha, image expects straight alpha
    let data: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let c = pixel.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();

    RgbaImage::from_raw(width, height, data)
        .ok_or_else(|| WatermarkError::Render("pixel buffer size mismatch".to_string()))
}
