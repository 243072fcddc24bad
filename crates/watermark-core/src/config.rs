//! Watermark configuration
//!
//! Settings arrive loosely typed (prompt inputs are strings, numbers may be
//! out of range). [`WatermarkConfig::from_settings`] normalizes every field
//! to a documented default instead of failing, so a config that exists is
//! always valid.

use crate::anchor::Anchor;
use crate::color::{parse_hex_color, Rgb};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Opacity used when the setting is missing or not a number
pub const DEFAULT_OPACITY: f32 = 0.5;

/// Scale used when the setting is missing or not a number
pub const DEFAULT_SCALE: f64 = 0.2;

/// Smallest watermark width relative to the photo width
pub const MIN_SCALE: f64 = 0.01;

/// Font size used when the setting is missing or not a positive number
pub const DEFAULT_FONT_SIZE: f32 = 30.0;

/// Default horizontal and vertical offset in pixels
pub const DEFAULT_OFFSET: i64 = 10;

/// Which kind of watermark to produce
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WatermarkKind {
    #[default]
    Text,
    Image,
    /// Any other `type` value; always passes the photo through
    Unknown(String),
}

impl WatermarkKind {
    /// Parse the `type` setting
    pub fn parse(value: &str) -> Self {
        match value {
            "text" => WatermarkKind::Text,
            "image" => WatermarkKind::Image,
            other => WatermarkKind::Unknown(other.to_string()),
        }
    }
}

/// Raw watermark settings as stored by the host
///
/// Every field is kept as an untyped JSON value; normalization happens in
/// [`WatermarkConfig::from_settings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatermarkSettings {
    /// `"text"` or `"image"`
    #[serde(rename = "type")]
    pub kind: Option<Value>,
    pub text: Option<Value>,
    pub image_path: Option<Value>,
    /// One of the nine anchor keys
    pub position: Option<Value>,
    pub opacity: Option<Value>,
    pub font_size: Option<Value>,
    /// `#RRGGBB`
    pub font_color: Option<Value>,
    pub scale: Option<Value>,
    pub offset_x: Option<Value>,
    pub offset_y: Option<Value>,
}

/// Parse the longest leading decimal number of `input`
///
/// Leading whitespace is skipped and trailing text ignored, so `"0.7px"`
/// reads as 0.7. A leading `Infinity` is accepted with an optional sign.
fn parse_number_prefix(input: &str) -> Option<f64> {
    let text = input.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if text[end..].starts_with("Infinity") {
        return text[..end + "Infinity".len()].parse::<f64>().ok();
    }

    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - end - 1;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    text[..end].parse::<f64>().ok()
}

/// Read a setting as a number, accepting strings with a leading number
fn lenient_number(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_prefix(s),
        _ => None,
    };
    number.filter(|v| !v.is_nan())
}

/// Read a setting as a string, accepting numbers
fn lenient_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Clamp opacity to `[0, 1]`, defaulting to 0.5 when not a number
pub fn resolve_opacity(raw: Option<f64>) -> f32 {
    raw.filter(|v| !v.is_nan())
        .map(|v| v.clamp(0.0, 1.0) as f32)
        .unwrap_or(DEFAULT_OPACITY)
}

/// Clamp scale to `[0.01, 1]`, defaulting to 0.2 when not a number
pub fn resolve_scale(raw: Option<f64>) -> f64 {
    raw.filter(|v| !v.is_nan())
        .map(|v| v.clamp(MIN_SCALE, 1.0))
        .unwrap_or(DEFAULT_SCALE)
}

fn resolve_font_size(raw: Option<f64>) -> f32 {
    raw.map(|v| v as f32)
        .filter(|v| v.is_finite() && *v > 0.0)
        .unwrap_or(DEFAULT_FONT_SIZE)
}

fn resolve_offset(raw: Option<f64>) -> i64 {
    raw.filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
        .unwrap_or(DEFAULT_OFFSET)
}

/// Validated watermark configuration for a single compositing call
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkConfig {
    kind: WatermarkKind,
    text: String,
    image_source: Option<PathBuf>,
    anchor: Anchor,
    opacity: f32,
    font_size: f32,
    font_color: Rgb,
    scale: f64,
    offset_x: i64,
    offset_y: i64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            kind: WatermarkKind::Text,
            text: String::new(),
            image_source: None,
            anchor: Anchor::BottomRight,
            opacity: DEFAULT_OPACITY,
            font_size: DEFAULT_FONT_SIZE,
            font_color: Rgb::WHITE,
            scale: DEFAULT_SCALE,
            offset_x: DEFAULT_OFFSET,
            offset_y: DEFAULT_OFFSET,
        }
    }
}

impl WatermarkConfig {
    /// Text watermark with default styling
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: WatermarkKind::Text,
            text: text.into(),
            ..Self::default()
        }
    }

    /// Image watermark read from `path`
    pub fn image(path: impl AsRef<Path>) -> Self {
        Self {
            kind: WatermarkKind::Image,
            ..Self::default()
        }
        .with_image_source(path)
    }

    /// Normalize raw host settings
    ///
    /// Never fails: invalid values fall back to their defaults.
    pub fn from_settings(settings: &WatermarkSettings) -> Self {
        let kind = lenient_string(settings.kind.as_ref())
            .map(|s| WatermarkKind::parse(&s))
            .unwrap_or_default();
        let anchor = lenient_string(settings.position.as_ref())
            .map(|s| Anchor::from_key_or_default(&s))
            .unwrap_or_default();
        let font_color = lenient_string(settings.font_color.as_ref())
            .map(|s| parse_hex_color(&s))
            .unwrap_or_default();

        let config = Self {
            kind,
            text: lenient_string(settings.text.as_ref()).unwrap_or_default(),
            image_source: None,
            anchor,
            opacity: resolve_opacity(lenient_number(settings.opacity.as_ref())),
            font_size: resolve_font_size(lenient_number(settings.font_size.as_ref())),
            font_color,
            scale: resolve_scale(lenient_number(settings.scale.as_ref())),
            offset_x: resolve_offset(lenient_number(settings.offset_x.as_ref())),
            offset_y: resolve_offset(lenient_number(settings.offset_y.as_ref())),
        };

        match lenient_string(settings.image_path.as_ref()) {
            Some(path) => config.with_image_source(path),
            None => config,
        }
    }

    /// Set the anchor
    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    /// Set the text opacity, clamped to `[0, 1]`
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = resolve_opacity(Some(f64::from(opacity)));
        self
    }

    /// Set the font size; non-positive sizes fall back to the default
    pub fn with_font_size(mut self, font_size: f32) -> Self {
        self.font_size = resolve_font_size(Some(f64::from(font_size)));
        self
    }

    /// Set the font color from a `#RRGGBB` code
    pub fn with_font_color(mut self, color: &str) -> Self {
        self.font_color = parse_hex_color(color);
        self
    }

    /// Set the image scale, clamped to `[0.01, 1]`
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = resolve_scale(Some(scale));
        self
    }

    /// Set the watermark asset path; an empty path clears it
    pub fn with_image_source(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.image_source = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path.to_path_buf())
        };
        self
    }

    /// Set the pixel offsets from the anchor point
    pub fn with_offset(mut self, offset_x: i64, offset_y: i64) -> Self {
        self.offset_x = offset_x;
        self.offset_y = offset_y;
        self
    }

    pub fn kind(&self) -> &WatermarkKind {
        &self.kind
    }

    pub fn text_content(&self) -> &str {
        &self.text
    }

    pub fn image_source(&self) -> Option<&Path> {
        self.image_source.as_deref()
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn font_color(&self) -> Rgb {
        self.font_color
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Configured offsets; accepted but not applied when compositing
    pub fn offset(&self) -> (i64, i64) {
        (self.offset_x, self.offset_y)
    }
}
