//! Watermark generation and compositing

use crate::anchor::{Anchor, Gravity};
use crate::config::{WatermarkConfig, WatermarkKind};
use crate::raster;
use crate::text::{self, TextStyle};
use crate::{Result, WatermarkError};
use bytes::Bytes;
use image::{imageops, DynamicImage, RgbaImage};
use log::{debug, trace};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use usvg::fontdb;

/// A rendered watermark bitmap at its natural size
#[derive(Debug, Clone)]
pub struct Overlay {
    bitmap: RgbaImage,
}

impl Overlay {
    /// Wrap an already rendered bitmap
    pub fn from_bitmap(bitmap: RgbaImage) -> Self {
        Self { bitmap }
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    /// Encode the overlay as a PNG file
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        raster::encode_png(&self.bitmap)
    }
}

/// Outcome of watermark generation
#[derive(Debug, Clone)]
pub enum Watermark {
    /// An overlay to merge onto the photo
    Overlay(Overlay),
    /// No watermark was requested; the photo is returned as is
    PassThrough,
}

impl Watermark {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Watermark::PassThrough)
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        match self {
            Watermark::Overlay(overlay) => Some(overlay),
            Watermark::PassThrough => None,
        }
    }
}

/// Run CPU-bound work on the blocking pool
async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| WatermarkError::TaskFailed(e.to_string()))?
}

/// Whether the watermark asset exists as a regular file
async fn asset_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Watermark generator
///
/// Holds the font database used to rasterize text overlays. The database is
/// shared read-only between calls; nothing else is kept between invocations.
#[derive(Debug, Clone)]
pub struct Watermarker {
    fonts: Arc<fontdb::Database>,
}

impl Default for Watermarker {
    fn default() -> Self {
        Self::new()
    }
}

/// Families tried, in order, for the generic `sans-serif` family
const SANS_SERIF_CANDIDATES: [&str; 5] = [
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Helvetica",
    "Arial",
];

fn has_family(fonts: &fontdb::Database, family: &str) -> bool {
    fonts
        .faces()
        .any(|face| face.families.iter().any(|(name, _)| name == family))
}

/// Point `sans-serif` at a family that is installed
///
/// fontdb maps it to "Arial" out of the box, which leaves text runs without
/// a face on most Linux systems. A mapping that already resolves is kept.
fn resolve_sans_serif(fonts: &mut fontdb::Database) {
    if has_family(fonts, fonts.family_name(&fontdb::Family::SansSerif)) {
        return;
    }

    let family = SANS_SERIF_CANDIDATES
        .iter()
        .find(|candidate| has_family(fonts, candidate))
        .map(|candidate| candidate.to_string())
        .or_else(|| {
            fonts
                .faces()
                .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
        });

    if let Some(family) = family {
        debug!("Using {family:?} for sans-serif text");
        fonts.set_sans_serif_family(family);
    }
}

impl Watermarker {
    /// Create a watermarker that renders text with the system fonts
    pub fn new() -> Self {
        let mut fonts = fontdb::Database::new();
        fonts.load_system_fonts();
        debug!("Loaded {} system font faces", fonts.len());
        Self::with_font_database(fonts)
    }

    /// Create a watermarker with an empty font database
    ///
    /// Text overlays still have their full size but no glyphs are drawn
    /// until fonts are added with [`Watermarker::with_font_data`].
    pub fn without_system_fonts() -> Self {
        Self::with_font_database(fontdb::Database::new())
    }

    /// Create a watermarker from a prepared font database
    pub fn with_font_database(mut fonts: fontdb::Database) -> Self {
        resolve_sans_serif(&mut fonts);
        Self {
            fonts: Arc::new(fonts),
        }
    }

    /// Add a font from memory
    ///
    /// The added font becomes the sans-serif family, so it is used whenever
    /// Arial is not installed.
    pub fn with_font_data(mut self, data: Vec<u8>) -> Self {
        let fonts = Arc::make_mut(&mut self.fonts);
        let ids = fonts.load_font_source(fontdb::Source::Binary(Arc::new(data)));

        let family = ids
            .first()
            .and_then(|id| fonts.face(*id))
            .and_then(|face| face.families.first())
            .map(|(name, _)| name.clone());
        match family {
            Some(family) => {
                debug!("Added font family {family:?}");
                fonts.set_sans_serif_family(family);
            }
            None => debug!("Font data contained no usable faces"),
        }
        self
    }

    /// Add a font file (.ttf, .otf, .ttc)
    ///
    /// Like [`Watermarker::with_font_data`], the file's family becomes the
    /// sans-serif family.
    pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(self.with_font_data(data))
    }

    /// Family used for the generic `sans-serif` text run
    pub fn sans_serif_family(&self) -> &str {
        self.fonts.family_name(&fontdb::Family::SansSerif)
    }

    /// Number of font faces available for text overlays
    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    /// Produce the overlay described by `config`
    ///
    /// # Arguments
    /// * `config` - Validated watermark configuration
    /// * `base` - The photo the overlay is meant for (image mode sizes the
    ///   asset relative to its width)
    ///
    /// # Returns
    /// [`Watermark::PassThrough`] when the kind is unknown, the text is
    /// empty, or the image source is unset or missing.
    pub async fn generate(&self, config: &WatermarkConfig, base: &[u8]) -> Result<Watermark> {
        match config.kind() {
            WatermarkKind::Text if !config.text_content().is_empty() => {
                let overlay = self.text_overlay(config).await?;
                Ok(Watermark::Overlay(overlay))
            }
            WatermarkKind::Image => match config.image_source() {
                Some(path) if asset_exists(path).await => {
                    let overlay = image_overlay(path, base, config.scale()).await?;
                    Ok(Watermark::Overlay(overlay))
                }
                source => {
                    debug!("Image watermark source unavailable ({source:?}), passing through");
                    Ok(Watermark::PassThrough)
                }
            },
            WatermarkKind::Text => {
                debug!("Empty watermark text, passing through");
                Ok(Watermark::PassThrough)
            }
            WatermarkKind::Unknown(kind) => {
                debug!("Unknown watermark type {kind:?}, passing through");
                Ok(Watermark::PassThrough)
            }
        }
    }

    async fn text_overlay(&self, config: &WatermarkConfig) -> Result<Overlay> {
        let content = config.text_content();
        let style = TextStyle {
            font_size: config.font_size(),
            color: config.font_color(),
            opacity: config.opacity(),
        };

        let (width, height) = text::text_surface_size(content, style.font_size);
        let (px_width, px_height) = text::pixel_size(width, height);
        let markup = text::text_markup(content, &style);
        trace!("Text overlay markup: {markup}");

        let fonts = Arc::clone(&self.fonts);
        let bitmap =
            run_blocking(move || text::rasterize(&markup, px_width, px_height, fonts)).await?;

        debug!("Rendered text overlay {px_width}x{px_height}");
        Ok(Overlay::from_bitmap(bitmap))
    }

    /// Generate the watermark for `config` and merge it onto `base`
    ///
    /// On pass-through the very same `base` buffer is returned.
    pub async fn apply(&self, base: Bytes, config: &WatermarkConfig) -> Result<Bytes> {
        let watermark = self.generate(config, &base).await?;
        composite(base, watermark, config.anchor()).await
    }
}

async fn image_overlay(path: &Path, base: &[u8], scale: f64) -> Result<Overlay> {
    let base_width = raster::get_dimensions(base)?.width;
    let target_width = (f64::from(base_width) * scale).floor() as u32;

    let asset = tokio::fs::read(path)
        .await
        .map_err(|source| WatermarkError::Asset {
            path: PathBuf::from(path),
            source,
        })?;

    let bitmap = run_blocking(move || {
        let decoded = raster::decode_any(&asset)?;
        Ok(raster::resize_to_width(&decoded, target_width))
    })
    .await?;

    debug!(
        "Resized image watermark {} to {}x{}",
        path.display(),
        bitmap.width(),
        bitmap.height()
    );
    Ok(Overlay::from_bitmap(bitmap))
}

/// Merge a watermark onto a photo
///
/// # Arguments
/// * `base` - Encoded photo; never modified
/// * `watermark` - Output of [`Watermarker::generate`]
/// * `anchor` - Where the overlay is placed
///
/// # Returns
/// `base` itself on pass-through, otherwise a new buffer in the same
/// container format as `base`. Configured offsets are not applied; the
/// overlay sits flush against the anchor's edges.
pub async fn composite(base: Bytes, watermark: Watermark, anchor: Anchor) -> Result<Bytes> {
    let overlay = match watermark {
        Watermark::PassThrough => return Ok(base),
        Watermark::Overlay(overlay) => overlay,
    };

    let gravity = anchor.gravity();
    let merged = run_blocking(move || merge(&base, &overlay, gravity)).await?;
    Ok(Bytes::from(merged))
}

fn merge(base: &[u8], overlay: &Overlay, gravity: Gravity) -> Result<Vec<u8>> {
    let format = raster::detect_format(base)?;
    let decoded = raster::decode(base, format)?;
    let color = decoded.color();

    let (x, y) = gravity.offset(
        decoded.width(),
        decoded.height(),
        overlay.width(),
        overlay.height(),
    );
    trace!("Placing {gravity:?} overlay at ({x}, {y}) on {color:?} base");

    // Alpha "over" blend, clipped to the canvas
    let merged = if raster::is_high_depth(color) {
        let mut canvas = decoded.into_rgba16();
        let layer = DynamicImage::ImageRgba8(overlay.bitmap().clone()).into_rgba16();
        imageops::overlay(&mut canvas, &layer, x, y);
        DynamicImage::ImageRgba16(canvas)
    } else {
        let mut canvas = decoded.into_rgba8();
        imageops::overlay(&mut canvas, overlay.bitmap(), x, y);
        DynamicImage::ImageRgba8(canvas)
    };

    raster::encode(merged, format, color)
}

static DEFAULT_WATERMARKER: OnceLock<Watermarker> = OnceLock::new();

/// Watermark a photo using a shared, system-font watermarker
pub async fn add_watermark(base: Bytes, config: &WatermarkConfig) -> Result<Bytes> {
    DEFAULT_WATERMARKER
        .get_or_init(Watermarker::new)
        .apply(base, config)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_base(width: u32, height: u32, color: Rgba<u8>) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, color);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        Bytes::from(buffer.into_inner())
    }

    fn red_overlay(width: u32, height: u32) -> Watermark {
        Watermark::Overlay(Overlay::from_bitmap(RgbaImage::from_pixel(
            width,
            height,
            Rgba([255, 0, 0, 255]),
        )))
    }

    #[tokio::test]
    async fn test_pass_through_returns_same_buffer() {
        let base = png_base(10, 10, Rgba([0, 0, 0, 255]));
        let out = composite(base.clone(), Watermark::PassThrough, Anchor::TopLeft)
            .await
            .unwrap();
        assert_eq!(out.as_ptr(), base.as_ptr());
        assert_eq!(out, base);
    }

    #[tokio::test]
    async fn test_pass_through_ignores_corrupt_base() {
        let base = Bytes::from_static(b"definitely not an image");
        let out = composite(base.clone(), Watermark::PassThrough, Anchor::TopLeft)
            .await
            .unwrap();
        assert_eq!(out, base);
    }

    #[tokio::test]
    async fn test_overlay_lands_at_gravity() {
        let base = png_base(100, 50, Rgba([255, 255, 255, 255]));
        let out = composite(base, red_overlay(10, 10), Anchor::BottomRight)
            .await
            .unwrap();

        let merged = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(merged.dimensions(), (100, 50));
        assert_eq!(merged.get_pixel(99, 49), &Rgba([255, 0, 0, 255]));
        assert_eq!(merged.get_pixel(90, 40), &Rgba([255, 0, 0, 255]));
        assert_eq!(merged.get_pixel(89, 49), &Rgba([255, 255, 255, 255]));
        assert_eq!(merged.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn test_overlay_blends_alpha() {
        let base = png_base(4, 4, Rgba([0, 0, 0, 255]));
        let half_white = Watermark::Overlay(Overlay::from_bitmap(RgbaImage::from_pixel(
            4,
            4,
            Rgba([255, 255, 255, 128]),
        )));
        let out = composite(base, half_white, Anchor::TopLeft).await.unwrap();

        let merged = image::load_from_memory(&out).unwrap().to_rgba8();
        let pixel = merged.get_pixel(1, 1);
        assert!((120..=136).contains(&pixel[0]), "got {pixel:?}");
        assert_eq!(pixel[3], 255);
    }

    #[tokio::test]
    async fn test_oversized_overlay_is_clipped() {
        let base = png_base(20, 20, Rgba([0, 0, 255, 255]));
        let out = composite(base, red_overlay(50, 50), Anchor::MiddleCenter)
            .await
            .unwrap();

        let merged = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(merged.dimensions(), (20, 20));
        assert_eq!(merged.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(merged.get_pixel(19, 19), &Rgba([255, 0, 0, 255]));
    }

    #[tokio::test]
    async fn test_corrupt_base_is_an_error() {
        let base = Bytes::from_static(b"definitely not an image");
        let result = composite(base, red_overlay(2, 2), Anchor::TopLeft).await;
        assert!(matches!(result, Err(WatermarkError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn test_truncated_base_is_an_error() {
        let full = png_base(30, 30, Rgba([0, 0, 0, 255]));
        let base = full.slice(0..full.len() / 2);
        let result = composite(base, red_overlay(2, 2), Anchor::TopLeft).await;
        assert!(matches!(result, Err(WatermarkError::Decode(_))));
    }

    #[tokio::test]
    async fn test_generate_empty_text_passes_through() {
        let watermarker = Watermarker::without_system_fonts();
        let base = png_base(10, 10, Rgba([0, 0, 0, 255]));
        let watermark = watermarker
            .generate(&WatermarkConfig::text(""), &base)
            .await
            .unwrap();
        assert!(watermark.is_pass_through());
    }

    #[tokio::test]
    async fn test_generate_text_overlay_size() {
        let watermarker = Watermarker::without_system_fonts();
        let base = png_base(10, 10, Rgba([0, 0, 0, 255]));
        let config = WatermarkConfig::text("© 2024").with_font_size(40.0);

        let watermark = watermarker.generate(&config, &base).await.unwrap();
        let overlay = watermark.overlay().unwrap();
        assert_eq!((overlay.width(), overlay.height()), (184, 80));
    }

    #[tokio::test]
    async fn test_generate_unknown_kind_passes_through() {
        let watermarker = Watermarker::without_system_fonts();
        let settings = serde_json::from_value(serde_json::json!({ "type": "video" })).unwrap();
        let config = WatermarkConfig::from_settings(&settings);
        let watermark = watermarker.generate(&config, b"").await.unwrap();
        assert!(watermark.is_pass_through());
    }

    #[tokio::test]
    async fn test_generate_image_without_source_passes_through() {
        let watermarker = Watermarker::without_system_fonts();
        let config = WatermarkConfig::image("");
        assert_eq!(config.image_source(), None);
        let watermark = watermarker.generate(&config, b"").await.unwrap();
        assert!(watermark.is_pass_through());
    }

    #[tokio::test]
    async fn test_generate_image_directory_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let watermarker = Watermarker::without_system_fonts();
        let config = WatermarkConfig::image(dir.path());
        let watermark = watermarker.generate(&config, b"").await.unwrap();
        assert!(watermark.is_pass_through());
    }

    #[tokio::test]
    async fn test_generate_image_corrupt_asset_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let asset = dir.path().join("logo.png");
        std::fs::write(&asset, b"not a png").unwrap();

        let watermarker = Watermarker::without_system_fonts();
        let base = png_base(100, 100, Rgba([0, 0, 0, 255]));
        let result = watermarker
            .generate(&WatermarkConfig::image(&asset), &base)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_overlay_encode_png() {
        let overlay = Overlay::from_bitmap(RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4])));
        let png = overlay.encode_png().unwrap();
        assert_eq!(raster::detect_format(&png).unwrap(), ImageFormat::Png);
        assert_eq!(
            raster::get_dimensions(&png).unwrap(),
            raster::ImageDimensions {
                width: 3,
                height: 2
            }
        );
    }

    #[test]
    fn test_font_data_is_added() {
        let watermarker = Watermarker::without_system_fonts();
        assert_eq!(watermarker.font_count(), 0);
        // Not a font; fontdb skips it silently
        let watermarker = watermarker.with_font_data(vec![0, 1, 2, 3]);
        assert_eq!(watermarker.font_count(), 0);
    }

    #[test]
    fn test_missing_font_file_is_an_error() {
        let result = Watermarker::without_system_fonts().with_font_file("/does/not/exist.ttf");
        assert!(matches!(result, Err(WatermarkError::IoError(_))));
    }

    const TUFFY: &[u8] = include_bytes!("../tests/fonts/Tuffy.ttf");

    #[test]
    fn test_font_data_becomes_sans_serif() {
        let watermarker = Watermarker::without_system_fonts().with_font_data(TUFFY.to_vec());
        assert_eq!(watermarker.font_count(), 1);
        assert_eq!(watermarker.sans_serif_family(), "Tuffy");
    }

    #[test]
    fn test_font_file_becomes_sans_serif() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Tuffy.ttf");
        std::fs::write(&path, TUFFY).unwrap();

        let watermarker = Watermarker::without_system_fonts()
            .with_font_file(&path)
            .unwrap();
        assert_eq!(watermarker.sans_serif_family(), "Tuffy");
    }

    #[test]
    fn test_prepared_database_maps_sans_serif_to_installed_face() {
        let mut fonts = fontdb::Database::new();
        fonts.load_font_data(TUFFY.to_vec());
        assert_eq!(fonts.family_name(&fontdb::Family::SansSerif), "Arial");

        let watermarker = Watermarker::with_font_database(fonts);
        assert_eq!(watermarker.sans_serif_family(), "Tuffy");
    }

    #[test]
    fn test_installed_sans_serif_mapping_is_kept() {
        let mut fonts = fontdb::Database::new();
        fonts.load_font_data(TUFFY.to_vec());
        fonts.set_sans_serif_family("Tuffy");

        let watermarker = Watermarker::with_font_database(fonts);
        assert_eq!(watermarker.sans_serif_family(), "Tuffy");
    }

    #[tokio::test]
    async fn test_text_overlay_draws_glyphs() {
        let watermarker = Watermarker::without_system_fonts().with_font_data(TUFFY.to_vec());
        let config = WatermarkConfig::text("HELLO WORLD")
            .with_font_size(40.0)
            .with_font_color("#ff0000")
            .with_opacity(0.6);

        let watermark = watermarker.generate(&config, b"").await.unwrap();
        let bitmap = watermark.overlay().unwrap().bitmap();

        let inked: Vec<&Rgba<u8>> = bitmap.pixels().filter(|p| p[3] > 0).collect();
        assert!(inked.len() > 500, "only {} inked pixels", inked.len());

        // Pure channels survive premultiplication exactly
        for pixel in &inked {
            assert_eq!([pixel[0], pixel[1], pixel[2]], [255, 0, 0], "{pixel:?}");
        }

        // Glyph interiors are fully covered, so alpha peaks at opacity * 255
        let max_alpha = inked.iter().map(|p| p[3]).max().unwrap();
        assert!((150..=156).contains(&max_alpha), "max alpha {max_alpha}");
    }
}
