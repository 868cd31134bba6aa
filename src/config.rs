//! Configuration types for cover generation.
//!
//! Two structs carry every knob:
//!
//! * [`CollageConfig`]: pure composition settings (canvas, grid, large
//!   cells, tilt, zoom, output encoding). Everything the Composer needs and
//!   nothing else, so it can be used without any network access.
//! * [`GeneratorConfig`]: the fetch side (API base URL, timeout, page size,
//!   track cap, caching, shuffling) plus the [`CollageConfig`] to use.
//!
//! Both are built through builders whose `build()` validates constraints, so
//! every configuration error is reported before any request or pixel work.

use crate::cache::CoverCache;
use crate::error::CoverGenError;
use crate::pipeline::layout::{self, CellGeometry, GridPos};
use crate::pipeline::paginate::MAX_PAGE_LIMIT;
use crate::progress::ProgressCallback;
use crate::spotify::SPOTIFY_API_URL;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Composition settings for one collage.
///
/// Built via [`CollageConfig::builder()`] or using
/// [`CollageConfig::default()`].
///
/// # Example
/// ```rust
/// use playlist_covergen::{CollageConfig, LargeCellPlacement};
///
/// let config = CollageConfig::builder()
///     .size(640, 640)
///     .grid(4, 4)
///     .gap(8)
///     .large_cells(LargeCellPlacement::Random { count: 2, seed: Some(7) })
///     .build()
///     .unwrap();
/// assert_eq!(config.required_images().unwrap(), 16 - 3 * 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollageConfig {
    /// Canvas width in pixels. Default: 2048.
    pub width: u32,

    /// Canvas height in pixels. Default: 2048.
    pub height: u32,

    /// Background colour (RGB) used for the canvas, the gaps and the corners
    /// exposed by rotation. Default: `#2f3030`.
    pub background: [u8; 3],

    /// Number of grid columns. Default: 5.
    pub columns: u32,

    /// Number of grid rows. Default: 5.
    pub rows: u32,

    /// Gap between neighbouring cells in pixels. Default: 20.
    pub gap: u32,

    /// Where the 2×2 cells go. Default: fixed at (1, 2) and (3, 3).
    pub large_cells: LargeCellPlacement,

    /// Whole-canvas tilt in degrees, counter-clockwise. Default: 20.
    pub rotation_degrees: f32,

    /// Centre zoom applied after rotation; 1.0 leaves the canvas untouched.
    /// Default: 1.2.
    ///
    /// The zoom also hides the background-coloured corners the tilt exposes.
    pub zoom: f32,

    /// Output encoding. Default: JPEG at quality 80.
    pub output_format: OutputFormat,
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            width: 2048,
            height: 2048,
            background: [0x2f, 0x30, 0x30],
            columns: 5,
            rows: 5,
            gap: 20,
            large_cells: LargeCellPlacement::default(),
            rotation_degrees: 20.0,
            zoom: 1.2,
            output_format: OutputFormat::default(),
        }
    }
}

impl CollageConfig {
    /// Create a new builder for `CollageConfig`.
    pub fn builder() -> CollageConfigBuilder {
        CollageConfigBuilder {
            config: Self::default(),
        }
    }

    /// Number of 2×2 cells this configuration places.
    pub fn large_cell_count(&self) -> u32 {
        self.large_cells.count()
    }

    /// Number of source images a composition consumes: every single cell
    /// not covered by a large cell, plus one per large cell.
    pub fn required_images(&self) -> Result<usize, CoverGenError> {
        self.validate()?;
        Ok(layout::required_images(
            self.columns,
            self.rows,
            self.large_cell_count(),
        ))
    }

    /// Check every constraint the Composer relies on.
    ///
    /// Called by [`CollageConfigBuilder::build`] and again by
    /// [`crate::pipeline::compose::compose`], since the fields are public.
    pub fn validate(&self) -> Result<(), CoverGenError> {
        if self.width == 0 || self.height == 0 {
            return Err(CoverGenError::InvalidConfig(format!(
                "Canvas must be non-empty, got {}×{}",
                self.width, self.height
            )));
        }
        if !self.zoom.is_finite() || self.zoom < 1.0 {
            return Err(CoverGenError::InvalidConfig(format!(
                "Zoom must be a finite factor ≥ 1.0, got {}",
                self.zoom
            )));
        }
        if !self.rotation_degrees.is_finite() {
            return Err(CoverGenError::InvalidConfig(format!(
                "Rotation must be finite, got {}",
                self.rotation_degrees
            )));
        }
        if let OutputFormat::Jpeg { quality } = self.output_format {
            if !(1..=100).contains(&quality) {
                return Err(CoverGenError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {quality}"
                )));
            }
        }

        CellGeometry::derive(self.width, self.height, self.columns, self.rows, self.gap)?;

        match &self.large_cells {
            LargeCellPlacement::Fixed(anchors) => {
                layout::validate_anchors(anchors, self.columns, self.rows)
            }
            LargeCellPlacement::Random { count, .. } => {
                let max = layout::max_large_cells(self.columns, self.rows);
                if *count > max {
                    return Err(CoverGenError::InvalidConfig(format!(
                        "{count} large cells do not fit a {}×{} grid (at most {max})",
                        self.columns, self.rows
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Builder for [`CollageConfig`].
#[derive(Debug)]
pub struct CollageConfigBuilder {
    config: CollageConfig,
}

impl CollageConfigBuilder {
    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    pub fn background(mut self, rgb: [u8; 3]) -> Self {
        self.config.background = rgb;
        self
    }

    pub fn grid(mut self, columns: u32, rows: u32) -> Self {
        self.config.columns = columns;
        self.config.rows = rows;
        self
    }

    pub fn gap(mut self, gap: u32) -> Self {
        self.config.gap = gap;
        self
    }

    pub fn large_cells(mut self, placement: LargeCellPlacement) -> Self {
        self.config.large_cells = placement;
        self
    }

    pub fn rotation_degrees(mut self, degrees: f32) -> Self {
        self.config.rotation_degrees = degrees;
        self
    }

    pub fn zoom(mut self, zoom: f32) -> Self {
        self.config.zoom = zoom;
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Pick a square grid suited to `image_count` distinct images.
    ///
    /// `cells_per_side = min(6, floor(√n) − 1)` (at least 1) with
    /// `cells_per_side − 2` randomly placed large cells, leaving enough
    /// spare images to substitute for ones that fail to load.
    pub fn auto_grid(mut self, image_count: usize) -> Self {
        let root = (image_count as f64).sqrt().floor() as u32;
        let side = root.saturating_sub(1).clamp(1, 6);
        let count = side.saturating_sub(2);
        self.config.columns = side;
        self.config.rows = side;
        self.config.large_cells = LargeCellPlacement::Random { count, seed: None };
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CollageConfig, CoverGenError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Placement policy for the enlarged 2×2 cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LargeCellPlacement {
    /// Anchor the large cells at these grid positions (top-left cell of the
    /// 2×2 block). Validated for bounds and overlap at build time.
    Fixed(Vec<GridPos>),
    /// Place `count` non-overlapping large cells at random anchors on every
    /// composition. A seed makes the draw reproducible.
    Random { count: u32, seed: Option<u64> },
}

impl Default for LargeCellPlacement {
    fn default() -> Self {
        LargeCellPlacement::Fixed(vec![GridPos::new(1, 2), GridPos::new(3, 3)])
    }
}

impl LargeCellPlacement {
    /// No large cells at all.
    pub fn none() -> Self {
        LargeCellPlacement::Fixed(Vec::new())
    }

    /// Number of large cells this policy places.
    pub fn count(&self) -> u32 {
        match self {
            LargeCellPlacement::Fixed(anchors) => anchors.len() as u32,
            LargeCellPlacement::Random { count, .. } => *count,
        }
    }
}

/// Encoding of the persisted cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Lossy JPEG at the given quality (1–100). (default, quality 80)
    Jpeg { quality: u8 },
    /// Lossless PNG.
    Png,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Jpeg { quality: 80 }
    }
}

impl OutputFormat {
    /// Conventional file extension for the format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg { .. } => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

/// Parse a `#rrggbb` (or `rrggbb`, or short `#rgb`) colour string.
pub fn parse_hex_color(s: &str) -> Result<[u8; 3], CoverGenError> {
    let hex = s.trim().trim_start_matches('#');
    let invalid = || CoverGenError::InvalidConfig(format!("Invalid colour '{s}', expected #rrggbb"));

    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    match hex.len() {
        6 => {
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
            Ok([channel(0)?, channel(2)?, channel(4)?])
        }
        3 => {
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 1], 16)
                    .map(|v| v * 17)
                    .map_err(|_| invalid())
            };
            Ok([channel(0)?, channel(1)?, channel(2)?])
        }
        _ => Err(invalid()),
    }
}

// ── Generator config ─────────────────────────────────────────────────────

/// Configuration for the full fetch + compose pipeline.
///
/// Built via [`GeneratorConfig::builder()`] or using
/// [`GeneratorConfig::default()`].
#[derive(Clone)]
pub struct GeneratorConfig {
    /// Web API base URL. Default: `https://api.spotify.com/v1`.
    pub api_base_url: String,

    /// Per-request timeout in seconds. Default: 10.
    pub request_timeout_secs: u64,

    /// Items requested per page, capped at the protocol maximum of 50. Default: 50.
    pub page_size: usize,

    /// Stop fetching tracks after this many. Default: None (whole playlist).
    pub max_tracks: Option<usize>,

    /// Seed for the order in which cover candidates are tried. Default: None.
    pub shuffle_seed: Option<u64>,

    /// Cycle through the decoded images again when the playlist has fewer
    /// distinct covers than the grid has slots. Default: true.
    ///
    /// When false, such playlists fail with
    /// [`CoverGenError::NotEnoughImages`].
    pub repeat_images: bool,

    /// Memoise cover lists per (playlist, token). Default: true.
    pub use_cache: bool,

    /// Cache to memoise into. If None, the process-wide cache is used.
    pub cache: Option<Arc<CoverCache>>,

    /// Collage settings.
    pub collage: CollageConfig,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_base_url: SPOTIFY_API_URL.to_string(),
            request_timeout_secs: 10,
            page_size: MAX_PAGE_LIMIT,
            max_tracks: None,
            shuffle_seed: None,
            repeat_images: true,
            use_cache: true,
            cache: None,
            collage: CollageConfig::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("page_size", &self.page_size)
            .field("max_tracks", &self.max_tracks)
            .field("shuffle_seed", &self.shuffle_seed)
            .field("repeat_images", &self.repeat_images)
            .field("use_cache", &self.use_cache)
            .field("cache", &self.cache.as_ref().map(|_| "<CoverCache>"))
            .field("collage", &self.collage)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CoverProgressCallback>"),
            )
            .finish()
    }
}

impl GeneratorConfig {
    /// Create a new builder for `GeneratorConfig`.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug)]
pub struct GeneratorConfigBuilder {
    config: GeneratorConfig,
}

impl GeneratorConfigBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.config.page_size = n.clamp(1, MAX_PAGE_LIMIT);
        self
    }

    pub fn max_tracks(mut self, n: usize) -> Self {
        self.config.max_tracks = Some(n);
        self
    }

    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.config.shuffle_seed = Some(seed);
        self
    }

    pub fn repeat_images(mut self, v: bool) -> Self {
        self.config.repeat_images = v;
        self
    }

    pub fn use_cache(mut self, v: bool) -> Self {
        self.config.use_cache = v;
        self
    }

    pub fn cache(mut self, cache: Arc<CoverCache>) -> Self {
        self.config.cache = Some(cache);
        self
    }

    pub fn collage(mut self, collage: CollageConfig) -> Self {
        self.config.collage = collage;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GeneratorConfig, CoverGenError> {
        let c = &self.config;
        if c.request_timeout_secs == 0 {
            return Err(CoverGenError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        if c.page_size == 0 || c.page_size > MAX_PAGE_LIMIT {
            return Err(CoverGenError::InvalidConfig(format!(
                "Page size must be 1–{MAX_PAGE_LIMIT}, got {}",
                c.page_size
            )));
        }
        if !c.api_base_url.starts_with("http://") && !c.api_base_url.starts_with("https://") {
            return Err(CoverGenError::InvalidConfig(format!(
                "API base URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        c.collage.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_collage_is_valid() {
        let config = CollageConfig::default();
        config.validate().expect("default must validate");
        assert_eq!(config.required_images().unwrap(), 19);
    }

    #[test]
    fn zoom_below_one_is_rejected() {
        for zoom in [0.0, -1.0, 0.5, f32::NAN] {
            let err = CollageConfig::builder().zoom(zoom).build().unwrap_err();
            assert!(matches!(err, CoverGenError::InvalidConfig(_)), "zoom {zoom}");
        }
        assert!(CollageConfig::builder().zoom(1.0).build().is_ok());
    }

    #[test]
    fn gap_consuming_canvas_is_rejected() {
        let err = CollageConfig::builder()
            .size(100, 100)
            .grid(5, 5)
            .gap(25)
            .large_cells(LargeCellPlacement::none())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("cell"), "got: {err}");
    }

    #[test]
    fn too_many_random_large_cells_rejected() {
        let err = CollageConfig::builder()
            .grid(3, 3)
            .large_cells(LargeCellPlacement::Random { count: 2, seed: None })
            .build()
            .unwrap_err();
        assert!(matches!(err, CoverGenError::InvalidConfig(_)));
    }

    #[test]
    fn overlapping_fixed_cells_rejected() {
        let err = CollageConfig::builder()
            .large_cells(LargeCellPlacement::Fixed(vec![
                GridPos::new(1, 1),
                GridPos::new(2, 2),
            ]))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("overlap"), "got: {err}");
    }

    #[test]
    fn jpeg_quality_zero_rejected() {
        assert!(CollageConfig::builder()
            .output_format(OutputFormat::Jpeg { quality: 0 })
            .build()
            .is_err());
    }

    #[test]
    fn auto_grid_follows_image_count() {
        let c = CollageConfig::builder().auto_grid(30).size(640, 640).gap(8).build().unwrap();
        // floor(sqrt(30)) - 1 = 4
        assert_eq!((c.columns, c.rows), (4, 4));
        assert_eq!(c.large_cell_count(), 2);

        let c = CollageConfig::builder().auto_grid(400).build().unwrap();
        assert_eq!(c.columns, 6);
        assert_eq!(c.large_cell_count(), 4);

        let c = CollageConfig::builder().auto_grid(2).build().unwrap();
        assert_eq!(c.columns, 1);
        assert_eq!(c.large_cell_count(), 0);
    }

    #[test]
    fn hex_colours() {
        assert_eq!(parse_hex_color("#2f3030").unwrap(), [0x2f, 0x30, 0x30]);
        assert_eq!(parse_hex_color("2C2C3C").unwrap(), [0x2c, 0x2c, 0x3c]);
        assert_eq!(parse_hex_color("#fff").unwrap(), [255, 255, 255]);
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
    }

    #[test]
    fn generator_builder_clamps_page_size() {
        let c = GeneratorConfig::builder().page_size(500).build().unwrap();
        assert_eq!(c.page_size, MAX_PAGE_LIMIT);
        let c = GeneratorConfig::builder().page_size(0).build().unwrap();
        assert_eq!(c.page_size, 1);
    }

    #[test]
    fn generator_builder_rejects_zero_timeout() {
        assert!(GeneratorConfig::builder().request_timeout_secs(0).build().is_err());
    }

    #[test]
    fn generator_builder_trims_base_url() {
        let c = GeneratorConfig::builder()
            .api_base_url("http://127.0.0.1:9000/v1/")
            .build()
            .unwrap();
        assert_eq!(c.api_base_url, "http://127.0.0.1:9000/v1");
    }
}
