//! Collage composition: lay source images onto a fixed-size canvas.
//!
//! ```text
//! validate ──▶ anchors ──▶ layout ──▶ cover-fit + paste ──▶ rotate ──▶ zoom
//! ```
//!
//! The Composer is deterministic for a given image order and configuration
//! (random large-cell placement included, once seeded). File discovery,
//! sampling and decoding all happen before it is called.

use crate::config::{CollageConfig, LargeCellPlacement};
use crate::error::CoverGenError;
use crate::pipeline::layout::{self, GridLayout, GridPos};
use crate::pipeline::{select, transform};
use image::imageops;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::{debug, warn};

/// Resolve the large-cell anchors for one composition.
pub fn resolve_anchors(config: &CollageConfig) -> Result<Vec<GridPos>, CoverGenError> {
    match &config.large_cells {
        LargeCellPlacement::Fixed(anchors) => {
            layout::validate_anchors(anchors, config.columns, config.rows)?;
            Ok(anchors.clone())
        }
        LargeCellPlacement::Random { count, seed } => {
            let mut rng = select::rng_from_seed(*seed);
            layout::pick_random_anchors(config.columns, config.rows, *count, &mut rng)
        }
    }
}

/// Compose `images` into a collage.
///
/// Images are consumed in order: single cells first (column-major), then
/// large cells. Extra images beyond [`CollageConfig::required_images`] are
/// ignored.
///
/// # Errors
/// * [`CoverGenError::InvalidConfig`]: any configuration error, checked
///   before pixel work starts.
/// * [`CoverGenError::NotEnoughImages`]: fewer images than slots. Images
///   with a zero side are skipped and do not count as available.
pub fn compose(images: &[DynamicImage], config: &CollageConfig) -> Result<RgbImage, CoverGenError> {
    config.validate()?;

    let anchors = resolve_anchors(config)?;
    let layout = GridLayout::new(
        config.width,
        config.height,
        config.columns,
        config.rows,
        config.gap,
        &anchors,
    )?;

    let usable: Vec<&DynamicImage> = images.iter().filter(|i| i.width() > 0 && i.height() > 0).collect();
    if usable.len() < images.len() {
        warn!("Skipping {} empty source image(s)", images.len() - usable.len());
    }

    let required = layout.slot_count();
    if usable.len() < required {
        return Err(CoverGenError::NotEnoughImages {
            required,
            available: usable.len(),
        });
    }

    debug!(
        "Composing {}×{} canvas: {} single + {} large cells ({}×{} px / {}×{} px)",
        config.width,
        config.height,
        layout.singles.len(),
        layout.larges.len(),
        layout.geometry.cell_width,
        layout.geometry.cell_height,
        layout.geometry.large_width,
        layout.geometry.large_height,
    );

    let background = Rgb(config.background);
    let mut canvas = RgbImage::from_pixel(config.width, config.height, background);

    for (slot, image) in layout.slots().zip(usable) {
        let tile = transform::cover_fit(image, slot.width, slot.height)?;
        imageops::replace(&mut canvas, &tile, i64::from(slot.x), i64::from(slot.y));
    }

    let rotated = transform::rotate_in_place(&canvas, config.rotation_degrees, background);
    transform::zoom_in(&rotated, config.zoom)
}
