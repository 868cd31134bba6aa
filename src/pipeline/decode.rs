//! Source-image loading: decode from a file or from downloaded bytes.
//!
//! A source that fails to load is logged and dropped; [`decode_until`] then
//! moves on to the next candidate, so spare candidates act as substitutes.

use crate::error::{CoverGenError, ImageLoadError};
use crate::progress::ProgressCallback;
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File extensions picked up by [`discover_images`].
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Where a source image comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// A local file.
    Path(PathBuf),
    /// Bytes already in memory (e.g. a downloaded cover); `label` names it in logs.
    Bytes { label: String, data: Vec<u8> },
}

impl ImageSource {
    /// Human-readable name for logs and error messages.
    pub fn label(&self) -> String {
        match self {
            ImageSource::Path(p) => p.display().to_string(),
            ImageSource::Bytes { label, .. } => label.clone(),
        }
    }

    /// Decode the image, guessing the format from its content.
    pub fn decode(&self) -> Result<DynamicImage, ImageLoadError> {
        match self {
            ImageSource::Path(path) => {
                let reader = ImageReader::open(path)
                    .and_then(|r| r.with_guessed_format())
                    .map_err(|e| ImageLoadError::Read {
                        path: path.clone(),
                        detail: e.to_string(),
                    })?;
                reader.decode().map_err(|e| ImageLoadError::Decode {
                    source_label: path.display().to_string(),
                    detail: e.to_string(),
                })
            }
            ImageSource::Bytes { label, data } => {
                image::load_from_memory(data).map_err(|e| ImageLoadError::Decode {
                    source_label: label.clone(),
                    detail: e.to_string(),
                })
            }
        }
    }
}

/// Images that decoded plus the failures met on the way.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    pub images: Vec<DynamicImage>,
    pub failures: Vec<ImageLoadError>,
}

/// Decode candidates in order until `needed` images load or candidates run out.
pub fn decode_until(
    sources: impl IntoIterator<Item = ImageSource>,
    needed: usize,
    progress: Option<&ProgressCallback>,
) -> DecodeOutcome {
    let mut outcome = DecodeOutcome::default();

    for source in sources {
        if outcome.images.len() >= needed {
            break;
        }
        record(&mut outcome, source.decode(), &source.label(), needed, progress);
    }

    outcome
}

/// Append one load result to `outcome`, logging and reporting it.
pub(crate) fn record(
    outcome: &mut DecodeOutcome,
    result: Result<DynamicImage, ImageLoadError>,
    label: &str,
    needed: usize,
    progress: Option<&ProgressCallback>,
) {
    match result {
        Ok(image) => {
            debug!("Loaded {} ({}×{})", label, image.width(), image.height());
            outcome.images.push(image);
            if let Some(cb) = progress {
                cb.on_image_loaded(outcome.images.len(), needed);
            }
        }
        Err(e) => {
            warn!("Skipping image: {}", e);
            if let Some(cb) = progress {
                cb.on_image_failed(label, &e.to_string());
            }
            outcome.failures.push(e);
        }
    }
}

/// List image files (by extension, case-insensitive) directly inside `dir`,
/// sorted by path.
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>, CoverGenError> {
    if !dir.is_dir() {
        return Err(CoverGenError::InputNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| {
        CoverGenError::Internal(format!("Failed to list '{}': {e}", dir.display()))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    debug!("Found {} images in {}", files.len(), dir.display());
    Ok(files)
}
