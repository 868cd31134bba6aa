//! Result types returned by the generator.

use crate::pipeline::paginate::FetchStatus;
use image::RgbImage;
use serde::Serialize;

/// A composed cover plus what it took to make it.
#[derive(Debug, Clone)]
pub struct CoverOutput {
    /// The final canvas, after rotation and zoom.
    pub image: RgbImage,
    pub stats: CoverStats,
}

/// Counters for one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverStats {
    /// Track items fetched from the playlist. 0 for local folders and cache hits.
    pub tracks_fetched: usize,
    /// Distinct candidate images (cover URLs or files).
    pub unique_covers: usize,
    /// Slots the grid has.
    pub required_images: usize,
    /// Images placed on the canvas, counting repeats.
    pub images_used: usize,
    /// Candidates that failed to download or decode.
    pub failed_images: usize,
    /// How the track listing walk ended. `None` for local folders.
    pub fetch_status: Option<FetchStatus>,
    /// The cover list came from the cache.
    pub cached: bool,
    pub fetch_duration_ms: u64,
    pub compose_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl CoverStats {
    /// The track list was cut short by a failed page.
    pub fn is_partial(&self) -> bool {
        self.fetch_status.as_ref().is_some_and(FetchStatus::is_partial)
    }

    /// Some slots hold repeated images.
    pub fn has_repeats(&self) -> bool {
        let distinct_loaded = self.unique_covers.saturating_sub(self.failed_images);
        self.images_used > distinct_loaded
    }
}
