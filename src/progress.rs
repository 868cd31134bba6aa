//! Progress-callback trait for cover-generation events.
//!
//! Inject an [`Arc<dyn CoverProgressCallback>`] via
//! [`crate::config::GeneratorConfigBuilder::progress_callback`] to follow a
//! run as tracks are fetched and source images are loaded.
//!
//! # Example
//!
//! ```rust
//! use playlist_covergen::{CoverProgressCallback, GeneratorConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     loaded: AtomicUsize,
//! }
//!
//! impl CoverProgressCallback for CountingCallback {
//!     fn on_image_loaded(&self, loaded: usize, required: usize) {
//!         self.loaded.store(loaded, Ordering::SeqCst);
//!         eprintln!("{loaded}/{required} images");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { loaded: AtomicUsize::new(0) });
//!
//! let config = GeneratorConfig::builder()
//!     .progress_callback(counter as Arc<dyn CoverProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the generator as it works through a playlist.
///
/// Implementations must be `Send + Sync`: composition runs on a blocking
/// worker thread. Every method defaults to a no-op.
pub trait CoverProgressCallback: Send + Sync {
    /// Called once the track listing walk has ended.
    ///
    /// `partial` is true when a page request failed and later pages were
    /// never fetched.
    fn on_fetch_complete(&self, items: usize, partial: bool) {
        let _ = (items, partial);
    }

    /// Called before the first source image is loaded.
    fn on_generation_start(&self, required: usize) {
        let _ = required;
    }

    /// Called after each source image decodes.
    fn on_image_loaded(&self, loaded: usize, required: usize) {
        let _ = (loaded, required);
    }

    /// Called when a source image cannot be downloaded or decoded.
    fn on_image_failed(&self, source: &str, error: &str) {
        let _ = (source, error);
    }

    /// Called once the collage has been composed.
    fn on_generation_complete(&self, used: usize, failed: usize) {
        let _ = (used, failed);
    }
}

/// Does nothing. Used when no callback is configured.
pub struct NoopProgressCallback;

impl CoverProgressCallback for NoopProgressCallback {}

/// The type stored in [`crate::config::GeneratorConfig`].
pub type ProgressCallback = Arc<dyn CoverProgressCallback>;
