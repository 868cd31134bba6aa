//! # playlist-covergen
//!
//! Generate collage-style playlist covers from the album art of a
//! playlist's tracks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! playlist
//!  │
//!  ├─ 1. Fetch    walk the track listing page by page (≤ 50 per page)
//!  ├─ 2. Extract  first album-image URL per track, deduplicated
//!  ├─ 3. Select   shuffle candidates; repeat them when too few
//!  ├─ 4. Decode   download + decode, substituting failures
//!  ├─ 5. Compose  grid with 2×2 large cells, then rotate and zoom
//!  └─ 6. Output   JPEG/PNG file or base64 upload
//! ```
//!
//! A listing that fails part-way keeps what it fetched; the result says so
//! through [`FetchStatus`]. Configuration problems are rejected before any
//! request or pixel work.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use playlist_covergen::{generate_cover_to_file, AccessToken, GeneratorConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GeneratorConfig::default();
//!     let token = AccessToken::new(std::env::var("SPOTIFY_ACCESS_TOKEN")?);
//!     let cover = generate_cover_to_file(
//!         "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M",
//!         token,
//!         Path::new("cover.jpg"),
//!         &config,
//!     )
//!     .await?;
//!     eprintln!("{} covers, partial: {}", cover.stats.unique_covers, cover.stats.is_partial());
//!     Ok(())
//! }
//! ```
//!
//! Local images work without a token:
//!
//! ```rust,no_run
//! use playlist_covergen::{compose_from_dir, GeneratorConfig};
//! use std::path::Path;
//!
//! let cover = compose_from_dir(Path::new("./images"), &GeneratorConfig::default())?;
//! cover.image.save("cover.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `covergen` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod spotify;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::CoverCache;
pub use config::{
    parse_hex_color, CollageConfig, CollageConfigBuilder, GeneratorConfig, GeneratorConfigBuilder,
    LargeCellPlacement, OutputFormat,
};
pub use error::{CoverGenError, ImageLoadError, PageError};
pub use generate::{
    compose_from_dir, compose_from_files, generate_and_upload, generate_cover, generate_cover_sync,
    generate_cover_to_file,
};
pub use output::{CoverOutput, CoverStats};
pub use pipeline::compose::compose;
pub use pipeline::layout::GridPos;
pub use pipeline::paginate::{fetch_all, FetchOutcome, FetchStatus, ListingRequest};
pub use progress::{CoverProgressCallback, NoopProgressCallback, ProgressCallback};
pub use spotify::{parse_playlist_ref, AccessToken, PlaylistSummary, SpotifyClient, UserProfile};
