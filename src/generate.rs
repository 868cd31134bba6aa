//! Top-level entry points: playlist → cover, folder → cover.
//!
//! ```text
//! playlist ref ─▶ album_covers ─▶ shuffle ─▶ download+decode ─▶ fill ─▶ compose
//!                 (paginated,      (seeded)   (substitutes       (repeat   (blocking
//!                  cached)                     failures)          or fail)  worker)
//! ```
//!
//! Network requests are awaited one at a time. Composition is CPU-bound and
//! runs on tokio's blocking pool.

use crate::config::{CollageConfig, GeneratorConfig, OutputFormat};
use crate::error::CoverGenError;
use crate::output::{CoverOutput, CoverStats};
use crate::pipeline::compose::compose;
use crate::pipeline::decode::{self, DecodeOutcome, ImageSource};
use crate::pipeline::encode;
use crate::pipeline::select;
use crate::spotify::{parse_playlist_ref, AccessToken, SpotifyClient};
use image::{DynamicImage, RgbImage};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// JPEG quality used for uploads when the configured output is PNG.
const DEFAULT_UPLOAD_QUALITY: u8 = 80;

/// Generate a cover for a playlist.
///
/// `playlist` may be an id, a `spotify:playlist:` URI or an open.spotify.com
/// link.
///
/// # Errors
/// Fatal only: invalid reference or configuration, a listing that failed
/// before yielding any track, or too few decodable covers (see
/// [`GeneratorConfig::repeat_images`]). A listing cut short after some pages
/// still produces a cover; check [`CoverStats::is_partial`].
pub async fn generate_cover(
    playlist: &str,
    token: AccessToken,
    config: &GeneratorConfig,
) -> Result<CoverOutput, CoverGenError> {
    let playlist_id = parse_playlist_ref(playlist)?;
    config.collage.validate()?;
    let client = SpotifyClient::new(token, config)?;
    generate_with_client(&client, &playlist_id, config).await
}

/// [`generate_cover`], then write the canvas to `output` in the configured format.
pub async fn generate_cover_to_file(
    playlist: &str,
    token: AccessToken,
    output: &Path,
    config: &GeneratorConfig,
) -> Result<CoverOutput, CoverGenError> {
    let cover = generate_cover(playlist, token, config).await?;
    encode::save_canvas(&cover.image, output, config.collage.output_format)?;
    info!("Wrote cover to {}", output.display());
    Ok(cover)
}

/// [`generate_cover`], then replace the playlist's cover with the result.
pub async fn generate_and_upload(
    playlist: &str,
    token: AccessToken,
    config: &GeneratorConfig,
) -> Result<CoverOutput, CoverGenError> {
    let playlist_id = parse_playlist_ref(playlist)?;
    config.collage.validate()?;
    let client = SpotifyClient::new(token, config)?;
    let cover = generate_with_client(&client, &playlist_id, config).await?;

    let quality = match config.collage.output_format {
        OutputFormat::Jpeg { quality } => quality,
        OutputFormat::Png => DEFAULT_UPLOAD_QUALITY,
    };
    let image = cover.image.clone();
    let payload = tokio::task::spawn_blocking(move || encode::encode_for_upload(&image, quality))
        .await
        .map_err(|e| CoverGenError::Internal(format!("Encoding task failed: {e}")))??;

    client.upload_cover(&playlist_id, payload).await?;
    Ok(cover)
}

/// Blocking wrapper around [`generate_cover`] for callers without a runtime.
pub fn generate_cover_sync(
    playlist: &str,
    token: AccessToken,
    config: &GeneratorConfig,
) -> Result<CoverOutput, CoverGenError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| CoverGenError::Internal(format!("Failed to start runtime: {e}")))?;
    runtime.block_on(generate_cover(playlist, token, config))
}

/// Compose a cover from local image files.
///
/// Candidates are shuffled with [`GeneratorConfig::shuffle_seed`], decoded in
/// that order until the grid is full, and repeated when
/// [`GeneratorConfig::repeat_images`] allows.
pub fn compose_from_files(paths: &[PathBuf], config: &GeneratorConfig) -> Result<CoverOutput, CoverGenError> {
    let start = Instant::now();
    let collage = &config.collage;
    let required = collage.required_images()?;
    collage.validate()?;

    let mut rng = select::rng_from_seed(config.shuffle_seed);
    let candidates = select::shuffled(paths, &mut rng);
    if let Some(cb) = &config.progress_callback {
        cb.on_generation_start(required);
    }

    let decoded = decode::decode_until(
        candidates.into_iter().map(ImageSource::Path),
        required,
        config.progress_callback.as_ref(),
    );
    let failed = decoded.failures.len();
    let images = fill_slots(decoded, required, config.repeat_images, &mut rng)?;

    let compose_start = Instant::now();
    let image = compose(&images, collage)?;
    let compose_duration_ms = compose_start.elapsed().as_millis() as u64;

    if let Some(cb) = &config.progress_callback {
        cb.on_generation_complete(images.len(), failed);
    }

    Ok(CoverOutput {
        image,
        stats: CoverStats {
            unique_covers: paths.len(),
            required_images: required,
            images_used: images.len(),
            failed_images: failed,
            compose_duration_ms,
            total_duration_ms: start.elapsed().as_millis() as u64,
            ..Default::default()
        },
    })
}

/// [`compose_from_files`] over every `jpg`/`jpeg`/`png` file in `dir`.
pub fn compose_from_dir(dir: &Path, config: &GeneratorConfig) -> Result<CoverOutput, CoverGenError> {
    let files = decode::discover_images(dir)?;
    info!("Composing from {} files in {}", files.len(), dir.display());
    compose_from_files(&files, config)
}

async fn generate_with_client(
    client: &SpotifyClient,
    playlist_id: &str,
    config: &GeneratorConfig,
) -> Result<CoverOutput, CoverGenError> {
    let start = Instant::now();
    let required = config.collage.required_images()?;
    info!("Generating cover for playlist {} ({} images needed)", playlist_id, required);

    // ── Step 1: Cover URLs ───────────────────────────────────────────────
    let covers = client.album_covers(playlist_id, config.max_tracks).await?;
    let fetch_duration_ms = start.elapsed().as_millis() as u64;
    if covers.status.is_partial() {
        warn!(
            "Track listing for {} stopped early; composing from {} covers",
            playlist_id,
            covers.urls.len()
        );
    }
    if let Some(cb) = &config.progress_callback {
        cb.on_fetch_complete(covers.tracks_fetched, covers.status.is_partial());
    }

    // ── Step 2: Download + decode in shuffled order ──────────────────────
    let mut rng = select::rng_from_seed(config.shuffle_seed);
    let candidates = select::shuffled(covers.urls.as_slice(), &mut rng);
    if let Some(cb) = &config.progress_callback {
        cb.on_generation_start(required);
    }

    let mut decoded = DecodeOutcome::default();
    for url in candidates {
        if decoded.images.len() >= required {
            break;
        }
        let result = match client.download_image(&url).await {
            Ok(data) => ImageSource::Bytes {
                label: url.clone(),
                data,
            }
            .decode(),
            Err(e) => Err(e),
        };
        decode::record(&mut decoded, result, &url, required, config.progress_callback.as_ref());
    }
    let failed = decoded.failures.len();

    // ── Step 3: Fill the grid ────────────────────────────────────────────
    let images = fill_slots(decoded, required, config.repeat_images, &mut rng)?;
    let used = images.len();

    // ── Step 4: Compose ──────────────────────────────────────────────────
    let compose_start = Instant::now();
    let image = compose_blocking(images, config.collage.clone()).await?;
    let compose_duration_ms = compose_start.elapsed().as_millis() as u64;
    debug!("Composed in {}ms", compose_duration_ms);

    if let Some(cb) = &config.progress_callback {
        cb.on_generation_complete(used, failed);
    }

    Ok(CoverOutput {
        image,
        stats: CoverStats {
            tracks_fetched: covers.tracks_fetched,
            unique_covers: covers.urls.len(),
            required_images: required,
            images_used: used,
            failed_images: failed,
            fetch_status: Some(covers.status),
            cached: covers.cached,
            fetch_duration_ms,
            compose_duration_ms,
            total_duration_ms: start.elapsed().as_millis() as u64,
        },
    })
}

async fn compose_blocking(images: Vec<DynamicImage>, collage: CollageConfig) -> Result<RgbImage, CoverGenError> {
    tokio::task::spawn_blocking(move || compose(&images, &collage))
        .await
        .map_err(|e| CoverGenError::Internal(format!("Compose task failed: {e}")))?
}

/// Decoded images sized to exactly `required`, repeating when allowed.
fn fill_slots<R: Rng + ?Sized>(
    decoded: DecodeOutcome,
    required: usize,
    repeat: bool,
    rng: &mut R,
) -> Result<Vec<DynamicImage>, CoverGenError> {
    let available = decoded.images.len();
    if available >= required {
        return Ok(decoded.images);
    }
    if available == 0 || !repeat {
        return Err(CoverGenError::NotEnoughImages { required, available });
    }

    info!("Only {} distinct images for {} slots; repeating", available, required);
    Ok(select::repeat_to_fill(decoded.images, required, rng))
}
