//! Error types for the playlist-covergen library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`CoverGenError`] (fatal): the cover cannot be produced at all
//!   (invalid configuration, too few images, output not writable). Returned
//!   as `Err(CoverGenError)` from the top-level `generate*` / `compose*`
//!   functions.
//!
//! * [`PageError`] (non-fatal): one page of a paginated listing failed.
//!   Pagination stops there and keeps everything fetched so far; the error
//!   is carried in [`crate::pipeline::paginate::FetchStatus::Stopped`] so the
//!   caller can tell a complete listing from a truncated one.
//!
//! * [`ImageLoadError`] (non-fatal): a single source image could not be
//!   downloaded or decoded. It is excluded from the selection pool and
//!   another candidate takes its place when one is available.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the playlist-covergen library.
#[derive(Debug, Error)]
pub enum CoverGenError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed (zoom, grid geometry, large-cell layout…).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Fewer source images are available than the grid has slots.
    #[error("Not enough images: the collage needs {required} but only {available} are available")]
    NotEnoughImages { required: usize, available: usize },

    /// A source bitmap has a zero width or height and cannot fill a cell.
    #[error("Empty source image ({width}×{height})")]
    EmptyImage { width: u32, height: u32 },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The playlist reference is neither an id, a `spotify:` URI nor an open.spotify.com URL.
    #[error("Invalid playlist reference '{input}'\nExpected an id, spotify:playlist:<id> or https://open.spotify.com/playlist/<id>")]
    InvalidPlaylist { input: String },

    /// A local image file or folder does not exist.
    #[error("Input not found: '{path}'")]
    InputNotFound { path: PathBuf },

    // ── API errors ────────────────────────────────────────────────────────
    /// The Web API answered with a non-success status on a request that
    /// cannot degrade to partial results (profile lookup, cover upload).
    #[error("API error from '{endpoint}' (HTTP {status}): {message}")]
    ApiError {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// A paginated listing failed on its first page, so there is nothing
    /// to degrade to.
    #[error("Listing '{endpoint}' failed: {source}")]
    ListingFailed {
        endpoint: String,
        #[source]
        source: PageError,
    },

    /// The request never produced a response.
    #[error("Request to '{endpoint}' failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("Request to '{endpoint}' timed out after {secs}s\nRaise GeneratorConfig::request_timeout_secs.")]
    RequestTimeout { endpoint: String, secs: u64 },

    /// The encoded cover is larger than the upload endpoint accepts, even at
    /// the lowest quality tried.
    #[error("Encoded cover is {bytes} bytes, above the {limit}-byte upload limit")]
    CoverTooLarge { bytes: usize, limit: usize },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The canvas could not be encoded into the requested format.
    #[error("Failed to encode cover: {detail}")]
    EncodeFailed { detail: String },

    /// Could not create or write the output image file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for one page of a paginated listing.
///
/// `offset` is the item offset the failed page was requested at, which is
/// also the number of items successfully accumulated before it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// The API answered with a non-success status.
    #[error("page at offset {offset}: HTTP {status}: {message}")]
    Status {
        offset: usize,
        status: u16,
        message: String,
    },

    /// The request failed before a response arrived.
    #[error("page at offset {offset}: request failed: {detail}")]
    Transport { offset: usize, detail: String },

    /// The request timed out.
    #[error("page at offset {offset}: timed out after {secs}s")]
    Timeout { offset: usize, secs: u64 },

    /// The body was not a page (`items` array plus nullable `next`).
    #[error("page at offset {offset}: malformed body: {detail}")]
    Malformed { offset: usize, detail: String },

    /// The page returned no items yet announced a further page.
    #[error("page at offset {offset}: no items returned but a next page was announced")]
    NoProgress { offset: usize },
}

/// A non-fatal error for a single source image.
#[derive(Debug, Clone, Error)]
pub enum ImageLoadError {
    /// The image URL could not be fetched.
    #[error("failed to download '{url}': {detail}")]
    Download { url: String, detail: String },

    /// The image file could not be read.
    #[error("failed to read '{path}': {detail}")]
    Read { path: PathBuf, detail: String },

    /// The bytes are not a decodable image.
    #[error("failed to decode '{source_label}': {detail}")]
    Decode {
        source_label: String,
        detail: String,
    },
}

/// Summarise an error body returned by the Web API.
///
/// Regular endpoints answer `{"error": {"status": 401, "message": "…"}}`;
/// the accounts service answers `{"error": "…", "error_description": "…"}`.
/// Anything else is returned verbatim.
pub(crate) fn describe_api_error(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    if let Some(message) = json.pointer("/error/message").and_then(|m| m.as_str()) {
        return message.to_string();
    }
    if let Some(description) = json.get("error_description").and_then(|d| d.as_str()) {
        return description.to_string();
    }
    if let Some(error) = json.get("error").and_then(|e| e.as_str()) {
        return error.to_string();
    }

    body.trim().to_string()
}
