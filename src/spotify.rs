//! Web API client: playlists, profile, album covers, cover upload.
//!
//! All requests carry `Authorization: Bearer <token>` except image
//! downloads, which go to the public image CDN. Requests are issued one at a
//! time, each bounded by [`GeneratorConfig::request_timeout_secs`].

use crate::cache::{CachedCovers, CoverCache};
use crate::config::GeneratorConfig;
use crate::error::{describe_api_error, CoverGenError, ImageLoadError};
use crate::pipeline::covers::extract_cover_urls;
use crate::pipeline::paginate::{fetch_all, FetchOutcome, FetchStatus, ListingRequest};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Production Web API base URL.
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// Field filter for playlist tracks: only what cover extraction reads.
const TRACK_FIELDS: &str = "items(track(album(images),name)),next";

/// A playlist needs at least this many tracks to get a generated cover.
pub const MIN_TRACKS_FOR_COVER: u64 = 4;

static RE_PLAYLIST_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:spotify:playlist:|https?://open\.spotify\.com/(?:[\w-]+/)?playlist/)?([A-Za-z0-9]+)(?:[?#].*)?$",
    )
    .unwrap()
});

/// Extract the playlist id from a bare id, a `spotify:playlist:` URI or an
/// `open.spotify.com` link.
pub fn parse_playlist_ref(input: &str) -> Result<String, CoverGenError> {
    RE_PLAYLIST_REF
        .captures(input.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| CoverGenError::InvalidPlaylist {
            input: input.to_string(),
        })
}

/// An OAuth bearer token. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl From<String> for AccessToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AccessToken {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub display_name: Option<String>,
    /// First avatar URL, if the user has one.
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackCount {
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

/// One entry of the user's playlist listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub tracks: TrackCount,
    #[serde(default)]
    pub images: Option<Vec<ImageRef>>,
}

impl PlaylistSummary {
    /// Owned by `user_display_name` and long enough for a collage.
    pub fn has_editable_cover(&self, user_display_name: &str) -> bool {
        self.owner.display_name.as_deref() == Some(user_display_name)
            && self.tracks.total >= MIN_TRACKS_FOR_COVER
    }

    /// Current cover URL, if any.
    pub fn cover_url(&self) -> Option<&str> {
        self.images.as_ref()?.first().map(|i| i.url.as_str())
    }
}

/// Cover URLs for one playlist.
#[derive(Debug, Clone)]
pub struct CoverUrls {
    /// Distinct first-album-image URLs.
    pub urls: Arc<Vec<String>>,
    /// Track items fetched; 0 when served from the cache.
    pub tracks_fetched: usize,
    /// How the track walk ended; for cache hits, how the memoised walk ended.
    pub status: FetchStatus,
    pub cached: bool,
}

/// Web API client bound to one access token.
pub struct SpotifyClient {
    http: reqwest::Client,
    token: AccessToken,
    base_url: String,
    timeout_secs: u64,
    page_size: usize,
    cache: Option<Arc<CoverCache>>,
}

impl SpotifyClient {
    /// Build a client from the generator settings (base URL, timeout, page
    /// size, cache).
    pub fn new(token: AccessToken, config: &GeneratorConfig) -> Result<Self, CoverGenError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CoverGenError::Internal(format!("Failed to build HTTP client: {e}")))?;

        let cache = if config.use_cache {
            Some(config.cache.clone().unwrap_or_else(CoverCache::global))
        } else {
            None
        };

        Ok(Self {
            http,
            token,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
            page_size: config.page_size,
            cache,
        })
    }

    /// `GET /me`.
    pub async fn current_user_profile(&self) -> Result<UserProfile, CoverGenError> {
        let endpoint = format!("{}/me", self.base_url);
        let request = self.http.get(&endpoint).bearer_auth(self.token.as_str());
        let body = self.send(&endpoint, request).await?;

        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| CoverGenError::ApiError {
                endpoint: endpoint.clone(),
                status: 200,
                message: format!("unexpected profile body: {e}"),
            })?;

        Ok(UserProfile {
            display_name: json
                .get("display_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            image_url: json
                .pointer("/images/0/url")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }

    /// `GET /me/playlists`, every page.
    ///
    /// Entries that do not parse as a playlist are skipped with a warning.
    pub async fn playlists(&self) -> Result<FetchOutcome<PlaylistSummary>, CoverGenError> {
        let endpoint = format!("{}/me/playlists", self.base_url);
        let request = ListingRequest::new(&endpoint).page_size(self.page_size);
        let outcome = fetch_all(&self.http, &request, self.token.as_str(), self.timeout_secs).await;
        let outcome = fail_if_empty(&endpoint, outcome)?;

        Ok(outcome.filter_map_items(|item| {
            serde_json::from_value::<PlaylistSummary>(item)
                .map_err(|e| warn!("Skipping playlist entry: {}", e))
                .ok()
        }))
    }

    /// The user's playlists whose cover this tool may replace.
    pub async fn editable_playlists(&self) -> Result<Vec<PlaylistSummary>, CoverGenError> {
        let profile = self.current_user_profile().await?;
        let Some(user) = profile.display_name else {
            warn!("Profile has no display name; no playlist can be matched to its owner");
            return Ok(Vec::new());
        };

        let outcome = self.playlists().await?;
        Ok(outcome
            .items
            .into_iter()
            .filter(|p| p.has_editable_cover(&user))
            .collect())
    }

    /// Distinct album-cover URLs of a playlist's tracks.
    ///
    /// Memoised per (playlist, token, cap). A walk cut short by a failure
    /// is returned but never memoised.
    pub async fn album_covers(
        &self,
        playlist_id: &str,
        max_tracks: Option<usize>,
    ) -> Result<CoverUrls, CoverGenError> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(playlist_id, self.token.as_str(), max_tracks) {
                debug!("Cover cache hit for playlist {} ({} urls)", playlist_id, hit.urls.len());
                return Ok(CoverUrls {
                    urls: hit.urls,
                    tracks_fetched: 0,
                    status: hit.status,
                    cached: true,
                });
            }
        }

        let endpoint = format!("{}/playlists/{}/tracks", self.base_url, playlist_id);
        let request = ListingRequest::new(&endpoint)
            .param("fields", TRACK_FIELDS)
            .page_size(self.page_size)
            .max_items(max_tracks);
        let outcome = fetch_all(&self.http, &request, self.token.as_str(), self.timeout_secs).await;
        let outcome = fail_if_empty(&endpoint, outcome)?;

        let urls = Arc::new(extract_cover_urls(&outcome.items));
        info!(
            "Playlist {}: {} tracks, {} distinct covers ({} requests)",
            playlist_id,
            outcome.items.len(),
            urls.len(),
            outcome.requests
        );

        if let Some(cache) = &self.cache {
            if !outcome.status.is_partial() {
                cache.insert(
                    playlist_id,
                    self.token.as_str(),
                    max_tracks,
                    CachedCovers {
                        urls: Arc::clone(&urls),
                        status: outcome.status.clone(),
                    },
                );
            }
        }

        Ok(CoverUrls {
            urls,
            tracks_fetched: outcome.items.len(),
            status: outcome.status,
            cached: false,
        })
    }

    /// `PUT /playlists/{id}/images` with a base64 JPEG body.
    pub async fn upload_cover(&self, playlist_id: &str, jpeg_base64: String) -> Result<(), CoverGenError> {
        let endpoint = format!("{}/playlists/{}/images", self.base_url, playlist_id);
        let request = self
            .http
            .put(&endpoint)
            .bearer_auth(self.token.as_str())
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg_base64);
        self.send(&endpoint, request).await?;
        info!("Uploaded cover for playlist {}", playlist_id);
        Ok(())
    }

    /// Fetch image bytes from a public URL (no auth header).
    pub async fn download_image(&self, url: &str) -> Result<Vec<u8>, ImageLoadError> {
        let download_err = |detail: String| ImageLoadError::Download {
            url: url.to_string(),
            detail,
        };

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| download_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_err(format!("HTTP {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_err(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn send(&self, endpoint: &str, request: reqwest::RequestBuilder) -> Result<String, CoverGenError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CoverGenError::RequestTimeout {
                    endpoint: endpoint.to_string(),
                    secs: self.timeout_secs,
                }
            } else {
                CoverGenError::RequestFailed {
                    endpoint: endpoint.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| CoverGenError::RequestFailed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(CoverGenError::ApiError {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                message: describe_api_error(&body),
            });
        }
        Ok(body)
    }
}

/// A walk that failed before yielding anything has no partial result.
fn fail_if_empty<T>(endpoint: &str, outcome: FetchOutcome<T>) -> Result<FetchOutcome<T>, CoverGenError> {
    if outcome.items.is_empty() {
        if let FetchStatus::Stopped(source) = outcome.status {
            return Err(CoverGenError::ListingFailed {
                endpoint: endpoint.to_string(),
                source,
            });
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;

    #[test]
    fn playlist_refs() {
        let id = "37i9dQZF1DXcBWIGoYBM5M";
        assert_eq!(parse_playlist_ref(id).unwrap(), id);
        assert_eq!(parse_playlist_ref(&format!("spotify:playlist:{id}")).unwrap(), id);
        assert_eq!(
            parse_playlist_ref(&format!("https://open.spotify.com/playlist/{id}?si=abc123")).unwrap(),
            id
        );
        assert_eq!(
            parse_playlist_ref(&format!("https://open.spotify.com/intl-de/playlist/{id}")).unwrap(),
            id
        );
        assert_eq!(parse_playlist_ref(&format!("  {id}\n")).unwrap(), id);
    }

    #[test]
    fn bad_playlist_refs() {
        for input in ["", "spotify:album:abc", "https://example.com/playlist/abc", "id with spaces"] {
            assert!(
                matches!(parse_playlist_ref(input), Err(CoverGenError::InvalidPlaylist { .. })),
                "{input:?}"
            );
        }
    }

    #[test]
    fn token_debug_is_redacted() {
        let token = AccessToken::new("BQ-secret");
        assert!(!format!("{token:?}").contains("secret"));
        assert_eq!(token.as_str(), "BQ-secret");
    }

    fn playlist(owner: Option<&str>, total: u64) -> PlaylistSummary {
        PlaylistSummary {
            id: "p".into(),
            name: "Mix".into(),
            owner: Owner {
                display_name: owner.map(str::to_string),
            },
            tracks: TrackCount { total },
            images: None,
        }
    }

    #[test]
    fn editable_cover_needs_owner_and_four_tracks() {
        assert!(playlist(Some("ana"), 4).has_editable_cover("ana"));
        assert!(!playlist(Some("ana"), 3).has_editable_cover("ana"));
        assert!(!playlist(Some("bob"), 40).has_editable_cover("ana"));
        assert!(!playlist(None, 40).has_editable_cover("ana"));
    }

    #[test]
    fn playlist_summary_tolerates_null_images() {
        let json = serde_json::json!({
            "id": "abc",
            "name": "Road trip",
            "owner": { "display_name": "ana" },
            "tracks": { "total": 12 },
            "images": null
        });
        let p: PlaylistSummary = serde_json::from_value(json).unwrap();
        assert_eq!(p.tracks.total, 12);
        assert!(p.cover_url().is_none());
    }

    #[test]
    fn empty_stopped_walk_is_an_error() {
        let outcome: FetchOutcome<()> = FetchOutcome {
            items: vec![],
            status: FetchStatus::Stopped(PageError::Status {
                offset: 0,
                status: 401,
                message: "expired".into(),
            }),
            requests: 1,
        };
        let err = fail_if_empty("http://x/me/playlists", outcome).unwrap_err();
        assert!(matches!(err, CoverGenError::ListingFailed { .. }));
    }

    #[test]
    fn partial_walk_with_items_is_kept() {
        let outcome = FetchOutcome {
            items: vec![1, 2],
            status: FetchStatus::Stopped(PageError::NoProgress { offset: 2 }),
            requests: 2,
        };
        assert_eq!(fail_if_empty("x", outcome).unwrap().items, vec![1, 2]);
    }
}
