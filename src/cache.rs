//! Memoised cover-URL lists.
//!
//! Fetching a long playlist takes one request per 50 tracks, so repeated
//! generations for the same playlist reuse the URL list from an earlier
//! walk. Entries are keyed by playlist id, access token and track cap: a
//! different token may see a different playlist, and a capped walk is not a
//! full one.
//!
//! Walks stopped by a failure are never stored (see
//! [`crate::spotify::SpotifyClient::album_covers`]); a capped walk is stored
//! together with its [`FetchStatus`].

use crate::pipeline::paginate::FetchStatus;
use lru::LruCache;
use once_cell::sync::Lazy;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Entry capacity of the process-wide cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 2048;

static GLOBAL: Lazy<Arc<CoverCache>> = Lazy::new(|| {
    Arc::new(CoverCache::new(
        NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
    ))
});

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    playlist_id: String,
    token: String,
    max_tracks: Option<usize>,
}

/// A memoised walk: its cover URLs and how the walk ended.
#[derive(Debug, Clone)]
pub struct CachedCovers {
    pub urls: Arc<Vec<String>>,
    pub status: FetchStatus,
}

/// An LRU map from (playlist, token, cap) to cover URLs, with an optional TTL.
#[derive(Debug)]
pub struct CoverCache {
    entries: Mutex<LruCache<CacheKey, (Instant, CachedCovers)>>,
    ttl: Option<Duration>,
}

impl CoverCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: None,
        }
    }

    /// Entries older than `ttl` are treated as missing.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The process-wide cache.
    pub fn global() -> Arc<CoverCache> {
        Arc::clone(&GLOBAL)
    }

    pub fn get(&self, playlist_id: &str, token: &str, max_tracks: Option<usize>) -> Option<CachedCovers> {
        let key = key(playlist_id, token, max_tracks);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let expired = match entries.get(&key) {
            None => return None,
            Some((stored_at, _)) => self.ttl.is_some_and(|ttl| stored_at.elapsed() > ttl),
        };
        if expired {
            entries.pop(&key);
            return None;
        }
        entries.get(&key).map(|(_, covers)| covers.clone())
    }

    pub fn insert(&self, playlist_id: &str, token: &str, max_tracks: Option<usize>, covers: CachedCovers) {
        let key = key(playlist_id, token, max_tracks);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, (Instant::now(), covers));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

fn key(playlist_id: &str, token: &str, max_tracks: Option<usize>) -> CacheKey {
    CacheKey {
        playlist_id: playlist_id.to_string(),
        token: token.to_string(),
        max_tracks,
    }
}
