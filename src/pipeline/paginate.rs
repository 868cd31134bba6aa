//! Offset-paginated fetching: walk a listing endpoint end-to-end.
//!
//! ## Termination
//!
//! Each page is requested with `limit` and `offset` query parameters. The
//! loop stops when:
//!
//! * the page's `next` cursor is `null` ([`FetchStatus::Complete`]),
//! * the caller's item cap is reached ([`FetchStatus::CapReached`]),
//! * a request fails, or a page makes no progress
//!   ([`FetchStatus::Stopped`]).
//!
//! Failures never surface as `Err`: the items accumulated so far are
//! returned together with the [`PageError`] that stopped the walk, so the
//! caller decides whether partial data is acceptable.
//!
//! Requests are issued strictly one after another.

use crate::error::{describe_api_error, PageError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Hard protocol maximum for `limit`.
pub const MAX_PAGE_LIMIT: usize = 50;

/// One paginated listing to walk.
#[derive(Debug, Clone)]
pub struct ListingRequest {
    /// Absolute endpoint URL.
    pub endpoint: String,
    /// Query parameters sent with every page (`limit`/`offset` are managed
    /// by the fetcher and stripped from here).
    pub params: Vec<(String, String)>,
    /// Items per page, clamped to 1–[`MAX_PAGE_LIMIT`].
    pub page_size: usize,
    /// Stop after this many items. `None` = unbounded.
    pub max_items: Option<usize>,
}

impl ListingRequest {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
            page_size: MAX_PAGE_LIMIT,
            max_items: None,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if key != "limit" && key != "offset" {
            self.params.push((key, value.into()));
        }
        self
    }

    pub fn page_size(mut self, n: usize) -> Self {
        self.page_size = n.clamp(1, MAX_PAGE_LIMIT);
        self
    }

    pub fn max_items(mut self, cap: Option<usize>) -> Self {
        self.max_items = cap;
        self
    }

    /// Page size for the next request given the running offset.
    fn limit_at(&self, offset: usize) -> usize {
        let page_size = self.page_size.clamp(1, MAX_PAGE_LIMIT);
        match self.max_items {
            Some(cap) => page_size.min(cap.saturating_sub(offset)),
            None => page_size,
        }
    }
}

/// Why a paginated walk ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    /// The last page had no `next` cursor.
    Complete,
    /// The item cap was reached.
    CapReached,
    /// A request failed; later pages were never requested.
    Stopped(PageError),
}

impl FetchStatus {
    /// Whether the walk ended early because of a failure.
    pub fn is_partial(&self) -> bool {
        matches!(self, FetchStatus::Stopped(_))
    }

    /// The failure that stopped the walk, if any.
    pub fn error(&self) -> Option<&PageError> {
        match self {
            FetchStatus::Stopped(e) => Some(e),
            _ => None,
        }
    }
}

/// Items accumulated by a paginated walk.
#[derive(Debug, Clone)]
pub struct FetchOutcome<T = Value> {
    /// Items in the order the API returned them.
    pub items: Vec<T>,
    /// How the walk ended.
    pub status: FetchStatus,
    /// Number of page requests issued.
    pub requests: usize,
}

impl<T> FetchOutcome<T> {
    /// Convert items, dropping the ones `f` rejects.
    pub fn filter_map_items<U>(self, f: impl FnMut(T) -> Option<U>) -> FetchOutcome<U> {
        FetchOutcome {
            items: self.items.into_iter().filter_map(f).collect(),
            status: self.status,
            requests: self.requests,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page {
    items: Vec<Value>,
    #[serde(default)]
    next: Option<String>,
}

/// Walk `request` page by page with a bearer token.
pub async fn fetch_all(
    client: &reqwest::Client,
    request: &ListingRequest,
    bearer_token: &str,
    timeout_secs: u64,
) -> FetchOutcome {
    let mut items: Vec<Value> = Vec::new();
    let mut offset = 0usize;
    let mut requests = 0usize;

    let status = loop {
        let limit = request.limit_at(offset);
        if limit == 0 {
            break FetchStatus::CapReached;
        }

        requests += 1;
        let page = match fetch_page(client, request, bearer_token, limit, offset, timeout_secs).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    "Failed requesting the next page of '{}': {} (keeping {} items)",
                    request.endpoint,
                    e,
                    items.len()
                );
                break FetchStatus::Stopped(e);
            }
        };

        let mut page_items = page.items;
        // Never exceed the budget even if the server ignores `limit`.
        if request.max_items.is_some() {
            page_items.truncate(limit);
        }
        let received = page_items.len();
        items.extend(page_items);
        offset += received;
        debug!(
            "Page {} of '{}': {} items (total {})",
            requests, request.endpoint, received, offset
        );

        if page.next.is_none() {
            break FetchStatus::Complete;
        }
        if received == 0 {
            warn!(
                "'{}' returned an empty page with a next cursor at offset {}; stopping",
                request.endpoint, offset
            );
            break FetchStatus::Stopped(PageError::NoProgress { offset });
        }
    };

    FetchOutcome {
        items,
        status,
        requests,
    }
}

async fn fetch_page(
    client: &reqwest::Client,
    request: &ListingRequest,
    bearer_token: &str,
    limit: usize,
    offset: usize,
    timeout_secs: u64,
) -> Result<Page, PageError> {
    let response = client
        .get(&request.endpoint)
        .query(&request.params)
        .query(&[("limit", limit), ("offset", offset)])
        .bearer_auth(bearer_token)
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                PageError::Timeout {
                    offset,
                    secs: timeout_secs,
                }
            } else {
                PageError::Transport {
                    offset,
                    detail: e.to_string(),
                }
            }
        })?;

    let status = response.status();
    let body = response.bytes().await.map_err(|e| PageError::Transport {
        offset,
        detail: e.to_string(),
    })?;

    if !status.is_success() {
        return Err(PageError::Status {
            offset,
            status: status.as_u16(),
            message: describe_api_error(&String::from_utf8_lossy(&body)),
        });
    }

    serde_json::from_slice::<Page>(&body).map_err(|e| PageError::Malformed {
        offset,
        detail: e.to_string(),
    })
}
