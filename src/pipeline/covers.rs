//! Cover-URL extraction from playlist track items.
//!
//! Each item is expected to look like
//! `{"track": {"name": "…", "album": {"images": [{"url": "…"}, …]}}}`; the
//! first (largest) album image is the cover. Items without one are skipped
//! with a warning, never failing the batch.

use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

/// Extract one cover URL per item, deduplicated.
///
/// The first occurrence of each URL keeps its position; callers should not
/// rely on the order, since covers are shuffled before composition anyway.
pub fn extract_cover_urls(items: &[Value]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for item in items {
        match cover_url(item) {
            Some(url) => {
                if seen.insert(url) {
                    urls.push(url.to_string());
                }
            }
            None => {
                let name = item
                    .pointer("/track/name")
                    .and_then(Value::as_str)
                    .unwrap_or("<unknown track>");
                warn!("{} has no cover image!", name);
            }
        }
    }

    urls
}

fn cover_url(item: &Value) -> Option<&str> {
    item.pointer("/track/album/images/0/url")?
        .as_str()
        .filter(|url| !url.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn track(name: &str, urls: &[&str]) -> Value {
        let images: Vec<Value> = urls.iter().map(|u| json!({ "url": u, "width": 640 })).collect();
        json!({ "track": { "name": name, "album": { "images": images } } })
    }

    #[test]
    fn duplicates_collapse() {
        let items = vec![track("a", &["A"]), track("b", &["A"]), track("c", &["B"])];
        let urls = extract_cover_urls(&items);
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&"A".to_string()));
        assert!(urls.contains(&"B".to_string()));
    }

    #[test]
    fn first_image_is_the_cover() {
        let items = vec![track("a", &["large", "medium", "small"])];
        assert_eq!(extract_cover_urls(&items), vec!["large".to_string()]);
    }

    #[test]
    fn items_without_covers_are_skipped() {
        let items = vec![
            track("no art", &[]),
            json!({ "track": null }),
            json!({ "track": { "name": "local file" } }),
            track("ok", &["C"]),
        ];
        assert_eq!(extract_cover_urls(&items), vec!["C".to_string()]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(extract_cover_urls(&[]).is_empty());
    }
}
