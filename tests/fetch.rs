//! Integration tests for paginated fetching and the Web API client.
//!
//! Every test runs against a local `wiremock` server; no network access is
//! needed.

use image::{DynamicImage, Rgb, RgbImage};
use playlist_covergen::{
    fetch_all, generate_cover, AccessToken, CollageConfig, CoverCache, CoverGenError, FetchStatus,
    GeneratorConfig, LargeCellPlacement, ListingRequest, OutputFormat, PageError, SpotifyClient,
};
use serde_json::{json, Value};
use std::io::Cursor;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const TOKEN: &str = "test-token";

fn page(items: Vec<Value>, next: Option<&str>) -> Value {
    json!({ "items": items, "next": next })
}

fn numbers(range: std::ops::Range<u64>) -> Vec<Value> {
    range.map(|i| json!({ "n": i })).collect()
}

fn track(name: &str, cover: &str) -> Value {
    json!({ "track": { "name": name, "album": { "images": [{ "url": cover }] } } })
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn fresh_cache() -> Arc<CoverCache> {
    Arc::new(CoverCache::new(NonZeroUsize::new(16).unwrap()))
}

fn config_for(server: &MockServer) -> GeneratorConfig {
    GeneratorConfig::builder()
        .api_base_url(server.uri())
        .cache(fresh_cache())
        .build()
        .unwrap()
}

async fn mount_page(server: &MockServer, route: &str, offset: &str, body: Value, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(query_param("offset", offset))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(hits)
        .mount(server)
        .await;
}

fn png(rgb: [u8; 3]) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(rgb)))
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

// ── fetch_all ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fetches_every_page_in_order() {
    let server = MockServer::start().await;
    let next = format!("{}/items?more", server.uri());
    mount_page(&server, "/items", "0", page(numbers(0..3), Some(&next)), 1).await;
    mount_page(&server, "/items", "3", page(numbers(3..6), Some(&next)), 1).await;
    mount_page(&server, "/items", "6", page(numbers(6..7), None), 1).await;

    let request = ListingRequest::new(format!("{}/items", server.uri())).page_size(3);
    let outcome = fetch_all(&client(), &request, TOKEN, 5).await;

    assert_eq!(outcome.status, FetchStatus::Complete);
    assert_eq!(outcome.requests, 3);
    let ns: Vec<u64> = outcome.items.iter().map(|v| v["n"].as_u64().unwrap()).collect();
    assert_eq!(ns, (0..7).collect::<Vec<_>>());
}

#[tokio::test]
async fn cap_limits_items_and_requests() {
    let server = MockServer::start().await;
    let next = format!("{}/items?more", server.uri());
    mount_page(&server, "/items", "0", page(numbers(0..50), Some(&next)), 1).await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("offset", "50"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(numbers(50..60), Some(&next))))
        .expect(1)
        .mount(&server)
        .await;

    let request = ListingRequest::new(format!("{}/items", server.uri())).max_items(Some(60));
    let outcome = fetch_all(&client(), &request, TOKEN, 5).await;

    assert_eq!(outcome.items.len(), 60);
    assert_eq!(outcome.status, FetchStatus::CapReached);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn cap_above_total_returns_everything() {
    let server = MockServer::start().await;
    mount_page(&server, "/items", "0", page(numbers(0..4), None), 1).await;

    let request = ListingRequest::new(format!("{}/items", server.uri())).max_items(Some(100));
    let outcome = fetch_all(&client(), &request, TOKEN, 5).await;

    assert_eq!(outcome.items.len(), 4);
    assert_eq!(outcome.status, FetchStatus::Complete);
}

#[tokio::test]
async fn failure_on_second_page_keeps_first_page() {
    let server = MockServer::start().await;
    let next = format!("{}/items?more", server.uri());
    mount_page(&server, "/items", "0", page(numbers(0..3), Some(&next)), 1).await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("offset", "3"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": { "status": 500, "message": "Server error" } })),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/items", "6", page(numbers(6..9), None), 0).await;

    let request = ListingRequest::new(format!("{}/items", server.uri())).page_size(3);
    let outcome = fetch_all(&client(), &request, TOKEN, 5).await;

    assert_eq!(outcome.items.len(), 3);
    assert_eq!(outcome.requests, 2);
    assert_eq!(
        outcome.status,
        FetchStatus::Stopped(PageError::Status {
            offset: 3,
            status: 500,
            message: "Server error".into(),
        })
    );
}

#[tokio::test]
async fn connection_refused_on_second_page_keeps_first_page() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Serves exactly one response, then stops listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let body = page(numbers(0..3), Some("http://unused/next")).to_string();
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    let request = ListingRequest::new(format!("http://{addr}/items")).page_size(3);
    let http = reqwest::Client::builder().pool_max_idle_per_host(0).build().unwrap();
    let outcome = fetch_all(&http, &request, TOKEN, 5).await;
    server.await.unwrap();

    assert_eq!(outcome.items.len(), 3);
    assert_eq!(outcome.requests, 2);
    assert!(
        matches!(outcome.status, FetchStatus::Stopped(PageError::Transport { offset: 3, .. })),
        "{:?}",
        outcome.status
    );
}

#[tokio::test]
async fn empty_page_with_next_terminates() {
    let server = MockServer::start().await;
    let next = format!("{}/items?more", server.uri());
    mount_page(&server, "/items", "0", page(numbers(0..2), Some(&next)), 1).await;
    mount_page(&server, "/items", "2", page(vec![], Some(&next)), 1).await;

    let request = ListingRequest::new(format!("{}/items", server.uri())).page_size(2);
    let outcome = fetch_all(&client(), &request, TOKEN, 5).await;

    assert_eq!(outcome.items.len(), 2);
    assert_eq!(
        outcome.status,
        FetchStatus::Stopped(PageError::NoProgress { offset: 2 })
    );
}

#[tokio::test]
async fn bearer_token_and_fixed_params_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("fields", "items,next"))
        .and(query_param("limit", "50"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(numbers(0..1), None)))
        .expect(1)
        .mount(&server)
        .await;

    let request = ListingRequest::new(format!("{}/items", server.uri())).param("fields", "items,next");
    let outcome = fetch_all(&client(), &request, TOKEN, 5).await;
    assert_eq!(outcome.status, FetchStatus::Complete);
}

#[tokio::test]
async fn malformed_body_stops_the_walk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let request = ListingRequest::new(format!("{}/items", server.uri()));
    let outcome = fetch_all(&client(), &request, TOKEN, 5).await;
    assert!(matches!(
        outcome.status,
        FetchStatus::Stopped(PageError::Malformed { offset: 0, .. })
    ));
}

#[tokio::test]
async fn slow_page_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page(numbers(0..1), None))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let request = ListingRequest::new(format!("{}/items", server.uri()));
    let outcome = fetch_all(&client(), &request, TOKEN, 1).await;
    assert_eq!(
        outcome.status,
        FetchStatus::Stopped(PageError::Timeout { offset: 0, secs: 1 })
    );
    assert!(outcome.items.is_empty());
}

// ── SpotifyClient ────────────────────────────────────────────────────────────

#[tokio::test]
async fn album_covers_are_deduplicated_and_cached() {
    let server = MockServer::start().await;
    let tracks = vec![
        track("one", "http://img/a"),
        track("two", "http://img/a"),
        track("three", "http://img/b"),
        json!({ "track": { "name": "no art", "album": { "images": [] } } }),
    ];
    Mock::given(method("GET"))
        .and(path("/playlists/pl1/tracks"))
        .and(query_param("fields", "items(track(album(images),name)),next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(tracks, None)))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = SpotifyClient::new(AccessToken::new(TOKEN), &config).unwrap();

    let first = client.album_covers("pl1", None).await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.tracks_fetched, 4);
    let mut urls = first.urls.as_ref().clone();
    urls.sort();
    assert_eq!(urls, vec!["http://img/a".to_string(), "http://img/b".to_string()]);

    let second = client.album_covers("pl1", None).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.urls, first.urls);
}

#[tokio::test]
async fn cached_capped_walk_reports_cap_reached() {
    let server = MockServer::start().await;
    let next = format!("{}/playlists/pl3/tracks?more", server.uri());
    let tracks = vec![track("one", "http://img/a"), track("two", "http://img/b")];
    mount_page(&server, "/playlists/pl3/tracks", "0", page(tracks, Some(&next)), 1).await;

    let config = config_for(&server);
    let client = SpotifyClient::new(AccessToken::new(TOKEN), &config).unwrap();

    let first = client.album_covers("pl3", Some(2)).await.unwrap();
    assert!(!first.cached);
    assert_eq!(first.status, FetchStatus::CapReached);

    let second = client.album_covers("pl3", Some(2)).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.status, FetchStatus::CapReached);
}

#[tokio::test]
async fn partial_cover_lists_are_not_cached() {
    let server = MockServer::start().await;
    let next = format!("{}/playlists/pl2/tracks?more", server.uri());
    mount_page(
        &server,
        "/playlists/pl2/tracks",
        "0",
        page(vec![track("one", "http://img/a")], Some(&next)),
        2,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/playlists/pl2/tracks"))
        .and(query_param("offset", "1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = SpotifyClient::new(AccessToken::new(TOKEN), &config).unwrap();

    for _ in 0..2 {
        let covers = client.album_covers("pl2", None).await.unwrap();
        assert!(!covers.cached);
        assert!(covers.status.is_partial());
        assert_eq!(covers.urls.len(), 1);
    }
}

#[tokio::test]
async fn first_page_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/playlists/pl3/tracks"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "status": 401, "message": "The access token expired" } })),
        )
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = SpotifyClient::new(AccessToken::new(TOKEN), &config).unwrap();
    let err = client.album_covers("pl3", None).await.unwrap_err();

    match err {
        CoverGenError::ListingFailed { source, .. } => {
            assert!(matches!(source, PageError::Status { status: 401, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn editable_playlists_filters_by_owner_and_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "display_name": "ana",
            "images": [{ "url": "http://img/avatar" }]
        })))
        .mount(&server)
        .await;
    let playlists = vec![
        json!({ "id": "keep", "name": "Mine", "owner": { "display_name": "ana" }, "tracks": { "total": 30 }, "images": [] }),
        json!({ "id": "short", "name": "Tiny", "owner": { "display_name": "ana" }, "tracks": { "total": 3 }, "images": null }),
        json!({ "id": "theirs", "name": "Shared", "owner": { "display_name": "bob" }, "tracks": { "total": 90 } }),
    ];
    mount_page(&server, "/me/playlists", "0", page(playlists, None), 1).await;

    let config = config_for(&server);
    let client = SpotifyClient::new(AccessToken::new(TOKEN), &config).unwrap();

    let profile = client.current_user_profile().await.unwrap();
    assert_eq!(profile.display_name.as_deref(), Some("ana"));
    assert_eq!(profile.image_url.as_deref(), Some("http://img/avatar"));

    let editable = client.editable_playlists().await.unwrap();
    let ids: Vec<&str> = editable.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["keep"]);
}

#[tokio::test]
async fn upload_sends_base64_jpeg() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/playlists/pl4/images"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "image/jpeg"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = SpotifyClient::new(AccessToken::new(TOKEN), &config).unwrap();
    let canvas = RgbImage::from_pixel(64, 64, Rgb([200, 10, 10]));
    let payload = playlist_covergen::pipeline::encode::encode_for_upload(&canvas, 80).unwrap();
    client.upload_cover("pl4", payload.clone()).await.unwrap();

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, payload.into_bytes());
}

#[tokio::test]
async fn upload_rejection_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/playlists/pl5/images"))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({ "error": { "status": 403, "message": "Insufficient client scope" } })),
        )
        .mount(&server)
        .await;

    let config = config_for(&server);
    let client = SpotifyClient::new(AccessToken::new(TOKEN), &config).unwrap();
    let err = client.upload_cover("pl5", "AAAA".into()).await.unwrap_err();
    assert!(matches!(
        err,
        CoverGenError::ApiError { status: 403, ref message, .. } if message == "Insufficient client scope"
    ));
}

// ── generate_cover ───────────────────────────────────────────────────────────

#[tokio::test]
async fn generates_cover_from_playlist_end_to_end() {
    let server = MockServer::start().await;
    let base = server.uri();

    let mut tracks: Vec<Value> = (0..4)
        .map(|i| track(&format!("song {i}"), &format!("{base}/img/{i}.png")))
        .collect();
    tracks.push(track("broken", &format!("{base}/img/missing.png")));
    mount_page(&server, "/playlists/pl6/tracks", "0", page(tracks, None), 1).await;

    for i in 0..4u8 {
        Mock::given(method("GET"))
            .and(path(format!("/img/{i}.png")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png([i * 60, 100, 50])))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/img/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let collage = CollageConfig::builder()
        .size(90, 90)
        .grid(3, 3)
        .gap(0)
        .large_cells(LargeCellPlacement::none())
        .rotation_degrees(0.0)
        .zoom(1.0)
        .output_format(OutputFormat::Png)
        .build()
        .unwrap();
    let config = GeneratorConfig::builder()
        .api_base_url(&base)
        .cache(fresh_cache())
        .shuffle_seed(5)
        .collage(collage)
        .build()
        .unwrap();

    let cover = generate_cover("spotify:playlist:pl6", AccessToken::new(TOKEN), &config)
        .await
        .unwrap();

    assert_eq!(cover.image.dimensions(), (90, 90));
    assert_eq!(cover.stats.tracks_fetched, 5);
    assert_eq!(cover.stats.unique_covers, 5);
    assert_eq!(cover.stats.failed_images, 1);
    assert_eq!(cover.stats.required_images, 9);
    assert_eq!(cover.stats.images_used, 9);
    assert_eq!(cover.stats.fetch_status, Some(FetchStatus::Complete));
    assert!(cover.stats.has_repeats());
}

#[tokio::test]
async fn generation_without_repeat_needs_enough_covers() {
    let server = MockServer::start().await;
    let base = server.uri();
    let tracks = vec![track("only", &format!("{base}/img/0.png"))];
    mount_page(&server, "/playlists/pl7/tracks", "0", page(tracks, None), 1).await;
    Mock::given(method("GET"))
        .and(path("/img/0.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png([1, 2, 3])))
        .mount(&server)
        .await;

    let config = GeneratorConfig::builder()
        .api_base_url(&base)
        .cache(fresh_cache())
        .repeat_images(false)
        .build()
        .unwrap();
    let err = generate_cover("pl7", AccessToken::new(TOKEN), &config)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoverGenError::NotEnoughImages {
            required: 19,
            available: 1
        }
    ));
}
