//! HTTP integration tests for the render endpoint.
//!
//! Tests verify:
//! - Valid tokens redirect to the stored thumbnail
//! - Invalid tokens and missing sources map to 403 / 404
//! - The render route follows the server URL's path
//! - Health check

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use lazythumb::io::SourceRef;
use lazythumb::thumbnail::{Options, SignedPayload};
use lazythumb::{create_router, RouterConfig};

use super::test_utils::{
    create_test_jpeg, decoded_size, deferred_settings, token_from_url, MockObjectStore,
    MockSourceStore, TestHarness, STORAGE_URL,
};

const SERVER_URL: &str = "https://thumbs.test/";

fn cat() -> SourceRef {
    SourceRef::key("photos/cat.jpg")
}

/// Build a router over a deferred-mode service, returning a token for a
/// 200x200 center crop of an 800x600 source.
async fn router_with_token(
    server_url: &str,
    config: RouterConfig,
) -> (Router, String, Arc<MockObjectStore>) {
    let sources = MockSourceStore::new().with_source(cat(), create_test_jpeg(800, 600));
    let harness = TestHarness::new(sources, deferred_settings(server_url));

    let mut options = Options::new();
    options.insert("crop", "center");
    let deferred = harness
        .service
        .get_thumbnail(Some(&cat()), "200x200", options)
        .await
        .unwrap()
        .unwrap();
    let token = token_from_url(deferred.url.as_deref().unwrap()).to_string();

    let TestHarness {
        service, storage, ..
    } = harness;
    (create_router(service, config), token, storage)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// =============================================================================
// Render Endpoint
// =============================================================================

#[tokio::test]
async fn test_valid_token_redirects_to_thumbnail() {
    let (router, token, storage) = router_with_token(SERVER_URL, RouterConfig::new()).await;

    let response = router
        .clone()
        .oneshot(get(&format!("/hash/{}", token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.starts_with(STORAGE_URL), "{}", location);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=3600"
    );
    assert_eq!(
        response.headers().get("x-thumbnail-status").unwrap(),
        "generated"
    );

    let name = location.strip_prefix(STORAGE_URL).unwrap();
    let (data, _) = storage.get(name).await.unwrap();
    assert_eq!(decoded_size(&data), (200, 200));

    // Second fetch is served from the metadata cache
    let response = router
        .oneshot(get(&format!("/hash/{}", token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get("x-thumbnail-status").unwrap(),
        "cached"
    );
    assert_eq!(response.headers().get("location").unwrap(), location.as_str());
    assert_eq!(storage.write_count(), 1);
}

#[tokio::test]
async fn test_cache_max_age_is_configurable() {
    let config = RouterConfig::new().with_cache_max_age(60);
    let (router, token, _) = router_with_token(SERVER_URL, config).await;

    let response = router
        .oneshot(get(&format!("/hash/{}", token)))
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=60"
    );
}

#[tokio::test]
async fn test_tampered_token_is_forbidden() {
    let (router, token, storage) = router_with_token(SERVER_URL, RouterConfig::new()).await;

    let (payload, _) = token.rsplit_once(':').unwrap();
    let tampered = format!("{}:AAAA", payload);

    let response = router
        .oneshot(get(&format!("/hash/{}", tampered)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = json_body(response).await;
    assert_eq!(json["error"], "invalid_signature");
    assert_eq!(json["status"], 403);
    assert_eq!(storage.write_count(), 0);
}

#[tokio::test]
async fn test_missing_source_is_not_found() {
    let harness = TestHarness::new(MockSourceStore::new(), deferred_settings(SERVER_URL));
    let payload = SignedPayload::new(SourceRef::key("gone.jpg"), "100x100", Options::new());
    let token = harness.service.signer().sign(&payload).unwrap();
    let router = create_router(harness.service, RouterConfig::new());

    let response = router
        .oneshot(get(&format!("/hash/{}", token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = json_body(response).await;
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_render_route_follows_base_path() {
    let server_url = "https://thumbs.test/media/";
    let config = RouterConfig::new().with_base_path("/media/");
    let (router, token, _) = router_with_token(server_url, config).await;

    let response = router
        .clone()
        .oneshot(get(&format!("/media/hash/{}", token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let response = router
        .oneshot(get(&format!("/hash/{}", token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let harness = TestHarness::new(MockSourceStore::new(), deferred_settings(SERVER_URL));
    let router = create_router(harness.service, RouterConfig::new());

    let response = router.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
