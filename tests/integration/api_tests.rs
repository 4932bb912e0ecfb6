//! HTTP API integration tests.
//!
//! These drive the full router with a mock origin and an in-process memory
//! tier, checking status codes, headers and the transformed bodies.

use axum::{body::Body, Router};
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use img_proxy::cache::{MemoryCache, TierChain, DEFAULT_TIER_TIMEOUT};
use img_proxy::proxy::ImageProxy;
use img_proxy::server::{create_router, ErrorResponse, HealthResponse, RouterConfig};

use super::test_utils::{
    create_jpeg, create_png, dimensions, is_valid_jpeg, is_valid_webp, MockOrigin,
};

const SOURCE_URL: &str = "https://example.com/photo.png";

fn build_router(origin: MockOrigin) -> Router {
    build_router_with_config(origin, RouterConfig::new())
}

fn build_router_with_config(origin: MockOrigin, config: RouterConfig) -> Router {
    let chain = TierChain::new(DEFAULT_TIER_TIMEOUT).with_tier(Arc::new(MemoryCache::default()));
    let proxy = ImageProxy::new(chain, origin);
    create_router(proxy, config.with_tracing(false))
}

async fn get(router: &Router, uri: &str) -> http::Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: http::Response<Body>) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn header<'a>(response: &'a http::Response<Body>, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
}

async fn assert_error(response: http::Response<Body>, status: StatusCode, kind: &str) {
    assert_eq!(response.status(), status);
    assert_eq!(header(&response, "content-type"), "application/json");

    let body = body_bytes(response).await;
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, kind);
    assert_eq!(error.status, Some(status.as_u16()));
}

// =============================================================================
// Successful Transforms
// =============================================================================

#[tokio::test]
async fn test_resize_to_webp() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(1600, 1200)).await;
    let router = build_router(origin.clone());

    let response = get(
        &router,
        "/image/width=800,format=webp,quality=80/https://example.com/photo.png",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/webp");
    assert_eq!(
        header(&response, "cache-control"),
        "public, max-age=31536000"
    );
    assert_eq!(header(&response, "x-cache-tier"), "miss");

    let body = body_bytes(response).await;
    assert!(is_valid_webp(&body));
    assert_eq!(dimensions(&body), (800, 600));
    assert_eq!(origin.fetch_count(), 1);
}

#[tokio::test]
async fn test_repeat_request_served_from_memory() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(400, 300)).await;
    let router = build_router(origin.clone());
    let uri = "/image/width=200/https://example.com/photo.png";

    let first = get(&router, uri).await;
    assert_eq!(header(&first, "x-cache-tier"), "miss");
    let first_body = body_bytes(first).await;

    let second = get(&router, uri).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(header(&second, "x-cache-tier"), "memory");
    assert_eq!(header(&second, "content-type"), "image/webp");
    let second_body = body_bytes(second).await;

    assert_eq!(first_body, second_body);
    assert_eq!(origin.fetch_count(), 1);
}

#[tokio::test]
async fn test_centered_crop() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(2000, 1000)).await;
    let router = build_router(origin);

    let response = get(
        &router,
        "/image/width=500,h=500,fit=crop,format=png/https://example.com/photo.png",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/png");

    let body = body_bytes(response).await;
    let img = image::load_from_memory(&body).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (500, 500));

    // Top-left of the output is source pixel (750, 250)
    assert_eq!(img.get_pixel(0, 0).0, [238, 250, 232]);
}

#[tokio::test]
async fn test_auto_dimensions_keep_source_size() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(321, 123)).await;
    let router = build_router(origin);

    let response = get(
        &router,
        "/image/width=auto,h=auto/https://example.com/photo.png",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_bytes(response).await;
    assert_eq!(dimensions(&body), (321, 123));
}

#[tokio::test]
async fn test_jpeg_output() {
    let origin = MockOrigin::new();
    let url = "https://example.com/photo.jpg";
    origin.serve(url, create_jpeg(640, 480)).await;
    let router = build_router(origin);

    let response = get(
        &router,
        "/image/h=240,format=jpeg,quality=60/https://example.com/photo.jpg",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/jpeg");

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));
    assert_eq!(dimensions(&body), (320, 240));
}

#[tokio::test]
async fn test_custom_cache_max_age() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(64, 64)).await;
    let router =
        build_router_with_config(origin, RouterConfig::new().with_cache_max_age(3600));

    let response = get(&router, "/image/width=32/https://example.com/photo.png").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "cache-control"), "public, max-age=3600");
}

// =============================================================================
// Source URL Handling
// =============================================================================

#[tokio::test]
async fn test_query_string_is_part_of_source_url() {
    let origin = MockOrigin::new();
    origin
        .serve("https://example.com/photo.png?v=2&size=large", create_png(100, 100))
        .await;
    let router = build_router(origin.clone());

    let response = get(
        &router,
        "/image/width=50/https://example.com/photo.png?v=2&size=large",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        origin.fetched_urls().await,
        vec!["https://example.com/photo.png?v=2&size=large".to_string()]
    );
}

#[tokio::test]
async fn test_percent_encoded_source_url() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(100, 100)).await;
    let router = build_router(origin.clone());

    let response = get(
        &router,
        "/image/width=50/https%3A%2F%2Fexample.com%2Fphoto.png",
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(origin.fetched_urls().await, vec![SOURCE_URL.to_string()]);
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_unknown_fit_mode_rejected_before_fetch() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(100, 100)).await;
    let router = build_router(origin.clone());

    let response = get(&router, "/image/fit=zoom/https://example.com/photo.png").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_bytes(response).await;
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "internal_error");
    assert_eq!(error.message, "Image processing failed.");
    assert_eq!(error.status, Some(500));

    assert_eq!(origin.fetch_count(), 0);
}

#[tokio::test]
async fn test_invalid_quality_rejected_before_fetch() {
    let origin = MockOrigin::new();
    let router = build_router(origin.clone());

    let response = get(&router, "/image/quality=0/https://example.com/photo.png").await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;

    let response = get(&router, "/image/width=abc/https://example.com/photo.png").await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;

    assert_eq!(origin.fetch_count(), 0);
}

#[tokio::test]
async fn test_oversized_dimensions_rejected_before_fetch() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(10, 10)).await;
    let router = build_router(origin.clone());

    let response = get(
        &router,
        "/image/width=4000000000/https://example.com/photo.png",
    )
    .await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;

    let response = get(
        &router,
        "/image/width=4000000000,h=4000000000,fit=fill/https://example.com/photo.png",
    )
    .await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;

    assert_eq!(origin.fetch_count(), 0);

    // The server keeps answering afterwards
    let response = get(&router, "/image/width=5,format=png/https://example.com/photo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_derived_dimension_rejected() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(1, 100)).await;
    let router = build_router(origin.clone());

    // h derives to 409600 from the 1x100 aspect ratio
    let response = get(&router, "/image/width=4096/https://example.com/photo.png").await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;
    assert_eq!(origin.fetch_count(), 1);
}

#[tokio::test]
async fn test_custom_max_dimension() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(100, 100)).await;
    let chain = TierChain::new(DEFAULT_TIER_TIMEOUT).with_tier(Arc::new(MemoryCache::default()));
    let proxy = ImageProxy::new(chain, origin).with_max_dimension(64);
    let router = create_router(proxy, RouterConfig::new().with_tracing(false));

    let response = get(&router, "/image/width=64,format=png/https://example.com/photo.png").await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = get(&router, "/image/width=65,format=png/https://example.com/photo.png").await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;
}

#[tokio::test]
async fn test_origin_not_found() {
    let origin = MockOrigin::new();
    origin.serve_status(SOURCE_URL, 404).await;
    let router = build_router(origin);

    let response = get(&router, "/image/width=100/https://example.com/photo.png").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_bytes(response).await;
    let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "not_found");
    assert_eq!(error.message, "Image not found at source URL.");
    assert_eq!(error.status, Some(404));
}

#[tokio::test]
async fn test_origin_server_error_maps_to_not_found() {
    let origin = MockOrigin::new();
    origin.serve_status(SOURCE_URL, 503).await;
    let router = build_router(origin);

    let response = get(&router, "/image/width=100/https://example.com/photo.png").await;
    assert_error(response, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn test_origin_unreachable_maps_to_not_found() {
    let router = build_router(MockOrigin::unreachable());

    let response = get(&router, "/image/width=100/https://example.com/photo.png").await;
    assert_error(response, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn test_undecodable_source() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, b"definitely not an image".to_vec()).await;
    let router = build_router(origin);

    let response = get(&router, "/image/width=100/https://example.com/photo.png").await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;
}

#[tokio::test]
async fn test_unsupported_output_format() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(100, 100)).await;
    let router = build_router(origin.clone());

    let response = get(&router, "/image/format=bmp/https://example.com/photo.png").await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;

    // Format is only checked at encode time, after the fetch
    assert_eq!(origin.fetch_count(), 1);
}

#[tokio::test]
async fn test_crop_larger_than_source() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(100, 100)).await;
    let router = build_router(origin);

    let response = get(
        &router,
        "/image/width=200,h=50,fit=crop/https://example.com/photo.png",
    )
    .await;
    assert_error(response, StatusCode::INTERNAL_SERVER_ERROR, "internal_error").await;
}

#[tokio::test]
async fn test_errors_are_not_cached() {
    let origin = MockOrigin::new();
    origin.serve_status(SOURCE_URL, 404).await;
    let router = build_router(origin.clone());
    let uri = "/image/width=100/https://example.com/photo.png";

    let response = get(&router, uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    origin.serve(SOURCE_URL, create_png(200, 200)).await;

    let response = get(&router, uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-cache-tier"), "miss");
    assert_eq!(origin.fetch_count(), 2);
}

#[tokio::test]
async fn test_missing_image_url_segment() {
    let router = build_router(MockOrigin::new());

    let response = get(&router, "/image/width=100").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Health & CORS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let router = build_router(MockOrigin::new());

    let response = get(&router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_cors_allows_any_origin_by_default() {
    let origin = MockOrigin::new();
    origin.serve(SOURCE_URL, create_png(50, 50)).await;
    let router = build_router(origin);

    let request = Request::builder()
        .uri("/image/width=10/https://example.com/photo.png")
        .header("origin", "https://site.example")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "access-control-allow-origin"), "*");
}
