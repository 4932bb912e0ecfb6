//! HTTP request handlers for the image proxy.
//!
//! # Endpoints
//!
//! - `GET /image/{options}/{*image_url}` - Serve a transformed image
//! - `GET /health` - Health check endpoint

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::ProxyError;
use crate::io::OriginFetcher;
use crate::proxy::ImageProxy;

/// Header reporting which tier served the response.
pub const CACHE_TIER_HEADER: HeaderName = HeaderName::from_static("x-cache-tier");

/// Default Cache-Control max-age: one year
pub const DEFAULT_CACHE_MAX_AGE: u32 = 31_536_000;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<F: OriginFetcher> {
    /// Request orchestrator
    pub proxy: ImageProxy<F>,

    /// Cache-Control max-age sent with every image, in seconds
    pub cache_max_age: u32,
}

impl<F: OriginFetcher> AppState<F> {
    /// Create application state with the default max-age.
    pub fn new(proxy: ImageProxy<F>) -> Self {
        Self::with_cache_max_age(proxy, DEFAULT_CACHE_MAX_AGE)
    }

    /// Create application state with a custom max-age.
    pub fn with_cache_max_age(proxy: ImageProxy<F>, cache_max_age: u32) -> Self {
        Self {
            proxy,
            cache_max_age,
        }
    }
}

impl<F: OriginFetcher> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            proxy: self.proxy.clone(),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for image requests.
///
/// Extracted from: `/image/{options}/{*image_url}`
#[derive(Debug, Deserialize)]
pub struct ImagePathParams {
    /// Comma-separated `key=value` transform options
    pub options: String,

    /// Source image URL (percent-decoded)
    pub image_url: String,
}

impl ImagePathParams {
    /// Full source URL, with the request's query string re-attached.
    ///
    /// The router splits `?...` off the request path, so an origin URL that
    /// carries its own query string would otherwise lose it.
    pub fn source_url(&self, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}?{}", self.image_url, q),
            _ => self.image_url.clone(),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier ("not_found" or "internal_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ProxyError to an HTTP response.
///
/// Only an unavailable origin gets its own status (404). Every other kind is
/// reported as a generic 500; the detail goes to the log, not the client.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            ProxyError::OriginUnavailable(_) => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Image not found at source URL.",
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Image processing failed.",
            ),
        };

        if status.is_server_error() {
            error!(
                error_kind = self.kind(),
                status = status.as_u16(),
                "Request failed: {}",
                self
            );
        } else {
            debug!(
                error_kind = self.kind(),
                status = status.as_u16(),
                "Source not found: {}",
                self
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image requests.
///
/// # Endpoint
///
/// `GET /image/{options}/{*image_url}`
///
/// # Response Headers
///
/// - `Content-Type: image/<format>`
/// - `Cache-Control: public, max-age=<cache_max_age>`
/// - `X-Cache-Tier: memory | distributed | durable | miss`
///
/// # Errors
///
/// - `404 Not Found` if the source image cannot be fetched
/// - `500 Internal Server Error` for every other failure
pub async fn image_handler<F: OriginFetcher>(
    State(state): State<AppState<F>>,
    Path(params): Path<ImagePathParams>,
    RawQuery(query): RawQuery,
) -> Result<Response, ProxyError> {
    let source_url = params.source_url(query.as_deref());

    let response = state.proxy.handle(&source_url, &params.options).await?;
    let tier = response.tier_label();

    debug!(
        url = %source_url,
        options = %params.options,
        tier = tier,
        bytes = response.data.len(),
        "Serving image"
    );

    Ok((
        [
            (header::CONTENT_TYPE, response.content_type),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_max_age),
            ),
            (CACHE_TIER_HEADER, tier.to_string()),
        ],
        response.data,
    )
        .into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
