//! HTTP request handlers for the deferred-render API.
//!
//! # Endpoints
//!
//! - `GET /hash/{token}` - Render a signed thumbnail request and redirect to it
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{IoError, ThumbnailError};
use crate::thumbnail::{LazyThumbnailService, ThumbnailStatus};

/// Default `Cache-Control` max-age for render redirects, in seconds.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the thumbnail service.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// The service that verifies and renders deferred requests
    pub service: Arc<LazyThumbnailService>,

    /// Cache control max-age for redirects, in seconds
    pub cache_max_age: u32,
}

impl AppState {
    pub fn new(service: LazyThumbnailService) -> Self {
        Self::with_cache_max_age(service, DEFAULT_CACHE_MAX_AGE)
    }

    pub fn with_cache_max_age(service: LazyThumbnailService, cache_max_age: u32) -> Self {
        Self {
            service: Arc::new(service),
            cache_max_age,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_signature")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    pub status: u16,
}

impl ErrorResponse {
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ThumbnailError to HTTP response.
///
/// - 5xx errors are logged at ERROR level
/// - 404s at DEBUG level
/// - other 4xx errors at WARN level
impl IntoResponse for ThumbnailError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ThumbnailError::InvalidGeometry { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_geometry")
            }
            ThumbnailError::InvalidOptions { .. } => (StatusCode::BAD_REQUEST, "invalid_options"),
            ThumbnailError::InvalidSignature => (StatusCode::FORBIDDEN, "invalid_signature"),

            ThumbnailError::SourceFetchFailed(io_err) => match io_err {
                IoError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                IoError::Unsupported(_) => (StatusCode::NOT_FOUND, "unsupported_source"),
                IoError::Connection(_) => (StatusCode::BAD_GATEWAY, "connection_error"),
                _ => (StatusCode::BAD_GATEWAY, "source_error"),
            },
            ThumbnailError::DecodeError { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "decode_error")
            }

            ThumbnailError::TransformFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "transform_failed")
            }
            ThumbnailError::EncodeError { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "encode_error")
            }
            ThumbnailError::InvalidServerUrl { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error")
            }
            ThumbnailError::Storage(IoError::Connection(_)) => {
                (StatusCode::BAD_GATEWAY, "connection_error")
            }
            ThumbnailError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle deferred-render requests.
///
/// # Endpoint
///
/// `GET /hash/{token}`
///
/// # Response
///
/// - `302 Found`: redirect to the rendered thumbnail in storage
/// - `403 Forbidden`: token does not verify
/// - `404 Not Found`: source no longer exists
/// - `422 Unprocessable Entity`: source is not a decodable image
/// - `500 Internal Server Error`: rendering or storage failure
///
/// # Headers
///
/// - `Location`: storage URL of the thumbnail
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Thumbnail-Status`: `generated`, `cached` or `existing`
pub async fn render_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Response, ThumbnailError> {
    let thumbnail = state.service.render_token(&token).await?;
    let location = thumbnail
        .url
        .clone()
        .ok_or_else(|| ThumbnailError::transform("rendered thumbnail has no URL"))?;

    debug!(
        key = thumbnail.key.as_deref().unwrap_or_default(),
        status = status_name(thumbnail.status),
        "Redirecting to thumbnail"
    );

    Ok((
        StatusCode::FOUND,
        [
            (header::LOCATION, location),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={}", state.cache_max_age),
            ),
            (
                header::HeaderName::from_static("x-thumbnail-status"),
                status_name(thumbnail.status).to_string(),
            ),
        ],
    )
        .into_response())
}

/// Handle health check requests.
///
/// `GET /health` returns `{"status": "healthy", "version": "..."}`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn status_name(status: ThumbnailStatus) -> &'static str {
    match status {
        ThumbnailStatus::Cached => "cached",
        ThumbnailStatus::Generated => "generated",
        ThumbnailStatus::Existing => "existing",
        ThumbnailStatus::Deferred => "deferred",
        ThumbnailStatus::Dummy => "dummy",
        ThumbnailStatus::NotFound => "not_found",
    }
}

// =============================================================================
// Tests
// =============================================================================
