//! Maps license errors to HTTP responses.
//!
//! Admin failures keep the `{success:false, error?}` body shape the clients
//! expect. Internal details are logged, never returned.

use crate::routes::StatusResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use keyguard_license::LicenseError;
use thiserror::Error;
use tracing::error;

/// Request failure with an HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Admin secret mismatch (403, no body detail).
    #[error("forbidden")]
    Forbidden,

    /// Target key does not exist (200 with `key_not_found`).
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Key already exists and reissue is disabled (409).
    #[error("key exists: {0}")]
    KeyExists(String),

    /// Unparsable `expires` value (400).
    #[error("invalid expires: {0}")]
    InvalidExpiry(String),

    /// Storage failure (500). Message is logged, not returned.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, Option<&'static str>) {
        match self {
            Self::Forbidden => (StatusCode::FORBIDDEN, None),
            Self::KeyNotFound(_) => (StatusCode::OK, Some("key_not_found")),
            Self::KeyExists(_) => (StatusCode::CONFLICT, Some("key_exists")),
            Self::InvalidExpiry(_) => (StatusCode::BAD_REQUEST, Some("invalid_expires")),
            Self::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, Some("storage_error")),
        }
    }
}

impl From<LicenseError> for ApiError {
    fn from(err: LicenseError) -> Self {
        match err {
            LicenseError::Forbidden => Self::Forbidden,
            LicenseError::NotFound(key) => Self::KeyNotFound(key),
            LicenseError::KeyExists(key) => Self::KeyExists(key),
            LicenseError::InvalidExpiry(value) => Self::InvalidExpiry(value),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Storage(msg) = &self {
            error!("Request failed on storage: {msg}");
        }
        let (status, code) = self.status_and_code();
        let body = StatusResponse {
            success: false,
            error: code.map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}
