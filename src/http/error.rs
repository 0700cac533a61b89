//! The one place where failures become status codes.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::media::scanner::ScanError;
use crate::stream::responder::StreamError;

#[derive(Debug)]
pub enum ApiError {
    NotFound {
        code: &'static str,
        message: String,
    },
    /// 416 with `Content-Range: bytes */{size}`, `Accept-Ranges` and no body.
    RangeNotSatisfiable { size: u64 },
    Unauthorized,
    /// 500. `detail` is logged always and sent only when `expose` is set.
    Internal { detail: String, expose: bool },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            message: message.into(),
        }
    }

    pub fn internal(detail: impl Into<String>, expose: bool) -> Self {
        Self::Internal {
            detail: detail.into(),
            expose,
        }
    }

    /// Map a responder error. `development` controls whether I/O detail
    /// reaches the client.
    pub fn from_stream(err: StreamError, development: bool) -> Self {
        match err {
            StreamError::UnknownVideo(_) => Self::not_found("unknown_video", err.to_string()),
            // The message names the id only; server paths stay in the log.
            StreamError::FileMissing { ref id, .. } => {
                Self::not_found("file_missing", format!("video {id} is no longer on disk"))
            }
            StreamError::RangeNotSatisfiable { size } => Self::RangeNotSatisfiable { size },
            StreamError::Io { .. } => Self::internal(err.to_string(), development),
        }
    }

    pub fn from_scan(err: ScanError, development: bool) -> Self {
        Self::internal(err.to_string(), development)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            ApiError::RangeNotSatisfiable { size } => {
                return (
                    status,
                    [
                        (header::CONTENT_RANGE, format!("bytes */{size}")),
                        (header::ACCEPT_RANGES, "bytes".to_string()),
                    ],
                    Body::empty(),
                )
                    .into_response();
            }
            ApiError::NotFound { code, message } => (code, message),
            ApiError::Unauthorized => ("unauthorized", "access code required".to_string()),
            ApiError::Internal { detail, expose } => {
                tracing::error!(status = %status, error = %detail, "Server error in API handler");
                let message = if expose {
                    detail
                } else {
                    "internal server error".to_string()
                };
                ("internal_error", message)
            }
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}
