//! 统一的 API 错误类型与转换。

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::io::ErrorKind;

use crate::range::RangeError;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
    RangeNotSatisfiable(u64),
    Unauthorized(HeaderMap),
    PayloadTooLarge(u64),
}

fn error_body(status: StatusCode, headers: HeaderMap, message: &str) -> Response {
    (status, headers, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, HeaderMap::new(), &msg),
            ApiError::NotFound(msg) => error_body(StatusCode::NOT_FOUND, HeaderMap::new(), &msg),
            ApiError::Internal(msg) => {
                error_body(StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), &msg)
            }
            ApiError::RangeNotSatisfiable(size) => {
                let mut headers = HeaderMap::new();
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                error_body(
                    StatusCode::RANGE_NOT_SATISFIABLE,
                    headers,
                    "range not satisfiable",
                )
            }
            ApiError::Unauthorized(headers) => {
                error_body(StatusCode::UNAUTHORIZED, headers, "unauthorized")
            }
            ApiError::PayloadTooLarge(limit) => error_body(
                StatusCode::PAYLOAD_TOO_LARGE,
                HeaderMap::new(),
                &format!("upload exceeds limit of {limit} bytes"),
            ),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound => ApiError::NotFound("file not found".into()),
            StorageError::Io(err) => match err.kind() {
                ErrorKind::NotFound => ApiError::NotFound("file not found".into()),
                _ => ApiError::Internal(err.to_string()),
            },
        }
    }
}

impl From<RangeError> for ApiError {
    fn from(error: RangeError) -> Self {
        match error {
            RangeError::Malformed => ApiError::BadRequest("invalid Range header".into()),
            RangeError::Unsatisfiable { total } => ApiError::RangeNotSatisfiable(total),
        }
    }
}
