//! Error taxonomy shared by the injection engine and the wrapped pipeline.
//!
//! `AppError` is the object every synthetic failure is built from. It carries
//! a coarse `ErrorType` (which decides the HTTP status), a machine-readable
//! code, a human message and, when known, the request ID.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Coarse classification of an application error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    BadRequest,
    Unauthorized,
    Forbidden,
    ObjectNotFound,
    Conflict,
    RateLimited,
    Internal,
    Storage,
    #[serde(alias = "task_leak")]
    GoroutineLeak,
    ServiceUnavailable,
    Timeout,
}

impl ErrorType {
    /// Wire name, as it appears in `error_type` fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::BadRequest => "bad_request",
            ErrorType::Unauthorized => "unauthorized",
            ErrorType::Forbidden => "forbidden",
            ErrorType::ObjectNotFound => "object_not_found",
            ErrorType::Conflict => "conflict",
            ErrorType::RateLimited => "rate_limited",
            ErrorType::Internal => "internal",
            ErrorType::Storage => "storage",
            ErrorType::GoroutineLeak => "goroutine_leak",
            ErrorType::ServiceUnavailable => "service_unavailable",
            ErrorType::Timeout => "timeout",
        }
    }

    /// Parse a rule's free-form error type. Unknown names map to `Internal`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "bad_request" => ErrorType::BadRequest,
            "unauthorized" => ErrorType::Unauthorized,
            "forbidden" => ErrorType::Forbidden,
            "object_not_found" | "not_found" => ErrorType::ObjectNotFound,
            "conflict" => ErrorType::Conflict,
            "rate_limited" => ErrorType::RateLimited,
            "storage" => ErrorType::Storage,
            "goroutine_leak" | "task_leak" => ErrorType::GoroutineLeak,
            "service_unavailable" => ErrorType::ServiceUnavailable,
            "timeout" => ErrorType::Timeout,
            _ => ErrorType::Internal,
        }
    }

    /// HTTP status a response carrying this error type is sent with.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorType::BadRequest => StatusCode::BAD_REQUEST,
            ErrorType::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorType::Forbidden => StatusCode::FORBIDDEN,
            ErrorType::ObjectNotFound => StatusCode::NOT_FOUND,
            ErrorType::Conflict => StatusCode::CONFLICT,
            ErrorType::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorType::Internal | ErrorType::Storage | ErrorType::GoroutineLeak => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorType::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorType::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An application-level error with a stable JSON representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct AppError {
    pub error_type: ErrorType,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    pub fn new(error_type: ErrorType, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type,
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.error_type.http_status()
    }

    /// The `{"success": false, "error": ..}` body shape used by every error
    /// response, injected or not.
    pub fn body(&self) -> Value {
        json!({
            "success": false,
            "error": self.to_string(),
            "error_type": self.error_type.as_str(),
            "error_code": self.code,
            "request_id": self.request_id,
        })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.http_status(), Json(self.body())).into_response()
    }
}
