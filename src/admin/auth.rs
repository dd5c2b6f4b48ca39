use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AdminState;
use crate::error::{AppError, ErrorType};
use crate::http::request::RequestIdExt;

/// Rejects requests without `Authorization: Bearer <api_key>`.
pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == &*state.api_key);

    if authorized {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected unauthenticated admin request");
    AppError::new(ErrorType::Unauthorized, "UNAUTHORIZED", "Missing or invalid API key")
        .with_request_id(request.request_id().map(str::to_owned))
        .into_response()
}
