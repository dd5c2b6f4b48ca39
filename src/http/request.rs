//! Request metadata: request IDs and cancellation.
//!
//! # Responsibilities
//! - Generate a UUID v4 request ID for requests that arrive without one
//! - Echo the ID back on the response
//! - Expose the ID and an optional cancellation token to the middleware
//!
//! # Design Decisions
//! - Request ID added as early as possible so injected errors can carry it
//! - Cancellation is opt-in: an upstream layer or caller inserts a
//!   `RequestCancellation`; dropping the request future also cancels

use axum::http::{HeaderName, Request};
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer that assigns a UUID request ID when none is present.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Cancellation signal for one request, stored in the request extensions.
#[derive(Debug, Clone, Default)]
pub struct RequestCancellation(pub CancellationToken);

impl RequestCancellation {
    pub fn new() -> Self {
        Self(CancellationToken::new())
    }

    pub fn token(&self) -> &CancellationToken {
        &self.0
    }
}

/// Convenience accessors on incoming requests.
pub trait RequestIdExt {
    /// The request ID header value, if present and valid UTF-8.
    fn request_id(&self) -> Option<&str>;

    /// The cancellation token attached to this request, if any.
    fn cancellation(&self) -> Option<CancellationToken>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
    }

    fn cancellation(&self) -> Option<CancellationToken> {
        self.extensions()
            .get::<RequestCancellation>()
            .map(|c| c.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_request_id_from_header() {
        let req = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(req.request_id(), Some("abc-123"));

        let bare = Request::new(Body::empty());
        assert_eq!(bare.request_id(), None);
    }

    #[test]
    fn test_cancellation_extension() {
        let cancel = RequestCancellation::new();
        let mut req = Request::new(Body::empty());
        req.extensions_mut().insert(cancel.clone());

        let token = req.cancellation().unwrap();
        assert!(!token.is_cancelled());
        cancel.token().cancel();
        assert!(token.is_cancelled());
    }
}
