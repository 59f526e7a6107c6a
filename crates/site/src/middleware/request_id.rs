//! Request correlation ids.
//!
//! The site runs behind an edge proxy that usually stamps requests with
//! an `x-request-id` header. That id is reused when it looks sane and
//! replaced with a fresh UUID v4 when it is missing or malformed, then
//! recorded on the tracing span, tagged on the Sentry scope, and echoed
//! in the response so a support ticket can quote it.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request ids.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream id accepted verbatim.
const MAX_REQUEST_ID_LENGTH: usize = 64;

/// An upstream id is kept only when it is non-empty, bounded, and plain
/// token text. Anything else gets a fresh id rather than flowing into
/// logs and response headers.
fn acceptable_request_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= MAX_REQUEST_ID_LENGTH
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

fn resolve_request_id(upstream: Option<&str>) -> String {
    match upstream {
        Some(id) if acceptable_request_id(id) => id.to_owned(),
        _ => Uuid::new_v4().to_string(),
    }
}

/// Middleware that ensures every request carries a correlation id.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let upstream = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok());
    let request_id = resolve_request_id(upstream);

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_is_kept() {
        let id = resolve_request_id(Some("edge-7f3a2.41"));
        assert_eq!(id, "edge-7f3a2.41");
    }

    #[test]
    fn test_missing_id_gets_a_uuid() {
        let id = resolve_request_id(None);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_malformed_ids_are_replaced() {
        for bad in ["", "has space", "quote\"inject", &"x".repeat(65)] {
            let id = resolve_request_id(Some(bad));
            assert!(Uuid::parse_str(&id).is_ok(), "kept malformed id {bad:?}");
        }
    }
}
