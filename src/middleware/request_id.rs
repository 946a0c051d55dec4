//! Per-request correlation id and the request span.
//!
//! A caller-supplied `x-request-id` is kept when it is short and made of
//! `[A-Za-z0-9_-]`; anything else is replaced by a fresh UUID. The id is
//! echoed on the response. The span leaves `user_id` empty for the auth
//! middleware to fill in.

use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{field, info_span, Instrument};
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    fn accept(candidate: &str) -> Option<Self> {
        let well_formed = (1..=MAX_LEN).contains(&candidate.len())
            && candidate
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        well_formed.then(|| Self(candidate.to_owned()))
    }

    pub fn for_request(headers: &HeaderMap) -> Self {
        headers
            .get(&REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::accept)
            .unwrap_or_else(|| Self(Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = RequestId::for_request(request.headers());

    let span = info_span!(
        "request",
        request_id = %id,
        method = %request.method(),
        path = %request.uri().path(),
        user_id = field::Empty,
    );
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_header(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER.clone(), HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_caller_id_is_reused() {
        assert_eq!(RequestId::for_request(&with_header("walk-42_A")).as_str(), "walk-42_A");
    }

    #[test]
    fn test_unsafe_ids_are_replaced_with_uuid() {
        let too_long = "x".repeat(MAX_LEN + 1);
        for bad in ["has space", "semi;colon", "a/b", too_long.as_str()] {
            let id = RequestId::for_request(&with_header(bad));
            assert!(Uuid::parse_str(id.as_str()).is_ok(), "{bad} was kept");
        }
    }

    #[test]
    fn test_missing_header_mints_distinct_ids() {
        let a = RequestId::for_request(&HeaderMap::new());
        let b = RequestId::for_request(&HeaderMap::new());
        assert_ne!(a, b);
    }
}
