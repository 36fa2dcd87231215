//! Request and response values passed between the front server, the worker and the network.

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Body of the response synthesized when a subresource cannot be fetched.
pub const OFFLINE_BODY: &str = "Network error occurred";

/// How a request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// Loading a top-level document.
    Navigate,
    /// Anything else: scripts, styles, images, API calls.
    #[default]
    Subresource,
}

/// Where a response came from, mirroring the Fetch `Response.type` values
/// the worker cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin network response.
    Basic,
    /// Cross-origin network response.
    Cors,
    /// Built locally rather than received from the network.
    Synthetic,
}

/// An outgoing resource request.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Absolute target URL.
    pub url: Url,
    /// Navigation or subresource.
    pub mode: RequestMode,
    /// Request headers forwarded to the network.
    pub headers: HeaderMap,
    /// Request payload, empty for `GET`.
    pub body: Bytes,
}

impl Request {
    /// Creates a request with an explicit method.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            mode: RequestMode::Subresource,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Creates a `GET` subresource request.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Creates a `GET` navigation request.
    #[must_use]
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_mode(RequestMode::Navigate)
    }

    /// Sets the request mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Adds a header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Whether the cache may answer or store this request. Only `GET` qualifies.
    #[must_use]
    pub fn is_cacheable_method(&self) -> bool {
        self.method == Method::GET
    }

    /// Sets the request payload.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns true for top-level document loads.
    #[must_use]
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A captured HTTP response.
///
/// Cloning is cheap: the body is reference counted, so duplicating a response
/// to both store and return it does not copy the payload.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Full response body.
    pub body: Bytes,
    /// Origin classification.
    pub kind: ResponseType,
    /// Final URL after redirects, `None` for synthesized responses.
    pub url: Option<Url>,
    /// Whether the network followed at least one redirect.
    pub redirected: bool,
}

impl Response {
    /// Creates a synthesized response with no headers.
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            kind: ResponseType::Synthetic,
            url: None,
            redirected: false,
        }
    }

    /// The plain-text `503 Service Unavailable` returned when a subresource
    /// cannot be fetched and nothing is cached for it.
    #[must_use]
    pub fn service_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_BODY)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
    }

    /// Adds a header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the canonical reason phrase for the status.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Returns the `Content-Type` header if present and valid UTF-8.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Whether this response may be written to the cache on a miss.
    ///
    /// Only plain same-origin `200` responses qualify: cross-origin,
    /// redirected and non-200 responses pass through unstored. The request
    /// side is checked separately with [`Request::is_cacheable_method`].
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && self.kind == ResponseType::Basic && !self.redirected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(status: StatusCode) -> Response {
        Response {
            kind: ResponseType::Basic,
            url: Some(Url::parse("https://portal.example.com/a.js").unwrap()),
            ..Response::new(status, "body")
        }
    }

    #[test]
    fn navigate_sets_mode() {
        let url = Url::parse("https://portal.example.com/").unwrap();
        assert!(Request::navigate(url.clone()).is_navigation());
        assert!(!Request::get(url).is_navigation());
    }

    #[test]
    fn only_get_is_cacheable() {
        let url = Url::parse("https://portal.example.com/submit").unwrap();
        assert!(Request::get(url.clone()).is_cacheable_method());
        assert!(Request::navigate(url.clone()).is_cacheable_method());
        for method in [Method::POST, Method::PUT, Method::HEAD, Method::DELETE] {
            assert!(!Request::new(method, url.clone()).is_cacheable_method());
        }
    }

    #[test]
    fn service_unavailable_is_plain_text_503() {
        let res = Response::service_unavailable();
        assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.status_text(), "Service Unavailable");
        assert_eq!(res.content_type(), Some("text/plain"));
        assert_eq!(&res.body[..], OFFLINE_BODY.as_bytes());
        assert!(!res.ok());
    }

    #[test]
    fn only_plain_same_origin_200_is_cacheable() {
        assert!(basic(StatusCode::OK).is_cacheable());
        assert!(!basic(StatusCode::NOT_FOUND).is_cacheable());
        assert!(!basic(StatusCode::NO_CONTENT).is_cacheable());

        let cors = Response {
            kind: ResponseType::Cors,
            ..basic(StatusCode::OK)
        };
        assert!(!cors.is_cacheable());

        let redirected = Response {
            redirected: true,
            ..basic(StatusCode::OK)
        };
        assert!(!redirected.is_cacheable());

        assert!(!Response::new(StatusCode::OK, "x").is_cacheable());
    }

    #[test]
    fn clone_shares_body() {
        let res = basic(StatusCode::OK);
        let copy = res.clone();
        assert_eq!(res.body.as_ptr(), copy.body.as_ptr());
    }
}
