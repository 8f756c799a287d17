//! Wire-level request: the fully resolved, transport-ready form of a call.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default per-request timeout applied at the transport boundary.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Cache directive carried to the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Let the transport follow standard HTTP caching semantics
    #[default]
    UseProtocolCachePolicy,
    /// Always go to the origin
    ReloadIgnoringCacheData,
    /// Prefer cached data, load from the origin otherwise
    ReturnCacheDataElseLoad,
    /// Use cached data only; never load
    ReturnCacheDataDontLoad,
}

/// Immutable, transport-ready HTTP request.
///
/// Modifications go through the `with_*` methods, which consume `self` and
/// return the updated request, so every middleware step produces a new value.
#[derive(Debug, Clone)]
pub struct WireRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Duration,
    cache_policy: CachePolicy,
}

impl WireRequest {
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_policy: CachePolicy::default(),
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and visible ASCII
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn cache_policy(&self) -> CachePolicy {
        self.cache_policy
    }

    /// Set a header, replacing any existing value (names are case-insensitive)
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn without_header(mut self, name: &HeaderName) -> Self {
        self.headers.remove(name);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Option<Bytes>) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cache_policy(mut self, cache_policy: CachePolicy) -> Self {
        self.cache_policy = cache_policy;
        self
    }

    /// Convert into an `http::Request` for tower/hyper based transports.
    ///
    /// # Errors
    /// Returns `http::Error` if the parts cannot form a valid request.
    pub fn to_http(&self) -> Result<http::Request<Full<Bytes>>, http::Error> {
        let mut request = http::Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone())
            .body(Full::new(self.body.clone().unwrap_or_default()))?;
        *request.headers_mut() = self.headers.clone();
        Ok(request)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn request() -> WireRequest {
        WireRequest::new(Method::GET, Uri::from_static("https://example.com/a"))
    }

    #[test]
    fn test_defaults() {
        let req = request();
        assert_eq!(req.timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(req.cache_policy(), CachePolicy::UseProtocolCachePolicy);
        assert!(req.body().is_none());
        assert!(req.headers().is_empty());
    }

    #[test]
    fn test_with_header_is_case_insensitive_last_write_wins() {
        let req = request()
            .with_header(
                HeaderName::from_static("x-test"),
                HeaderValue::from_static("one"),
            )
            .with_header(
                HeaderName::from_bytes(b"X-Test").unwrap(),
                HeaderValue::from_static("two"),
            );
        assert_eq!(req.header("x-test"), Some("two"));
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn test_functional_update_leaves_original_untouched() {
        let original = request();
        let updated = original
            .clone()
            .with_header(
                HeaderName::from_static("x-a"),
                HeaderValue::from_static("1"),
            )
            .with_body(Some(Bytes::from_static(b"hi")));
        assert!(original.headers().is_empty());
        assert!(original.body().is_none());
        assert_eq!(updated.header("x-a"), Some("1"));
    }

    #[test]
    fn test_to_http_carries_parts() {
        let req = request()
            .with_method(Method::POST)
            .with_header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain"),
            )
            .with_body(Some(Bytes::from_static(b"payload")));
        let http_req = req.to_http().unwrap();
        assert_eq!(http_req.method(), Method::POST);
        assert_eq!(http_req.uri(), "https://example.com/a");
        assert_eq!(http_req.headers()[http::header::CONTENT_TYPE], "text/plain");
    }
}
