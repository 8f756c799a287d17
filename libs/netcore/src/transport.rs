use crate::config::TransportConfig;
use crate::error::{BoxError, TransportError, TransportErrorKind};
use crate::wire::{CachePolicy, WireRequest};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CACHE_CONTROL;
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use tower::{Service, ServiceExt};

/// Raw outcome of a successful exchange, whatever the status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Sends a wire request and returns the raw response.
///
/// Implementations must be safe for concurrent use. Cancellation is
/// cooperative: callers drop the returned future to abandon an in-flight
/// exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    /// Returns a classified [`TransportError`] when no response was received.
    async fn send(&self, request: &WireRequest) -> Result<TransportResponse, TransportError>;
}

/// Response body exceeded the configured limit.
#[derive(Error, Debug)]
#[error("response body too large: limit {limit} bytes, got at least {actual} bytes")]
pub struct BodyTooLarge {
    pub limit: usize,
    pub actual: usize,
}

/// Adapts any tower [`Service`] over `http::Request<Full<Bytes>>` into a
/// [`Transport`], collecting the response body up to `max_body_size` bytes.
#[derive(Debug, Clone)]
pub struct ServiceTransport<S> {
    service: S,
    max_body_size: usize,
}

impl<S> ServiceTransport<S> {
    #[must_use]
    pub fn new(service: S, max_body_size: usize) -> Self {
        Self {
            service,
            max_body_size,
        }
    }
}

#[async_trait]
impl<S, B> Transport for ServiceTransport<S>
where
    S: Service<http::Request<Full<Bytes>>, Response = http::Response<B>>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    async fn send(&self, request: &WireRequest) -> Result<TransportResponse, TransportError> {
        let mut http_request = request.to_http().map_err(TransportError::other)?;
        apply_cache_policy(request.cache_policy(), http_request.headers_mut());

        let response = self
            .service
            .clone()
            .oneshot(http_request)
            .await
            .map_err(|e| classify_error(e.into()))?;

        let (parts, body) = response.into_parts();
        let body = read_body_limited(body, self.max_body_size).await?;

        Ok(TransportResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

/// Reload requests must bypass caches; other policies are left to HTTP
/// caching semantics.
fn apply_cache_policy(policy: CachePolicy, headers: &mut HeaderMap) {
    if policy == CachePolicy::ReloadIgnoringCacheData && !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }
}

async fn read_body_limited<B>(body: B, limit: usize) -> Result<Bytes, TransportError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|e| classify_error(e.into()))?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(TransportError::other(BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                }));
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

/// Classify a transport fault by walking its source chain.
///
/// Connect failures map to `NotConnected`; resets, aborts and truncated
/// messages to `ConnectionLost`; timeouts to `TimedOut`. Anything else is
/// `Other` and therefore not retried.
#[must_use]
pub fn classify_error(err: BoxError) -> TransportError {
    let kind = classify_kind(err.as_ref());
    TransportError::new(kind, err)
}

fn classify_kind(err: &(dyn StdError + 'static)) -> TransportErrorKind {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::TimedOut => return TransportErrorKind::TimedOut,
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof => return TransportErrorKind::ConnectionLost,
                std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::AddrNotAvailable
                | std::io::ErrorKind::HostUnreachable
                | std::io::ErrorKind::NetworkUnreachable => return TransportErrorKind::NotConnected,
                _ => {}
            }
        }
        if let Some(h) = e.downcast_ref::<hyper::Error>() {
            if h.is_timeout() {
                return TransportErrorKind::TimedOut;
            }
            if h.is_incomplete_message() || h.is_closed() || h.is_canceled() {
                return TransportErrorKind::ConnectionLost;
            }
        }
        if e.is::<tokio::time::error::Elapsed>() {
            return TransportErrorKind::TimedOut;
        }
        if let Some(legacy) = e.downcast_ref::<hyper_util::client::legacy::Error>()
            && legacy.is_connect()
        {
            return classify_connect(legacy);
        }
        current = e.source();
    }
    TransportErrorKind::Other
}

/// Connect failures are `NotConnected` unless the cause was a timeout.
fn classify_connect(err: &hyper_util::client::legacy::Error) -> TransportErrorKind {
    match err.source().map(classify_kind) {
        Some(TransportErrorKind::TimedOut) => TransportErrorKind::TimedOut,
        _ => TransportErrorKind::NotConnected,
    }
}

/// Hyper client type used by [`HyperTransport`].
pub type HyperClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Default transport: a pooled hyper client over rustls with webpki roots.
#[derive(Debug, Clone)]
pub struct HyperTransport {
    inner: ServiceTransport<HyperClient>,
}

impl HyperTransport {
    /// Build with [`TransportConfig::default`].
    ///
    /// # Errors
    /// Returns `TransportError` if the TLS connector cannot be initialized.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_config(&TransportConfig::default())
    }

    /// # Errors
    /// Returns `TransportError` if the TLS connector cannot be initialized.
    pub fn with_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let https = build_https_connector(config.allow_http)?;

        let mut client_builder = Client::builder(TokioExecutor::new());
        // pool_timer is required for pool_idle_timeout to take effect
        client_builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout);

        let client = client_builder.build::<_, Full<Bytes>>(https);
        Ok(Self {
            inner: ServiceTransport::new(client, config.max_body_size),
        })
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: &WireRequest) -> Result<TransportResponse, TransportError> {
        tracing::trace!(method = %request.method(), uri = %request.uri(), "sending request");
        self.inner.send(request).await
    }
}

/// HTTP/2 is negotiated via ALPN alongside HTTP/1.1.
fn build_https_connector(allow_http: bool) -> Result<HttpsConnector<HttpConnector>, TransportError> {
    let builder = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(crypto_provider())
        .map_err(TransportError::other)?;
    let connector = if allow_http {
        builder.https_or_http().enable_all_versions().build()
    } else {
        builder.https_only().enable_all_versions().build()
    };
    Ok(connector)
}

/// Use the process-wide rustls provider if one is installed, otherwise a
/// local aws-lc-rs provider (not installed globally).
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use http::{Method, Uri};
    use std::convert::Infallible;
    use std::future::Future;

    fn request() -> WireRequest {
        WireRequest::new(Method::GET, Uri::from_static("http://example.com/a"))
    }

    fn echo_service(
        body: &'static [u8],
    ) -> impl Service<
        http::Request<Full<Bytes>>,
        Response = http::Response<Full<Bytes>>,
        Error = Infallible,
        Future = impl Future<Output = Result<http::Response<Full<Bytes>>, Infallible>> + Send,
    > + Clone
    + Send
    + Sync
    + 'static {
        tower::service_fn(move |req: http::Request<Full<Bytes>>| async move {
            let mut response = http::Response::new(Full::new(Bytes::from_static(body)));
            *response.status_mut() = StatusCode::ACCEPTED;
            if let Some(cc) = req.headers().get(CACHE_CONTROL) {
                response.headers_mut().insert("x-seen-cache-control", cc.clone());
            }
            Ok::<_, Infallible>(response)
        })
    }

    #[tokio::test]
    async fn test_service_transport_collects_response() {
        let transport = ServiceTransport::new(echo_service(b"hello"), 1024);
        let response = transport.send(&request()).await.unwrap();
        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(response.body, Bytes::from_static(b"hello"));
        assert!(response.headers.get("x-seen-cache-control").is_none());
    }

    #[tokio::test]
    async fn test_service_transport_enforces_body_limit() {
        let transport = ServiceTransport::new(echo_service(b"0123456789"), 4);
        let err = transport.send(&request()).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Other);
        assert!(err.into_source().downcast_ref::<BodyTooLarge>().is_some());
    }

    #[tokio::test]
    async fn test_reload_policy_sets_no_cache() {
        let transport = ServiceTransport::new(echo_service(b""), 1024);

        let req = request().with_cache_policy(CachePolicy::ReloadIgnoringCacheData);
        let response = transport.send(&req).await.unwrap();
        assert_eq!(response.headers["x-seen-cache-control"], "no-cache");

        let req = request()
            .with_cache_policy(CachePolicy::ReloadIgnoringCacheData)
            .with_header(CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
        let response = transport.send(&req).await.unwrap();
        assert_eq!(response.headers["x-seen-cache-control"], "max-age=0");
    }

    #[test]
    fn test_classify_io_errors() {
        use std::io::{Error, ErrorKind};

        let cases = [
            (ErrorKind::ConnectionReset, TransportErrorKind::ConnectionLost),
            (ErrorKind::UnexpectedEof, TransportErrorKind::ConnectionLost),
            (ErrorKind::ConnectionRefused, TransportErrorKind::NotConnected),
            (ErrorKind::TimedOut, TransportErrorKind::TimedOut),
            (ErrorKind::PermissionDenied, TransportErrorKind::Other),
        ];
        for (io_kind, expected) in cases {
            let err = classify_error(Box::new(Error::new(io_kind, "boom")));
            assert_eq!(err.kind(), expected, "{io_kind:?}");
        }
    }

    #[test]
    fn test_classify_walks_source_chain() {
        #[derive(Debug, Error)]
        #[error("wrapped")]
        struct Wrapped(#[source] std::io::Error);

        let err = classify_error(Box::new(Wrapped(std::io::Error::from(
            std::io::ErrorKind::ConnectionAborted,
        ))));
        assert_eq!(err.kind(), TransportErrorKind::ConnectionLost);
        assert!(err.is_transient());
    }

    #[test]
    fn test_hyper_transport_builds() {
        assert!(HyperTransport::new().is_ok());
        let config = TransportConfig {
            allow_http: false,
            ..Default::default()
        };
        assert!(HyperTransport::with_config(&config).is_ok());
    }
}
