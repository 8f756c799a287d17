use crate::error::{BoxError, InvalidRequestKind, NetworkError, TransportError};
use crate::executor::NetworkService;
use crate::host::HostProvider;
use crate::request::NetworkRequest;
use crate::wire::WireRequest;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Async, fallible wire-request transformer.
///
/// A step receives the request by value and returns the (possibly rewritten)
/// request; it never keeps a handle to it after returning.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Transform the request.
    ///
    /// # Errors
    /// Any error aborts the chain; the call fails with a
    /// `TransportErrorKind::Middleware` transport error.
    async fn process(&self, request: WireRequest) -> Result<WireRequest, BoxError>;

    /// Name used in trace output
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Ordered middleware sequence, shared read-only across concurrent calls.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    steps: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; steps run in the order they were pushed
    #[must_use]
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.steps.push(Arc::new(middleware));
        self
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.steps.push(middleware);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in registration order, threading the request through.
    ///
    /// Cancellation is checked before each step.
    ///
    /// # Errors
    /// - `NetworkError::Cancelled` if `cancel` fires before a step starts
    /// - `NetworkError::Transport` (kind `Middleware`) if a step fails; later
    ///   steps are not run
    pub async fn apply(
        &self,
        mut request: WireRequest,
        cancel: &CancellationToken,
    ) -> Result<WireRequest, NetworkError> {
        for (index, step) in self.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::debug!(checkpoint = "middleware", index, "request cancelled");
                return Err(NetworkError::Cancelled);
            }
            tracing::trace!(index, name = step.name(), "applying middleware");
            request = step
                .process(request)
                .await
                .map_err(|e| NetworkError::Transport(TransportError::middleware(e)))?;
        }
        Ok(request)
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|step| step.name()))
            .finish()
    }
}

/// Sets a fixed header on every request.
#[derive(Debug, Clone)]
pub struct HeaderMiddleware {
    name: HeaderName,
    value: HeaderValue,
    only_if_absent: bool,
}

impl HeaderMiddleware {
    /// Create a middleware that always sets `name: value`, replacing any
    /// existing value.
    ///
    /// # Errors
    /// Returns `NetworkError::InvalidRequest` with `InvalidHeader` if the name
    /// or value is not valid HTTP.
    pub fn try_new(name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self, NetworkError> {
        let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
            NetworkError::invalid_request(InvalidRequestKind::InvalidHeader, e.to_string())
        })?;
        let value = HeaderValue::try_from(value.as_ref()).map_err(|e| {
            NetworkError::invalid_request(InvalidRequestKind::InvalidHeader, e.to_string())
        })?;
        Ok(Self {
            name,
            value,
            only_if_absent: false,
        })
    }

    /// Leave requests that already carry the header untouched
    #[must_use]
    pub fn if_absent(mut self) -> Self {
        self.only_if_absent = true;
        self
    }
}

#[async_trait]
impl Middleware for HeaderMiddleware {
    async fn process(&self, request: WireRequest) -> Result<WireRequest, BoxError> {
        if self.only_if_absent && request.headers().contains_key(&self.name) {
            return Ok(request);
        }
        Ok(request.with_header(self.name.clone(), self.value.clone()))
    }

    fn name(&self) -> &str {
        "header"
    }
}

/// Adds a `User-Agent` header unless the request already has one.
#[derive(Debug, Clone)]
pub struct UserAgentMiddleware {
    inner: HeaderMiddleware,
}

impl UserAgentMiddleware {
    /// # Errors
    /// Returns `NetworkError::InvalidRequest` if the user agent string is not a
    /// valid header value.
    pub fn try_new(user_agent: impl AsRef<str>) -> Result<Self, NetworkError> {
        let inner = HeaderMiddleware::try_new(http::header::USER_AGENT.as_str(), user_agent)?
            .if_absent();
        Ok(Self { inner })
    }
}

impl Default for UserAgentMiddleware {
    fn default() -> Self {
        Self {
            inner: HeaderMiddleware {
                name: http::header::USER_AGENT,
                value: HeaderValue::from_static(crate::config::DEFAULT_USER_AGENT),
                only_if_absent: true,
            },
        }
    }
}

#[async_trait]
impl Middleware for UserAgentMiddleware {
    async fn process(&self, request: WireRequest) -> Result<WireRequest, BoxError> {
        self.inner.process(request).await
    }

    fn name(&self) -> &str {
        "user_agent"
    }
}

/// Middleware backed by an async closure. See [`middleware_fn`].
pub struct FnMiddleware<F, Fut> {
    name: String,
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

/// Wrap an async closure as a [`Middleware`].
///
/// ```ignore
/// let stamp = middleware_fn("stamp", |req: WireRequest| async move {
///     Ok::<_, BoxError>(req.with_header(HeaderName::from_static("x-stamp"), now()))
/// });
/// ```
#[must_use]
pub fn middleware_fn<F, Fut>(name: impl Into<String>, f: F) -> FnMiddleware<F, Fut>
where
    F: Fn(WireRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<WireRequest, BoxError>> + Send,
{
    FnMiddleware {
        name: name.into(),
        f,
        _fut: PhantomData,
    }
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F, Fut>
where
    F: Fn(WireRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<WireRequest, BoxError>> + Send,
{
    async fn process(&self, request: WireRequest) -> Result<WireRequest, BoxError> {
        (self.f)(request).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Decorates a [`NetworkService`] with a middleware chain.
///
/// The wire request is built against `host`, rewritten by the chain, and then
/// handed to the inner service as an already-prepared request, so the inner
/// service sends exactly what the chain produced.
pub struct MiddlewareService<S> {
    inner: S,
    host: Arc<dyn HostProvider>,
    chain: MiddlewareChain,
}

impl<S: NetworkService> MiddlewareService<S> {
    #[must_use]
    pub fn new(inner: S, host: Arc<dyn HostProvider>, chain: MiddlewareChain) -> Self {
        Self { inner, host, chain }
    }

    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: NetworkService> NetworkService for MiddlewareService<S> {
    async fn fetch_with_cancel<R>(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, NetworkError>
    where
        R: NetworkRequest,
    {
        let wire = request.make_wire_request(self.host.as_ref())?;
        let wire = self.chain.apply(wire, cancel).await?;
        let prepared = PreparedRequest {
            descriptor: request,
            wire,
        };
        self.inner.fetch_with_cancel(&prepared, cancel).await
    }
}

/// A descriptor whose wire form has already been produced.
///
/// `make_wire_request` ignores the host and returns the stored request;
/// decoding is delegated to the original descriptor.
struct PreparedRequest<'a, R> {
    descriptor: &'a R,
    wire: WireRequest,
}

impl<R: NetworkRequest> NetworkRequest for PreparedRequest<'_, R> {
    type Response = R::Response;

    fn path(&self) -> String {
        self.wire.uri().path().to_owned()
    }

    fn method(&self) -> Method {
        self.wire.method().clone()
    }

    fn decode(&self, body: &Bytes) -> Result<Self::Response, BoxError> {
        self.descriptor.decode(body)
    }

    fn make_wire_request(&self, _host: &dyn HostProvider) -> Result<WireRequest, NetworkError> {
        Ok(self.wire.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::error::TransportErrorKind;
    use http::Uri;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request() -> WireRequest {
        WireRequest::new(Method::GET, Uri::from_static("https://example.com/a"))
    }

    #[tokio::test]
    async fn test_header_middleware_overwrites() {
        let mw = HeaderMiddleware::try_new("X-Env", "prod").unwrap();
        let req = request().with_header(
            HeaderName::from_static("x-env"),
            HeaderValue::from_static("dev"),
        );
        let req = mw.process(req).await.unwrap();
        assert_eq!(req.header("x-env"), Some("prod"));
    }

    #[tokio::test]
    async fn test_user_agent_not_overwritten() {
        let mw = UserAgentMiddleware::try_new("test-agent/1.0").unwrap();

        let req = mw.process(request()).await.unwrap();
        assert_eq!(req.header("user-agent"), Some("test-agent/1.0"));

        let req = request().with_header(
            http::header::USER_AGENT,
            HeaderValue::from_static("custom-agent/2.0"),
        );
        let req = mw.process(req).await.unwrap();
        assert_eq!(req.header("user-agent"), Some("custom-agent/2.0"));
    }

    #[test]
    fn test_header_middleware_invalid_value() {
        // Control characters are invalid in header values
        assert!(UserAgentMiddleware::try_new("invalid\x00agent").is_err());
        assert!(HeaderMiddleware::try_new("bad name", "v").is_err());
    }

    #[tokio::test]
    async fn test_chain_runs_in_registration_order() {
        let chain = MiddlewareChain::new()
            .with(HeaderMiddleware::try_new("x-a", "1").unwrap())
            .with(middleware_fn("copy", |req: WireRequest| async move {
                let seen = req.header("x-a").unwrap_or("missing").to_owned();
                Ok::<_, BoxError>(req.with_header(
                    HeaderName::from_static("x-b"),
                    HeaderValue::try_from(seen)?,
                ))
            }));

        let req = chain
            .apply(request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(req.header("x-b"), Some("1"));
    }

    #[tokio::test]
    async fn test_chain_failure_stops_later_steps() {
        let later = Arc::new(AtomicUsize::new(0));
        let counter = later.clone();
        let chain = MiddlewareChain::new()
            .with(middleware_fn("fail", |_req: WireRequest| async move {
                Err::<WireRequest, BoxError>("signing failed".into())
            }))
            .with(middleware_fn("later", move |req: WireRequest| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, BoxError>(req)
                }
            }));

        let err = chain
            .apply(request(), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            NetworkError::Transport(t) => assert_eq!(t.kind(), TransportErrorKind::Middleware),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chain_checks_cancellation_before_each_step() {
        let cancel = CancellationToken::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let token = cancel.clone();
        let first_ran = ran.clone();
        let second_ran = ran.clone();
        let chain = MiddlewareChain::new()
            .with(middleware_fn("cancel", move |req: WireRequest| {
                let token = token.clone();
                let first_ran = first_ran.clone();
                async move {
                    first_ran.fetch_add(1, Ordering::SeqCst);
                    token.cancel();
                    Ok::<_, BoxError>(req)
                }
            }))
            .with(middleware_fn("never", move |req: WireRequest| {
                let second_ran = second_ran.clone();
                async move {
                    second_ran.fetch_add(10, Ordering::SeqCst);
                    Ok::<_, BoxError>(req)
                }
            }));

        let err = chain.apply(request(), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_debug_lists_step_names() {
        let chain = MiddlewareChain::new()
            .with(UserAgentMiddleware::default())
            .with(HeaderMiddleware::try_new("x-a", "1").unwrap());
        assert_eq!(format!("{chain:?}"), r#"["user_agent", "header"]"#);
        assert_eq!(chain.len(), 2);
    }
}
