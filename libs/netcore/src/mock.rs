//! Test doubles: a scripted [`Transport`] and a handler-driven
//! [`NetworkService`] that bypasses middleware and transport entirely.

use crate::error::{BoxError, NetworkError, TransportError};
use crate::executor::NetworkService;
use crate::host::HostProvider;
use crate::request::NetworkRequest;
use crate::transport::{Transport, TransportResponse};
use crate::wire::WireRequest;
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Delay used by [`MockNetworkService::simulated`]
pub const DEFAULT_SIMULATED_DELAY: Duration = Duration::from_millis(500);

type Responder =
    dyn Fn(usize, &WireRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Scripted transport that counts invocations.
///
/// The responder receives the zero-based attempt index and the request.
/// Clones share the same counter and request log.
///
/// ```ignore
/// let transport = MockTransport::new(|attempt, _req| {
///     if attempt < 2 {
///         Err(TransportError::connection_lost("reset"))
///     } else {
///         Ok(TransportResponse::new(StatusCode::OK, r#"{"id":1,"name":"Jerry"}"#))
///     }
/// });
/// ```
#[derive(Clone)]
pub struct MockTransport {
    responder: Arc<Responder>,
    calls: Arc<Mutex<usize>>,
    requests: Arc<Mutex<Vec<WireRequest>>>,
    delay: Option<Duration>,
}

impl MockTransport {
    #[must_use]
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(usize, &WireRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Always answer `200 OK` with `body`
    #[must_use]
    pub fn always_ok(body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self::new(move |_, _| Ok(TransportResponse::new(StatusCode::OK, body.clone())))
    }

    /// Always answer with `status` and an empty body
    #[must_use]
    pub fn always_status(status: StatusCode) -> Self {
        Self::new(move |_, _| Ok(TransportResponse::new(status, Bytes::new())))
    }

    /// Sleep before answering (the call is counted when it starts)
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `send` invocations so far
    #[must_use]
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }

    /// Requests received so far, in order
    #[must_use]
    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &WireRequest) -> Result<TransportResponse, TransportError> {
        let attempt = {
            let mut calls = self.calls.lock();
            let attempt = *calls;
            *calls += 1;
            attempt
        };
        self.requests.lock().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(attempt, request)
    }
}

type Handler = dyn Fn(&WireRequest) -> Result<Bytes, BoxError> + Send + Sync;

/// Service that maps the built wire request straight to response bytes.
///
/// Validates request construction and decoding without a transport. Handler
/// errors surface as `NetworkError::Unknown`.
#[derive(Clone)]
pub struct MockNetworkService {
    host: Arc<dyn HostProvider>,
    handler: Arc<Handler>,
    delay: Option<Duration>,
}

impl MockNetworkService {
    #[must_use]
    pub fn new<F>(host: impl HostProvider + 'static, handler: F) -> Self
    where
        F: Fn(&WireRequest) -> Result<Bytes, BoxError> + Send + Sync + 'static,
    {
        Self {
            host: Arc::new(host),
            handler: Arc::new(handler),
            delay: None,
        }
    }

    /// Simulate network latency with [`DEFAULT_SIMULATED_DELAY`]
    #[must_use]
    pub fn simulated(self) -> Self {
        self.with_delay(DEFAULT_SIMULATED_DELAY)
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl NetworkService for MockNetworkService {
    async fn fetch_with_cancel<R>(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, NetworkError>
    where
        R: NetworkRequest,
    {
        if cancel.is_cancelled() {
            return Err(NetworkError::Cancelled);
        }
        let wire = request.make_wire_request(self.host.as_ref())?;

        if let Some(delay) = self.delay {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(NetworkError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
            if cancel.is_cancelled() {
                return Err(NetworkError::Cancelled);
            }
        }

        let body = (self.handler)(&wire).map_err(NetworkError::Unknown)?;
        request.decode(&body).map_err(NetworkError::DecodingFailed)
    }
}
