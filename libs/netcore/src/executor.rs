use crate::config::{ExecutorConfig, MiddlewareMode};
use crate::error::{NetworkError, TransportError};
use crate::host::HostProvider;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::request::NetworkRequest;
use crate::transport::{HyperTransport, Transport, TransportResponse};
use crate::wire::WireRequest;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Anything that can execute a [`NetworkRequest`].
///
/// Every call yields either the decoded response or exactly one
/// [`NetworkError`].
#[async_trait]
pub trait NetworkService: Send + Sync {
    /// Execute `request`, observing `cancel` at every checkpoint.
    ///
    /// # Errors
    /// Returns `NetworkError::Cancelled` once cancellation is observed, or
    /// the classified fault that ended the call.
    async fn fetch_with_cancel<R>(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, NetworkError>
    where
        R: NetworkRequest;

    /// Execute `request` without external cancellation.
    ///
    /// # Errors
    /// See [`fetch_with_cancel`](NetworkService::fetch_with_cancel).
    async fn fetch<R>(&self, request: &R) -> Result<R::Response, NetworkError>
    where
        R: NetworkRequest,
    {
        self.fetch_with_cancel(request, &CancellationToken::new())
            .await
    }
}

/// Executor that builds, transforms, sends, classifies and retries.
///
/// Per call: the wire request is built from the descriptor and host, the
/// middleware chain rewrites it, and the transport is invoked up to
/// `max_retries + 1` times. 5xx responses and transient transport faults are
/// retried after a fixed delay; everything else is terminal. Once retries are
/// exhausted the last classified fault is returned as is.
///
/// # Example
///
/// ```ignore
/// let executor = ResilientExecutor::builder(StaticHost::parse("https://api.example.com/v1")?, HyperTransport::new()?)
///     .middleware(UserAgentMiddleware::default())
///     .retry_delay(Duration::from_millis(500))
///     .build();
///
/// let user = executor.fetch(&GetUser { id: 7 }).await?;
/// ```
#[derive(Clone)]
pub struct ResilientExecutor {
    host: Arc<dyn HostProvider>,
    transport: Arc<dyn Transport>,
    middleware: MiddlewareChain,
    config: ExecutorConfig,
}

impl ResilientExecutor {
    /// Executor with default configuration and no middleware
    #[must_use]
    pub fn new(host: impl HostProvider + 'static, transport: impl Transport + 'static) -> Self {
        Self::builder(host, transport).build()
    }

    /// Executor over the default [`HyperTransport`].
    ///
    /// # Errors
    /// Returns `TransportError` if the TLS connector cannot be initialized.
    pub fn with_default_transport(host: impl HostProvider + 'static) -> Result<Self, TransportError> {
        Ok(Self::new(host, HyperTransport::new()?))
    }

    pub fn builder(
        host: impl HostProvider + 'static,
        transport: impl Transport + 'static,
    ) -> ResilientExecutorBuilder {
        ResilientExecutorBuilder {
            host: Arc::new(host),
            transport: Arc::new(transport),
            middleware: MiddlewareChain::new(),
            config: ExecutorConfig::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    #[must_use]
    pub fn host(&self) -> &dyn HostProvider {
        self.host.as_ref()
    }

    #[must_use]
    pub fn middleware(&self) -> &MiddlewareChain {
        &self.middleware
    }

    async fn wait_before_retry(&self, cancel: &CancellationToken) -> Result<(), NetworkError> {
        check_cancelled(cancel, "before_retry_delay")?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(checkpoint = "retry_delay", "request cancelled");
                return Err(NetworkError::Cancelled);
            }
            () = tokio::time::sleep(self.config.retry_delay) => {}
        }
        check_cancelled(cancel, "after_retry_delay")
    }

    async fn send_once(
        &self,
        request: &WireRequest,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse, NetworkError> {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(checkpoint = "in_flight", "request cancelled");
                return Err(NetworkError::Cancelled);
            }
            outcome = tokio::time::timeout(request.timeout(), self.transport.send(request)) => outcome,
        };
        check_cancelled(cancel, "after_send")?;

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(NetworkError::Transport(err)),
            Err(elapsed) => Err(NetworkError::Transport(TransportError::timed_out(elapsed))),
        }
    }
}

#[async_trait]
impl NetworkService for ResilientExecutor {
    async fn fetch_with_cancel<R>(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, NetworkError>
    where
        R: NetworkRequest,
    {
        check_cancelled(cancel, "entry")?;

        let built = request.make_wire_request(self.host.as_ref())?;
        let per_attempt = self.config.middleware_mode == MiddlewareMode::PerAttempt;
        let wire = if per_attempt {
            built
        } else {
            self.middleware.apply(built, cancel).await?
        };

        let method = wire.method().clone();
        let host = wire.uri().host().unwrap_or_default().to_owned();

        let mut attempt = 0usize;
        loop {
            let rewritten = if per_attempt {
                Some(self.middleware.apply(wire.clone(), cancel).await?)
            } else {
                None
            };
            let current = rewritten.as_ref().unwrap_or(&wire);

            let fault = match self.send_once(current, cancel).await {
                Ok(response) if response.status.is_success() => {
                    check_cancelled(cancel, "before_decode")?;
                    return request
                        .decode(&response.body)
                        .map_err(NetworkError::DecodingFailed);
                }
                Ok(response) => NetworkError::ServerError {
                    status: response.status,
                    body: response.body,
                },
                Err(err) => err,
            };

            if !is_retryable(&fault) {
                return Err(fault);
            }

            if attempt >= self.config.max_retries {
                tracing::warn!(
                    attempts = attempt + 1,
                    error = %fault,
                    method = %method,
                    host = %host,
                    "Request failed after exhausting retries"
                );
                return Err(fault);
            }

            tracing::debug!(
                retry = attempt + 1,
                max_retries = self.config.max_retries,
                status = ?fault.status().as_ref().map(http::StatusCode::as_u16),
                error = %fault,
                method = %method,
                host = %host,
                delay_ms = self.config.retry_delay.as_millis(),
                "Retrying request"
            );

            self.wait_before_retry(cancel).await?;
            attempt += 1;
        }
    }
}

/// 5xx responses and transient transport faults
fn is_retryable(fault: &NetworkError) -> bool {
    match fault {
        NetworkError::ServerError { status, .. } => status.is_server_error(),
        NetworkError::Transport(err) => err.is_transient(),
        _ => false,
    }
}

fn check_cancelled(cancel: &CancellationToken, checkpoint: &'static str) -> Result<(), NetworkError> {
    if cancel.is_cancelled() {
        tracing::debug!(checkpoint, "request cancelled");
        return Err(NetworkError::Cancelled);
    }
    Ok(())
}

/// Builder for [`ResilientExecutor`].
#[must_use]
pub struct ResilientExecutorBuilder {
    host: Arc<dyn HostProvider>,
    transport: Arc<dyn Transport>,
    middleware: MiddlewareChain,
    config: ExecutorConfig,
}

impl ResilientExecutorBuilder {
    /// Replace the whole configuration
    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.config.retry_delay = retry_delay;
        self
    }

    pub fn middleware_mode(mut self, mode: MiddlewareMode) -> Self {
        self.config.middleware_mode = mode;
        self
    }

    /// Append a middleware step after those already registered
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Replace the middleware chain
    pub fn middleware_chain(mut self, chain: MiddlewareChain) -> Self {
        self.middleware = chain;
        self
    }

    #[must_use]
    pub fn build(self) -> ResilientExecutor {
        ResilientExecutor {
            host: self.host,
            transport: self.transport,
            middleware: self.middleware,
            config: self.config,
        }
    }
}
