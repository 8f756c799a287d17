#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Declarative HTTP request pipeline
//!
//! Callers describe a call with a [`NetworkRequest`] (path, method, headers,
//! query, body, timeout, cache policy, response type) and execute it through
//! a [`NetworkService`]:
//! - URL composition against a [`HostProvider`] base URL with slash-safe joins
//! - Body encoding: JSON trees, raw bytes, `multipart/form-data`
//! - Ordered async [`Middleware`] that rewrites the wire request
//! - [`ResilientExecutor`]: bounded retries on 5xx and transient transport
//!   faults, fixed delay, cooperative cancellation via `CancellationToken`
//! - A closed error taxonomy ([`NetworkError`])
//! - Pluggable [`Transport`]; [`HyperTransport`] (hyper + rustls) by default
//!
//! # Example
//!
//! ```ignore
//! use netcore::{NetworkRequest, NetworkService, ResilientExecutor, StaticHost};
//!
//! struct GetUser { id: u64 }
//!
//! impl NetworkRequest for GetUser {
//!     type Response = User;
//!     fn path(&self) -> String { format!("/users/{}", self.id) }
//!     fn method(&self) -> http::Method { http::Method::GET }
//! }
//!
//! let executor = ResilientExecutor::with_default_transport(
//!     StaticHost::parse("https://api.example.com/v1")?,
//! )?;
//! let user = executor.fetch(&GetUser { id: 7 }).await?;
//! ```

mod body;
mod config;
mod error;
mod executor;
mod host;
mod json;
mod middleware;
pub mod mock;
mod multipart;
mod request;
mod transport;
pub mod url;
mod wire;

pub use body::{EncodedBody, RequestBody};
pub use config::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_USER_AGENT,
    ExecutorConfig, MiddlewareMode, TransportConfig,
};
pub use error::{
    BoxError, InvalidRequestKind, NetworkError, TransportError, TransportErrorKind,
};
pub use executor::{NetworkService, ResilientExecutor, ResilientExecutorBuilder};
pub use host::{HostProvider, StaticHost};
pub use json::{JsonValue, JsonValueError};
pub use middleware::{
    FnMiddleware, HeaderMiddleware, Middleware, MiddlewareChain, MiddlewareService,
    UserAgentMiddleware, middleware_fn,
};
pub use multipart::{MultipartFile, MultipartForm};
pub use request::NetworkRequest;
pub use transport::{
    BodyTooLarge, HyperClient, HyperTransport, ServiceTransport, Transport, TransportResponse,
    classify_error,
};
pub use wire::{CachePolicy, DEFAULT_REQUEST_TIMEOUT, WireRequest};

pub use tokio_util::sync::CancellationToken;
