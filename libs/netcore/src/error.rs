use bytes::Bytes;
use http::StatusCode;
use std::fmt;
use thiserror::Error;

/// Boxed underlying fault carried by the error taxonomy.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of request-building failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
///
/// # Example
///
/// ```ignore
/// match &err {
///     NetworkError::InvalidRequest { kind, .. } => match kind {
///         InvalidRequestKind::InvalidUrl => println!("Malformed URL"),
///         InvalidRequestKind::InvalidHeader => println!("Bad header name or value"),
///         InvalidRequestKind::UnencodableBody => println!("Body could not be encoded"),
///     },
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRequestKind {
    /// Host URL or composed request URL is not a well-formed absolute URL
    InvalidUrl,
    /// Header name or value is not valid HTTP
    InvalidHeader,
    /// Body could not be encoded (e.g. non-finite JSON number)
    UnencodableBody,
}

/// Classification of transport-level faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection dropped mid-exchange (reset, aborted, unexpected EOF)
    ConnectionLost,
    /// No connection could be established (DNS, refused, unreachable)
    NotConnected,
    /// The attempt exceeded the per-request timeout
    TimedOut,
    /// A middleware step reported a failure
    Middleware,
    /// Any other transport fault
    Other,
}

impl TransportErrorKind {
    /// Whether a fault of this kind is expected to clear up by resending
    /// the same request unchanged.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            TransportErrorKind::ConnectionLost
                | TransportErrorKind::NotConnected
                | TransportErrorKind::TimedOut
        )
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportErrorKind::ConnectionLost => "connection lost",
            TransportErrorKind::NotConnected => "not connected",
            TransportErrorKind::TimedOut => "timed out",
            TransportErrorKind::Middleware => "middleware failed",
            TransportErrorKind::Other => "transport failure",
        })
    }
}

/// A fault reported by the transport (or by middleware, which is surfaced
/// as a transport-adjacent failure).
#[derive(Error, Debug)]
#[error("{kind}: {source}")]
pub struct TransportError {
    kind: TransportErrorKind,
    #[source]
    source: BoxError,
}

impl TransportError {
    #[must_use]
    pub fn new(kind: TransportErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    #[must_use]
    pub fn connection_lost(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::ConnectionLost, source)
    }

    #[must_use]
    pub fn not_connected(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::NotConnected, source)
    }

    #[must_use]
    pub fn timed_out(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::TimedOut, source)
    }

    #[must_use]
    pub fn middleware(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::Middleware, source)
    }

    #[must_use]
    pub fn other(source: impl Into<BoxError>) -> Self {
        Self::new(TransportErrorKind::Other, source)
    }

    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Consume the error and return the underlying fault
    #[must_use]
    pub fn into_source(self) -> BoxError {
        self.source
    }
}

/// Error taxonomy surfaced by every [`NetworkService`](crate::NetworkService).
///
/// The set is closed: a call yields either the decoded response or exactly
/// one of these kinds.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// The request could not be built (bad URL, header, or body)
    ///
    /// Use the `kind` field for programmatic matching. The `reason` field contains
    /// a diagnostic message intended for logging only; do not match on its contents.
    #[error("The request was malformed: {reason}")]
    InvalidRequest {
        kind: InvalidRequestKind,
        reason: String,
    },

    /// The transport call itself failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// HTTP non-2xx status
    #[error("Server responded with status code: {}", status.as_u16())]
    ServerError { status: StatusCode, body: Bytes },

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    DecodingFailed(#[source] BoxError),

    /// The call was cancelled
    #[error("The request was cancelled.")]
    Cancelled,

    /// Any fault not fitting the kinds above
    #[error("An unknown error occurred: {0}")]
    Unknown(#[source] BoxError),
}

impl NetworkError {
    #[must_use]
    pub fn invalid_request(kind: InvalidRequestKind, reason: impl Into<String>) -> Self {
        NetworkError::InvalidRequest {
            kind,
            reason: reason.into(),
        }
    }

    /// HTTP status for `ServerError`, `None` otherwise
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            NetworkError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetworkError::Cancelled)
    }
}

/// Kind-level equality: transport errors compare by [`TransportErrorKind`],
/// server errors by status code; underlying faults and bodies are ignored.
impl PartialEq for NetworkError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                NetworkError::InvalidRequest { kind: a, .. },
                NetworkError::InvalidRequest { kind: b, .. },
            ) => a == b,
            (NetworkError::Transport(a), NetworkError::Transport(b)) => a.kind == b.kind,
            (
                NetworkError::ServerError { status: a, .. },
                NetworkError::ServerError { status: b, .. },
            ) => a == b,
            (NetworkError::DecodingFailed(_), NetworkError::DecodingFailed(_))
            | (NetworkError::Cancelled, NetworkError::Cancelled)
            | (NetworkError::Unknown(_), NetworkError::Unknown(_)) => true,
            _ => false,
        }
    }
}
