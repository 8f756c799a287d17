use crate::body::RequestBody;
use crate::error::{BoxError, InvalidRequestKind, NetworkError};
use crate::host::HostProvider;
use crate::url::build_url;
use crate::wire::{CachePolicy, DEFAULT_REQUEST_TIMEOUT, WireRequest};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Declarative description of an HTTP call, independent of any host.
///
/// Implementors describe the path, method and optional parts of a call; the
/// provided [`make_wire_request`](NetworkRequest::make_wire_request) turns the
/// description into a [`WireRequest`] for a given host.
///
/// # Example
///
/// ```ignore
/// struct GetUser { id: u64 }
///
/// impl NetworkRequest for GetUser {
///     type Response = User;
///
///     fn path(&self) -> String { "/users".to_owned() }
///     fn method(&self) -> Method { Method::GET }
///     fn query_items(&self) -> Vec<(String, String)> {
///         vec![("id".to_owned(), self.id.to_string())]
///     }
/// }
///
/// let user = executor.fetch(&GetUser { id: 7 }).await?;
/// ```
pub trait NetworkRequest: Send + Sync {
    /// Expected response type
    type Response: DeserializeOwned + Send;

    /// Path relative to the host base URL
    fn path(&self) -> String;

    fn method(&self) -> Method;

    /// Request headers; later entries win over earlier ones with the same
    /// (case-insensitive) name
    fn headers(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Query items, appended in the given order
    fn query_items(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn body(&self) -> RequestBody {
        RequestBody::None
    }

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::default()
    }

    /// Per-call timeout applied at the transport boundary
    fn timeout(&self) -> Duration {
        DEFAULT_REQUEST_TIMEOUT
    }

    /// Decode a successful response body. Defaults to JSON via `serde_json`.
    ///
    /// # Errors
    /// Returns the decoder's fault when the body does not match `Response`.
    fn decode(&self, body: &Bytes) -> Result<Self::Response, BoxError> {
        serde_json::from_slice(body).map_err(Into::into)
    }

    /// Build the wire request for `host`.
    ///
    /// Caller headers are applied first; a body that implies a `Content-Type`
    /// (JSON, multipart) then overrides any caller-supplied one. Raw bodies
    /// keep the caller's header.
    ///
    /// # Errors
    /// Returns `NetworkError::InvalidRequest` if the URL, a header, or the body
    /// cannot be built.
    fn make_wire_request(&self, host: &dyn HostProvider) -> Result<WireRequest, NetworkError> {
        let uri = build_url(host.base_url(), &self.path(), &self.query_items())?;
        let headers = parse_headers(self.headers())?;
        let encoded = self.body().encode()?;

        let request = WireRequest::new(self.method(), uri)
            .with_timeout(self.timeout())
            .with_cache_policy(self.cache_policy())
            .with_body(encoded.bytes)
            .with_headers(headers);

        // the body's content type must match its bytes (multipart boundary)
        Ok(match encoded.content_type {
            Some(content_type) => request.with_header(CONTENT_TYPE, content_type),
            None => request,
        })
    }
}

fn parse_headers(headers: Vec<(String, String)>) -> Result<HeaderMap, NetworkError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            (Err(e), _) => {
                return Err(NetworkError::invalid_request(
                    InvalidRequestKind::InvalidHeader,
                    format!("invalid header name: {e}"),
                ));
            }
            (_, Err(e)) => {
                return Err(NetworkError::invalid_request(
                    InvalidRequestKind::InvalidHeader,
                    format!("invalid header value: {e}"),
                ));
            }
        }
    }
    Ok(map)
}
