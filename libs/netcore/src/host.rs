//! Host configuration: the absolute base URL every request path is joined to.

use crate::error::{InvalidRequestKind, NetworkError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provides the absolute base URL requests are resolved against.
///
/// Implementations must be immutable for the lifetime of the executor that
/// holds them and safe to share across concurrent calls.
pub trait HostProvider: Send + Sync {
    /// Absolute base URL: scheme, authority and optional base path.
    fn base_url(&self) -> &str;
}

/// A fixed, pre-validated base URL.
///
/// # Example
///
/// ```ignore
/// let host = StaticHost::parse("https://api.example.com/v1")?;
/// assert_eq!(host.base_url(), "https://api.example.com/v1");
///
/// let host = StaticHost::from_parts("https", "custom.example.com", Some(8443), "/v2/api")?;
/// assert_eq!(host.base_url(), "https://custom.example.com:8443/v2/api");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StaticHost {
    base_url: String,
}

impl StaticHost {
    /// Validate and wrap an absolute base URL.
    ///
    /// # Errors
    /// Returns `NetworkError::InvalidRequest` with `InvalidUrl` if the URL does
    /// not parse, lacks an authority, or uses a scheme other than http/https.
    pub fn parse(base_url: impl Into<String>) -> Result<Self, NetworkError> {
        let base_url = base_url.into();
        validate_base_url(&base_url)?;
        Ok(Self { base_url })
    }

    /// Assemble a base URL from its components.
    ///
    /// # Errors
    /// Same conditions as [`StaticHost::parse`].
    pub fn from_parts(
        scheme: &str,
        host: &str,
        port: Option<u16>,
        base_path: &str,
    ) -> Result<Self, NetworkError> {
        let mut url = format!("{scheme}://{host}");
        if let Some(port) = port {
            url.push(':');
            url.push_str(&port.to_string());
        }
        if !base_path.is_empty() {
            if !base_path.starts_with('/') {
                url.push('/');
            }
            url.push_str(base_path);
        }
        Self::parse(url)
    }
}

impl HostProvider for StaticHost {
    fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl fmt::Display for StaticHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url)
    }
}

impl TryFrom<String> for StaticHost {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StaticHost> for String {
    fn from(host: StaticHost) -> Self {
        host.base_url
    }
}

fn validate_base_url(url: &str) -> Result<(), NetworkError> {
    let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
        NetworkError::invalid_request(InvalidRequestKind::InvalidUrl, format!("'{url}': {e}"))
    })?;

    if uri.authority().is_none() {
        return Err(NetworkError::invalid_request(
            InvalidRequestKind::InvalidUrl,
            format!("'{url}': missing host/authority"),
        ));
    }

    match uri.scheme_str() {
        Some("http" | "https") => {}
        Some(scheme) => {
            return Err(NetworkError::invalid_request(
                InvalidRequestKind::InvalidUrl,
                format!("'{url}': scheme '{scheme}' not supported"),
            ));
        }
        None => {
            return Err(NetworkError::invalid_request(
                InvalidRequestKind::InvalidUrl,
                format!("'{url}': missing scheme"),
            ));
        }
    }

    if uri.query().is_some() {
        return Err(NetworkError::invalid_request(
            InvalidRequestKind::InvalidUrl,
            format!("'{url}': base URL must not carry a query"),
        ));
    }

    Ok(())
}
