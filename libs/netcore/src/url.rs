//! URL composition: base URL + request path + ordered query items.

use crate::error::{InvalidRequestKind, NetworkError};
use http::Uri;

/// Join `path` onto `base_url` and append `query` in caller order.
///
/// - An empty path or `"/"` yields the base URL unchanged.
/// - Otherwise exactly one `/` separates base and path, whether or not the base
///   ends with `/` or the path starts with one.
/// - `?`, `#` and spaces inside the path are percent-encoded, so the path can
///   never start a query or fragment of its own.
/// - Query items are form-urlencoded and appended after `?`.
///
/// A base URL without a path (`https://api.example.com`) is rendered with
/// the root path, so an empty path yields `https://api.example.com/`.
///
/// # Errors
/// Returns `NetworkError::InvalidRequest` with `InvalidUrl` if the query cannot
/// be encoded or the result is not an absolute URL.
pub fn build_url(
    base_url: &str,
    path: &str,
    query: &[(String, String)],
) -> Result<Uri, NetworkError> {
    let mut url = join_path(base_url, path);

    if !query.is_empty() {
        let encoded = serde_urlencoded::to_string(query).map_err(|e| {
            NetworkError::invalid_request(InvalidRequestKind::InvalidUrl, e.to_string())
        })?;
        url.push('?');
        url.push_str(&encoded);
    }

    let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
        NetworkError::invalid_request(InvalidRequestKind::InvalidUrl, format!("'{url}': {e}"))
    })?;

    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(NetworkError::invalid_request(
            InvalidRequestKind::InvalidUrl,
            format!("'{url}': not an absolute URL"),
        ));
    }

    Ok(uri)
}

fn join_path(base_url: &str, path: &str) -> String {
    if path.is_empty() || path == "/" {
        return base_url.to_owned();
    }

    let relative = path.trim_start_matches('/');
    let mut url = String::with_capacity(base_url.len() + relative.len() + 1);
    url.push_str(base_url);
    if !base_url.ends_with('/') {
        url.push('/');
    }
    for c in relative.chars() {
        match c {
            '?' => url.push_str("%3F"),
            '#' => url.push_str("%23"),
            ' ' => url.push_str("%20"),
            _ => url.push(c),
        }
    }
    url
}
