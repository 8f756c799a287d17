use crate::error::{InvalidRequestKind, NetworkError};
use crate::json::JsonValue;
use crate::multipart::MultipartForm;
use bytes::Bytes;
use http::HeaderValue;

/// Body of a request descriptor. Exactly one variant is active.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    /// No body
    #[default]
    None,
    /// JSON tree, encoded with `Content-Type: application/json`
    Json(JsonValue),
    /// Raw bytes, sent unchanged with no implied content type
    Raw(Bytes),
    /// `multipart/form-data` form
    Multipart(MultipartForm),
}

/// Encoded body bytes plus the content type the body implies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBody {
    pub bytes: Option<Bytes>,
    pub content_type: Option<HeaderValue>,
}

impl RequestBody {
    /// Encode the body into wire bytes and its implied `Content-Type`.
    ///
    /// # Errors
    /// Returns `NetworkError::InvalidRequest` with `UnencodableBody` when the JSON
    /// tree cannot be serialized (non-finite numbers are rejected rather than
    /// emitted as invalid JSON), or when the multipart boundary is not a valid
    /// header value.
    pub fn encode(&self) -> Result<EncodedBody, NetworkError> {
        match self {
            RequestBody::None => Ok(EncodedBody::default()),
            RequestBody::Json(tree) => {
                let bytes = tree.to_vec().map_err(|e| {
                    NetworkError::invalid_request(InvalidRequestKind::UnencodableBody, e.to_string())
                })?;
                Ok(EncodedBody {
                    bytes: Some(Bytes::from(bytes)),
                    content_type: Some(HeaderValue::from_static("application/json")),
                })
            }
            RequestBody::Raw(bytes) => Ok(EncodedBody {
                bytes: Some(bytes.clone()),
                content_type: None,
            }),
            RequestBody::Multipart(form) => {
                let content_type = HeaderValue::try_from(form.content_type()).map_err(|e| {
                    NetworkError::invalid_request(InvalidRequestKind::UnencodableBody, e.to_string())
                })?;
                Ok(EncodedBody {
                    bytes: Some(form.encode()),
                    content_type: Some(content_type),
                })
            }
        }
    }
}

impl From<JsonValue> for RequestBody {
    fn from(value: JsonValue) -> Self {
        RequestBody::Json(value)
    }
}

impl From<MultipartForm> for RequestBody {
    fn from(form: MultipartForm) -> Self {
        RequestBody::Multipart(form)
    }
}
