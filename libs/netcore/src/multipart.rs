//! `multipart/form-data` encoding (RFC 2388 layout).

use bytes::{BufMut, Bytes, BytesMut};

/// A file part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    pub name: String,
    pub filename: String,
    pub data: Bytes,
    pub mime_type: String,
}

impl MultipartFile {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<String>,
        data: impl Into<Bytes>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Multipart form with a per-instance random boundary.
///
/// Fields behave as a mapping (re-adding a name replaces its value in place);
/// files are kept in insertion order. Encoding emits all fields first, then
/// all files.
///
/// # Example
///
/// ```ignore
/// let mut form = MultipartForm::new();
/// form.add_field("name", "Test");
/// form.add_file(MultipartFile::new("avatar", "a.png", png_bytes, "image/png"));
/// let body = RequestBody::Multipart(form);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    boundary: String,
    fields: Vec<(String, String)>,
    files: Vec<MultipartFile>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    /// Create an empty form with a fresh UUID v4 boundary
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(uuid::Uuid::new_v4().to_string())
    }

    /// Create an empty form with a caller-chosen boundary.
    ///
    /// The caller is responsible for picking a boundary that does not occur
    /// in any part's content.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            fields: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Set a text field; an existing field with the same name is overwritten.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
        self
    }

    pub fn add_file(&mut self, file: MultipartFile) -> &mut Self {
        self.files.push(file);
        self
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    #[must_use]
    pub fn files(&self) -> &[MultipartFile] {
        &self.files
    }

    /// Value for the `Content-Type` header
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode the form into its wire bytes.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let delimiter = format!("--{}\r\n", self.boundary);
        let mut out = BytesMut::new();

        for (name, value) in &self.fields {
            out.put_slice(delimiter.as_bytes());
            out.put_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }

        for file in &self.files {
            out.put_slice(delimiter.as_bytes());
            out.put_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    file.name, file.filename
                )
                .as_bytes(),
            );
            out.put_slice(format!("Content-Type: {}\r\n\r\n", file.mime_type).as_bytes());
            out.put_slice(&file.data);
            out.put_slice(b"\r\n");
        }

        out.put_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out.freeze()
    }
}
