use serde::{Deserialize, Serialize};

/// Where a captured image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImageSource {
    /// Inline base64 payload, optionally carrying a `data:<mime>;base64,` header.
    Embedded {
        #[serde(rename = "mimeType")]
        mime_type: String,
        payload: String,
    },
    /// Fetchable reference: `http(s)://`, `file://`, a bare path, or a `data:` URI.
    Uri { uri: String },
}

impl ImageSource {
    /// Classify a raw command-line style argument.
    ///
    /// `data:` URIs become embedded sources; everything else is treated as a URI.
    pub fn from_arg(arg: &str, mime_type: Option<&str>) -> Self {
        if arg.starts_with("data:") {
            let mime = mime_type
                .map(str::to_string)
                .or_else(|| data_uri_mime(arg).map(str::to_string))
                .unwrap_or_else(|| "application/octet-stream".to_string());
            ImageSource::Embedded {
                mime_type: mime,
                payload: arg.to_string(),
            }
        } else {
            ImageSource::Uri {
                uri: arg.to_string(),
            }
        }
    }
}

/// Extract `<mime>` from `data:<mime>;base64,...`.
pub(crate) fn data_uri_mime(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("data:")?;
    let end = rest.find([';', ','])?;
    let mime = &rest[..end];
    (!mime.is_empty()).then_some(mime)
}

/// Raw image bytes, exactly as captured. Moved from step to step, never re-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageBytes(Vec<u8>);

impl ImageBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }

    /// MIME type and preferred extension sniffed from the magic bytes.
    ///
    /// Only the header is inspected; pixel data is never decoded.
    pub fn sniff_format(&self) -> Option<(&'static str, &'static str)> {
        let format = image::guess_format(&self.0).ok()?;
        let ext = format.extensions_str().first().copied()?;
        Some((format.to_mime_type(), ext))
    }
}

impl From<Vec<u8>> for ImageBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for ImageBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Aggregated smile score.
pub type FinalScore = u32;

/// A payload handed to the persister. Consumed by the save, never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistableArtifact {
    pub body: Vec<u8>,
    pub suggested_name: String,
    pub mime_type: Option<String>,
}

impl PersistableArtifact {
    pub fn new(body: Vec<u8>, suggested_name: impl Into<String>) -> Self {
        Self {
            body,
            suggested_name: suggested_name.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}
