//! Image source decoding — embedded base64 payloads and fetchable URIs.
//!
//! Every path returns the image bytes exactly as they were captured. Nothing
//! is re-encoded and a failure never yields a partial buffer.

use crate::types::{ImageBytes, ImageSource};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use std::path::Path;
use thiserror::Error;

const DATA_URI_BASE64_MARKER: &str = ";base64,";

/// Forgiving decoder: padding optional, non-zero trailing bits ignored.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Error, Debug)]
pub enum DecoderError {
    #[error("malformed embedded image payload: {0}")]
    Decode(String),
    #[error("failed to fetch image from {uri}: {reason}")]
    Fetch { uri: String, reason: String },
}

/// Decode an image source into its raw bytes.
pub async fn decode(source: ImageSource) -> Result<ImageBytes, DecoderError> {
    match source {
        ImageSource::Embedded { mime_type, payload } => {
            let bytes = decode_embedded(&payload)?;
            tracing::debug!(mime = %mime_type, bytes = bytes.len(), "decoded embedded image");
            Ok(bytes)
        }
        ImageSource::Uri { uri } => {
            // `data:` references carry their bytes inline.
            if uri.starts_with("data:") {
                return decode_embedded(&uri);
            }
            let bytes = fetch(&uri).await?;
            tracing::debug!(uri = %uri, bytes = bytes.len(), "fetched image");
            Ok(bytes)
        }
    }
}

/// Decode a standard base64 payload, stripping any `data:<mime>;base64,` header.
///
/// ASCII whitespace is skipped and padding is optional, so line-wrapped and
/// unpadded payloads decode. A body whose unpadded length is `1 (mod 4)`
/// cannot encode whole bytes and is rejected.
pub fn decode_embedded(payload: &str) -> Result<ImageBytes, DecoderError> {
    let body: Vec<u8> = strip_data_uri_header(payload)?
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let unpadded = body.iter().rev().skip_while(|&&b| b == b'=').count();
    if unpadded % 4 == 1 {
        return Err(DecoderError::Decode(format!(
            "invalid base64 length {unpadded}"
        )));
    }
    FORGIVING
        .decode(&body)
        .map(ImageBytes::new)
        .map_err(|e| DecoderError::Decode(e.to_string()))
}

fn strip_data_uri_header(payload: &str) -> Result<&str, DecoderError> {
    if !payload.starts_with("data:") {
        return Ok(payload);
    }
    match payload.find(DATA_URI_BASE64_MARKER) {
        Some(idx) => Ok(&payload[idx + DATA_URI_BASE64_MARKER.len()..]),
        None => Err(DecoderError::Decode(
            "data URI is not base64 encoded".to_string(),
        )),
    }
}

async fn fetch(uri: &str) -> Result<ImageBytes, DecoderError> {
    let fetch_err = |reason: String| DecoderError::Fetch {
        uri: uri.to_string(),
        reason,
    };

    if uri.starts_with("http://") || uri.starts_with("https://") {
        let response = reqwest::get(uri)
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP {status}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;
        return Ok(ImageBytes::new(body.to_vec()));
    }

    if uri.contains("://") && !uri.starts_with("file://") {
        return Err(fetch_err("unsupported URI scheme".to_string()));
    }
    let path = uri.strip_prefix("file://").unwrap_or(uri);

    tokio::fs::read(Path::new(path))
        .await
        .map(ImageBytes::new)
        .map_err(|e| fetch_err(e.to_string()))
}
