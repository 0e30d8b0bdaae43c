//! `data:` URIs for images travelling inside JSON payloads.
//!
//! Only the base64 form is supported: `data:<mime>;base64,<payload>`.
//! Media-type parameters (e.g. `;charset=...`) are accepted and dropped.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::RequestError;

/// MIME type of every image this crate produces.
pub const PNG_MIME: &str = "image/png";

/// Media type assumed when a data URI omits one.
const DEFAULT_MIME: &str = "text/plain";

/// A decoded data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    /// Media type without parameters, e.g. `image/jpeg`.
    pub mime: String,
    /// Decoded payload.
    pub data: Vec<u8>,
}

impl DataUri {
    /// Returns `true` for any `image/*` media type.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// Encode bytes as a base64 data URI with the given media type.
#[must_use]
pub fn encode(mime: &str, data: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(data))
}

/// Encode PNG bytes as a `data:image/png;base64,...` URI.
#[must_use]
pub fn encode_png(png: &[u8]) -> String {
    encode(PNG_MIME, png)
}

/// Parse a base64 data URI.
///
/// # Errors
///
/// Returns [`RequestError::InvalidDataUri`] if the string lacks the
/// `data:` scheme, the comma separator, or the `;base64` marker, and
/// [`RequestError::Base64`] if the payload does not decode.
pub fn decode(uri: &str) -> Result<DataUri, RequestError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| RequestError::InvalidDataUri("missing `data:` scheme".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| RequestError::InvalidDataUri("missing `,` separator".into()))?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| RequestError::InvalidDataUri("only base64 data URIs are supported".into()))?;

    let mime = media_type.split(';').next().unwrap_or_default().trim();
    let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };

    Ok(DataUri {
        mime: mime.to_ascii_lowercase(),
        data: BASE64.decode(payload.trim())?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn png_uri_has_expected_prefix() {
        let uri = encode_png(&[0x89, b'P', b'N', b'G']);
        assert_eq!(uri, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn decode_reads_back_mime_and_bytes() {
        let uri = encode("image/jpeg", b"hello");
        let parsed = decode(&uri).unwrap();
        assert_eq!(parsed.mime, "image/jpeg");
        assert_eq!(parsed.data, b"hello");
        assert!(parsed.is_image());
    }

    #[test]
    fn parameters_are_dropped() {
        let parsed = decode("data:Image/PNG;name=a.png;base64,AA==").unwrap();
        assert_eq!(parsed.mime, "image/png");
        assert_eq!(parsed.data, vec![0]);
    }

    #[test]
    fn missing_media_type_defaults_to_text() {
        let parsed = decode("data:;base64,aGk=").unwrap();
        assert_eq!(parsed.mime, "text/plain");
        assert!(!parsed.is_image());
    }

    #[test]
    fn rejects_malformed_uris() {
        for bad in [
            "http://example.com/a.png",
            "data:image/png;base64",
            "data:image/png,plain-text",
        ] {
            assert!(
                matches!(decode(bad), Err(RequestError::InvalidDataUri(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn rejects_bad_base64() {
        assert!(matches!(
            decode("data:image/png;base64,!!!"),
            Err(RequestError::Base64(_))
        ));
    }
}
