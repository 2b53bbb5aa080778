//! Inline media attachments.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reelforge_error::{ReelforgeResult, ValidationError};
use serde::{Deserialize, Serialize};

/// An attachment as it arrives over the wire: base64 or a data URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttachmentPayload {
    /// Original file name
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub name: Option<String>,
    /// Declared MIME type
    #[serde(default, rename = "type", deserialize_with = "crate::lenient::text")]
    pub mime_type: Option<String>,
    /// Base64 payload, optionally wrapped in a `data:` URL
    #[serde(default, deserialize_with = "crate::lenient::text")]
    pub data: Option<String>,
}

/// A decoded attachment that lives only for one request.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct MediaAttachment {
    name: String,
    mime_type: String,
    bytes: Vec<u8>,
}

impl MediaAttachment {
    /// Create an attachment from already-decoded bytes.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Size of the decoded payload.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File extension (with leading dot) to use when writing this attachment.
    ///
    /// Prefers the extension of the original name, falls back to the MIME type.
    pub fn extension(&self) -> String {
        let from_name = std::path::Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
        match from_name {
            Some(ext) => format!(".{}", ext.to_ascii_lowercase()),
            None => extension_for_mime(&self.mime_type).to_string(),
        }
    }
}

impl AttachmentPayload {
    /// Decode the payload. A `data:` URL also supplies the MIME type when
    /// none was declared.
    ///
    /// # Examples
    ///
    /// ```
    /// use reelforge_core::AttachmentPayload;
    ///
    /// let payload = AttachmentPayload {
    ///     name: Some("dot.png".to_string()),
    ///     mime_type: None,
    ///     data: Some("data:image/png;base64,aGVsbG8=".to_string()),
    /// };
    /// let attachment = payload.decode().unwrap();
    /// assert_eq!(attachment.mime_type(), "image/png");
    /// assert_eq!(attachment.bytes(), b"hello");
    /// ```
    pub fn decode(&self) -> ReelforgeResult<MediaAttachment> {
        let name = self.name.clone().unwrap_or_else(|| "attachment".to_string());
        let raw = self
            .data
            .as_deref()
            .ok_or_else(|| ValidationError::new(format!("Missing data for '{}'.", name)))?;

        let (url_mime, encoded) = split_data_url(raw);
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| ValidationError::new(format!("Invalid base64 data for '{}'.", name)))?;

        let mime_type = self
            .mime_type
            .clone()
            .or(url_mime)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(MediaAttachment::new(name, mime_type, bytes))
    }
}

/// Split `data:<mime>;base64,<payload>` into its MIME type and payload.
fn split_data_url(raw: &str) -> (Option<String>, &str) {
    let Some(rest) = raw.strip_prefix("data:") else {
        return (None, raw);
    };
    match rest.split_once(',') {
        Some((header, payload)) => {
            let mime = header.split(';').next().unwrap_or("").trim();
            ((!mime.is_empty()).then(|| mime.to_string()), payload)
        }
        None => (None, rest),
    }
}

/// Map a MIME type to a file extension, `.bin` when unknown.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/webp" => ".webp",
        "image/gif" => ".gif",
        "video/mp4" => ".mp4",
        "video/quicktime" => ".mov",
        "video/webm" => ".webm",
        _ => ".bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_base64_keeps_declared_type() {
        let payload = AttachmentPayload {
            name: Some("clip.mp4".to_string()),
            mime_type: Some("video/mp4".to_string()),
            data: Some("AAEC".to_string()),
        };
        let attachment = payload.decode().unwrap();
        assert_eq!(attachment.bytes(), &vec![0u8, 1, 2]);
        assert_eq!(attachment.mime_type(), "video/mp4");
        assert_eq!(attachment.extension(), ".mp4");
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let payload = AttachmentPayload {
            name: Some("x.png".to_string()),
            mime_type: None,
            data: Some("!!not base64!!".to_string()),
        };
        let err = payload.decode().unwrap_err();
        assert!(err.to_string().contains("Invalid base64"));
    }

    #[test]
    fn test_extension_falls_back_to_mime() {
        let attachment = MediaAttachment::new("upload", "image/webp", vec![1]);
        assert_eq!(attachment.extension(), ".webp");
        let unknown = MediaAttachment::new("upload", "application/x-thing", vec![1]);
        assert_eq!(unknown.extension(), ".bin");
    }
}
