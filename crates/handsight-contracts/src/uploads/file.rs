use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("unsupported file type '{mime_type}': only image/* files can be analyzed")]
    InvalidFileType { mime_type: String },
}

impl SelectionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidFileType { mime_type } => format!(
                "That file is not an image ({mime_type}). Please choose a JPG or PNG handwriting sample."
            ),
        }
    }
}

/// Raw bytes of the user's selection plus their declared mime type.
///
/// Immutable; a new selection always produces a new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    name: Option<String>,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(
        bytes: impl Into<Arc<[u8]>>,
        mime_type: &str,
        name: Option<String>,
    ) -> Result<Self, SelectionError> {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        if !mime_type.starts_with("image/") || !is_media_type(&mime_type) {
            return Err(SelectionError::InvalidFileType { mime_type });
        }
        Ok(Self {
            name: name.filter(|value| !value.trim().is_empty()),
            mime_type,
            bytes: bytes.into(),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name sent as the multipart file name.
    pub fn upload_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("upload.{}", extension_for_mime(&self.mime_type)))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Short content digest used to correlate log lines.
    pub fn digest(&self) -> String {
        let digest = Sha256::digest(self.bytes());
        hex::encode(&digest[..6])
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "heic" => Some("image/heic"),
        "txt" | "md" => Some("text/plain"),
        "json" => Some("application/json"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Declared mime type for a file picked from disk: extension first, then
/// a content sniff, then the opaque fallback.
pub fn detect_mime(path: &Path, bytes: &[u8]) -> String {
    if let Some(mime) = mime_for_path(path) {
        return mime.to_string();
    }
    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| FALLBACK_MIME.to_string())
}

/// `type/subtype` followed by `; name=value` parameters, where every name
/// and bare value is an RFC 7230 token and values may also be quoted.
fn is_media_type(value: &str) -> bool {
    let mut parts = value.split(';');
    let essence = parts.next().unwrap_or_default().trim_end();
    let Some((kind, subtype)) = essence.split_once('/') else {
        return false;
    };
    if !is_token(kind) || !is_token(subtype) {
        return false;
    }
    parts.all(|param| {
        let Some((name, raw)) = param.trim().split_once('=') else {
            return false;
        };
        let quoted = raw
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .is_some_and(|inner| !inner.contains('"'));
        is_token(name) && (is_token(raw) || quoted)
    })
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte))
}

fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "png",
    }
}
