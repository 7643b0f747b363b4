use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::messages::Message;

/// Largest decoded image accepted by the remote edit service.
pub const DEFAULT_PAYLOAD_CEILING_BYTES: usize = 5 * 1024 * 1024;

/// A user-selected file as it arrives at the input boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or("image")
            .to_string();
        let mime_type = mime_for_path(path)
            .or_else(|| sniff_image_mime(&bytes))
            .unwrap_or("application/octet-stream")
            .to_string();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    /// Upstream filter: only `image/*` files reach the normalizer or converter.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) if idx > 0 => &self.name[..idx],
            _ => self.name.as_str(),
        }
    }
}

/// Transport form of an image: standard base64 plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub base64: String,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(base64: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            base64: base64.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::new(BASE64.encode(bytes), mime_type)
    }

    /// Decoded size implied by the base64 length, without decoding.
    pub fn estimated_decoded_len(&self) -> usize {
        let trimmed = self.base64.trim_end();
        let padding = trimmed
            .bytes()
            .rev()
            .take_while(|byte| *byte == b'=')
            .count();
        (trimmed.len() / 4 * 3 + (trimmed.len() % 4) * 3 / 4).saturating_sub(padding)
    }

    pub fn exceeds(&self, ceiling_bytes: usize) -> bool {
        self.estimated_decoded_len() > ceiling_bytes
    }

    /// Raw image bytes. Fails with the invalid-image-data message when the
    /// base64 does not decode.
    pub fn decode_bytes(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.base64.trim().as_bytes())
            .with_context(|| Message::InvalidImageData.text())
    }

    /// Short content hash used to correlate payloads across events.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.mime_type.as_bytes());
        hasher.update(self.base64.as_bytes());
        hex::encode(&hasher.finalize()[..6])
    }

    pub fn file_extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }

    /// `data:<mime>;base64,<payload>`, the form a front end displays.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let lowered = mime_type.trim().to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("png") {
        return "png";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "bin"
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())?;
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some("image/png");
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"GIF8") {
        return Some("image/gif");
    }
    None
}
