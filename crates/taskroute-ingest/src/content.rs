//! Content storage and text extraction.
//!
//! `ContentStore` is the seam to the storage/transcription service. The
//! local implementation keeps bytes on disk, content-addressed by SHA-256,
//! and extracts text from text-like media types only. Audio and video
//! transcription belong to an external service.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use taskroute_core::{Error, Result};
use tracing::debug;

const LOCAL_SCHEME: &str = "local://";

/// Text derived from an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Extracted text; empty when nothing could be derived.
    pub text: String,
    pub language: Option<String>,
    pub duration_ms: Option<i64>,
}

/// Storage/extraction collaborator.
pub trait ContentStore: Send + Sync {
    /// Persist bytes and return a locator for them.
    fn store(&self, bytes: &[u8], media_type: &str) -> Result<String>;

    /// Read back the bytes behind a locator.
    fn fetch(&self, locator: &str) -> Result<Vec<u8>>;

    /// Derive text from bytes. Returns an empty extraction when the media
    /// type carries no extractable text.
    fn extract_text(&self, bytes: &[u8], media_type: &str) -> Result<Extraction>;
}

/// Filesystem-backed content store rooted at the uploads directory.
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(Self { root })
    }

    fn path_for(&self, locator: &str) -> Result<PathBuf> {
        let key = locator
            .strip_prefix(LOCAL_SCHEME)
            .ok_or_else(|| Error::InvalidInput(format!("unsupported locator '{}'", locator)))?;
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!("malformed locator '{}'", locator)));
        }
        Ok(self.root.join(key))
    }
}

impl ContentStore for LocalContentStore {
    fn store(&self, bytes: &[u8], _media_type: &str) -> Result<String> {
        let key = content_hash(bytes);
        let path = self.root.join(&key);
        if !path.exists() {
            std::fs::write(&path, bytes).map_err(|e| Error::Storage(e.to_string()))?;
        }
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(format!("{}{}", LOCAL_SCHEME, key))
    }

    fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        let path = self.path_for(locator)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("stored content {}", locator)))
            }
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    fn extract_text(&self, bytes: &[u8], media_type: &str) -> Result<Extraction> {
        let text = match MediaKind::from_media_type(media_type) {
            MediaKind::Text => String::from_utf8_lossy(bytes).into_owned(),
            MediaKind::Json => extract_json(bytes),
            MediaKind::AudioVideo => String::new(),
            MediaKind::Unknown => sniff_text(bytes).unwrap_or_default(),
        };
        Ok(Extraction {
            text,
            language: None,
            duration_ms: None,
        })
    }
}

/// Coarse classification of a media type for extraction purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Text,
    Json,
    AudioVideo,
    Unknown,
}

impl MediaKind {
    fn from_media_type(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/json" => Self::Json,
            "application/xml" | "application/yaml" | "application/x-yaml" | "application/toml" => {
                Self::Text
            }
            t if t.starts_with("text/") => Self::Text,
            t if t.ends_with("+json") => Self::Json,
            t if t.starts_with("audio/") || t.starts_with("video/") => Self::AudioVideo,
            _ => Self::Unknown,
        }
    }
}

/// Flatten every string value of a JSON document into lines. Falls back to
/// the raw text when the bytes are not valid JSON.
fn extract_json(bytes: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => {
            let mut lines = Vec::new();
            collect_strings(&value, &mut lines);
            lines.join("\n")
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => out.push(s.clone()),
        serde_json::Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        serde_json::Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

/// Treat unknown bytes as text when they are valid UTF-8 and mostly printable.
fn sniff_text(bytes: &[u8]) -> Option<String> {
    let content = std::str::from_utf8(bytes).ok()?;
    let control = content
        .chars()
        .filter(|c| c.is_control() && *c != '\n' && *c != '\r' && *c != '\t')
        .count();
    if control > content.len() / 10 {
        None
    } else {
        Some(content.to_string())
    }
}

/// Compute SHA-256 content hash.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
