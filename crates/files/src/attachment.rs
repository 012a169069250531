//! The attached consent document.
//!
//! # MIME resolution
//!
//! The declared type is what travels with the upload, so it must be right even when the
//! operator picked a file with a misleading extension. Resolution order:
//!
//! 1. content sniffing with `infer` (magic bytes)
//! 2. the file extension (`.jpg`/`.jpeg`, `.png`, `.pdf`)
//! 3. `application/octet-stream`
//!
//! A result of step 3 is always rejected by the whitelist check.

use crate::constants::{
    ALLOWED_MIME_TYPES, MAX_ATTACHMENT_BYTES, MIME_JPEG, MIME_OCTET_STREAM, MIME_PDF, MIME_PNG,
};
use crate::{FilesError, FilesResult};
use odc_types::NonEmptyText;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;

/// A document attached to a registration form.
///
/// The size is always the length of the held bytes; it cannot drift from the content.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachedFile {
    name: NonEmptyText,
    mime_type: String,
    bytes: Vec<u8>,
}

impl AttachedFile {
    /// Builds an attachment from bytes already in memory with a caller-declared MIME type.
    pub fn new(name: NonEmptyText, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name,
            mime_type: mime_type.into().trim().to_ascii_lowercase(),
            bytes,
        }
    }

    /// Builds an attachment from bytes, resolving the MIME type from content and name.
    pub fn sniffed(name: NonEmptyText, bytes: Vec<u8>) -> Self {
        let mime_type = resolve_mime_type(name.as_str(), &bytes);
        Self::new(name, mime_type, bytes)
    }

    /// Reads an attachment from disk.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - the path is not a regular file
    /// - the path has no UTF-8 file name
    /// - reading fails (I/O)
    pub fn from_path(path: &Path) -> FilesResult<Self> {
        let metadata = fs::metadata(path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to stat {}: {}", path.display(), e),
            ))
        })?;
        if !metadata.is_file() {
            return Err(FilesError::NotAFile(path.display().to_string()));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| NonEmptyText::new(n).ok())
            .ok_or_else(|| FilesError::MissingFileName(path.display().to_string()))?;

        let bytes = fs::read(path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read {}: {}", path.display(), e),
            ))
        })?;

        let file = Self::sniffed(name, bytes);
        tracing::debug!(
            "loaded attachment {} ({}, {} bytes)",
            file.name(),
            file.mime_type(),
            file.size_bytes()
        );
        Ok(file)
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_allowed_type(&self) -> bool {
        ALLOWED_MIME_TYPES.contains(&self.mime_type.as_str())
    }

    pub fn is_within_size_limit(&self) -> bool {
        self.size_bytes() <= MAX_ATTACHMENT_BYTES
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Hex SHA-256 of the content, used to identify the document in logs.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        hex::encode(hasher.finalize())
    }
}

// Raw bytes stay out of logs.
impl fmt::Debug for AttachedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachedFile")
            .field("name", &self.name.as_str())
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

fn resolve_mime_type(name: &str, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_owned();
    }

    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => MIME_JPEG,
        Some("png") => MIME_PNG,
        Some("pdf") => MIME_PDF,
        _ => MIME_OCTET_STREAM,
    }
    .to_owned()
}
