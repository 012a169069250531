//! Attachment limits shared by the form model and the stub collaborator.

/// MIME type for JPEG images.
pub const MIME_JPEG: &str = "image/jpeg";

/// MIME type for PNG images.
pub const MIME_PNG: &str = "image/png";

/// MIME type for PDF documents.
pub const MIME_PDF: &str = "application/pdf";

/// Fallback when neither the content nor the extension identifies the file.
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// Document types the verification service accepts.
pub const ALLOWED_MIME_TYPES: [&str; 3] = [MIME_JPEG, MIME_PNG, MIME_PDF];

/// Largest attachment the verification service accepts (5 MiB).
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;
