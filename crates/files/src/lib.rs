//! Consent-document attachments.
//!
//! A registration carries one signed consent document, uploaded to the verification
//! service after the entity record exists. This crate owns the in-memory form of that
//! document:
//!
//! - [`AttachedFile`] holds the name, MIME type, size and raw bytes of the document
//! - the accepted MIME types and the size ceiling live in [`constants`]
//! - [`Preview`] is the best-effort, displayable rendering of image attachments
//!
//! Nothing here talks to the network; enforcing the limits before an upload is the form
//! model's job, which reads them through [`AttachedFile::is_allowed_type`] and
//! [`AttachedFile::is_within_size_limit`].
//!
//! ## Example
//!
//! ```no_run
//! use odc_files::{AttachedFile, Preview};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = AttachedFile::from_path(Path::new("consent.png"))?;
//! if let Some(preview) = Preview::decode(&file) {
//!     println!("{} bytes of preview", preview.data_url().len());
//! }
//! # Ok(())
//! # }
//! ```

mod attachment;
pub mod constants;
mod preview;

pub use attachment::AttachedFile;
pub use constants::{ALLOWED_MIME_TYPES, MAX_ATTACHMENT_BYTES};
pub use preview::Preview;

/// Errors that can occur while loading an attachment
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// The path does not name a regular file
    #[error("not a file: {0}")]
    NotAFile(String),

    /// The file name could not be derived from the path
    #[error("attachment has no usable file name: {0}")]
    MissingFileName(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FilesResult<T> = std::result::Result<T, FilesError>;
