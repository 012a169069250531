//! Displayable previews of image attachments.

use crate::AttachedFile;
use base64::{engine::general_purpose, Engine as _};

/// A `data:` URL rendering of an image attachment.
#[derive(Clone, PartialEq, Eq)]
pub struct Preview {
    mime_type: String,
    data_url: String,
}

impl Preview {
    /// Decodes an attachment into a preview.
    ///
    /// Returns `None` when the attachment is not an image, or when its bytes do not sniff
    /// as the declared image type. A missing preview never blocks a submission.
    pub fn decode(file: &AttachedFile) -> Option<Self> {
        if !file.is_image() {
            return None;
        }

        let detected = infer::get(file.bytes())?;
        if detected.mime_type() != file.mime_type() {
            tracing::debug!(
                "preview skipped for {}: declared {} but content is {}",
                file.name(),
                file.mime_type(),
                detected.mime_type()
            );
            return None;
        }

        let encoded = general_purpose::STANDARD.encode(file.bytes());
        Some(Self {
            mime_type: file.mime_type().to_owned(),
            data_url: format!("data:{};base64,{}", file.mime_type(), encoded),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

impl std::fmt::Debug for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preview")
            .field("mime_type", &self.mime_type)
            .field("data_url_len", &self.data_url.len())
            .finish()
    }
}
