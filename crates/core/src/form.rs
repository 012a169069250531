//! Registration form model: the draft, the signer, the attached document and its preview.
//!
//! Image previews are decoded off the caller's task. A decode that finishes after the form
//! was dropped, or after the attachment was replaced or removed, is discarded.

use crate::draft::{RegistrationDraft, SignerInfo};
use crate::error::{RegistrationResult, ValidationError};
use crate::validation;
use odc_files::{AttachedFile, Preview};
use odc_types::EntityKind;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
struct PreviewSlot {
    generation: u64,
    preview: Option<Preview>,
}

#[derive(Debug)]
pub struct RegistrationForm {
    draft: RegistrationDraft,
    signer: SignerInfo,
    attachment: Option<AttachedFile>,
    preview: Arc<Mutex<PreviewSlot>>,
    pending_preview: Option<JoinHandle<()>>,
}

impl RegistrationForm {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            draft: RegistrationDraft::new(kind),
            signer: SignerInfo::own(),
            attachment: None,
            preview: Arc::new(Mutex::new(PreviewSlot::default())),
            pending_preview: None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.draft.kind()
    }

    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    pub fn signer(&self) -> &SignerInfo {
        &self.signer
    }

    pub fn signer_mut(&mut self) -> &mut SignerInfo {
        &mut self.signer
    }

    pub fn attachment(&self) -> Option<&AttachedFile> {
        self.attachment.as_ref()
    }

    pub fn set_field(&mut self, key: &str, value: impl AsRef<str>) -> RegistrationResult<()> {
        self.draft.set(key, value)
    }

    pub fn set_signer(&mut self, signer: SignerInfo) {
        self.signer = signer;
    }

    /// Replaces the attached document and starts decoding its preview.
    ///
    /// Inside a tokio runtime the decode runs on the blocking pool; outside one it runs
    /// inline.
    pub fn attach(&mut self, file: AttachedFile) {
        tracing::debug!(
            "attached {} ({}, {} bytes, sha256 {})",
            file.name(),
            file.mime_type(),
            file.size_bytes(),
            file.digest()
        );

        let generation = self.invalidate_preview();
        if file.is_image() {
            let slot = Arc::downgrade(&self.preview);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let file = file.clone();
                    self.pending_preview = Some(handle.spawn_blocking(move || {
                        store_preview(&slot, generation, Preview::decode(&file));
                    }));
                }
                Err(_) => store_preview(&slot, generation, Preview::decode(&file)),
            }
        }
        self.attachment = Some(file);
    }

    /// Reads a document from disk and attaches it.
    pub fn attach_path(&mut self, path: &Path) -> RegistrationResult<()> {
        let file = AttachedFile::from_path(path)?;
        self.attach(file);
        Ok(())
    }

    /// Removes the attached document and any preview of it.
    pub fn detach(&mut self) {
        self.invalidate_preview();
        self.attachment = None;
    }

    /// The decoded preview of the current attachment, once available.
    pub fn preview(&self) -> Option<Preview> {
        self.preview
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .preview
            .clone()
    }

    /// Handle on the decode started by the last [`RegistrationForm::attach`], if any.
    pub fn take_pending_preview(&mut self) -> Option<JoinHandle<()>> {
        self.pending_preview.take()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(&self.draft, &self.signer, self.attachment.as_ref())
    }

    pub fn validate_signature(&self) -> Result<(), ValidationError> {
        validation::validate_signature(&self.signer, self.attachment.as_ref())
    }

    /// Back to an empty form of the same kind.
    pub fn reset(&mut self) {
        self.draft.clear();
        self.signer = SignerInfo::own();
        self.detach();
    }

    pub fn is_empty(&self) -> bool {
        self.draft.is_empty() && self.attachment.is_none()
    }

    fn invalidate_preview(&mut self) -> u64 {
        self.pending_preview = None;
        let mut slot = self.preview.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        slot.preview = None;
        slot.generation
    }
}

fn store_preview(slot: &Weak<Mutex<PreviewSlot>>, generation: u64, preview: Option<Preview>) {
    let Some(slot) = slot.upgrade() else {
        tracing::debug!("form closed before preview decoded; discarding");
        return;
    };
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.generation != generation {
        tracing::debug!("attachment changed before preview decoded; discarding");
        return;
    }
    slot.preview = preview;
}
