//! Client-side checks that run before any network call.
//!
//! Checks run in a fixed order and the first failure is returned:
//!
//! 1. required entity fields are present, in schema order
//! 2. present fields are well formed, in schema order
//! 3. guardian name and relation, when a guardian signs
//! 4. a consent document is attached
//! 5. its MIME type is JPEG, PNG or PDF
//! 6. it is no larger than 5 MiB

use crate::draft::{RegistrationDraft, SignerInfo};
use crate::error::ValidationError;
use crate::schema;
use odc_files::{AttachedFile, MAX_ATTACHMENT_BYTES};
use odc_types::SignerType;

/// Runs every check against a full submission.
pub fn validate(
    draft: &RegistrationDraft,
    signer: &SignerInfo,
    file: Option<&AttachedFile>,
) -> Result<(), ValidationError> {
    validate_entity(draft)?;
    validate_signature(signer, file)
}

/// Entity field checks only.
pub fn validate_entity(draft: &RegistrationDraft) -> Result<(), ValidationError> {
    let fields = schema::fields_for(draft.kind());

    if let Some(spec) = fields
        .iter()
        .find(|spec| spec.required && draft.get(spec.key).is_none())
    {
        return Err(ValidationError::MissingField {
            key: spec.key,
            label: spec.label,
        });
    }

    for spec in fields {
        if let Some(value) = draft.get(spec.key) {
            spec.check(value)?;
        }
    }

    Ok(())
}

/// Signer and attachment checks, shared by a full submit and a signature-only retry.
pub fn validate_signature(
    signer: &SignerInfo,
    file: Option<&AttachedFile>,
) -> Result<(), ValidationError> {
    if signer.signer_type() == SignerType::Guardian {
        if signer.guardian_name().is_none() {
            return Err(ValidationError::MissingGuardianName);
        }
        if signer.guardian_relation().is_none() {
            return Err(ValidationError::MissingGuardianRelation);
        }
    }

    let file = file.ok_or(ValidationError::MissingSignatureFile)?;

    if !file.is_allowed_type() {
        return Err(ValidationError::UnsupportedFileType {
            mime_type: file.mime_type().to_string(),
        });
    }

    if !file.is_within_size_limit() {
        return Err(ValidationError::FileTooLarge {
            size_bytes: file.size_bytes(),
            limit_bytes: MAX_ATTACHMENT_BYTES,
        });
    }

    Ok(())
}
