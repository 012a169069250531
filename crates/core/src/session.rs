//! The registration state machine, free of I/O.
//!
//! ```text
//! Idle ─submit─▶ Validating ─ok─▶ CreatingEntity ─id─▶ UploadingSignature ─▶ Completed(Success|Warning)
//!                    │                  │
//!                    └──invalid──▶ Failed ◀──rejected/transport/timeout
//! ```
//!
//! [`RegistrationSession`] owns the form and the current state. The orchestrator feeds it
//! the results of network calls; it answers with the next request to send or the final
//! outcome. A creation failure has no path to the upload step.

use crate::error::{RegistrationError, RegistrationResult};
use crate::form::RegistrationForm;
use crate::outcome::{OutcomeReason, OutcomeStatus, SubmissionOutcome};
use odc_client::{ApiReply, ClientError, ClientResult, CreatedEntity, SignatureUpload, StoredSignature};
use odc_types::{EntityId, EntityKind, SignerType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Validating,
    CreatingEntity,
    UploadingSignature,
    /// Success or Warning.
    Completed(OutcomeStatus),
    Failed,
}

impl SubmissionState {
    /// A submission is in flight; submit and retry are ignored.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            SubmissionState::Validating
                | SubmissionState::CreatingEntity
                | SubmissionState::UploadingSignature
        )
    }
}

/// The creation request to send.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateEntityStep {
    pub kind: EntityKind,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmitStart {
    /// A submission is already in flight.
    Busy,
    /// Validation failed; no request may be sent.
    Invalid(SubmissionOutcome),
    Create(CreateEntityStep),
}

#[derive(Clone, Debug, PartialEq)]
pub enum AfterCreate {
    Upload(SignatureUpload),
    Finished(SubmissionOutcome),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RetryStart {
    Busy,
    Invalid(SubmissionOutcome),
    Upload(SignatureUpload),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub outcome: SubmissionOutcome,
    /// The upload hit an authorisation failure whose signal the caller must publish once
    /// the outcome is recorded.
    pub deferred_unauthenticated: bool,
}

/// Upload contents captured when a submission starts. Edits made while the request is in
/// flight do not leak into it.
#[derive(Clone, Debug)]
struct UploadDraft {
    kind: EntityKind,
    file_name: String,
    mime_type: String,
    bytes: Vec<u8>,
    signer_name: String,
    signer_type: SignerType,
    guardian_name: Option<String>,
    guardian_relation: Option<String>,
}

impl UploadDraft {
    fn capture(form: &RegistrationForm, signer_name: String) -> Option<Self> {
        let file = form.attachment()?;
        let signer = form.signer();
        Some(Self {
            kind: form.kind(),
            file_name: file.name().to_string(),
            mime_type: file.mime_type().to_string(),
            bytes: file.bytes().to_vec(),
            signer_name,
            signer_type: signer.signer_type(),
            guardian_name: signer.guardian_name().map(str::to_string),
            guardian_relation: signer.guardian_relation().map(str::to_string),
        })
    }

    fn into_upload(self, entity_id: EntityId) -> SignatureUpload {
        SignatureUpload {
            file_name: self.file_name,
            mime_type: self.mime_type,
            bytes: self.bytes,
            signer_name: self.signer_name,
            signer_type: self.signer_type,
            entity_kind: self.kind,
            entity_id,
            guardian_name: self.guardian_name,
            guardian_relation: self.guardian_relation,
        }
    }
}

/// A record that exists without verified consent.
#[derive(Clone, Debug)]
struct UnverifiedEntity {
    entity_id: EntityId,
    signer_name: String,
}

#[derive(Debug)]
pub struct RegistrationSession {
    form: RegistrationForm,
    state: SubmissionState,
    outcome: Option<SubmissionOutcome>,
    pending_upload: Option<UploadDraft>,
    current_entity: Option<UnverifiedEntity>,
    unverified: Option<UnverifiedEntity>,
    attempts: u32,
}

impl RegistrationSession {
    pub fn new(kind: EntityKind) -> Self {
        Self::with_form(RegistrationForm::new(kind))
    }

    pub fn with_form(form: RegistrationForm) -> Self {
        Self {
            form,
            state: SubmissionState::Idle,
            outcome: None,
            pending_upload: None,
            current_entity: None,
            unverified: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// The latest attempt's outcome.
    pub fn outcome(&self) -> Option<&SubmissionOutcome> {
        self.outcome.as_ref()
    }

    pub fn form(&self) -> &RegistrationForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut RegistrationForm {
        &mut self.form
    }

    pub fn kind(&self) -> EntityKind {
        self.form.kind()
    }

    /// The record awaiting a verified consent document, after a Warning.
    pub fn unverified_entity(&self) -> Option<&EntityId> {
        self.unverified.as_ref().map(|u| &u.entity_id)
    }

    /// Starts a full submission: validate, then create the entity.
    pub fn begin_submit(&mut self) -> SubmitStart {
        if self.state.is_busy() {
            tracing::debug!(
                "{} submit ignored while {:?}",
                self.kind(),
                self.state
            );
            return SubmitStart::Busy;
        }

        self.attempts += 1;
        self.outcome = None;
        self.transition(SubmissionState::Validating);

        if let Err(e) = self.form.validate() {
            tracing::info!("{} submission blocked by validation: {}", self.kind(), e);
            let outcome = SubmissionOutcome::new(
                OutcomeStatus::Error,
                OutcomeReason::Validation,
                e.to_string(),
                self.attempts,
            );
            return SubmitStart::Invalid(self.fail(outcome));
        }

        let signer_name = self.form.draft().name().unwrap_or_default().to_string();
        let Some(upload) = UploadDraft::capture(&self.form, signer_name) else {
            // Validation guarantees an attachment.
            let outcome = SubmissionOutcome::new(
                OutcomeStatus::Error,
                OutcomeReason::Validation,
                crate::ValidationError::MissingSignatureFile.to_string(),
                self.attempts,
            );
            return SubmitStart::Invalid(self.fail(outcome));
        };

        let step = CreateEntityStep {
            kind: self.kind(),
            payload: self.form.draft().payload(),
        };
        self.pending_upload = Some(upload);
        self.current_entity = None;
        self.transition(SubmissionState::CreatingEntity);
        SubmitStart::Create(step)
    }

    /// Records the creation reply.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnexpectedEvent`] unless the session is creating an
    /// entity.
    pub fn entity_created(
        &mut self,
        result: ClientResult<ApiReply<CreatedEntity>>,
    ) -> RegistrationResult<AfterCreate> {
        self.expect_state(SubmissionState::CreatingEntity, "entity creation reply")?;
        let kind = self.kind();

        let (reason, message) = match result {
            Ok(ApiReply::Accepted(created)) => {
                let Some(upload) = self.pending_upload.take() else {
                    return Err(self.unexpected("entity creation reply"));
                };
                tracing::info!("{} record {} created", kind, created.id);
                // A new record supersedes any earlier unverified one.
                self.unverified = None;
                self.current_entity = Some(UnverifiedEntity {
                    entity_id: created.id.clone(),
                    signer_name: upload.signer_name.clone(),
                });
                self.transition(SubmissionState::UploadingSignature);
                return Ok(AfterCreate::Upload(upload.into_upload(created.id)));
            }
            Ok(ApiReply::Rejected { status, message }) => {
                tracing::error!("{} creation rejected (HTTP {}): {}", kind, status, message);
                (OutcomeReason::EntityRejected, message)
            }
            Err(ClientError::Timeout { after_ms }) => (
                OutcomeReason::Timeout,
                format!("records service did not respond within {} ms", after_ms),
            ),
            Err(ClientError::Unauthenticated) => (
                OutcomeReason::SessionExpired,
                "session expired; sign in again to register".to_string(),
            ),
            Err(e) => (OutcomeReason::Transport, e.to_string()),
        };

        if reason != OutcomeReason::EntityRejected {
            tracing::error!("{} creation failed: {}", kind, message);
        }
        self.pending_upload = None;
        let outcome = SubmissionOutcome::new(OutcomeStatus::Error, reason, message, self.attempts);
        Ok(AfterCreate::Finished(self.fail(outcome)))
    }

    /// Records the verification reply and completes the attempt.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnexpectedEvent`] unless an upload is in flight.
    pub fn signature_stored(
        &mut self,
        result: ClientResult<ApiReply<StoredSignature>>,
    ) -> RegistrationResult<Completion> {
        self.expect_state(SubmissionState::UploadingSignature, "verification reply")?;
        let Some(entity) = self.current_entity.take() else {
            return Err(self.unexpected("verification reply"));
        };
        let kind = self.kind();
        let mut deferred_unauthenticated = false;

        let warning = |reason, message: String| (OutcomeStatus::Warning, reason, message);
        let (status, reason, message) = match result {
            Ok(ApiReply::Accepted(stored))
                if !stored.ipfs_hash.trim().is_empty()
                    && !stored.ethereum_tx_hash.trim().is_empty() =>
            {
                let mut outcome = SubmissionOutcome::new(
                    OutcomeStatus::Success,
                    OutcomeReason::Verified,
                    format!("{} registered and consent verified", kind.label()),
                    self.attempts,
                )
                .with_entity(entity.entity_id);
                outcome.content_hash = Some(stored.ipfs_hash);
                outcome.ledger_tx_id = Some(stored.ethereum_tx_hash);
                tracing::info!(
                    "{} record verified (attempt {})",
                    kind,
                    self.attempts
                );
                self.unverified = None;
                return Ok(Completion {
                    outcome: self.complete(outcome),
                    deferred_unauthenticated,
                });
            }
            Ok(ApiReply::Accepted(_)) => warning(
                OutcomeReason::VerificationRejected,
                "verification service returned no proof of storage".to_string(),
            ),
            Ok(ApiReply::Rejected { message, .. }) => {
                warning(OutcomeReason::VerificationRejected, message)
            }
            Err(ClientError::Unauthenticated) => {
                deferred_unauthenticated = true;
                warning(
                    OutcomeReason::SessionExpired,
                    "session expired before the consent document was verified".to_string(),
                )
            }
            Err(ClientError::Timeout { after_ms }) => warning(
                OutcomeReason::Timeout,
                format!("verification service did not respond within {} ms", after_ms),
            ),
            Err(e) => warning(OutcomeReason::Transport, e.to_string()),
        };

        tracing::warn!(
            "{} record {} exists but consent is unverified: {}",
            kind,
            entity.entity_id,
            message
        );
        let outcome = SubmissionOutcome::new(status, reason, message, self.attempts)
            .with_entity(entity.entity_id.clone());
        self.unverified = Some(entity);
        Ok(Completion {
            outcome: self.complete(outcome),
            deferred_unauthenticated,
        })
    }

    /// Starts an upload-only attempt for the record left unverified by a Warning.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::NothingToRetry`] when no record is awaiting consent.
    pub fn begin_signature_retry(&mut self) -> RegistrationResult<RetryStart> {
        if self.state.is_busy() {
            return Ok(RetryStart::Busy);
        }
        let entity = self
            .unverified
            .clone()
            .ok_or(RegistrationError::NothingToRetry)?;

        self.attempts += 1;
        self.outcome = None;
        self.transition(SubmissionState::Validating);

        if let Err(e) = self.form.validate_signature() {
            tracing::info!("{} signature retry blocked by validation: {}", self.kind(), e);
            let outcome = SubmissionOutcome::new(
                OutcomeStatus::Error,
                OutcomeReason::Validation,
                e.to_string(),
                self.attempts,
            )
            .with_entity(entity.entity_id);
            return Ok(RetryStart::Invalid(self.fail(outcome)));
        }

        let Some(upload) = UploadDraft::capture(&self.form, entity.signer_name.clone()) else {
            return Err(self.unexpected("signature retry"));
        };
        tracing::info!(
            "retrying consent upload for {} record {}",
            self.kind(),
            entity.entity_id
        );
        let upload = upload.into_upload(entity.entity_id.clone());
        self.current_entity = Some(entity);
        self.transition(SubmissionState::UploadingSignature);
        Ok(RetryStart::Upload(upload))
    }

    /// Settles an attempt whose reply will never arrive.
    ///
    /// A record that was already created is kept for [`Self::begin_signature_retry`].
    /// Returns `None` when nothing is in flight.
    pub fn abandon(&mut self) -> Option<SubmissionOutcome> {
        let kind = self.kind();
        let entity = match self.state {
            SubmissionState::Validating | SubmissionState::CreatingEntity => None,
            SubmissionState::UploadingSignature => self.current_entity.take(),
            _ => return None,
        };
        self.pending_upload = None;

        let Some(entity) = entity else {
            tracing::warn!("{} submission cancelled before the record was created", kind);
            let outcome = SubmissionOutcome::new(
                OutcomeStatus::Error,
                OutcomeReason::Cancelled,
                "submission was cancelled before the record was created",
                self.attempts,
            );
            return Some(self.fail(outcome));
        };

        tracing::warn!(
            "{} record {} exists but the consent upload was cancelled",
            kind,
            entity.entity_id
        );
        let outcome = SubmissionOutcome::new(
            OutcomeStatus::Warning,
            OutcomeReason::Cancelled,
            "consent upload was cancelled; the record is unverified",
            self.attempts,
        )
        .with_entity(entity.entity_id.clone());
        self.unverified = Some(entity);
        Some(self.complete(outcome))
    }

    /// Back to `Idle` with an empty form. Refused while a submission is in flight.
    pub fn reset(&mut self) -> bool {
        if self.state.is_busy() {
            return false;
        }
        self.form.reset();
        self.outcome = None;
        self.pending_upload = None;
        self.current_entity = None;
        self.unverified = None;
        self.attempts = 0;
        self.transition(SubmissionState::Idle);
        true
    }

    fn complete(&mut self, outcome: SubmissionOutcome) -> SubmissionOutcome {
        self.transition(SubmissionState::Completed(outcome.status));
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn fail(&mut self, outcome: SubmissionOutcome) -> SubmissionOutcome {
        self.transition(SubmissionState::Failed);
        self.outcome = Some(outcome.clone());
        outcome
    }

    fn transition(&mut self, next: SubmissionState) {
        tracing::debug!("{} submission {:?} -> {:?}", self.kind(), self.state, next);
        self.state = next;
    }

    fn expect_state(
        &self,
        expected: SubmissionState,
        event: &'static str,
    ) -> RegistrationResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(self.unexpected(event))
        }
    }

    fn unexpected(&self, event: &'static str) -> RegistrationError {
        RegistrationError::UnexpectedEvent {
            event,
            state: format!("{:?}", self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::SignerInfo;
    use odc_files::AttachedFile;
    use odc_types::NonEmptyText;

    fn ready_session() -> RegistrationSession {
        let mut session = RegistrationSession::new(EntityKind::Patient);
        let form = session.form_mut();
        for (key, value) in [
            ("name", "Grace Hopper"),
            ("age", "52"),
            ("gender", "Female"),
            ("bloodType", "B-"),
            ("organNeeded", "Liver"),
            ("urgencyLevel", "High"),
            ("medicalCondition", "Cirrhosis"),
            ("address", "1 Navy Yard"),
            ("contactNumber", "555 0100 200"),
            ("hospitalId", "H-2"),
        ] {
            form.set_field(key, value).unwrap();
        }
        form.attach(AttachedFile::new(
            NonEmptyText::new("consent.pdf").unwrap(),
            "application/pdf",
            b"%PDF-1.7 signed".to_vec(),
        ));
        session
    }

    fn created(id: &str) -> ClientResult<ApiReply<CreatedEntity>> {
        Ok(ApiReply::Accepted(CreatedEntity {
            id: EntityId::new(id).unwrap(),
        }))
    }

    fn stored(hash: &str, tx: &str) -> ClientResult<ApiReply<StoredSignature>> {
        Ok(ApiReply::Accepted(StoredSignature {
            ipfs_hash: hash.into(),
            ethereum_tx_hash: tx.into(),
        }))
    }

    fn start_upload(session: &mut RegistrationSession, id: &str) -> SignatureUpload {
        assert!(matches!(session.begin_submit(), SubmitStart::Create(_)));
        match session.entity_created(created(id)).unwrap() {
            AfterCreate::Upload(upload) => upload,
            other => panic!("expected upload, got {:?}", other),
        }
    }

    #[test]
    fn happy_path_visits_every_state() {
        let mut session = ready_session();
        assert_eq!(session.state(), SubmissionState::Idle);

        let SubmitStart::Create(step) = session.begin_submit() else {
            panic!("expected create step");
        };
        assert_eq!(step.kind, EntityKind::Patient);
        assert_eq!(step.payload["age"], serde_json::json!(52));
        assert_eq!(session.state(), SubmissionState::CreatingEntity);

        let AfterCreate::Upload(upload) = session.entity_created(created("7")).unwrap() else {
            panic!("expected upload");
        };
        assert_eq!(session.state(), SubmissionState::UploadingSignature);
        assert_eq!(upload.entity_id.as_str(), "7");
        assert_eq!(upload.signer_name, "Grace Hopper");
        assert_eq!(upload.entity_kind, EntityKind::Patient);

        let done = session.signature_stored(stored("QmHash", "0xabc")).unwrap();
        assert_eq!(
            session.state(),
            SubmissionState::Completed(OutcomeStatus::Success)
        );
        assert_eq!(done.outcome.content_hash.as_deref(), Some("QmHash"));
        assert_eq!(done.outcome.ledger_tx_id.as_deref(), Some("0xabc"));
        assert!(!done.deferred_unauthenticated);
        assert_eq!(session.unverified_entity(), None);
    }

    #[test]
    fn validation_failure_goes_straight_to_failed() {
        let mut session = ready_session();
        session.form_mut().set_field("urgencyLevel", "").unwrap();

        let SubmitStart::Invalid(outcome) = session.begin_submit() else {
            panic!("expected invalid");
        };
        assert_eq!(session.state(), SubmissionState::Failed);
        assert_eq!(outcome.reason, OutcomeReason::Validation);
        assert_eq!(outcome.message, "Urgency is required");
        assert_eq!(outcome.entity_id, None);
    }

    #[test]
    fn creation_rejection_never_yields_an_upload() {
        let mut session = ready_session();
        session.begin_submit();

        let after = session
            .entity_created(Ok(ApiReply::Rejected {
                status: 400,
                message: "duplicate patient".into(),
            }))
            .unwrap();
        let AfterCreate::Finished(outcome) = after else {
            panic!("expected finished");
        };
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert_eq!(outcome.message, "duplicate patient");
        assert_eq!(session.state(), SubmissionState::Failed);

        // A late verification reply has nowhere to land.
        assert!(matches!(
            session.signature_stored(stored("Qm", "0x")),
            Err(RegistrationError::UnexpectedEvent { .. })
        ));
    }

    #[test]
    fn creation_errors_are_classified() {
        let cases = [
            (ClientError::Timeout { after_ms: 50 }, OutcomeReason::Timeout),
            (ClientError::Unauthenticated, OutcomeReason::SessionExpired),
            (
                ClientError::Transport("connection refused".into()),
                OutcomeReason::Transport,
            ),
        ];
        for (error, reason) in cases {
            let mut session = ready_session();
            session.begin_submit();
            let AfterCreate::Finished(outcome) = session.entity_created(Err(error)).unwrap() else {
                panic!("expected finished");
            };
            assert_eq!(outcome.reason, reason);
            assert_eq!(session.state(), SubmissionState::Failed);
        }
    }

    #[test]
    fn submit_is_ignored_while_in_flight() {
        let mut session = ready_session();
        session.begin_submit();
        assert_eq!(session.begin_submit(), SubmitStart::Busy);

        session.entity_created(created("1")).unwrap();
        assert_eq!(session.begin_submit(), SubmitStart::Busy);
        assert!(matches!(session.begin_signature_retry(), Ok(RetryStart::Busy)));
        assert!(!session.reset());
    }

    #[test]
    fn structured_verification_failure_is_a_warning() {
        let mut session = ready_session();
        start_upload(&mut session, "7");

        let done = session
            .signature_stored(Ok(ApiReply::Rejected {
                status: 200,
                message: "document illegible".into(),
            }))
            .unwrap();

        assert_eq!(done.outcome.status, OutcomeStatus::Warning);
        assert_eq!(done.outcome.message, "document illegible");
        assert_eq!(done.outcome.entity_id.as_ref().map(EntityId::as_str), Some("7"));
        assert_eq!(
            session.state(),
            SubmissionState::Completed(OutcomeStatus::Warning)
        );
        assert_eq!(session.unverified_entity().map(EntityId::as_str), Some("7"));
    }

    #[test]
    fn empty_proof_is_not_success() {
        let mut session = ready_session();
        start_upload(&mut session, "7");
        let done = session.signature_stored(stored("", "0xabc")).unwrap();
        assert_eq!(done.outcome.status, OutcomeStatus::Warning);
        assert_eq!(done.outcome.reason, OutcomeReason::VerificationRejected);
    }

    #[test]
    fn upload_auth_failure_defers_the_signal() {
        let mut session = ready_session();
        start_upload(&mut session, "9");
        let done = session
            .signature_stored(Err(ClientError::Unauthenticated))
            .unwrap();
        assert!(done.deferred_unauthenticated);
        assert_eq!(done.outcome.reason, OutcomeReason::SessionExpired);
        assert_eq!(done.outcome.status, OutcomeStatus::Warning);
        assert_eq!(done.outcome.entity_id.as_ref().map(EntityId::as_str), Some("9"));
    }

    #[test]
    fn upload_timeout_is_a_warning() {
        let mut session = ready_session();
        start_upload(&mut session, "9");
        let done = session
            .signature_stored(Err(ClientError::Timeout { after_ms: 30_000 }))
            .unwrap();
        assert_eq!(done.outcome.status, OutcomeStatus::Warning);
        assert_eq!(done.outcome.reason, OutcomeReason::Timeout);
    }

    #[test]
    fn upload_snapshot_ignores_later_edits() {
        let mut session = ready_session();
        session.begin_submit();
        session.form_mut().set_field("name", "Someone Else").unwrap();
        session.form_mut().detach();

        let AfterCreate::Upload(upload) = session.entity_created(created("3")).unwrap() else {
            panic!("expected upload");
        };
        assert_eq!(upload.signer_name, "Grace Hopper");
        assert_eq!(upload.file_name, "consent.pdf");
    }

    #[test]
    fn retry_reuses_the_unverified_record() {
        let mut session = ready_session();
        start_upload(&mut session, "7");
        session
            .signature_stored(Ok(ApiReply::Rejected {
                status: 200,
                message: "document illegible".into(),
            }))
            .unwrap();

        session.form_mut().attach(AttachedFile::new(
            NonEmptyText::new("rescan.pdf").unwrap(),
            "application/pdf",
            b"%PDF-1.7 clearer".to_vec(),
        ));
        let RetryStart::Upload(upload) = session.begin_signature_retry().unwrap() else {
            panic!("expected upload");
        };
        assert_eq!(upload.entity_id.as_str(), "7");
        assert_eq!(upload.file_name, "rescan.pdf");

        let done = session.signature_stored(stored("QmNew", "0xdef")).unwrap();
        assert!(done.outcome.is_success());
        assert_eq!(done.outcome.attempt, 2);
        assert_eq!(session.unverified_entity(), None);
    }

    #[test]
    fn invalid_retry_keeps_the_record_for_later() {
        let mut session = ready_session();
        start_upload(&mut session, "7");
        session
            .signature_stored(Err(ClientError::Transport("reset".into())))
            .unwrap();

        session.form_mut().set_signer(SignerInfo::guardian("", "Parent"));
        let RetryStart::Invalid(outcome) = session.begin_signature_retry().unwrap() else {
            panic!("expected invalid");
        };
        assert_eq!(outcome.reason, OutcomeReason::Validation);
        assert_eq!(outcome.entity_id.as_ref().map(EntityId::as_str), Some("7"));
        assert_eq!(session.unverified_entity().map(EntityId::as_str), Some("7"));
    }

    #[test]
    fn retry_without_a_warning_is_an_error() {
        let mut session = ready_session();
        assert!(matches!(
            session.begin_signature_retry(),
            Err(RegistrationError::NothingToRetry)
        ));
    }

    #[test]
    fn terminal_states_accept_a_new_submit() {
        let mut session = ready_session();
        session.form_mut().set_field("name", "").unwrap();
        assert!(matches!(session.begin_submit(), SubmitStart::Invalid(_)));

        session.form_mut().set_field("name", "Grace Hopper").unwrap();
        assert!(matches!(session.begin_submit(), SubmitStart::Create(_)));
    }

    #[test]
    fn abandoned_creation_fails_and_frees_the_form() {
        let mut session = ready_session();
        session.begin_submit();

        let outcome = session.abandon().unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert_eq!(outcome.reason, OutcomeReason::Cancelled);
        assert_eq!(outcome.entity_id, None);
        assert_eq!(session.state(), SubmissionState::Failed);

        // A reply arriving after the fact is refused.
        assert!(session.entity_created(created("5")).is_err());
        assert!(matches!(session.begin_submit(), SubmitStart::Create(_)));
    }

    #[test]
    fn abandoned_upload_keeps_the_record_for_retry() {
        let mut session = ready_session();
        start_upload(&mut session, "7");

        let outcome = session.abandon().unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Warning);
        assert_eq!(outcome.reason, OutcomeReason::Cancelled);
        assert_eq!(outcome.entity_id.as_ref().map(EntityId::as_str), Some("7"));
        assert_eq!(session.unverified_entity().map(EntityId::as_str), Some("7"));
        assert!(matches!(session.begin_signature_retry(), Ok(RetryStart::Upload(_))));
    }

    #[test]
    fn abandon_is_a_no_op_when_settled() {
        let mut session = ready_session();
        assert_eq!(session.abandon(), None);

        start_upload(&mut session, "7");
        session.signature_stored(stored("Qm", "0x1")).unwrap();
        assert_eq!(session.abandon(), None);
        assert_eq!(
            session.state(),
            SubmissionState::Completed(OutcomeStatus::Success)
        );
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut session = ready_session();
        start_upload(&mut session, "7");
        session.signature_stored(stored("Qm", "0x1")).unwrap();

        assert!(session.reset());
        assert_eq!(session.state(), SubmissionState::Idle);
        assert!(session.outcome().is_none());
        assert!(session.form().is_empty());
    }
}
