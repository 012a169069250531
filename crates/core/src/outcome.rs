//! The result of one submission attempt.

use chrono::{DateTime, Utc};
use odc_types::EntityId;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeStatus {
    /// Record created and consent verified.
    Success,
    /// Record created; consent not verified.
    Warning,
    /// Nothing was created.
    Error,
}

/// Why an attempt ended the way it did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeReason {
    Verified,
    Validation,
    EntityRejected,
    VerificationRejected,
    Transport,
    Timeout,
    SessionExpired,
    /// The caller dropped the attempt before the reply arrived.
    Cancelled,
}

/// Outcome of one attempt. Never merged with an earlier attempt's outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub status: OutcomeStatus,
    pub reason: OutcomeReason,
    pub message: String,
    /// Present once the record exists, whatever happened afterwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_tx_id: Option<String>,
    /// 1 for the first attempt of a form, counting signature-only retries.
    pub attempt: u32,
    pub completed_at: DateTime<Utc>,
}

impl SubmissionOutcome {
    pub(crate) fn new(
        status: OutcomeStatus,
        reason: OutcomeReason,
        message: impl Into<String>,
        attempt: u32,
    ) -> Self {
        Self {
            status,
            reason,
            message: message.into(),
            entity_id: None,
            content_hash: None,
            ledger_tx_id: None,
            attempt,
            completed_at: Utc::now(),
        }
    }

    pub(crate) fn with_entity(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}
