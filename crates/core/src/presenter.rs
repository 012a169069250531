//! Maps a submission outcome to what the operator sees.
//!
//! The presenter never touches the network. Its only side effect is clearing the form
//! after a full success.

use crate::form::RegistrationForm;
use crate::outcome::{OutcomeReason, OutcomeStatus, SubmissionOutcome};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BannerTone {
    Success,
    Caution,
    Blocking,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Presentation {
    pub status: OutcomeStatus,
    pub tone: BannerTone,
    pub headline: String,
    pub message: String,
    pub note: Option<String>,
    pub details: Vec<(&'static str, String)>,
    pub form_reset: bool,
}

impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline)?;
        writeln!(f, "  {}", self.message)?;
        if let Some(note) = &self.note {
            writeln!(f, "  note: {}", note)?;
        }
        for (label, value) in &self.details {
            writeln!(f, "  {}: {}", label, value)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OutcomePresenter;

impl OutcomePresenter {
    pub fn present(&self, outcome: &SubmissionOutcome, form: &mut RegistrationForm) -> Presentation {
        let label = form.kind().label();
        let mut details = Vec::new();
        if let Some(id) = &outcome.entity_id {
            details.push(("record id", id.to_string()));
        }

        match outcome.status {
            OutcomeStatus::Success => {
                if let Some(hash) = &outcome.content_hash {
                    details.push(("content hash", hash.clone()));
                }
                if let Some(tx) = &outcome.ledger_tx_id {
                    details.push(("ledger transaction", tx.clone()));
                }
                form.reset();
                Presentation {
                    status: outcome.status,
                    tone: BannerTone::Success,
                    headline: format!("{} registered", capitalise(label)),
                    message: outcome.message.clone(),
                    note: None,
                    details,
                    form_reset: true,
                }
            }
            OutcomeStatus::Warning => {
                let next_step = match outcome.reason {
                    OutcomeReason::SessionExpired => {
                        "sign in again, then retry the signature upload"
                    }
                    _ => "attach a document and retry the signature upload",
                };
                Presentation {
                    status: outcome.status,
                    tone: BannerTone::Caution,
                    headline: format!("{} record created, consent not verified", capitalise(label)),
                    message: outcome.message.clone(),
                    note: Some(format!(
                        "The record exists but is unverified; {}.",
                        next_step
                    )),
                    details,
                    form_reset: false,
                }
            }
            OutcomeStatus::Error => Presentation {
                status: outcome.status,
                tone: BannerTone::Blocking,
                headline: format!("{} registration failed", capitalise(label)),
                message: outcome.message.clone(),
                note: None,
                details,
                form_reset: false,
            },
        }
    }
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
