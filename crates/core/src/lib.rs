//! # ODC Core
//!
//! Registration pipeline of the organ donation console.
//!
//! This crate contains the client-side orchestration of a donor or patient registration:
//! - Field schemas and the draft, signer and attachment held by the form
//! - Validation that runs before any request is sent
//! - The [`RegistrationSession`] state machine and the async [`SubmissionOrchestrator`]
//!   that drives it through entity creation and consent upload
//! - The [`OutcomePresenter`], which turns an outcome into what the operator sees
//!
//! **No transport concerns**: request headers, session storage and HTTP live in
//! `odc-client`.

pub mod draft;
mod error;
pub mod form;
pub mod orchestrator;
pub mod outcome;
pub mod presenter;
pub mod schema;
pub mod session;
pub mod validation;

pub use draft::{RegistrationDraft, SignerInfo};
pub use error::{RegistrationError, RegistrationResult, ValidationError};
pub use form::RegistrationForm;
pub use orchestrator::{SubmissionOrchestrator, SubmitResult};
pub use outcome::{OutcomeReason, OutcomeStatus, SubmissionOutcome};
pub use presenter::{BannerTone, OutcomePresenter, Presentation};
pub use session::{RegistrationSession, SubmissionState};
