//! Submission orchestrator: runs a [`RegistrationSession`] against the services.
//!
//! The two requests of a submission are strictly sequential; the upload needs the id the
//! creation returns. The session lock is only held around state transitions, never across
//! a request, so the form can be read and edited while a submission is in flight.

use crate::error::RegistrationResult;
use crate::form::RegistrationForm;
use crate::outcome::SubmissionOutcome;
use crate::presenter::{OutcomePresenter, Presentation};
use crate::session::{
    AfterCreate, RegistrationSession, RetryStart, SubmissionState, SubmitStart,
};
use odc_client::{AuthenticatedClient, SignatureUpload, Transport};
use odc_types::EntityKind;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitResult {
    /// Another submission was in flight; nothing was sent.
    Ignored,
    Finished(Presentation),
}

pub struct SubmissionOrchestrator<T> {
    client: AuthenticatedClient<T>,
    session: Mutex<RegistrationSession>,
    presenter: OutcomePresenter,
}

impl<T: Transport> SubmissionOrchestrator<T> {
    pub fn new(client: AuthenticatedClient<T>, kind: EntityKind) -> Self {
        Self::with_session(client, RegistrationSession::new(kind))
    }

    pub fn with_session(client: AuthenticatedClient<T>, session: RegistrationSession) -> Self {
        Self {
            client,
            session: Mutex::new(session),
            presenter: OutcomePresenter,
        }
    }

    pub fn client(&self) -> &AuthenticatedClient<T> {
        &self.client
    }

    pub fn state(&self) -> SubmissionState {
        self.lock().state()
    }

    pub fn outcome(&self) -> Option<SubmissionOutcome> {
        self.lock().outcome().cloned()
    }

    /// Runs `f` against the form.
    pub fn with_form<R>(&self, f: impl FnOnce(&mut RegistrationForm) -> R) -> R {
        f(self.lock().form_mut())
    }

    /// Validates, creates the entity, then uploads the consent document.
    ///
    /// Returns [`SubmitResult::Ignored`] without sending anything while another submission
    /// is in flight. Dropping the future mid-request settles the attempt as cancelled.
    pub async fn submit(&self) -> RegistrationResult<SubmitResult> {
        let step = {
            let mut session = self.lock();
            match session.begin_submit() {
                SubmitStart::Busy => return Ok(SubmitResult::Ignored),
                SubmitStart::Invalid(outcome) => {
                    return Ok(SubmitResult::Finished(self.present(&outcome, &mut session)));
                }
                SubmitStart::Create(step) => step,
            }
        };

        let mut in_flight = InFlight::new(&self.session);
        tracing::info!("submitting {} registration", step.kind);
        let reply = self.client.create_entity(step.kind, step.payload).await;

        let upload = {
            let mut session = self.lock();
            match session.entity_created(reply)? {
                AfterCreate::Finished(outcome) => {
                    in_flight.disarm();
                    return Ok(SubmitResult::Finished(self.present(&outcome, &mut session)));
                }
                AfterCreate::Upload(upload) => upload,
            }
        };
        self.upload(upload, in_flight).await
    }

    /// Re-sends only the consent document for the record a Warning left unverified.
    pub async fn retry_signature(&self) -> RegistrationResult<SubmitResult> {
        let upload = {
            let mut session = self.lock();
            match session.begin_signature_retry()? {
                RetryStart::Busy => return Ok(SubmitResult::Ignored),
                RetryStart::Invalid(outcome) => {
                    return Ok(SubmitResult::Finished(self.present(&outcome, &mut session)));
                }
                RetryStart::Upload(upload) => upload,
            }
        };
        self.upload(upload, InFlight::new(&self.session)).await
    }

    /// Clears the form and returns to `Idle`. Refused while a submission is in flight.
    pub fn reset(&self) -> bool {
        self.lock().reset()
    }

    async fn upload(
        &self,
        upload: SignatureUpload,
        mut in_flight: InFlight<'_>,
    ) -> RegistrationResult<SubmitResult> {
        let reply = self.client.verify_and_store(upload).await;

        let (presentation, deferred_unauthenticated) = {
            let mut session = self.lock();
            let completion = session.signature_stored(reply)?;
            in_flight.disarm();
            (
                self.present(&completion.outcome, &mut session),
                completion.deferred_unauthenticated,
            )
        };

        if deferred_unauthenticated {
            self.client.session().signal_unauthenticated();
        }
        Ok(SubmitResult::Finished(presentation))
    }

    fn present(
        &self,
        outcome: &SubmissionOutcome,
        session: &mut RegistrationSession,
    ) -> Presentation {
        self.presenter.present(outcome, session.form_mut())
    }

    fn lock(&self) -> MutexGuard<'_, RegistrationSession> {
        lock_session(&self.session)
    }
}

fn lock_session(session: &Mutex<RegistrationSession>) -> MutexGuard<'_, RegistrationSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held across a request; settles the session if the request future is dropped.
struct InFlight<'a> {
    session: &'a Mutex<RegistrationSession>,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(session: &'a Mutex<RegistrationSession>) -> Self {
        Self {
            session,
            armed: true,
        }
    }

    /// Called under the lock that records the reply.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock_session(self.session).abandon();
        }
    }
}
