//! Analysis request state machine.
//!
//! `Idle -> Submitting -> {Succeeded, FailedRetryable}`, with
//! `Submitting -> FallbackSubmitting` taken only when an authenticated attempt
//! is answered with 401.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use soilscan_auth::{GUEST_SCAN_LIMIT, QuotaTracker, Session, current_session, invalidate_session};
use soilscan_contract::{AnalysisResult, GENERIC_FAILURE, failure_message, parse_analysis_result};
use soilscan_stager::PendingImage;
use soilscan_store::KeyValueStore;
use soilscan_upload::{AnalysisRequest, AnalysisTransport, ResponseClass, classify_status};
use thiserror::Error;

use crate::redact_sensitive;

/// Orchestrator lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SubmissionState {
    /// No submission has run yet.
    #[default]
    Idle,
    /// First attempt in flight.
    Submitting,
    /// Credential was rejected; anonymous resubmission in flight.
    FallbackSubmitting,
    /// Last submission produced a result.
    Succeeded,
    /// Last submission failed; the staged image may be resubmitted.
    FailedRetryable,
}

impl SubmissionState {
    /// Returns `true` while a request is in flight.
    pub fn in_flight(self) -> bool {
        matches!(
            self,
            SubmissionState::Submitting | SubmissionState::FallbackSubmitting
        )
    }
}

/// Credential path that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubmissionPath {
    /// Bearer credential accepted.
    Authenticated,
    /// Guest session, no credential sent.
    Anonymous,
    /// Credential rejected, anonymous resubmission succeeded.
    Fallback,
}

impl SubmissionPath {
    /// Returns `true` when the result counts against the guest quota.
    pub fn is_anonymous(self) -> bool {
        !matches!(self, SubmissionPath::Authenticated)
    }
}

/// Informational events raised while a submission continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The stored credential was rejected and has been cleared; the image is
    /// being resubmitted as a guest.
    CredentialExpired,
}

impl Notice {
    /// User-facing text.
    pub fn message(self) -> &'static str {
        match self {
            Notice::CredentialExpired => "Session expired. Processing as a guest scan.",
        }
    }
}

/// Successful terminal state of one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Parsed service result.
    pub result: AnalysisResult,
    /// Credential path that produced it.
    pub path: SubmissionPath,
    /// Guest counter after this submission, when it was anonymous.
    pub guest_scans_used: Option<u32>,
}

/// Reasons a submission did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// Nothing is staged.
    #[error("Please select a soil image first.")]
    NoImageSelected,
    /// Guest ceiling reached; the visitor should sign in.
    #[error("Guest limit ({limit} scans) reached. Please Login or Sign Up to continue!")]
    QuotaExceeded {
        /// Guest ceiling.
        limit: u32,
    },
    /// Another submission is still in flight.
    #[error("An analysis is already in progress.")]
    Busy,
    /// Transport failure, non-success status or unparseable body.
    #[error("{message}")]
    RequestFailed {
        /// Server detail when available.
        message: String,
    },
}

impl SubmitError {
    /// Returns `true` when resubmitting the same image may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::RequestFailed { .. })
    }

    /// Returns `true` when the visitor should be sent to sign in.
    pub fn requires_sign_in(&self) -> bool {
        matches!(self, SubmitError::QuotaExceeded { .. })
    }
}

/// Outcome of one HTTP exchange.
enum Attempt {
    Parsed(AnalysisResult),
    CredentialRejected { message: String },
    Failed { message: String },
}

/// Runs analysis submissions against an injected store and transport.
pub struct Orchestrator {
    store: Arc<dyn KeyValueStore>,
    quota: QuotaTracker,
    transport: Arc<dyn AnalysisTransport>,
    state: Mutex<SubmissionState>,
}

impl Orchestrator {
    /// Creates an idle orchestrator.
    pub fn new(store: Arc<dyn KeyValueStore>, transport: Arc<dyn AnalysisTransport>) -> Self {
        Self {
            quota: QuotaTracker::new(Arc::clone(&store)),
            store,
            transport,
            state: Mutex::new(SubmissionState::Idle),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubmissionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Quota tracker over the same store.
    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Submits `image` for analysis.
    ///
    /// `on_notice` is invoked before the anonymous fallback starts. The staged
    /// image is never consumed, so a failed submission can be retried with the
    /// same reference.
    ///
    /// # Errors
    /// See [`SubmitError`]. Precondition failures leave the state unchanged.
    pub fn submit(
        &self,
        image: Option<&PendingImage>,
        on_notice: &mut dyn FnMut(Notice),
    ) -> Result<Submission, SubmitError> {
        let mut flight = self.begin(image)?;
        let image = flight.image;
        let session = flight.session.clone();

        let first = self.attempt(image, session.token());
        let (attempt, path) = match (first, &session) {
            (Attempt::CredentialRejected { .. }, Session::Authenticated { username, .. }) => {
                tracing::warn!(username = %username, "credential rejected; resubmitting as guest");
                if let Err(error) = invalidate_session(self.store.as_ref()) {
                    tracing::error!(%error, "failed to clear rejected credential");
                }
                on_notice(Notice::CredentialExpired);
                flight.transition(SubmissionState::FallbackSubmitting);
                (self.attempt(image, None), SubmissionPath::Fallback)
            }
            (attempt, Session::Authenticated { .. }) => (attempt, SubmissionPath::Authenticated),
            (attempt, Session::Guest) => (attempt, SubmissionPath::Anonymous),
        };

        match attempt {
            Attempt::Parsed(result) => {
                let guest_scans_used = if path.is_anonymous() {
                    match self.quota.record_anonymous_use() {
                        Ok(used) => Some(used),
                        Err(error) => {
                            tracing::error!(%error, "failed to record guest analysis");
                            Some(self.quota.used())
                        }
                    }
                } else {
                    None
                };

                flight.finish(SubmissionState::Succeeded);
                tracing::info!(digest = %image.digest(), ?path, "analysis succeeded");
                Ok(Submission {
                    result,
                    path,
                    guest_scans_used,
                })
            }
            Attempt::CredentialRejected { message } | Attempt::Failed { message } => {
                flight.finish(SubmissionState::FailedRetryable);
                tracing::warn!(digest = %image.digest(), ?path, %message, "analysis failed");
                Err(SubmitError::RequestFailed { message })
            }
        }
    }

    fn begin<'a>(&'a self, image: Option<&'a PendingImage>) -> Result<InFlight<'a>, SubmitError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight() {
            return Err(SubmitError::Busy);
        }

        let image = image.ok_or(SubmitError::NoImageSelected)?;
        let session = current_session(self.store.as_ref());
        if !self.quota.remaining_allowed(&session) {
            tracing::info!(used = self.quota.used(), "guest quota exhausted");
            return Err(SubmitError::QuotaExceeded {
                limit: GUEST_SCAN_LIMIT,
            });
        }

        *state = SubmissionState::Submitting;
        tracing::debug!(
            digest = %image.digest(),
            authenticated = session.is_authenticated(),
            "submission started"
        );
        Ok(InFlight {
            state: &self.state,
            image,
            session,
            finished: false,
        })
    }

    fn attempt(&self, image: &PendingImage, bearer_token: Option<&str>) -> Attempt {
        let request = AnalysisRequest {
            file_name: image.file_name().to_string(),
            mime_type: image.mime_type().to_string(),
            bytes: image.bytes(),
            bearer_token: bearer_token.map(str::to_string),
        };

        let response = match self.transport.submit(&request) {
            Ok(response) => response,
            Err(error) => {
                let message = error.to_string();
                tracing::warn!(error = %redact_sensitive(&message), "analysis transport failure");
                return Attempt::Failed { message };
            }
        };

        match classify_status(response.status) {
            ResponseClass::Success => match parse_analysis_result(&response.body) {
                Ok(result) => Attempt::Parsed(result),
                Err(error) => {
                    tracing::warn!(%error, status = response.status, "unparseable analysis body");
                    Attempt::Failed {
                        message: GENERIC_FAILURE.to_string(),
                    }
                }
            },
            ResponseClass::CredentialRejected => Attempt::CredentialRejected {
                message: failure_message(&response.body),
            },
            ResponseClass::Failure => Attempt::Failed {
                message: failure_message(&response.body),
            },
        }
    }
}

/// Marks a submission as in flight until it reaches a terminal state.
///
/// Dropping it without [`InFlight::finish`] (a panicking transport) leaves the
/// orchestrator in [`SubmissionState::FailedRetryable`].
struct InFlight<'a> {
    state: &'a Mutex<SubmissionState>,
    image: &'a PendingImage,
    session: Session,
    finished: bool,
}

impl InFlight<'_> {
    fn transition(&mut self, next: SubmissionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn finish(mut self, terminal: SubmissionState) {
        self.transition(terminal);
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.transition(SubmissionState::FailedRetryable);
        }
    }
}
