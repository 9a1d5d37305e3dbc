//! Explicit event handlers for the analysis page.
//!
//! A shell (CLI, desktop, web bridge) owns a [`Workflow`] and calls one handler
//! per user event. Nothing here depends on a UI toolkit.

use std::sync::Arc;

use serde::Serialize;
use soilscan_auth::{GUEST_SCAN_LIMIT, current_session};
use soilscan_render::{ResultView, SubmitControl, SubmitPhase, submit_control};
use soilscan_stager::{Candidate, ImageStager, PreviewTicket, ResolvedPreview, StageError};
use soilscan_store::KeyValueStore;
use soilscan_upload::AnalysisTransport;

use crate::AppError;
use crate::orchestrator::{Notice, Orchestrator, Submission, SubmissionState, SubmitError};

/// Navigation and quota summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Username when signed in.
    pub signed_in_as: Option<String>,
    /// Guest analyses already used.
    pub guest_scans_used: u32,
    /// Guest ceiling.
    pub guest_scan_limit: u32,
    /// Guest analyses left; `None` when signed in.
    pub guest_scans_remaining: Option<u32>,
    /// Staged file name, if any.
    pub staged_image: Option<String>,
    /// Whether the staged image has a resolved preview.
    pub preview_ready: bool,
    /// Orchestrator state.
    pub submission: SubmissionState,
    /// Submit control projection.
    pub submit: SubmitControl,
}

/// Page-level controller wiring stager, orchestrator and renderer.
pub struct Workflow {
    store: Arc<dyn KeyValueStore>,
    stager: ImageStager,
    orchestrator: Orchestrator,
    view: ResultView,
    phase: SubmitPhase,
}

impl Workflow {
    /// Creates a workflow with nothing staged.
    pub fn new(store: Arc<dyn KeyValueStore>, transport: Arc<dyn AnalysisTransport>) -> Self {
        Self {
            orchestrator: Orchestrator::new(Arc::clone(&store), transport),
            store,
            stager: ImageStager::new(),
            view: ResultView::new(),
            phase: SubmitPhase::Idle,
        }
    }

    /// Handles a picker selection or drop.
    ///
    /// # Errors
    /// Returns [`AppError::InvalidFileType`] for non-image files; the current
    /// selection is kept.
    pub fn select_file(&mut self, candidate: Candidate) -> Result<PreviewTicket, AppError> {
        match self.stager.stage(candidate) {
            Ok(ticket) => {
                self.phase = SubmitPhase::Idle;
                Ok(ticket)
            }
            Err(StageError::NotAnImage { mime_type }) => {
                Err(AppError::InvalidFileType { mime_type })
            }
            Err(error) => Err(AppError::Stage(error)),
        }
    }

    /// Handles preview completion. Returns `false` for stale previews.
    pub fn preview_ready(&mut self, preview: ResolvedPreview) -> bool {
        self.stager.apply_preview(preview)
    }

    /// Handles the remove-image control: drops the image and hides results.
    pub fn remove_image(&mut self) {
        self.stager.clear();
        self.view.clear();
        self.phase = SubmitPhase::Idle;
    }

    /// Handles the submit control.
    ///
    /// # Errors
    /// Returns [`AppError::Submit`] for precondition and request failures. A
    /// failed request keeps the staged image for retry.
    pub fn analyze(&mut self, on_notice: &mut dyn FnMut(Notice)) -> Result<Submission, AppError> {
        self.phase = SubmitPhase::Submitting;
        let outcome = self.orchestrator.submit(self.stager.current(), on_notice);

        match &outcome {
            Ok(submission) => {
                self.view.render(&submission.result);
                self.phase = SubmitPhase::Idle;
            }
            Err(SubmitError::RequestFailed { .. }) => {
                self.view.clear();
                self.phase = SubmitPhase::Failed;
            }
            Err(SubmitError::Busy) => {}
            Err(SubmitError::NoImageSelected | SubmitError::QuotaExceeded { .. }) => {
                self.phase = SubmitPhase::Idle;
            }
        }

        outcome.map_err(AppError::from)
    }

    /// Rendered result slots.
    pub fn view(&self) -> &ResultView {
        &self.view
    }

    /// Image stager.
    pub fn stager(&self) -> &ImageStager {
        &self.stager
    }

    /// Orchestrator.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Projects navigation, quota and submit-control state.
    pub fn status(&self) -> StatusSnapshot {
        let session = current_session(self.store.as_ref());
        let quota = self.orchestrator.quota();
        let staged = self.stager.current();

        StatusSnapshot {
            signed_in_as: session.username().map(str::to_string),
            guest_scans_used: quota.used(),
            guest_scan_limit: GUEST_SCAN_LIMIT,
            guest_scans_remaining: quota.remaining(&session),
            staged_image: staged.map(|image| image.file_name().to_string()),
            preview_ready: staged.is_some_and(|image| image.preview().is_some()),
            submission: self.orchestrator.state(),
            submit: submit_control(staged.is_some(), self.phase),
        }
    }
}
