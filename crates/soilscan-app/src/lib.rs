#![warn(missing_docs)]
//! # soilscan-app
//!
//! ## Purpose
//! Wires session, quota, staging, submission and rendering into the soil
//! analysis client used by the `soilscan` binary.
//!
//! ## Responsibilities
//! - Run submissions with the guest quota and the expired-credential fallback
//!   ([`orchestrator`]).
//! - Expose one handler per page event ([`workflow`]).
//! - Resolve layered configuration ([`config`]).
//! - Redact credentials from log-bound strings.
//!
//! ## Data flow
//! Candidate file -> stager -> orchestrator (session + quota + transport) ->
//! contract parse -> result view.
//!
//! ## Ownership and lifetimes
//! The store and transport are shared as `Arc<dyn _>` so shells and tests can
//! inject their own. The staged image is borrowed for each submission and
//! stays staged for retry.
//!
//! ## Error model
//! Subsystem failures are wrapped in [`AppError`]; submission outcomes keep
//! their user-facing text through [`SubmitError`].
//!
//! ## Security and privacy notes
//! - Bearer tokens never reach logs; [`redact_sensitive`] scrubs error text.
//! - A rejected credential is cleared before the anonymous resubmission.

pub mod config;
pub mod orchestrator;
pub mod workflow;

use soilscan_auth::AuthError;
use soilscan_stager::StageError;
use soilscan_store::StoreError;
use soilscan_upload::UploadError;
use thiserror::Error;

pub use config::{CliConfigOverrides, ConfigError, ConfigSource, LayeredConfig};
pub use orchestrator::{
    Notice, Orchestrator, Submission, SubmissionPath, SubmissionState, SubmitError,
};
pub use workflow::{StatusSnapshot, Workflow};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("SOILSCAN_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// Redacts credential values in log-bound text.
///
/// Everything after the first marker (`password`, `token`, `authorization`,
/// `bearer`) is replaced, since the secret usually follows it.
pub fn redact_sensitive(input: &str) -> String {
    const MARKERS: [&str; 4] = ["password", "token", "authorization", "bearer"];

    let lower = input.to_ascii_lowercase();
    let first = MARKERS
        .iter()
        .filter_map(|marker| lower.find(marker).map(|position| (position, *marker)))
        .min_by_key(|(position, _)| *position);

    match first {
        Some((position, marker)) => format!("{}{marker}=<redacted>", &input[..position]),
        None => input.to_string(),
    }
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// The selected file is not an image.
    #[error("Please upload a valid soil image.")]
    InvalidFileType {
        /// Detected MIME type.
        mime_type: String,
    },
    /// Submission precondition or request failure.
    #[error(transparent)]
    Submit(#[from] SubmitError),
    /// Staging failure other than a wrong file type.
    #[error("staging error: {0}")]
    Stage(StageError),
    /// Session error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),
    /// Key-value store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// HTTP transport setup error.
    #[error("upload error: {0}")]
    Upload(#[from] UploadError),
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
