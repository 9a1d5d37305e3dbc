#![warn(missing_docs)]
//! # soilscan-upload
//!
//! ## Purpose
//! Sends one staged image to the analysis endpoint.
//!
//! ## Responsibilities
//! - Validate the analysis endpoint URL.
//! - Define the injectable [`AnalysisTransport`] seam used by the orchestrator.
//! - Implement it over HTTP as a single-part multipart POST with an optional
//!   bearer credential ([`HttpTransport`]).
//! - Classify response statuses ([`classify_status`]).
//!
//! ## Data flow
//! Orchestrator builds [`AnalysisRequest`] -> [`AnalysisTransport::submit`] ->
//! [`TransportResponse`] (status + raw body) -> orchestrator classification.
//!
//! ## Ownership and lifetimes
//! Requests share the staged image bytes through `Arc<[u8]>`; the HTTP
//! implementation copies them once into the multipart body.
//!
//! ## Error model
//! Any HTTP status is a successful transport exchange. Only connection,
//! timeout and body-read failures surface as [`UploadError`].
//!
//! ## Security and privacy notes
//! Bearer tokens are excluded from `Debug` output and never logged.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use thiserror::Error;
use url::Url;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Default analysis endpoint of a locally running service.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api/analyze";

/// One analysis submission.
#[derive(Clone)]
pub struct AnalysisRequest {
    /// File name of the upload part.
    pub file_name: String,
    /// MIME type of the upload part.
    pub mime_type: String,
    /// Raw image bytes.
    pub bytes: Arc<[u8]>,
    /// Bearer credential, when submitting as an authenticated user.
    pub bearer_token: Option<String>,
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Raw response of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// Outcome category of a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx.
    Success,
    /// 401: the presented credential was rejected.
    CredentialRejected,
    /// Any other status.
    Failure,
}

/// Maps an HTTP status to its [`ResponseClass`].
pub fn classify_status(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        401 => ResponseClass::CredentialRejected,
        _ => ResponseClass::Failure,
    }
}

/// Abstract transport used by the orchestrator.
pub trait AnalysisTransport: Send + Sync {
    /// Sends `request` and returns the raw response.
    ///
    /// # Errors
    /// Returns [`UploadError`] when no HTTP response was obtained.
    fn submit(&self, request: &AnalysisRequest) -> Result<TransportResponse, UploadError>;
}

/// Multipart-over-HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: Url,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Creates a transport bound to `endpoint`.
    ///
    /// `timeout` is the HTTP client's request timeout; `None` disables it.
    ///
    /// # Errors
    /// Returns [`UploadError::InvalidEndpoint`] for unusable URLs and
    /// [`UploadError::Client`] when the HTTP client cannot be built.
    pub fn new(endpoint: &str, timeout: Option<Duration>) -> Result<Self, UploadError> {
        let endpoint = validate_analysis_endpoint(endpoint)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("soilscan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| UploadError::Client(error.to_string()))?;

        Ok(Self { endpoint, client })
    }

    /// Returns the bound endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl AnalysisTransport for HttpTransport {
    fn submit(&self, request: &AnalysisRequest) -> Result<TransportResponse, UploadError> {
        let part = Part::bytes(request.bytes.to_vec())
            .file_name(request.file_name.clone())
            .mime_str(&request.mime_type)
            .map_err(|error| UploadError::Client(error.to_string()))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        let mut builder = self.client.post(self.endpoint.clone()).multipart(form);
        if let Some(token) = &request.bearer_token {
            if !is_https_endpoint(self.endpoint.as_str()) {
                tracing::warn!(endpoint = %self.endpoint, "sending bearer credential over plain http");
            }
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().map_err(map_reqwest_error)?;
        tracing::debug!(status, body_len = body.len(), "analysis response received");

        Ok(TransportResponse { status, body })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> UploadError {
    if error.is_timeout() {
        UploadError::Timeout
    } else {
        UploadError::Transport(error.without_url().to_string())
    }
}

/// Validates an analysis endpoint URL.
///
/// # Errors
/// Returns [`UploadError::InvalidEndpoint`] when the URL does not parse, is not
/// http(s), or has no host.
pub fn validate_analysis_endpoint(endpoint: &str) -> Result<Url, UploadError> {
    let parsed = Url::parse(endpoint.trim())
        .map_err(|error| UploadError::InvalidEndpoint(format!("invalid analysis url: {error}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UploadError::InvalidEndpoint(
            "analysis endpoint must use http or https".to_string(),
        ));
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UploadError::InvalidEndpoint(
            "analysis endpoint must include a host".to_string(),
        ));
    }

    Ok(parsed)
}

/// Returns `true` when endpoint URL is HTTPS.
pub fn is_https_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .map(|url| url.scheme() == "https")
        .unwrap_or(false)
}

/// Upload transport errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Endpoint violates URL requirements.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// HTTP client construction or request assembly failed.
    #[error("http client failure: {0}")]
    Client(String),
    /// The transport's own timeout elapsed.
    #[error("analysis request timed out")]
    Timeout,
    /// Connection or body-read failure.
    #[error("analysis request failed: {0}")]
    Transport(String),
}
