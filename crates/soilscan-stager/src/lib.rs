#![warn(missing_docs)]
//! # soilscan-stager
//!
//! ## Purpose
//! Holds the single image the visitor intends to submit for analysis.
//!
//! ## Responsibilities
//! - Accept candidate files only when their type tag is `image/*`.
//! - Replace any previously staged image on a successful selection.
//! - Produce a displayable preview (`data:` URL) off the selection path.
//! - Discard previews that resolve after the image they belong to was replaced
//!   or removed.
//!
//! ## Data flow
//! File picker / drop target -> [`Candidate`] -> [`ImageStager::stage`] ->
//! [`PreviewTicket`] (resolved by the caller, possibly on another thread) ->
//! [`ImageStager::apply_preview`].
//!
//! ## Ownership and lifetimes
//! Image bytes live in an `Arc<[u8]>` shared between the staged image, pending
//! preview tickets and in-flight upload requests, so none of them copy the
//! payload.
//!
//! ## Error model
//! Non-image candidates fail with [`StageError::NotAnImage`] and leave the
//! stager untouched. Reading a file from disk may fail with [`StageError::Io`].
//!
//! ## Security and privacy notes
//! Image bytes are never logged; logs carry the SHA-256 digest instead.
//!
//! ## Example
//! ```rust
//! use soilscan_stager::{Candidate, ImageStager};
//!
//! let mut stager = ImageStager::new();
//! let ticket = stager
//!     .stage(Candidate::new("field.jpg", "image/jpeg", vec![0xFF, 0xD8]))
//!     .unwrap();
//! assert!(stager.apply_preview(ticket.resolve()));
//! assert!(stager.current().unwrap().preview().unwrap().starts_with("data:image/jpeg;base64,"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// A file offered by the visitor, not yet validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// File name reported by the picker.
    pub file_name: String,
    /// MIME type tag reported by the picker.
    pub mime_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Candidate {
    /// Creates a candidate from already-loaded parts.
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Loads a candidate from disk, guessing its type from the extension.
    ///
    /// # Errors
    /// Returns [`StageError::Io`] when the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StageError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| StageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload")
            .to_string();

        Ok(Self {
            file_name,
            mime_type: guess_mime_type(path),
            bytes,
        })
    }
}

/// Guesses a MIME type tag from a file extension.
pub fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Returns `true` when `mime_type` names an image.
pub fn is_image_type(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("image/")
}

/// The image currently staged for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    file_name: String,
    mime_type: String,
    bytes: Arc<[u8]>,
    digest: String,
    preview: Option<String>,
}

impl PendingImage {
    /// File name used for the upload part.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// MIME type tag used for the upload part.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Shared handle to the raw bytes.
    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Hex SHA-256 of the payload, for log correlation.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Rendered preview, once resolved.
    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }
}

/// Deferred preview work for one staging generation.
#[derive(Debug, Clone)]
pub struct PreviewTicket {
    generation: u64,
    mime_type: String,
    bytes: Arc<[u8]>,
}

impl PreviewTicket {
    /// Generation this ticket belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Encodes the image as a `data:` URL.
    pub fn resolve(self) -> ResolvedPreview {
        let data_url = format!(
            "data:{};base64,{}",
            self.mime_type,
            BASE64_STANDARD.encode(&self.bytes)
        );
        ResolvedPreview {
            generation: self.generation,
            data_url,
        }
    }
}

/// A finished preview waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPreview {
    generation: u64,
    data_url: String,
}

impl ResolvedPreview {
    /// Generation the preview was produced for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Encoded preview.
    pub fn data_url(&self) -> &str {
        &self.data_url
    }
}

/// Single-slot holder for the pending submission.
#[derive(Debug, Default)]
pub struct ImageStager {
    current: Option<PendingImage>,
    generation: u64,
}

impl ImageStager {
    /// Creates an empty stager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stages `candidate`, replacing any current image.
    ///
    /// The returned ticket must be resolved and handed back through
    /// [`ImageStager::apply_preview`] for the preview to appear.
    ///
    /// # Errors
    /// Returns [`StageError::NotAnImage`] for non-image type tags; the stager
    /// is left exactly as it was.
    pub fn stage(&mut self, candidate: Candidate) -> Result<PreviewTicket, StageError> {
        if !is_image_type(&candidate.mime_type) {
            tracing::debug!(mime_type = %candidate.mime_type, "rejected non-image candidate");
            return Err(StageError::NotAnImage {
                mime_type: candidate.mime_type,
            });
        }

        let bytes: Arc<[u8]> = Arc::from(candidate.bytes);
        let digest = hex::encode(Sha256::digest(&bytes));
        self.generation = self.generation.wrapping_add(1);

        tracing::info!(
            file_name = %candidate.file_name,
            mime_type = %candidate.mime_type,
            size = bytes.len(),
            digest = %digest,
            "image staged"
        );

        let ticket = PreviewTicket {
            generation: self.generation,
            mime_type: candidate.mime_type.clone(),
            bytes: Arc::clone(&bytes),
        };
        self.current = Some(PendingImage {
            file_name: candidate.file_name,
            mime_type: candidate.mime_type,
            bytes,
            digest,
            preview: None,
        });

        Ok(ticket)
    }

    /// Applies a resolved preview if it still belongs to the staged image.
    ///
    /// Returns `false` (and drops the preview) when the image was replaced or
    /// cleared after the ticket was issued.
    pub fn apply_preview(&mut self, preview: ResolvedPreview) -> bool {
        match self.current.as_mut() {
            Some(image) if preview.generation == self.generation => {
                image.preview = Some(preview.data_url);
                true
            }
            _ => {
                tracing::debug!(
                    stale = preview.generation,
                    current = self.generation,
                    "discarded stale preview"
                );
                false
            }
        }
    }

    /// Removes the staged image and its preview. Idempotent.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.current.take().is_some() {
            tracing::info!("staged image removed");
        }
    }

    /// Returns the staged image, if any.
    pub fn current(&self) -> Option<&PendingImage> {
        self.current.as_ref()
    }

    /// Current staging generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Errors produced while staging an image.
#[derive(Debug, Error)]
pub enum StageError {
    /// Candidate type tag does not begin with `image/`.
    #[error("not an image: {mime_type}")]
    NotAnImage {
        /// Rejected type tag.
        mime_type: String,
    },
    /// Candidate file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}
