//! Error types for uploads and narration.
//!
//! Upload failures are surfaced to the user as a blocking alert and return
//! the viewer to the upload screen. Narration failures never reach the view
//! as errors: [`crate::narration::narrate_or_fallback`] collapses them into a
//! fixed placeholder string.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Upload was requested with no file chosen.
    #[error("No file selected")]
    NoFileSelected,

    /// The chosen file could not be read from disk.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A conversion is already running; the new request was dropped.
    #[error("An upload is already in progress")]
    AlreadyInProgress,

    // ── Service errors ────────────────────────────────────────────────────
    /// Network or protocol failure talking to the conversion service.
    #[error("{0}")]
    Transport(String),

    /// The conversion service answered `success: false`.
    #[error("{0}")]
    Backend(String),

    /// The conversion service did not answer in time.
    #[error("Conversion timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl UploadError {
    /// Message shown in the upload-failed alert.
    pub fn user_message(&self) -> String {
        format!("Upload failed: {self}")
    }
}

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("No API key configured. Set narration.api_key or ANTHROPIC_API_KEY.")]
    MissingApiKey,

    #[error("Narration request failed: {0}")]
    Transport(String),

    #[error("Narration API error: {0}")]
    Api(String),

    #[error("Narration response contained no text")]
    EmptyResponse,
}
