//! Error types for the resume-lens library.
//!
//! Errors are grouped by the stage that raises them:
//!
//! * [`IngestionError`]: the content source could not be turned into text
//!   (unsupported media type, empty clipboard, unreadable file). Binary
//!   decoder failures arrive wrapped as [`IngestionError::Decode`].
//! * [`AnalysisError`]: the analysis backend could not produce a valid
//!   [`crate::schema::AnalysisResult`]. Each variant keeps the payload a
//!   caller needs to render a specific message (status code, raw text,
//!   offending field paths).
//! * [`PipelineError`]: the request was illegal for the current session
//!   state, or its completion arrived after a reset.
//!
//! None of these is fatal to the process. The session records ingestion and
//! analysis failures as [`crate::state::PipelineState::Failed`] and a
//! `reset` always brings it back to `Idle`.
//!
//! All stage errors are `Clone + PartialEq` because they are stored inside
//! the observable pipeline state and compared in tests.

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Fallback message when the service reports a failure without an error body.
pub const GENERIC_SERVICE_ERROR: &str = "Failed to analyze resume";

// ── Ingestion ────────────────────────────────────────────────────────────

/// Failure to turn a content source into an [`crate::pipeline::source::IngestedDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    /// The declared media type has no extraction strategy.
    #[error("Unsupported file type '{media_type}'. Please upload a PDF, Word or text file.")]
    UnsupportedFormat { media_type: String },

    /// The clipboard holds no plain-text representation.
    #[error("No text content found in clipboard")]
    EmptyClipboard,

    /// The underlying bytes could not be read.
    #[error("Error reading content: {reason}")]
    ReadFailure { reason: String },

    /// The external binary-document decoder rejected the bytes.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The source was read successfully but contains no text.
    #[error("'{label}' contains no text")]
    EmptyDocument { label: String },

    /// The source exceeds the configured size limit.
    #[error("Content too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },
}

impl IngestionError {
    pub(crate) fn read(err: impl fmt::Display) -> Self {
        IngestionError::ReadFailure {
            reason: err.to_string(),
        }
    }
}

/// Failure reported by a [`crate::pipeline::decoder::DocumentDecoder`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No decoder is installed for this media type.
    #[error("No document decoder available for '{media_type}'")]
    Unavailable { media_type: String },

    /// The decoder ran but could not extract text.
    #[error("Document decoding failed: {reason}")]
    Failed { reason: String },
}

// ── Analysis ─────────────────────────────────────────────────────────────

/// Failure of a single analysis invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// No credential was supplied; no request was sent.
    #[error("An API key is required to analyze a resume")]
    MissingCredential,

    /// The service answered with a non-success HTTP status.
    #[error("Analysis service error (status {status_code}): {message}")]
    ServiceError { status_code: u16, message: String },

    /// The completion text is not a JSON document.
    ///
    /// `raw_text` is the completion exactly as received so it can be shown
    /// for diagnosis. It is never promoted to a successful result.
    #[error("Analysis response is not valid JSON")]
    ParseError { raw_text: String },

    /// The completion parsed as JSON but violates the result schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request never produced an HTTP response.
    #[error("Could not reach the analysis service: {reason}")]
    Transport { reason: String },
}

/// Structural violations found by [`crate::pipeline::validate::validate`].
///
/// Field names are dotted wire paths such as `grammarAndStyle.clarityScore`
/// or `keywords.detected[2].count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("Analysis result failed validation (missing: {}, invalid: {})", join(.missing_fields), join(.invalid_fields))]
pub struct ValidationError {
    /// Required fields that are absent or `null`.
    pub missing_fields: BTreeSet<String>,
    /// Fields present with the wrong type or outside their allowed range.
    pub invalid_fields: BTreeSet<String>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.missing_fields.is_empty() && self.invalid_fields.is_empty()
    }
}

fn join(fields: &BTreeSet<String>) -> String {
    if fields.is_empty() {
        "none".to_string()
    } else {
        fields.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// A request that the state machine refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The same kind of operation is already in flight.
    #[error("{operation} is already in progress")]
    AlreadyInProgress { operation: &'static str },

    /// The event is not legal from the current state.
    #[error("Cannot {event} while {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    /// The session was reset while the operation was running; its outcome
    /// was discarded.
    #[error("Operation was superseded by a reset")]
    Superseded,
}

/// Why a session ended in [`crate::state::PipelineState::Failed`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureCause {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

// ── Config ───────────────────────────────────────────────────────────────

/// Builder validation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ── Session ──────────────────────────────────────────────────────────────

/// Every error the async [`crate::session::ResumeSession`] driver can return.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl From<FailureCause> for SessionError {
    fn from(cause: FailureCause) -> Self {
        match cause {
            FailureCause::Ingestion(e) => SessionError::Ingestion(e),
            FailureCause::Analysis(e) => SessionError::Analysis(e),
        }
    }
}
