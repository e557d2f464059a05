//! # resume-lens
//!
//! Turn a résumé into a structured, validated verdict from a chat-completion
//! model.
//!
//! ## Why this crate?
//!
//! Asking a model to "review this résumé" is easy; trusting what comes back
//! is not. Completions arrive fenced in Markdown, with scores out of range or
//! whole sections missing. This crate treats the completion as untrusted
//! input: it is parsed strictly, checked field by field, and either becomes a
//! complete [`AnalysisResult`] or a typed error that still carries the raw
//! text for diagnosis. Nothing is default-filled.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file / clipboard / sample
//!  │
//!  ├─ 1. Source    normalise input into one IngestedDocument (+ progress)
//!  ├─ 2. Route     media type → plain-text decode | external decoder | reject
//!  ├─ 3. Invoke    one POST to the chat-completion endpoint
//!  ├─ 4. Validate  completion JSON → AnalysisResult (strict, all-or-nothing)
//!  └─ 5. State     Idle → Ingesting → Ready → Analyzing → Complete | Failed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resume_lens::{ContentInput, Credential, FileInput, ResumeSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = ResumeSession::new(SessionConfig::builder().build()?);
//!
//!     let file = FileInput::open("resume.txt").await?.picked();
//!     session.ingest(ContentInput::File(file)).await?;
//!
//!     let key = Credential::new("sk-...");
//!     let result = session.analyze(Some(&key)).await?;
//!     println!("readability {}/10", result.overview.readability_score);
//!     for s in &result.suggestions.critical {
//!         println!("critical: {s}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Binary documents
//!
//! PDF and word-processor files are routed to a [`DocumentDecoder`] supplied
//! by the host through [`SessionConfigBuilder::decoder`]. Without one they
//! fail with [`DecodeError::Unavailable`]; the crate never parses binary
//! formats itself.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod session;
pub mod state;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::{
    AnalysisError, ConfigError, DecodeError, FailureCause, IngestionError, PipelineError,
    SessionError, ValidationError,
};
pub use pipeline::decoder::DocumentDecoder;
pub use pipeline::llm::{AnalysisInvoker, Credential, ResumeAnalyzer};
pub use pipeline::source::{
    ClipboardItem, ClipboardReader, ContentInput, DocumentId, FileInput, IngestedDocument,
    SourceKind,
};
pub use progress::{IngestionProgress, IngestionProgressObserver, ProgressPhase};
pub use schema::{
    AnalysisResult, DetectedKeyword, GrammarAndStyle, Keywords, Overview, Relevance, StyleIssue,
    Suggestions,
};
pub use session::ResumeSession;
pub use state::PipelineState;
