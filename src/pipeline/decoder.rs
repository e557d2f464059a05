//! Seam for binary document formats (PDF, Word, …).
//!
//! The pipeline never parses binary documents itself. When the format
//! router classifies a file as a binary document it hands the raw bytes to a
//! [`DocumentDecoder`] and waits for extracted text. A real deployment plugs
//! in a PDF/DOCX extractor here without touching the rest of the pipeline.
//!
//! [`UnavailableDecoder`] is the default: it fails every request with
//! [`DecodeError::Unavailable`], which surfaces as an ingestion failure
//! rather than fake text.

use crate::error::DecodeError;
use async_trait::async_trait;

/// Turns binary document bytes into plain text.
#[async_trait]
pub trait DocumentDecoder: Send + Sync {
    /// Extract text from `bytes` declared as `media_type` (lower-case essence,
    /// e.g. `application/pdf`).
    async fn decode(&self, bytes: &[u8], media_type: &str) -> Result<String, DecodeError>;
}

/// Decoder used when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDecoder;

#[async_trait]
impl DocumentDecoder for UnavailableDecoder {
    async fn decode(&self, _bytes: &[u8], media_type: &str) -> Result<String, DecodeError> {
        Err(DecodeError::Unavailable {
            media_type: media_type.to_string(),
        })
    }
}
