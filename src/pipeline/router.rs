//! Format routing: pick an extraction strategy from a declared media type.
//!
//! | Declared media type                         | Strategy                  |
//! |---------------------------------------------|---------------------------|
//! | `text/plain`, empty                         | [`ExtractionStrategy::PlainText`] |
//! | PDF, Word, OpenDocument text, RTF           | [`ExtractionStrategy::BinaryDocument`] |
//! | anything else, or unparsable                | [`IngestionError::UnsupportedFormat`] |
//!
//! Routing happens before a single byte is read, so an unsupported file
//! fails without emitting progress.

use crate::error::IngestionError;
use encoding_rs::{Encoding, UTF_8};
use mime_guess::mime::{self, Mime};
use std::borrow::Cow;
use tracing::debug;

/// Media types handed to the external [`super::decoder::DocumentDecoder`].
pub const BINARY_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.oasis.opendocument.text",
    "application/rtf",
];

/// How a file's bytes become text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Decode bytes with this character encoding.
    PlainText { encoding: &'static Encoding },
    /// Delegate to the document decoder. Carries the lower-case essence.
    BinaryDocument { media_type: &'static str },
}

/// Select the strategy for a declared media type.
pub fn route(media_type: &str) -> Result<ExtractionStrategy, IngestionError> {
    let declared = media_type.trim();
    if declared.is_empty() {
        debug!("Untyped content, decoding as UTF-8 text");
        return Ok(ExtractionStrategy::PlainText { encoding: UTF_8 });
    }

    let unsupported = || IngestionError::UnsupportedFormat {
        media_type: declared.to_string(),
    };

    let parsed: Mime = declared.parse().map_err(|_| unsupported())?;

    if parsed.type_() == mime::TEXT && parsed.subtype() == mime::PLAIN {
        let encoding = parsed
            .get_param(mime::CHARSET)
            .and_then(|label| Encoding::for_label(label.as_str().as_bytes()))
            .unwrap_or(UTF_8);
        debug!(encoding = encoding.name(), "Routing to plain-text decode");
        return Ok(ExtractionStrategy::PlainText { encoding });
    }

    let essence = parsed.essence_str().to_ascii_lowercase();
    BINARY_DOCUMENT_TYPES
        .iter()
        .find(|t| **t == essence)
        .map(|&t| {
            debug!(media_type = t, "Routing to document decoder");
            ExtractionStrategy::BinaryDocument { media_type: t }
        })
        .ok_or_else(unsupported)
}

/// Decode text bytes. A byte-order mark overrides `encoding`; malformed
/// sequences are replaced with U+FFFD.
pub fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, actual, had_errors): (Cow<'_, str>, _, _) = encoding.decode(bytes);
    if had_errors {
        debug!(encoding = actual.name(), "Replaced malformed sequences while decoding");
    }
    text.into_owned()
}
