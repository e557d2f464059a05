//! Pipeline stages for résumé analysis.
//!
//! Each submodule implements exactly one step and knows nothing about the
//! session lifecycle; [`crate::session`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ router ──▶ (decoder) ──▶ llm ──▶ validate
//! (input)   (media type) (binary)    (HTTP)   (schema)
//! ```
//!
//! 1. [`source`]: normalise a file, clipboard read or the sample into an
//!    `IngestedDocument`, emitting progress for file reads
//! 2. [`router`]: choose plain-text decoding, the external decoder or
//!    rejection from the declared media type
//! 3. [`decoder`]: the seam for binary formats; implemented by the host
//! 4. [`llm`]: one chat-completion call; the only stage with network I/O
//! 5. [`validate`]: strict structural check of the completion JSON

pub mod decoder;
pub mod llm;
pub mod router;
pub mod source;
pub mod validate;
