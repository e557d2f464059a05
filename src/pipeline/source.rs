//! Content sources: turn a dropped/picked file, the clipboard or the built-in
//! sample into one [`IngestedDocument`].
//!
//! ## Paths through the adapter
//!
//! ```text
//! File ──▶ route(media type) ──▶ read chunks ──▶ decode text ─┐
//!             │ unsupported          (progress)   or decoder   ├─▶ IngestedDocument
//! Clipboard ──▶ first text/plain representation ──────────────┤
//! Sample ─────▶ fixed built-in résumé ────────────────────────┘
//! ```
//!
//! File reads report progress in `Reading` (and `Decoding` for binary
//! documents); clipboard and sample emit a single terminal `Done` event.
//! The media type is checked before anything is read, so an unsupported
//! file fails without a single progress event.

use super::decoder::DocumentDecoder;
use super::router::{decode_text, route, ExtractionStrategy};
use crate::error::IngestionError;
use crate::progress::{IngestionProgressObserver, ProgressPhase, ProgressTracker};
use async_trait::async_trait;
use mime_guess::mime::{self, Mime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info};
use uuid::Uuid;

/// Label given to clipboard content.
pub const CLIPBOARD_LABEL: &str = "Pasted content";

/// Label of the built-in sample document.
pub const SAMPLE_LABEL: &str = "Sample Resume.txt";

/// Built-in résumé used to demo the pipeline without real input.
pub const SAMPLE_RESUME: &str = "\
EMILY JOHNSON
Software Engineer
emily.johnson@example.com | (555) 987-6543 | linkedin.com/in/emilyjohnson

SUMMARY
Innovative Software Engineer with 3+ years of experience in full-stack development, specializing in React and Node.js. Passionate about creating intuitive user experiences and optimizing application performance.

TECHNICAL SKILLS
Languages: JavaScript, TypeScript, HTML5, CSS3, Python
Frameworks: React, Redux, Express.js, Jest
Tools: Git, Docker, AWS, Webpack, Babel

PROFESSIONAL EXPERIENCE
Frontend Developer | Tech Innovations Inc. | June 2021 - Present
• Developed responsive web applications using React and TypeScript, improving user engagement by 35%
• Implemented state management with Redux, resulting in more maintainable codebase and 20% faster rendering
• Collaborated with UX designers to create intuitive interfaces, increasing user retention by 25%
• Led migration from CSS to Styled Components, improving component reusability and theming capabilities

Junior Web Developer | Digital Solutions LLC | August 2019 - May 2021
• Built and maintained client websites using React, HTML5, and CSS3
• Participated in agile development process, delivering features on time for bi-weekly sprints
• Optimized website performance, improving load times by 40% through code splitting and lazy loading
• Created RESTful APIs using Node.js and Express to support front-end functionality

EDUCATION
Bachelor of Science in Computer Science | University of Washington | 2019
• GPA: 3.8/4.0
• Relevant coursework: Data Structures, Algorithms, Web Development, Database Systems

PROJECTS
Personal Finance Dashboard
• Designed and implemented a personal finance tracking application using React and Chart.js
• Integrated with banking APIs to automatically categorize transactions and visualize spending patterns

Community Forum Platform
• Developed a responsive forum application using the MERN stack (MongoDB, Express, React, Node.js)
• Implemented real-time messaging using Socket.io and JWT-based authentication system

CERTIFICATIONS
• AWS Certified Developer – Associate | 2022
• React Nanodegree | Udacity | 2021
";

// ── Documents ────────────────────────────────────────────────────────────

/// Identity of one ingestion. Progress events and the resulting document
/// carry the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    DroppedFile,
    PickedFile,
    Clipboard,
    Sample,
}

/// Plain text ready for analysis. Immutable; `text` is never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedDocument {
    id: DocumentId,
    text: String,
    label: String,
    source_kind: SourceKind,
}

impl IngestedDocument {
    /// Fails with [`IngestionError::EmptyDocument`] when `text` is blank.
    pub fn new(
        id: DocumentId,
        text: impl Into<String>,
        label: impl Into<String>,
        source_kind: SourceKind,
    ) -> Result<Self, IngestionError> {
        let text = text.into();
        let label = label.into();
        if text.trim().is_empty() {
            return Err(IngestionError::EmptyDocument { label });
        }
        Ok(Self {
            id,
            text,
            label,
            source_kind,
        })
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }
}

// ── Inputs ───────────────────────────────────────────────────────────────

/// How the file reached the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileOrigin {
    Dropped,
    #[default]
    Picked,
}

/// A user-supplied file: name, declared media type and a byte source.
pub struct FileInput {
    name: String,
    media_type: String,
    origin: FileOrigin,
    size: Option<u64>,
    body: Box<dyn AsyncRead + Send + Unpin>,
}

impl FileInput {
    /// An in-memory file.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            media_type: media_type.into(),
            origin: FileOrigin::default(),
            size: Some(bytes.len() as u64),
            body: Box::new(std::io::Cursor::new(bytes)),
        }
    }

    /// A streaming file. `size` enables percentage progress while reading.
    pub fn from_reader(
        name: impl Into<String>,
        media_type: impl Into<String>,
        size: Option<u64>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            origin: FileOrigin::default(),
            size,
            body: Box::new(reader),
        }
    }

    /// Open a local file. The media type is inferred from the extension the
    /// way a browser file picker does; unknown extensions are left untyped.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IngestionError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| IngestionError::read(format!("{}: {e}", path.display())))?;
        let size = file.metadata().await.ok().map(|m| m.len());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or_default()
            .to_string();
        Ok(Self::from_reader(name, media_type, size, file))
    }

    pub fn dropped(mut self) -> Self {
        self.origin = FileOrigin::Dropped;
        self
    }

    pub fn picked(mut self) -> Self {
        self.origin = FileOrigin::Picked;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn source_kind(&self) -> SourceKind {
        match self.origin {
            FileOrigin::Dropped => SourceKind::DroppedFile,
            FileOrigin::Picked => SourceKind::PickedFile,
        }
    }
}

impl fmt::Debug for FileInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInput")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("origin", &self.origin)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// One representation of a clipboard item (`text/plain`, `image/png`, …).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardRepresentation {
    pub media_type: String,
    pub data: Vec<u8>,
}

/// One clipboard entry with all the formats it is offered in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardItem {
    pub representations: Vec<ClipboardRepresentation>,
}

impl ClipboardItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, media_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.representations.push(ClipboardRepresentation {
            media_type: media_type.into(),
            data: data.into(),
        });
        self
    }

    /// Shorthand for a single `text/plain` representation.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new().with("text/plain", text.into().into_bytes())
    }
}

/// Platform clipboard access.
#[async_trait]
pub trait ClipboardReader: Send + Sync {
    async fn read(&self) -> Result<Vec<ClipboardItem>, IngestionError>;
}

/// Clipboard reader used when none is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoClipboard;

#[async_trait]
impl ClipboardReader for NoClipboard {
    async fn read(&self) -> Result<Vec<ClipboardItem>, IngestionError> {
        Err(IngestionError::ReadFailure {
            reason: "clipboard access is not available".into(),
        })
    }
}

/// Fixed clipboard contents, for embedding hosts that already read the
/// clipboard themselves.
#[derive(Debug, Default, Clone)]
pub struct StaticClipboard(pub Vec<ClipboardItem>);

#[async_trait]
impl ClipboardReader for StaticClipboard {
    async fn read(&self) -> Result<Vec<ClipboardItem>, IngestionError> {
        Ok(self.0.clone())
    }
}

/// Everything the adapter accepts.
#[derive(Debug)]
pub enum ContentInput {
    File(FileInput),
    Clipboard,
    Sample,
}

impl ContentInput {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            ContentInput::File(f) => f.source_kind(),
            ContentInput::Clipboard => SourceKind::Clipboard,
            ContentInput::Sample => SourceKind::Sample,
        }
    }
}

impl From<FileInput> for ContentInput {
    fn from(file: FileInput) -> Self {
        ContentInput::File(file)
    }
}

// ── Adapter ──────────────────────────────────────────────────────────────

/// Produces exactly one [`IngestedDocument`] per input or fails with an
/// [`IngestionError`].
#[derive(Clone)]
pub struct ContentSourceAdapter {
    decoder: Arc<dyn DocumentDecoder>,
    clipboard: Arc<dyn ClipboardReader>,
    read_chunk_size: usize,
    max_document_bytes: u64,
}

impl ContentSourceAdapter {
    pub fn new(
        decoder: Arc<dyn DocumentDecoder>,
        clipboard: Arc<dyn ClipboardReader>,
        read_chunk_size: usize,
        max_document_bytes: u64,
    ) -> Self {
        Self {
            decoder,
            clipboard,
            read_chunk_size: read_chunk_size.max(1),
            max_document_bytes,
        }
    }

    /// Ingest one input, reporting progress for `id` to `observer`.
    pub async fn ingest(
        &self,
        input: ContentInput,
        id: DocumentId,
        observer: &dyn IngestionProgressObserver,
    ) -> Result<IngestedDocument, IngestionError> {
        let mut tracker = ProgressTracker::new(id, observer);
        let result = match input {
            ContentInput::File(file) => self.ingest_file(file, id, &mut tracker).await,
            ContentInput::Clipboard => self.ingest_clipboard(id).await,
            ContentInput::Sample => Ok(load_sample(id)),
        };
        match &result {
            Ok(doc) => {
                tracker.finish();
                info!(
                    document = %id,
                    label = doc.label(),
                    chars = doc.text().chars().count(),
                    "Ingested document"
                );
            }
            Err(e) => {
                tracker.fail();
                debug!(document = %id, error = %e, "Ingestion failed");
            }
        }
        result
    }

    async fn ingest_file(
        &self,
        mut file: FileInput,
        id: DocumentId,
        tracker: &mut ProgressTracker<'_>,
    ) -> Result<IngestedDocument, IngestionError> {
        // Both checks run before the first read so a rejected file emits nothing.
        let strategy = route(&file.media_type)?;
        if let Some(size) = file.size.filter(|s| *s > self.max_document_bytes) {
            return Err(IngestionError::TooLarge {
                size,
                max: self.max_document_bytes,
            });
        }

        let read_ceiling = match strategy {
            ExtractionStrategy::PlainText { .. } => 99,
            ExtractionStrategy::BinaryDocument { .. } => 49,
        };
        let bytes = self.read_all(&mut file, tracker, read_ceiling).await?;
        debug!(document = %id, bytes = bytes.len(), name = %file.name, "Read file");

        let text = match strategy {
            ExtractionStrategy::PlainText { encoding } => decode_text(&bytes, encoding),
            ExtractionStrategy::BinaryDocument { media_type } => {
                tracker.report(ProgressPhase::Decoding, 50);
                self.decoder.decode(&bytes, media_type).await?
            }
        };

        let label = if file.name.trim().is_empty() {
            "Uploaded file".to_string()
        } else {
            file.name.clone()
        };
        IngestedDocument::new(id, text, label, file.source_kind())
    }

    async fn read_all(
        &self,
        file: &mut FileInput,
        tracker: &mut ProgressTracker<'_>,
        ceiling: u8,
    ) -> Result<Vec<u8>, IngestionError> {
        let mut bytes = Vec::with_capacity(file.size.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; self.read_chunk_size];
        tracker.report(ProgressPhase::Reading, 0);

        loop {
            let n = file.body.read(&mut chunk).await.map_err(IngestionError::read)?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            let read = bytes.len() as u64;
            if read > self.max_document_bytes {
                return Err(IngestionError::TooLarge {
                    size: read,
                    max: self.max_document_bytes,
                });
            }
            if let Some(total) = file.size {
                tracker.report_fraction(ProgressPhase::Reading, read, total.max(read), 0, ceiling);
            }
        }
        Ok(bytes)
    }

    async fn ingest_clipboard(&self, id: DocumentId) -> Result<IngestedDocument, IngestionError> {
        let items = self.clipboard.read().await?;
        let text = items
            .iter()
            .flat_map(|item| item.representations.iter())
            .find_map(plain_text)
            .ok_or(IngestionError::EmptyClipboard)?;
        IngestedDocument::new(id, text, CLIPBOARD_LABEL, SourceKind::Clipboard)
    }
}

/// Decode a clipboard representation if, and only if, it is `text/plain`.
fn plain_text(rep: &ClipboardRepresentation) -> Option<String> {
    let parsed: Mime = rep.media_type.trim().parse().ok()?;
    if parsed.type_() != mime::TEXT || parsed.subtype() != mime::PLAIN {
        return None;
    }
    match route(&rep.media_type).ok()? {
        ExtractionStrategy::PlainText { encoding } => Some(decode_text(&rep.data, encoding)),
        ExtractionStrategy::BinaryDocument { .. } => None,
    }
}

/// The built-in sample. Synchronous and independent of any collaborator.
pub fn load_sample(id: DocumentId) -> IngestedDocument {
    IngestedDocument {
        id,
        text: SAMPLE_RESUME.to_string(),
        label: SAMPLE_LABEL.to_string(),
        source_kind: SourceKind::Sample,
    }
}
