//! Configuration for a résumé analysis session.
//!
//! Every knob lives in [`SessionConfig`], built via [`SessionConfigBuilder`].
//! Collaborators (document decoder, clipboard, analyzer, progress observer)
//! are injected here as trait objects so a host can swap any of them without
//! touching the pipeline.
//!
//! Nothing is read from the environment. The only secret, the service
//! credential, is supplied per call to
//! [`crate::session::ResumeSession::analyze`].

use crate::error::ConfigError;
use crate::pipeline::decoder::DocumentDecoder;
use crate::pipeline::llm::ResumeAnalyzer;
use crate::pipeline::source::ClipboardReader;
use crate::progress::ProgressObserver;
use std::fmt;
use std::sync::Arc;

/// Default chat-completion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for a [`crate::session::ResumeSession`].
///
/// # Example
/// ```rust
/// use resume_lens::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .model("gpt-4o-mini")
///     .temperature(0.2)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gpt-4o-mini");
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    /// Chat-completion URL. Must be http or https.
    pub endpoint: String,

    /// Model identifier sent with every request. Default: `gpt-4o`.
    pub model: String,

    /// Sampling temperature. Default: 0.3.
    ///
    /// The verdict should be reproducible for the same résumé, so keep this
    /// low; values above ~0.7 make scores drift between runs.
    pub temperature: f32,

    /// Completion token cap. `None` lets the service decide.
    pub max_tokens: Option<u32>,

    /// Ask the service for a JSON-object response format. Default: true.
    pub json_response: bool,

    /// Custom system prompt. If None, uses [`crate::prompts::ANALYSIS_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Bytes requested per read while ingesting a file. Default: 8 KiB.
    pub read_chunk_size: usize,

    /// Files larger than this are rejected. Default: 10 MiB.
    pub max_document_bytes: u64,

    /// Binary-document decoder. If None, binary documents fail with
    /// [`crate::error::DecodeError::Unavailable`].
    pub decoder: Option<Arc<dyn DocumentDecoder>>,

    /// Clipboard access. If None, clipboard reads fail with `ReadFailure`.
    pub clipboard: Option<Arc<dyn ClipboardReader>>,

    /// Pre-constructed analyzer. Takes precedence over the HTTP invoker
    /// built from `endpoint`/`model`.
    pub analyzer: Option<Arc<dyn ResumeAnalyzer>>,

    /// Receives ingestion progress events.
    pub progress_observer: Option<ProgressObserver>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: None,
            json_response: true,
            system_prompt: None,
            read_chunk_size: 8 * 1024,
            max_document_bytes: 10 * 1024 * 1024,
            decoder: None,
            clipboard: None,
            analyzer: None,
            progress_observer: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("json_response", &self.json_response)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("read_chunk_size", &self.read_chunk_size)
            .field("max_document_bytes", &self.max_document_bytes)
            .field("decoder", &self.decoder.as_ref().map(|_| "<dyn DocumentDecoder>"))
            .field("clipboard", &self.clipboard.as_ref().map(|_| "<dyn ClipboardReader>"))
            .field("analyzer", &self.analyzer.as_ref().map(|_| "<dyn ResumeAnalyzer>"))
            .field(
                "progress_observer",
                &self.progress_observer.as_ref().map(|_| "<dyn IngestionProgressObserver>"),
            )
            .finish()
    }
}

impl SessionConfig {
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn json_response(mut self, v: bool) -> Self {
        self.config.json_response = v;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn read_chunk_size(mut self, bytes: usize) -> Self {
        self.config.read_chunk_size = bytes;
        self
    }

    pub fn max_document_bytes(mut self, bytes: u64) -> Self {
        self.config.max_document_bytes = bytes;
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn DocumentDecoder>) -> Self {
        self.config.decoder = Some(decoder);
        self
    }

    pub fn clipboard(mut self, clipboard: Arc<dyn ClipboardReader>) -> Self {
        self.config.clipboard = Some(clipboard);
        self
    }

    pub fn analyzer(mut self, analyzer: Arc<dyn ResumeAnalyzer>) -> Self {
        self.config.analyzer = Some(analyzer);
        self
    }

    pub fn progress_observer(mut self, observer: ProgressObserver) -> Self {
        self.config.progress_observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, ConfigError> {
        let c = &self.config;
        match reqwest::Url::parse(&c.endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "endpoint must be an http(s) URL, got '{}'",
                    c.endpoint
                )))
            }
        }
        if c.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if c.read_chunk_size == 0 {
            return Err(ConfigError::Invalid("read chunk size must be ≥ 1".into()));
        }
        if c.max_document_bytes == 0 {
            return Err(ConfigError::Invalid("max document size must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
