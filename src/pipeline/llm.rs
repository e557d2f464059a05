//! Analysis invocation: one chat-completion request per résumé.
//!
//! This is the only stage with network I/O and the sole suspension point of
//! the whole pipeline. It is deliberately single-shot: no retry, no internal
//! timeout. A caller that wants either layers it on top (see
//! [`crate::session::ResumeSession::analyze`], which can simply be called
//! again after a failure).
//!
//! ## Request Layout
//!
//! ```text
//! POST {endpoint}
//! Authorization: Bearer <credential>
//! {
//!   "model": "...", "temperature": 0.3,
//!   "response_format": {"type": "json_object"},
//!   "messages": [
//!     {"role": "system", "content": <rubric>},
//!     {"role": "user",   "content": <résumé text>}
//!   ]
//! }
//! ```
//!
//! ## Response Handling
//!
//! | Outcome                                | Result                          |
//! |----------------------------------------|---------------------------------|
//! | connection / body read failed          | [`AnalysisError::Transport`]    |
//! | non-2xx status                         | [`AnalysisError::ServiceError`] |
//! | completion text is not JSON            | [`AnalysisError::ParseError`]   |
//! | JSON violates the result schema        | [`AnalysisError::Validation`]   |
//!
//! The credential, the résumé text and the request body are never logged.

use super::source::IngestedDocument;
use super::validate::validate;
use crate::config::SessionConfig;
use crate::error::{AnalysisError, GENERIC_SERVICE_ERROR};
use crate::prompts::ANALYSIS_SYSTEM_PROMPT;
use crate::schema::AnalysisResult;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Secret used to authenticate against the analysis service.
///
/// Held only in memory; `Debug` prints `[REDACTED]`.
pub struct Credential(SecretString);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::new(secret.into()))
    }

    /// `None` for a blank secret, so an empty input box counts as missing.
    pub fn non_empty(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        (!secret.trim().is_empty()).then(|| Self::new(secret))
    }

    fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_owned())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Anything that can turn a document into an [`AnalysisResult`].
///
/// [`AnalysisInvoker`] is the production implementation; the session depends
/// only on this trait so hosts can substitute another backend.
#[async_trait]
pub trait ResumeAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        document: &IngestedDocument,
        credential: Option<&Credential>,
    ) -> Result<AnalysisResult, AnalysisError>;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorEnvelope {
    error: ServiceErrorBody,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    message: Option<String>,
}

// ── Invoker ──────────────────────────────────────────────────────────────

/// Chat-completion client. Stateless between calls; cheap to clone.
#[derive(Clone)]
pub struct AnalysisInvoker {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    json_response: bool,
    system_prompt: Option<String>,
}

impl AnalysisInvoker {
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Reuse an existing `reqwest::Client` (connection pool, proxy settings).
    pub fn with_client(client: Client, config: &SessionConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            json_response: config.json_response,
            system_prompt: config.system_prompt.clone(),
        }
    }

    /// Perform exactly one request for `document`.
    pub async fn invoke(
        &self,
        document: &IngestedDocument,
        credential: Option<&Credential>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let credential = credential.ok_or(AnalysisError::MissingCredential)?;
        let start = Instant::now();

        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            response_format: self.json_response.then_some(ResponseFormat {
                kind: "json_object",
            }),
            messages: [
                ChatMessage {
                    role: "system",
                    content: self
                        .system_prompt
                        .as_deref()
                        .unwrap_or(ANALYSIS_SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: document.text(),
                },
            ],
        };

        debug!(document = %document.id(), model = %self.model, "Sending analysis request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            // An unreadable error body still reports the status.
            let message = response
                .text()
                .await
                .map(|body| service_message(&body))
                .unwrap_or_else(|_| GENERIC_SERVICE_ERROR.to_string());
            warn!(
                document = %document.id(),
                status = status.as_u16(),
                "Analysis service returned an error: {}",
                message
            );
            return Err(AnalysisError::ServiceError {
                status_code: status.as_u16(),
                message,
            });
        }

        let text = response.text().await.map_err(transport)?;
        let completion = completion_text(&text)?;
        let result = parse_completion(&completion)?;

        info!(
            document = %document.id(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(result)
    }
}

#[async_trait]
impl ResumeAnalyzer for AnalysisInvoker {
    async fn analyze(
        &self,
        document: &IngestedDocument,
        credential: Option<&Credential>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.invoke(document, credential).await
    }
}

fn transport(e: reqwest::Error) -> AnalysisError {
    AnalysisError::Transport {
        reason: e.to_string(),
    }
}

/// Error message from `{"error": {"message": ...}}`, or the generic fallback.
fn service_message(body: &str) -> String {
    serde_json::from_str::<ServiceErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_SERVICE_ERROR.to_string())
}

/// Pull the first choice's content out of a successful response body.
///
/// A body that is not a chat-completion envelope is reported as a
/// [`AnalysisError::ParseError`] carrying the whole body.
fn completion_text(body: &str) -> Result<String, AnalysisError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|_| AnalysisError::ParseError {
            raw_text: body.to_string(),
        })?;

    if let Some(usage) = &response.usage {
        debug!(
            "Analysis usage: input_tokens={}, output_tokens={}",
            usage.prompt_tokens, usage.completion_tokens
        );
    }

    Ok(response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default())
}

/// Strictly parse completion text into a validated result.
///
/// Markdown fences around the JSON are tolerated; anything else that is not
/// a JSON document is a [`AnalysisError::ParseError`] holding the text
/// exactly as received.
pub fn parse_completion(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let candidate: serde_json::Value =
        serde_json::from_str(strip_json_fences(text)).map_err(|_| AnalysisError::ParseError {
            raw_text: text.to_string(),
        })?;
    Ok(validate(&candidate)?)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(str::trim)
                .unwrap_or(stripped)
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::{load_sample, DocumentId};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn verdict() -> serde_json::Value {
        json!({
            "overview": {"readabilityScore": 8, "length": "1 page", "tone": "Professional", "structure": "Clear"},
            "grammarAndStyle": {"spellingErrors": 0, "grammarIssues": 1, "passiveVoice": 10, "clarityScore": 9, "issues": []},
            "keywords": {"detected": [{"keyword": "React", "count": 3, "relevance": "high"}], "missing": ["Kubernetes"], "density": 4.5},
            "suggestions": {"critical": [], "important": ["Add a summary"], "minor": []}
        })
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 300}
        })
    }

    async fn invoker(server: &MockServer) -> AnalysisInvoker {
        let config = SessionConfig::builder()
            .endpoint(format!("{}/v1/chat/completions", server.uri()))
            .build()
            .unwrap();
        AnalysisInvoker::new(&config)
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn service_message_falls_back() {
        assert_eq!(
            service_message(r#"{"error":{"message":"rate limited"}}"#),
            "rate limited"
        );
        assert_eq!(service_message("<html>502</html>"), GENERIC_SERVICE_ERROR);
        assert_eq!(service_message(r#"{"error":{}}"#), GENERIC_SERVICE_ERROR);
    }

    #[test]
    fn parse_error_keeps_raw_text() {
        assert_eq!(
            parse_completion("not json").unwrap_err(),
            AnalysisError::ParseError {
                raw_text: "not json".into()
            }
        );
    }

    #[test]
    fn credential_debug_is_redacted() {
        let c = Credential::new("sk-secret");
        assert!(!format!("{c:?}").contains("sk-secret"));
        assert!(Credential::non_empty("  ").is_none());
    }

    #[tokio::test]
    async fn missing_credential_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = invoker(&server)
            .await
            .invoke(&load_sample(DocumentId::new()), None)
            .await
            .unwrap_err();
        assert_eq!(err, AnalysisError::MissingCredential);
    }

    #[tokio::test]
    async fn successful_invocation_is_validated() {
        let server = MockServer::start().await;
        let doc = load_sample(DocumentId::new());
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "response_format": {"type": "json_object"},
                "messages": [
                    {"role": "system", "content": ANALYSIS_SYSTEM_PROMPT},
                    {"role": "user", "content": doc.text()}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion(&verdict().to_string())),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = invoker(&server)
            .await
            .invoke(&doc, Some(&Credential::new("sk-test")))
            .await
            .unwrap();
        assert_eq!(result.overview.readability_score, 8);
        assert_eq!(result.keywords.missing, vec!["Kubernetes"]);
    }

    #[tokio::test]
    async fn fenced_completion_is_accepted() {
        let server = MockServer::start().await;
        let fenced = format!("```json\n{}\n```", verdict());
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&fenced)))
            .mount(&server)
            .await;

        let result = invoker(&server)
            .await
            .invoke(&load_sample(DocumentId::new()), Some(&Credential::new("k")))
            .await
            .unwrap();
        assert_eq!(result.suggestions.important, vec!["Add a summary"]);
    }

    #[tokio::test]
    async fn error_status_carries_service_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"error": {"message": "rate limited"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = invoker(&server)
            .await
            .invoke(&load_sample(DocumentId::new()), Some(&Credential::new("k")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::ServiceError {
                status_code: 429,
                message: "rate limited".into()
            }
        );
    }

    #[tokio::test]
    async fn error_status_without_body_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = invoker(&server)
            .await
            .invoke(&load_sample(DocumentId::new()), Some(&Credential::new("k")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::ServiceError {
                status_code: 500,
                message: GENERIC_SERVICE_ERROR.into()
            }
        );
    }

    #[tokio::test]
    async fn truncated_error_body_keeps_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Promises 100 bytes, sends 5, then hangs up.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 64 * 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\n\r\nshort")
                .await;
            let _ = socket.shutdown().await;
        });

        let config = SessionConfig::builder()
            .endpoint(format!("http://{addr}/v1/chat/completions"))
            .build()
            .unwrap();
        let err = AnalysisInvoker::new(&config)
            .invoke(&load_sample(DocumentId::new()), Some(&Credential::new("k")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AnalysisError::ServiceError {
                status_code: 503,
                message: GENERIC_SERVICE_ERROR.into()
            }
        );
    }

    #[tokio::test]
    async fn schema_violation_is_a_validation_error() {
        let server = MockServer::start().await;
        let mut bad = verdict();
        bad["overview"]["readabilityScore"] = json!(42);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&bad.to_string())))
            .mount(&server)
            .await;

        let err = invoker(&server)
            .await
            .invoke(&load_sample(DocumentId::new()), Some(&Credential::new("k")))
            .await
            .unwrap_err();
        match err {
            AnalysisError::Validation(v) => {
                assert!(v.invalid_fields.contains("overview.readabilityScore"))
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        let config = SessionConfig::builder()
            .endpoint("http://127.0.0.1:9/v1/chat/completions")
            .build()
            .unwrap();
        let err = AnalysisInvoker::new(&config)
            .invoke(&load_sample(DocumentId::new()), Some(&Credential::new("k")))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Transport { .. }), "{err:?}");
    }
}
