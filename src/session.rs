//! Async session driver.
//!
//! [`ResumeSession`] wires the pipeline stages to one [`StateMachine`]:
//!
//! ```text
//! ingest(input) ─▶ start_ingest ─▶ ContentSourceAdapter ─▶ complete_ingest
//!                                    │ progress
//!                                    ▼
//!                            record_progress ─▶ observer
//! analyze(cred) ─▶ start_analysis ─▶ ResumeAnalyzer ─▶ complete_analysis
//! ```
//!
//! The machine sits behind a `std::sync::Mutex` that is only held for the
//! synchronous transition itself, never across an `.await`. Every
//! transition is published on a `tokio::sync::watch` channel so views can
//! follow the session with [`ResumeSession::subscribe`].
//!
//! `reset` can be called while `ingest` or `analyze` is still awaiting. The
//! pending call then returns [`crate::error::PipelineError::Superseded`] and its outcome
//! never reaches the state.

use crate::config::SessionConfig;
use crate::error::{AnalysisError, SessionError};
use crate::pipeline::decoder::UnavailableDecoder;
use crate::pipeline::llm::{AnalysisInvoker, Credential, ResumeAnalyzer};
use crate::pipeline::source::{
    load_sample, ContentInput, ContentSourceAdapter, IngestedDocument, NoClipboard, SourceKind,
};
use crate::progress::{
    IngestionProgress, IngestionProgressObserver, NoopProgressObserver, ProgressObserver,
    ProgressTracker,
};
use crate::schema::AnalysisResult;
use crate::state::{IngestTicket, PipelineState, StateMachine};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info};

/// One user session: a document travelling from ingestion to a verdict.
///
/// Share it as `Arc<ResumeSession>` to call [`reset`](Self::reset) from
/// another task while an operation is awaiting.
pub struct ResumeSession {
    machine: Mutex<StateMachine>,
    state_tx: watch::Sender<PipelineState>,
    adapter: ContentSourceAdapter,
    analyzer: Arc<dyn ResumeAnalyzer>,
    observer: ProgressObserver,
}

impl ResumeSession {
    /// Build a session from `config`. Collaborators left unset fall back to
    /// [`UnavailableDecoder`], [`NoClipboard`], an HTTP [`AnalysisInvoker`]
    /// and a no-op progress observer.
    pub fn new(config: SessionConfig) -> Self {
        let decoder = config
            .decoder
            .clone()
            .unwrap_or_else(|| Arc::new(UnavailableDecoder));
        let clipboard = config
            .clipboard
            .clone()
            .unwrap_or_else(|| Arc::new(NoClipboard));
        let analyzer = config
            .analyzer
            .clone()
            .unwrap_or_else(|| Arc::new(AnalysisInvoker::new(&config)));
        let observer = config
            .progress_observer
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressObserver));

        let (state_tx, _) = watch::channel(PipelineState::Idle);
        Self {
            machine: Mutex::new(StateMachine::new()),
            state_tx,
            adapter: ContentSourceAdapter::new(
                decoder,
                clipboard,
                config.read_chunk_size,
                config.max_document_bytes,
            ),
            analyzer,
            observer,
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PipelineState {
        self.state_tx.borrow().clone()
    }

    /// Receiver that is notified on every transition and progress update.
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    /// Ingest one input and move to `Ready`.
    ///
    /// Fails with [`crate::error::PipelineError::AlreadyInProgress`] while another
    /// ingestion is running. An ingestion error moves the session to
    /// `Failed` and is returned as-is.
    pub async fn ingest(&self, input: ContentInput) -> Result<Arc<IngestedDocument>, SessionError> {
        let ticket = self.with_machine(|m| m.start_ingest(input.source_kind()))?;
        let forward = ForwardProgress {
            session: self,
            ticket: &ticket,
        };
        let outcome = self
            .adapter
            .ingest(input, ticket.document_id(), &forward)
            .await;
        self.with_machine(|m| m.complete_ingest(ticket, outcome))
    }

    /// Load the built-in sample without awaiting anything.
    pub fn load_sample(&self) -> Result<Arc<IngestedDocument>, SessionError> {
        let ticket = self.with_machine(|m| m.start_ingest(SourceKind::Sample))?;
        let document = load_sample(ticket.document_id());
        ProgressTracker::new(
            ticket.document_id(),
            &ForwardProgress {
                session: self,
                ticket: &ticket,
            },
        )
        .finish();
        debug!(document = %ticket.document_id(), "Loaded sample document");
        self.with_machine(|m| m.complete_ingest(ticket, Ok(document)))
    }

    /// Analyse the ready document and move to `Complete`.
    ///
    /// Without a credential nothing is sent: the session stays `Ready` and
    /// [`AnalysisError::MissingCredential`] is returned so the caller can
    /// ask for one and call again.
    pub async fn analyze(
        &self,
        credential: Option<&Credential>,
    ) -> Result<Arc<AnalysisResult>, SessionError> {
        let ticket = self.with_machine(|m| {
            if credential.is_none() && matches!(m.state(), PipelineState::Ready(_)) {
                return Err(SessionError::from(AnalysisError::MissingCredential));
            }
            m.start_analysis().map_err(SessionError::from)
        })?;
        let outcome = self.analyzer.analyze(ticket.document(), credential).await;
        self.with_machine(|m| m.complete_analysis(ticket, outcome))
    }

    /// Return to `Idle` from any state, abandoning in-flight work.
    pub fn reset(&self) {
        self.with_machine(StateMachine::reset);
        info!("Session reset");
    }

    /// Run `f` on the machine and publish the resulting state.
    fn with_machine<R>(&self, f: impl FnOnce(&mut StateMachine) -> R) -> R {
        let mut machine = self.machine.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut machine);
        self.state_tx.send_replace(machine.state().clone());
        out
    }
}

impl std::fmt::Debug for ResumeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeSession")
            .field("state", &self.state_tx.borrow().name())
            .finish_non_exhaustive()
    }
}

/// Records progress on the machine and passes current events to the
/// configured observer. Events from a superseded ingestion go nowhere.
struct ForwardProgress<'a> {
    session: &'a ResumeSession,
    ticket: &'a IngestTicket,
}

impl IngestionProgressObserver for ForwardProgress<'_> {
    fn on_progress(&self, progress: &IngestionProgress) {
        let current = self
            .session
            .with_machine(|m| m.record_progress(self.ticket, *progress));
        if current {
            self.session.observer.on_progress(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{IngestionError, PipelineError};
    use crate::pipeline::source::{ClipboardItem, FileInput, StaticClipboard};
    use crate::pipeline::validate::validate;
    use crate::progress::ProgressPhase;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn sample_result() -> AnalysisResult {
        validate(&json!({
            "overview": {"readabilityScore": 8, "length": "Good", "tone": "Professional", "structure": "Clear"},
            "grammarAndStyle": {"spellingErrors": 0, "grammarIssues": 1, "passiveVoice": 10,
                                "clarityScore": 7, "issues": []},
            "keywords": {"detected": [{"keyword": "React", "count": 3, "relevance": "high"}],
                         "missing": ["GraphQL"], "density": 5.0},
            "suggestions": {"critical": [], "important": ["Add metrics"], "minor": []}
        }))
        .unwrap()
    }

    /// Counts calls and optionally waits for a signal before answering.
    struct FakeAnalyzer {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        outcome: Result<AnalysisResult, AnalysisError>,
    }

    impl FakeAnalyzer {
        fn ok() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gate: None,
                outcome: Ok(sample_result()),
            }
        }
    }

    #[async_trait]
    impl ResumeAnalyzer for FakeAnalyzer {
        async fn analyze(
            &self,
            _document: &IngestedDocument,
            _credential: Option<&Credential>,
        ) -> Result<AnalysisResult, AnalysisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcome.clone()
        }
    }

    fn session(analyzer: Arc<FakeAnalyzer>) -> ResumeSession {
        let config = SessionConfig::builder().analyzer(analyzer).build().unwrap();
        ResumeSession::new(config)
    }

    #[test]
    fn starts_idle() {
        let s = session(Arc::new(FakeAnalyzer::ok()));
        assert_eq!(s.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn sample_then_analysis_completes() {
        let analyzer = Arc::new(FakeAnalyzer::ok());
        let s = session(analyzer.clone());
        let doc = s.load_sample().unwrap();
        assert_eq!(s.state(), PipelineState::Ready(doc.clone()));

        let result = s.analyze(Some(&Credential::new("sk-test"))).await.unwrap();
        assert_eq!(result.overview.readability_score, 8);
        match s.state() {
            PipelineState::Complete { document, .. } => assert_eq!(document, doc),
            other => panic!("unexpected {other}"),
        }
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_credential_keeps_ready() {
        let analyzer = Arc::new(FakeAnalyzer::ok());
        let s = session(analyzer.clone());
        s.load_sample().unwrap();

        let err = s.analyze(None).await.unwrap_err();
        assert_eq!(err, SessionError::Analysis(AnalysisError::MissingCredential));
        assert_eq!(s.state().name(), "ready");
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);

        s.analyze(Some(&Credential::new("sk-test"))).await.unwrap();
        assert_eq!(s.state().name(), "complete");
    }

    #[tokio::test]
    async fn analysis_before_ingest_is_rejected() {
        let s = session(Arc::new(FakeAnalyzer::ok()));
        let err = s.analyze(None).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Pipeline(PipelineError::InvalidTransition { from: "idle", .. })
        ));
    }

    #[tokio::test]
    async fn analysis_failure_is_recorded() {
        let analyzer = Arc::new(FakeAnalyzer {
            outcome: Err(AnalysisError::ParseError {
                raw_text: "not json".into(),
            }),
            ..FakeAnalyzer::ok()
        });
        let s = session(analyzer);
        s.load_sample().unwrap();
        let err = s.analyze(Some(&Credential::new("k"))).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Analysis(AnalysisError::ParseError {
                raw_text: "not json".into()
            })
        );
        assert!(s.state().is_terminal());
    }

    #[tokio::test]
    async fn clipboard_ingest_and_progress_are_published() {
        let (observer, mut events) = crate::progress::progress_stream();
        let config = SessionConfig::builder()
            .analyzer(Arc::new(FakeAnalyzer::ok()))
            .clipboard(Arc::new(StaticClipboard(vec![ClipboardItem::text("Jane Doe")])))
            .progress_observer(observer)
            .build()
            .unwrap();
        let s = ResumeSession::new(config);
        let mut rx = s.subscribe();

        let doc = s.ingest(ContentInput::Clipboard).await.unwrap();
        assert_eq!(doc.text(), "Jane Doe");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().name(), "ready");

        drop(s);
        use tokio_stream::StreamExt;
        let first = events.next().await.unwrap();
        assert_eq!(first.percent, 100);
        assert_eq!(first.phase, ProgressPhase::Done);
        assert_eq!(first.document_id, doc.id());
    }

    #[tokio::test]
    async fn unsupported_file_fails_without_progress() {
        let (observer, mut events) = crate::progress::progress_stream();
        let config = SessionConfig::builder()
            .analyzer(Arc::new(FakeAnalyzer::ok()))
            .progress_observer(observer)
            .build()
            .unwrap();
        let s = ResumeSession::new(config);
        let file = FileInput::from_bytes("blob.bin", "application/unknown-binary", vec![1, 2, 3]);
        let err = s.ingest(file.into()).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Ingestion(IngestionError::UnsupportedFormat { .. })
        ));
        drop(s);
        use tokio_stream::StreamExt;
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn second_analysis_is_rejected_and_reset_discards_first() {
        let gate = Arc::new(Notify::new());
        let analyzer = Arc::new(FakeAnalyzer {
            gate: Some(gate.clone()),
            ..FakeAnalyzer::ok()
        });
        let s = Arc::new(session(analyzer.clone()));
        s.load_sample().unwrap();

        let running = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.analyze(Some(&Credential::new("k"))).await })
        };
        while s.state().name() != "analyzing" {
            tokio::task::yield_now().await;
        }

        let err = s.analyze(Some(&Credential::new("k"))).await.unwrap_err();
        assert_eq!(
            err,
            SessionError::Pipeline(PipelineError::AlreadyInProgress {
                operation: "analysis"
            })
        );

        s.reset();
        gate.notify_one();
        let late = running.await.unwrap();
        assert_eq!(late.unwrap_err(), SessionError::Pipeline(PipelineError::Superseded));
        assert_eq!(s.state(), PipelineState::Idle);
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);

        // A fresh run works after the reset.
        s.load_sample().unwrap();
        assert_eq!(s.state().name(), "ready");
    }
}
