//! The pipeline state machine.
//!
//! ```text
//! Idle ──start_ingest──▶ Ingesting ──progress──▶ Ingesting
//! Ingesting ──ok(doc)──▶ Ready        Ingesting ──err──▶ Failed*
//! Ready ──start_analysis──▶ Analyzing
//! Analyzing ──ok(result)──▶ Complete*   Analyzing ──err──▶ Failed*
//! any ──reset──▶ Idle
//! ```
//!
//! [`StateMachine`] is synchronous and owns no I/O; [`crate::session`]
//! drives it around the async stages. Each `start_*` hands out a ticket
//! stamped with the current epoch, and `reset` (like every start) moves the
//! epoch forward. A completion whose ticket carries an old epoch belongs to
//! abandoned work and is discarded with [`PipelineError::Superseded`]; it is
//! never merged into the newer state.

use crate::error::{AnalysisError, FailureCause, IngestionError, PipelineError, SessionError};
use crate::pipeline::source::{DocumentId, IngestedDocument, SourceKind};
use crate::progress::IngestionProgress;
use crate::schema::AnalysisResult;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Observable lifecycle of one session.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    Ingesting {
        document_id: DocumentId,
        source_kind: SourceKind,
        /// Latest event; `None` until the first one arrives.
        progress: Option<IngestionProgress>,
    },
    Ready(Arc<IngestedDocument>),
    Analyzing(Arc<IngestedDocument>),
    Complete {
        document: Arc<IngestedDocument>,
        result: Arc<AnalysisResult>,
    },
    Failed {
        cause: FailureCause,
        /// Present when the failure happened during analysis.
        document: Option<Arc<IngestedDocument>>,
    },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Ingesting { .. } => "ingesting",
            PipelineState::Ready(_) => "ready",
            PipelineState::Analyzing(_) => "analyzing",
            PipelineState::Complete { .. } => "complete",
            PipelineState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Complete { .. } | PipelineState::Failed { .. })
    }

    /// The document this state refers to, if any.
    pub fn document(&self) -> Option<&Arc<IngestedDocument>> {
        match self {
            PipelineState::Ready(doc) | PipelineState::Analyzing(doc) => Some(doc),
            PipelineState::Complete { document, .. } => Some(document),
            PipelineState::Failed { document, .. } => document.as_ref(),
            PipelineState::Idle | PipelineState::Ingesting { .. } => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Permission to complete one ingestion.
#[derive(Debug)]
pub struct IngestTicket {
    epoch: u64,
    document_id: DocumentId,
}

impl IngestTicket {
    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }
}

/// Permission to complete one analysis of `document`.
#[derive(Debug)]
pub struct AnalysisTicket {
    epoch: u64,
    document: Arc<IngestedDocument>,
}

impl AnalysisTicket {
    pub fn document(&self) -> &Arc<IngestedDocument> {
        &self.document
    }
}

/// Single-writer state machine for one session.
#[derive(Debug)]
pub struct StateMachine {
    state: PipelineState,
    epoch: u64,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            epoch: 0,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Begin ingesting. Allowed from `Idle`, and from `Ready` to replace the
    /// current source.
    pub fn start_ingest(&mut self, source_kind: SourceKind) -> Result<IngestTicket, PipelineError> {
        match &self.state {
            PipelineState::Idle | PipelineState::Ready(_) => {}
            PipelineState::Ingesting { .. } => {
                return Err(PipelineError::AlreadyInProgress {
                    operation: "ingestion",
                })
            }
            other => {
                return Err(PipelineError::InvalidTransition {
                    from: other.name(),
                    event: "start ingestion",
                })
            }
        }
        let document_id = DocumentId::new();
        let epoch = self.advance();
        self.transition(PipelineState::Ingesting {
            document_id,
            source_kind,
            progress: None,
        });
        Ok(IngestTicket { epoch, document_id })
    }

    /// Record a progress event. Returns `false` when the event is stale.
    pub fn record_progress(&mut self, ticket: &IngestTicket, progress: IngestionProgress) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        match &mut self.state {
            PipelineState::Ingesting {
                document_id,
                progress: current,
                ..
            } if *document_id == progress.document_id => {
                *current = Some(progress);
                true
            }
            _ => false,
        }
    }

    /// Apply the outcome of an ingestion.
    pub fn complete_ingest(
        &mut self,
        ticket: IngestTicket,
        outcome: Result<IngestedDocument, IngestionError>,
    ) -> Result<Arc<IngestedDocument>, SessionError> {
        if !self.is_current(ticket.epoch, "ingestion") {
            return Err(PipelineError::Superseded.into());
        }
        match outcome {
            Ok(doc) => {
                let doc = Arc::new(doc);
                self.transition(PipelineState::Ready(Arc::clone(&doc)));
                Ok(doc)
            }
            Err(e) => {
                self.transition(PipelineState::Failed {
                    cause: FailureCause::Ingestion(e.clone()),
                    document: None,
                });
                Err(e.into())
            }
        }
    }

    /// Begin analysing the ready document.
    pub fn start_analysis(&mut self) -> Result<AnalysisTicket, PipelineError> {
        let document = match &self.state {
            PipelineState::Ready(doc) => Arc::clone(doc),
            PipelineState::Analyzing(_) => {
                return Err(PipelineError::AlreadyInProgress {
                    operation: "analysis",
                })
            }
            other => {
                return Err(PipelineError::InvalidTransition {
                    from: other.name(),
                    event: "start analysis",
                })
            }
        };
        let epoch = self.advance();
        self.transition(PipelineState::Analyzing(Arc::clone(&document)));
        Ok(AnalysisTicket { epoch, document })
    }

    /// Apply the outcome of an analysis.
    pub fn complete_analysis(
        &mut self,
        ticket: AnalysisTicket,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> Result<Arc<AnalysisResult>, SessionError> {
        if !self.is_current(ticket.epoch, "analysis") {
            return Err(PipelineError::Superseded.into());
        }
        match outcome {
            Ok(result) => {
                let result = Arc::new(result);
                self.transition(PipelineState::Complete {
                    document: ticket.document,
                    result: Arc::clone(&result),
                });
                Ok(result)
            }
            Err(e) => {
                self.transition(PipelineState::Failed {
                    cause: FailureCause::Analysis(e.clone()),
                    document: Some(ticket.document),
                });
                Err(e.into())
            }
        }
    }

    /// Return to `Idle` from any state, invalidating every outstanding ticket.
    pub fn reset(&mut self) {
        self.advance();
        self.transition(PipelineState::Idle);
    }

    fn advance(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    fn is_current(&self, epoch: u64, operation: &str) -> bool {
        if epoch == self.epoch {
            return true;
        }
        warn!(
            "Discarding stale {} result (ticket epoch {}, session epoch {})",
            operation, epoch, self.epoch
        );
        false
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline transition: {} -> {}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::load_sample;
    use crate::progress::ProgressPhase;

    fn ready(sm: &mut StateMachine) -> Arc<IngestedDocument> {
        let t = sm.start_ingest(SourceKind::Sample).unwrap();
        let doc = load_sample(t.document_id());
        sm.complete_ingest(t, Ok(doc)).unwrap()
    }

    fn progress(id: DocumentId, percent: u8) -> IngestionProgress {
        IngestionProgress {
            document_id: id,
            percent,
            phase: ProgressPhase::Reading,
        }
    }

    #[test]
    fn happy_path_reaches_ready() {
        let mut sm = StateMachine::new();
        let t = sm.start_ingest(SourceKind::PickedFile).unwrap();
        assert_eq!(sm.state().name(), "ingesting");
        assert!(sm.record_progress(&t, progress(t.document_id(), 40)));
        match sm.state() {
            PipelineState::Ingesting { progress, .. } => {
                assert_eq!(progress.unwrap().percent, 40)
            }
            other => panic!("unexpected {other}"),
        }
        let doc = load_sample(t.document_id());
        sm.complete_ingest(t, Ok(doc)).unwrap();
        assert_eq!(sm.state().name(), "ready");
    }

    #[test]
    fn second_ingest_is_rejected_while_ingesting() {
        let mut sm = StateMachine::new();
        let _t = sm.start_ingest(SourceKind::Clipboard).unwrap();
        assert_eq!(
            sm.start_ingest(SourceKind::Sample).unwrap_err(),
            PipelineError::AlreadyInProgress {
                operation: "ingestion"
            }
        );
    }

    #[test]
    fn ingestion_failure_is_terminal() {
        let mut sm = StateMachine::new();
        let t = sm.start_ingest(SourceKind::Clipboard).unwrap();
        let err = sm
            .complete_ingest(t, Err(IngestionError::EmptyClipboard))
            .unwrap_err();
        assert_eq!(err, SessionError::Ingestion(IngestionError::EmptyClipboard));
        assert!(sm.state().is_terminal());
        assert!(matches!(
            sm.start_ingest(SourceKind::Sample),
            Err(PipelineError::InvalidTransition { from: "failed", .. })
        ));
    }

    #[test]
    fn analysis_keeps_the_document() {
        let mut sm = StateMachine::new();
        let doc = ready(&mut sm);
        let t = sm.start_analysis().unwrap();
        assert_eq!(sm.state().document(), Some(&doc));
        assert_eq!(
            sm.start_analysis().unwrap_err(),
            PipelineError::AlreadyInProgress {
                operation: "analysis"
            }
        );
        let err = sm
            .complete_analysis(t, Err(AnalysisError::MissingCredential))
            .unwrap_err();
        assert_eq!(err, SessionError::Analysis(AnalysisError::MissingCredential));
        match sm.state() {
            PipelineState::Failed { document, cause } => {
                assert_eq!(document.as_ref(), Some(&doc));
                assert_eq!(*cause, FailureCause::Analysis(AnalysisError::MissingCredential));
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn analysis_requires_ready() {
        let mut sm = StateMachine::new();
        assert_eq!(
            sm.start_analysis().unwrap_err(),
            PipelineError::InvalidTransition {
                from: "idle",
                event: "start analysis"
            }
        );
    }

    #[test]
    fn ready_can_be_replaced() {
        let mut sm = StateMachine::new();
        ready(&mut sm);
        assert!(sm.start_ingest(SourceKind::PickedFile).is_ok());
    }

    #[test]
    fn reset_from_every_state_returns_to_idle() {
        let mut sm = StateMachine::new();
        sm.reset();
        assert_eq!(*sm.state(), PipelineState::Idle);

        let _t = sm.start_ingest(SourceKind::Sample).unwrap();
        sm.reset();
        assert_eq!(*sm.state(), PipelineState::Idle);

        ready(&mut sm);
        sm.reset();
        assert_eq!(*sm.state(), PipelineState::Idle);

        ready(&mut sm);
        let _t = sm.start_analysis().unwrap();
        sm.reset();
        assert_eq!(*sm.state(), PipelineState::Idle);

        let t = sm.start_ingest(SourceKind::Clipboard).unwrap();
        let _ = sm.complete_ingest(t, Err(IngestionError::EmptyClipboard));
        sm.reset();
        assert_eq!(*sm.state(), PipelineState::Idle);
    }

    #[test]
    fn stale_completions_are_discarded() {
        let mut sm = StateMachine::new();
        let old = sm.start_ingest(SourceKind::Sample).unwrap();
        let old_id = old.document_id();
        sm.reset();
        let fresh = sm.start_ingest(SourceKind::Clipboard).unwrap();

        assert!(!sm.record_progress(&old, progress(old_id, 90)));
        let err = sm.complete_ingest(old, Ok(load_sample(old_id))).unwrap_err();
        assert_eq!(err, SessionError::Pipeline(PipelineError::Superseded));
        assert_eq!(sm.state().name(), "ingesting");

        let doc = load_sample(fresh.document_id());
        sm.complete_ingest(fresh, Ok(doc)).unwrap();
        let analysis = sm.start_analysis().unwrap();
        sm.reset();
        let err = sm
            .complete_analysis(analysis, Err(AnalysisError::MissingCredential))
            .unwrap_err();
        assert_eq!(err, SessionError::Pipeline(PipelineError::Superseded));
        assert_eq!(*sm.state(), PipelineState::Idle);
    }
}
