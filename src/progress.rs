//! Ingestion progress events.
//!
//! Inject an [`Arc<dyn IngestionProgressObserver>`] via
//! [`crate::config::SessionConfigBuilder::progress_observer`] to receive
//! events while a document is being read and decoded.
//!
//! Progress is advisory: it drives UI feedback and never gates correctness.
//! Every event stream produced by one ingestion obeys three rules, enforced
//! by [`ProgressTracker`] rather than by each extraction strategy:
//!
//! 1. `percent` strictly increases from event to event;
//! 2. a successful ingestion ends with exactly one event at `100`;
//! 3. nothing is emitted after that terminal event or after a failure.
//!
//! # Callback or stream
//!
//! Implement the trait directly, or call [`progress_stream`] to get an
//! observer paired with a `Stream` of events that can be forwarded to a
//! websocket or a terminal progress bar.
//!
//! ```rust
//! use resume_lens::progress::{IngestionProgress, IngestionProgressObserver};
//! use std::sync::{Arc, atomic::{AtomicU8, Ordering}};
//!
//! struct LastPercent(AtomicU8);
//!
//! impl IngestionProgressObserver for LastPercent {
//!     fn on_progress(&self, progress: &IngestionProgress) {
//!         self.0.store(progress.percent, Ordering::SeqCst);
//!     }
//! }
//!
//! let observer: Arc<dyn IngestionProgressObserver> = Arc::new(LastPercent(AtomicU8::new(0)));
//! # let _ = observer;
//! ```

use crate::pipeline::source::DocumentId;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// Which step of an ingestion produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    /// Bytes are being read from the source.
    Reading,
    /// Bytes were handed to the external document decoder.
    Decoding,
    /// Text is available. Always carries `percent == 100`.
    Done,
}

/// One progress event for one ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionProgress {
    pub document_id: DocumentId,
    /// 0–100.
    pub percent: u8,
    pub phase: ProgressPhase,
}

/// Receives ingestion progress events.
///
/// Purely observational: no return value and no backpressure. Implementations
/// must be `Send + Sync` since the session may run ingestion on any worker.
pub trait IngestionProgressObserver: Send + Sync {
    fn on_progress(&self, progress: &IngestionProgress);
}

/// Observer used when none is configured.
pub struct NoopProgressObserver;

impl IngestionProgressObserver for NoopProgressObserver {
    fn on_progress(&self, _progress: &IngestionProgress) {}
}

/// Shared observer handle as stored in [`crate::config::SessionConfig`].
pub type ProgressObserver = Arc<dyn IngestionProgressObserver>;

/// A boxed stream of progress events.
pub type ProgressStream = Pin<Box<dyn Stream<Item = IngestionProgress> + Send>>;

/// Observer that forwards every event into an unbounded channel.
pub struct ChannelProgressObserver {
    tx: mpsc::UnboundedSender<IngestionProgress>,
}

impl IngestionProgressObserver for ChannelProgressObserver {
    fn on_progress(&self, progress: &IngestionProgress) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.tx.send(*progress);
    }
}

/// Create an observer and the stream it feeds.
///
/// The stream ends once every clone of the observer has been dropped.
pub fn progress_stream() -> (Arc<ChannelProgressObserver>, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Arc::new(ChannelProgressObserver { tx }),
        Box::pin(UnboundedReceiverStream::new(rx)),
    )
}

/// Per-ingestion guard that enforces the event ordering rules.
///
/// Extraction strategies report whatever they measured; the tracker drops
/// events that would not strictly increase `percent`, and goes silent after
/// [`finish`](Self::finish) or [`fail`](Self::fail).
pub struct ProgressTracker<'a> {
    document_id: DocumentId,
    observer: &'a dyn IngestionProgressObserver,
    last: Option<u8>,
    closed: bool,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(document_id: DocumentId, observer: &'a dyn IngestionProgressObserver) -> Self {
        Self {
            document_id,
            observer,
            last: None,
            closed: false,
        }
    }

    /// Report an intermediate step. Values ≥ 100 are capped at 99 so only
    /// [`finish`](Self::finish) can emit the terminal event.
    pub fn report(&mut self, phase: ProgressPhase, percent: u8) {
        let percent = percent.min(99);
        self.emit(phase, percent);
    }

    /// Report `done` bytes out of `total`, scaled into `floor..=ceil`.
    pub fn report_fraction(
        &mut self,
        phase: ProgressPhase,
        done: u64,
        total: u64,
        floor: u8,
        ceil: u8,
    ) {
        if total == 0 {
            return;
        }
        let span = u64::from(ceil.saturating_sub(floor));
        let scaled = floor as u64 + (done.min(total) * span) / total;
        self.report(phase, scaled as u8);
    }

    /// Emit the terminal `Done` event at 100.
    pub fn finish(&mut self) {
        self.emit(ProgressPhase::Done, 100);
        self.closed = true;
    }

    /// Stop emitting; the ingestion failed.
    pub fn fail(&mut self) {
        self.closed = true;
    }

    /// Highest percent emitted so far.
    pub fn last_percent(&self) -> Option<u8> {
        self.last
    }

    fn emit(&mut self, phase: ProgressPhase, percent: u8) {
        if self.closed || self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        self.observer.on_progress(&IngestionProgress {
            document_id: self.document_id,
            percent,
            phase,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<IngestionProgress>>);

    impl IngestionProgressObserver for Recorder {
        fn on_progress(&self, progress: &IngestionProgress) {
            self.0.lock().unwrap().push(*progress);
        }
    }

    impl Recorder {
        fn percents(&self) -> Vec<u8> {
            self.0.lock().unwrap().iter().map(|p| p.percent).collect()
        }
    }

    #[test]
    fn tracker_drops_non_increasing_reports() {
        let rec = Recorder::default();
        let mut t = ProgressTracker::new(DocumentId::new(), &rec);
        t.report(ProgressPhase::Reading, 10);
        t.report(ProgressPhase::Reading, 10);
        t.report(ProgressPhase::Reading, 5);
        t.report(ProgressPhase::Reading, 40);
        t.finish();
        assert_eq!(rec.percents(), vec![10, 40, 100]);
    }

    #[test]
    fn only_finish_reaches_one_hundred() {
        let rec = Recorder::default();
        let mut t = ProgressTracker::new(DocumentId::new(), &rec);
        t.report(ProgressPhase::Reading, 100);
        assert_eq!(t.last_percent(), Some(99));
        t.finish();
        let events = rec.0.lock().unwrap().clone();
        assert_eq!(events.last().unwrap().percent, 100);
        assert_eq!(events.last().unwrap().phase, ProgressPhase::Done);
    }

    #[test]
    fn nothing_after_finish_or_fail() {
        let rec = Recorder::default();
        let mut t = ProgressTracker::new(DocumentId::new(), &rec);
        t.finish();
        t.finish();
        t.report(ProgressPhase::Decoding, 50);
        assert_eq!(rec.percents(), vec![100]);

        let rec = Recorder::default();
        let mut t = ProgressTracker::new(DocumentId::new(), &rec);
        t.report(ProgressPhase::Reading, 30);
        t.fail();
        t.report(ProgressPhase::Reading, 60);
        t.finish();
        assert_eq!(rec.percents(), vec![30]);
    }

    #[test]
    fn fraction_scales_into_band() {
        let rec = Recorder::default();
        let mut t = ProgressTracker::new(DocumentId::new(), &rec);
        t.report_fraction(ProgressPhase::Reading, 1, 4, 0, 50);
        t.report_fraction(ProgressPhase::Reading, 4, 4, 0, 50);
        t.report_fraction(ProgressPhase::Reading, 0, 0, 0, 50);
        assert_eq!(rec.percents(), vec![12, 50]);
    }

    #[tokio::test]
    async fn stream_receives_forwarded_events() {
        let (observer, mut stream) = progress_stream();
        let id = DocumentId::new();
        {
            let mut t = ProgressTracker::new(id, observer.as_ref());
            t.report(ProgressPhase::Reading, 20);
            t.finish();
        }
        drop(observer);

        let first = stream.next().await.unwrap();
        assert_eq!(first.document_id, id);
        assert_eq!(first.percent, 20);
        assert_eq!(stream.next().await.unwrap().percent, 100);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let mut t = ProgressTracker::new(DocumentId::new(), &NoopProgressObserver);
        t.report(ProgressPhase::Reading, 1);
        t.finish();
    }
}
