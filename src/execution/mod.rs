//! Parse workers and the sessions that own them.
//!
//! A [`ParserSession`] binds one source to one blocking worker:
//!
//! - the worker runs a [`RecordParser`] on a `spawn_blocking` thread
//! - records and errors are offered on a pair of delivery lanes
//! - the session's cancellation token stops the worker and ends pending reads
//!
//! Counters for all sessions of a reader live in [`ReaderMetrics`].

mod lanes;
mod metrics;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::ReaderError;
use crate::ingestion::csv::{ParserConfig, RecordParser};
use crate::ingestion::observability::{ReaderObserver, ReaderSeverity, SessionContext, SessionStats};
use crate::ingestion::source::{ByteStream, CloseHandle, SourceStream};
use crate::types::{Message, Part};

pub(crate) use lanes::Delivery;
pub use metrics::{ReaderMetrics, ReaderMetricsSnapshot};

use lanes::{lanes, LaneReceiver, LaneSender};

/// Everything a worker needs besides its source. Fixed for the lifetime of a reader.
#[derive(Clone)]
pub(crate) struct WorkerSettings {
    pub(crate) parser: ParserConfig,
    pub(crate) observer: Option<Arc<dyn ReaderObserver>>,
    pub(crate) alert_at_or_above: ReaderSeverity,
    pub(crate) metrics: Arc<ReaderMetrics>,
}

/// A live source: the consumer end of its lanes plus the handle to stop its worker.
pub(crate) struct ParserSession {
    ctx: SessionContext,
    lanes: LaneReceiver,
    cancel: CancellationToken,
    closer: Option<CloseHandle>,
    finished: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl ParserSession {
    /// Start a worker over `source`.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(session_id: u64, source: SourceStream, settings: &WorkerSettings) -> Self {
        let SourceStream { name, reader, closer } = source;
        let ctx = SessionContext { session_id, source: name };
        let cancel = CancellationToken::new();
        let (tx, rx) = lanes(cancel.clone());
        let finished = Arc::new(AtomicBool::new(false));

        let worker = ParseWorker {
            ctx: ctx.clone(),
            parser: RecordParser::new(reader, settings.parser),
            lanes: tx,
            cancel: cancel.clone(),
            finished: Arc::clone(&finished),
            settings: settings.clone(),
        };
        let rt = Handle::current();
        let worker = tokio::task::spawn_blocking(move || worker.run(&rt));

        settings.metrics.on_session_started();
        if let Some(obs) = &settings.observer {
            obs.on_session_started(&ctx);
        }

        Self {
            ctx,
            lanes: rx,
            cancel,
            closer,
            finished,
            worker,
        }
    }

    pub(crate) fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub(crate) fn lanes(&self) -> LaneReceiver {
        self.lanes.clone()
    }

    /// `true` once the worker has stopped.
    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Stop the worker, end pending reads and run the stream's close hook.
    ///
    /// Does not wait for the worker thread.
    pub(crate) fn shutdown(self) {
        debug!(session = self.ctx.session_id, source = %self.ctx.source, "tearing down csv session");
        self.cancel.cancel();
        // Unblock a pending read; the worker then drops the stream on its way out.
        if let Some(close) = self.closer {
            close();
        }
        drop(self.worker);
    }
}

struct ParseWorker {
    ctx: SessionContext,
    parser: RecordParser<ByteStream>,
    lanes: LaneSender,
    cancel: CancellationToken,
    finished: Arc<AtomicBool>,
    settings: WorkerSettings,
}

impl ParseWorker {
    fn run(mut self, rt: &Handle) {
        trace!(session = self.ctx.session_id, source = %self.ctx.source, "parse worker started");

        let mut stats = SessionStats::default();
        let mut cancelled = false;

        loop {
            // Reserve room before parsing so the worker never runs ahead of the consumer.
            let Some(permits) = rt.block_on(self.lanes.ready()) else {
                cancelled = true;
                break;
            };
            let Some(item) = self.parser.next() else {
                break;
            };
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let item = item.and_then(|rec| Part::from_structured(rec).map(Message::single));
            match &item {
                Ok(_) => {
                    self.settings.metrics.on_record_parsed();
                    stats.records += 1;
                }
                Err(e) => {
                    self.settings.metrics.on_record_error();
                    self.report(e);
                    stats.errors += 1;
                }
            }
            permits.send(item);
        }

        stats.exhausted = !cancelled;
        if stats.exhausted {
            self.settings.metrics.on_source_exhausted();
        }
        self.finished.store(true, Ordering::SeqCst);
        if let Some(obs) = &self.settings.observer {
            obs.on_session_finished(&self.ctx, stats);
        }
        trace!(
            session = self.ctx.session_id,
            records = stats.records,
            errors = stats.errors,
            cancelled,
            "parse worker stopped"
        );
        // Dropping `self.lanes` here closes both lanes for any waiting consumer.
    }

    fn report(&self, e: &ReaderError) {
        let Some(obs) = &self.settings.observer else {
            return;
        };
        let sev = ReaderSeverity::for_error(e);
        obs.on_failure(&self.ctx, sev, e);
        if sev >= self.settings.alert_at_or_above {
            obs.on_alert(&self.ctx, sev, e);
        }
    }
}
