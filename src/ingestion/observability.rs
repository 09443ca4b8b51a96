use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::ReaderError;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReaderSeverity {
    /// Informational event (e.g. a read timed out).
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// A record or source could not be processed.
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

impl ReaderSeverity {
    /// Classify an error.
    pub fn for_error(e: &ReaderError) -> Self {
        match e {
            ReaderError::Closed | ReaderError::NotConnected | ReaderError::Timeout => Self::Info,
            ReaderError::Io(_) => Self::Critical,
            ReaderError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            ReaderError::Provider(_) => Self::Warning,
            ReaderError::Parse { .. } | ReaderError::Encode(_) | ReaderError::Config { .. } => Self::Error,
        }
    }
}

/// Context about the session an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Monotonic session number, starting at 1 for the first successful connect.
    pub session_id: u64,
    /// Name of the source being read.
    pub source: String,
}

/// Counts reported when a session's worker stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    /// Records handed to the delivery lanes.
    pub records: u64,
    /// Errors handed to the error lane.
    pub errors: u64,
    /// `true` if the source was read to its end (as opposed to cancelled).
    pub exhausted: bool,
}

/// Observer interface for reader events.
///
/// Implementors can record metrics, logs, or trigger alerts. Callbacks for record failures run
/// on the parse worker thread.
pub trait ReaderObserver: Send + Sync {
    /// Called after a session's worker has been started.
    fn on_session_started(&self, _ctx: &SessionContext) {}

    /// Called when a session's worker stops.
    fn on_session_finished(&self, _ctx: &SessionContext, _stats: SessionStats) {}

    /// Called for every error surfaced on the error lane.
    fn on_failure(&self, _ctx: &SessionContext, _severity: ReaderSeverity, _error: &ReaderError) {}

    /// Called when a failure meets the alert threshold, right after [`Self::on_failure`] for
    /// the same error.
    ///
    /// Default behavior forwards to [`Self::on_failure`], so an observer that only implements
    /// `on_failure` sees every alert-level error twice. Override this to tell them apart.
    fn on_alert(&self, ctx: &SessionContext, severity: ReaderSeverity, error: &ReaderError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ReaderObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn ReaderObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ReaderObserver for CompositeObserver {
    fn on_session_started(&self, ctx: &SessionContext) {
        for o in &self.observers {
            o.on_session_started(ctx);
        }
    }

    fn on_session_finished(&self, ctx: &SessionContext, stats: SessionStats) {
        for o in &self.observers {
            o.on_session_finished(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &SessionContext, severity: ReaderSeverity, error: &ReaderError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &SessionContext, severity: ReaderSeverity, error: &ReaderError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits reader events as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ReaderObserver for TracingObserver {
    fn on_session_started(&self, ctx: &SessionContext) {
        info!(session = ctx.session_id, source = %ctx.source, "csv session started");
    }

    fn on_session_finished(&self, ctx: &SessionContext, stats: SessionStats) {
        info!(
            session = ctx.session_id,
            source = %ctx.source,
            records = stats.records,
            errors = stats.errors,
            exhausted = stats.exhausted,
            "csv session finished"
        );
    }

    fn on_failure(&self, ctx: &SessionContext, severity: ReaderSeverity, error: &ReaderError) {
        warn!(
            session = ctx.session_id,
            source = %ctx.source,
            ?severity,
            %error,
            "csv record failed"
        );
    }

    fn on_alert(&self, ctx: &SessionContext, severity: ReaderSeverity, error: &ReaderError) {
        error!(
            session = ctx.session_id,
            source = %ctx.source,
            ?severity,
            %error,
            "csv reader alert"
        );
    }
}
