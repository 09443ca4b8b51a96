use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Real-time counters for a reader.
///
/// The worker and the reader update these as records flow; callers can snapshot them at any
/// time.
#[derive(Debug, Default)]
pub struct ReaderMetrics {
    sessions_started: AtomicU64,
    sources_exhausted: AtomicU64,
    records_parsed: AtomicU64,
    records_delivered: AtomicU64,
    record_errors: AtomicU64,
    timeouts: AtomicU64,
}

impl ReaderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_session_started(&self) {
        let _ = self.sessions_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_source_exhausted(&self) {
        let _ = self.sources_exhausted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_record_parsed(&self) {
        let _ = self.records_parsed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_record_delivered(&self) {
        let _ = self.records_delivered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_record_error(&self) {
        let _ = self.record_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_timeout(&self) {
        let _ = self.timeouts.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ReaderMetricsSnapshot {
        ReaderMetricsSnapshot {
            sessions_started: self.sessions_started.load(Ordering::SeqCst),
            sources_exhausted: self.sources_exhausted.load(Ordering::SeqCst),
            records_parsed: self.records_parsed.load(Ordering::SeqCst),
            records_delivered: self.records_delivered.load(Ordering::SeqCst),
            record_errors: self.record_errors.load(Ordering::SeqCst),
            timeouts: self.timeouts.load(Ordering::SeqCst),
        }
    }
}

/// Immutable snapshot of [`ReaderMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReaderMetricsSnapshot {
    pub sessions_started: u64,
    pub sources_exhausted: u64,
    /// Records produced by parse workers, including any lost to session teardown.
    pub records_parsed: u64,
    pub records_delivered: u64,
    pub record_errors: u64,
    pub timeouts: u64,
}

impl fmt::Display for ReaderMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sessions={}, exhausted={}, records={}/{}, errors={}, timeouts={}",
            self.sessions_started,
            self.sources_exhausted,
            self.records_delivered,
            self.records_parsed,
            self.record_errors,
            self.timeouts
        )
    }
}
