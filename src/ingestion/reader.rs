//! The lifecycle controller: connect, read, close.
//!
//! [`CsvReader`] pulls byte streams from a [`SourceProvider`], runs one parse worker per stream
//! and hands structured records to callers of [`CsvReader::read`].
//!
//! - `connect` replaces the current session with one over the provider's next source.
//! - `read` returns the next record, a per-record error, `NotConnected` when the session has
//!   ended, or `Timeout` when the caller's token fires first.
//! - `close_async` tears everything down in the background; repeated calls are no-ops.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ReaderError, ReaderResult};
use crate::execution::{Delivery, ParserSession, ReaderMetrics, WorkerSettings};
use crate::types::{noop_ack, AckFn, Message};

use super::csv::ParserConfig;
use super::observability::{ReaderObserver, ReaderSeverity};
use super::source::SourceProvider;

/// Options controlling parsing and observability.
///
/// Use [`Default`] for common cases: comma delimiter, header row expected, lenient field counts.
#[derive(Clone)]
pub struct ReaderOptions {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Treat the first record of each source as column names.
    pub expect_headers: bool,
    /// Report ragged or undecodable records as errors instead of tolerating them.
    pub strict: bool,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn ReaderObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: ReaderSeverity,
}

impl ReaderOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_headers(mut self, expect_headers: bool) -> Self {
        self.expect_headers = expect_headers;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ReaderObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The parsing subset of these options.
    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            delimiter: self.delimiter,
            expect_headers: self.expect_headers,
            strict: self.strict,
        }
    }
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("delimiter", &(self.delimiter as char))
            .field("expect_headers", &self.expect_headers)
            .field("strict", &self.strict)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        let parser = ParserConfig::default();
        Self {
            delimiter: parser.delimiter,
            expect_headers: parser.expect_headers,
            strict: parser.strict,
            observer: None,
            alert_at_or_above: ReaderSeverity::Critical,
        }
    }
}

/// Where a [`CsvReader`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No session yet, or the last `connect` failed.
    Disconnected,
    /// Waiting on the provider for the next source.
    Connecting,
    /// A session is live and its worker is producing records.
    Streaming,
    /// The live session's source has been read to the end; `connect` moves to the next one.
    Exhausted,
    /// Teardown in progress.
    Closing,
    /// The provider ran out of sources, or the reader was closed.
    Closed,
}

struct Inner {
    provider: Box<dyn SourceProvider>,
    session: Option<ParserSession>,
    state: LifecycleState,
    sessions: u64,
    /// Set by the first close; later closes do nothing.
    closed: bool,
}

impl Inner {
    /// Tear down the live session, if any. Returns whether one existed.
    fn end_session(&mut self) -> bool {
        match self.session.take() {
            Some(session) => {
                session.shutdown();
                true
            }
            None => false,
        }
    }
}

/// Reads structured records from a sequence of CSV sources.
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Clone)]
pub struct CsvReader {
    inner: Arc<Mutex<Inner>>,
    settings: WorkerSettings,
}

impl fmt::Debug for CsvReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvReader")
            .field("parser", &self.settings.parser)
            .field("metrics", &self.settings.metrics.snapshot())
            .finish()
    }
}

impl CsvReader {
    /// Create a disconnected reader. Call [`Self::connect`] before reading.
    pub fn new(provider: impl SourceProvider, options: ReaderOptions) -> Self {
        let settings = WorkerSettings {
            parser: options.parser_config(),
            observer: options.observer,
            alert_at_or_above: options.alert_at_or_above,
            metrics: Arc::new(ReaderMetrics::new()),
        };
        Self {
            inner: Arc::new(Mutex::new(Inner {
                provider: Box::new(provider),
                session: None,
                state: LifecycleState::Disconnected,
                sessions: 0,
                closed: false,
            })),
            settings,
        }
    }

    /// Open the provider's next source, replacing any live session.
    ///
    /// # Errors
    ///
    /// - [`ReaderError::Closed`] once the provider is exhausted or the reader was closed. No
    ///   worker is started.
    /// - Any error from the provider, unchanged. The caller decides whether to retry.
    pub async fn connect(&self, cancel: &CancellationToken) -> ReaderResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.closed || inner.state == LifecycleState::Closed {
            return Err(ReaderError::Closed);
        }

        if inner.end_session() {
            inner.provider.release().await;
        }
        inner.state = LifecycleState::Connecting;

        let source = match inner.provider.next_source(cancel).await {
            Ok(Some(source)) => source,
            Ok(None) => {
                debug!("source provider exhausted");
                inner.state = LifecycleState::Closed;
                return Err(ReaderError::Closed);
            }
            Err(e) => {
                warn!(error = %e, "source provider failed");
                inner.state = LifecycleState::Disconnected;
                return Err(e);
            }
        };

        inner.sessions += 1;
        let session = ParserSession::spawn(inner.sessions, source, &self.settings);
        debug!(
            session = session.context().session_id,
            source = %session.context().source,
            "csv session connected"
        );
        inner.session = Some(session);
        inner.state = LifecycleState::Streaming;
        Ok(())
    }

    /// Wait for the next record.
    ///
    /// Returns the record with an acknowledgment callback that always succeeds.
    ///
    /// # Errors
    ///
    /// - A per-record error from the worker (e.g. a strict-mode field count mismatch). The
    ///   session stays live.
    /// - [`ReaderError::NotConnected`] if no session is live or it has ended; call
    ///   [`Self::connect`].
    /// - [`ReaderError::Timeout`] if `cancel` fired before anything arrived. The session stays
    ///   live.
    pub async fn read(&self, cancel: &CancellationToken) -> ReaderResult<(Message, AckFn)> {
        let lanes = {
            let inner = self.inner.lock().await;
            match &inner.session {
                Some(session) => session.lanes(),
                None => return Err(ReaderError::NotConnected),
            }
        };

        match lanes.recv(cancel).await {
            Delivery::Message(msg) => {
                self.settings.metrics.on_record_delivered();
                Ok((msg, noop_ack()))
            }
            Delivery::Error(e) => Err(e),
            Delivery::Closed => Err(ReaderError::NotConnected),
            Delivery::Cancelled => {
                self.settings.metrics.on_timeout();
                Err(ReaderError::Timeout)
            }
        }
    }

    /// Begin shutting down without waiting.
    ///
    /// The provider's release hook runs once, on the first call; later calls do nothing.
    /// Called outside a tokio runtime, the close runs to completion before returning.
    pub fn close_async(&self) {
        let inner = Arc::clone(&self.inner);
        match Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    let mut inner = inner.lock().await;
                    close_inner(&mut inner).await;
                });
            }
            Err(_) => {
                // No ambient runtime: finish the close on this thread.
                match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt.block_on(async move {
                        let mut inner = inner.lock().await;
                        close_inner(&mut inner).await;
                    }),
                    Err(e) => {
                        warn!(error = %e, "no runtime for close_async; skipping provider release");
                        let mut inner = inner.blocking_lock();
                        if !inner.closed {
                            inner.closed = true;
                            inner.end_session();
                            inner.state = LifecycleState::Closed;
                        }
                    }
                }
            }
        }
    }

    /// Wait for shutdown to complete.
    ///
    /// Shutdown has no drain phase, so this returns immediately.
    pub async fn wait_closed(&self, _timeout: Duration) -> ReaderResult<()> {
        Ok(())
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> LifecycleState {
        let inner = self.inner.lock().await;
        match (&inner.session, inner.state) {
            (Some(session), LifecycleState::Streaming) if session.is_finished() => LifecycleState::Exhausted,
            (_, state) => state,
        }
    }

    /// Shared counters for all sessions of this reader.
    pub fn metrics(&self) -> Arc<ReaderMetrics> {
        Arc::clone(&self.settings.metrics)
    }
}

async fn close_inner(inner: &mut Inner) {
    if inner.closed {
        return;
    }
    inner.closed = true;
    inner.state = LifecycleState::Closing;
    inner.provider.release().await;
    inner.end_session();
    inner.state = LifecycleState::Closed;
    debug!("csv reader closed");
}
