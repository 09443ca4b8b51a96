use std::sync::{Arc, Mutex};

use csv_record_source::ingestion::{
    CompositeObserver, CsvReader, InMemorySource, ReaderObserver, ReaderOptions, ReaderSeverity,
    SessionContext, SessionStats,
};
use csv_record_source::ReaderError;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingObserver {
    started: Mutex<Vec<SessionContext>>,
    finished: Mutex<Vec<SessionStats>>,
    failures: Mutex<Vec<ReaderSeverity>>,
    alerts: Mutex<Vec<ReaderSeverity>>,
}

impl ReaderObserver for RecordingObserver {
    fn on_session_started(&self, ctx: &SessionContext) {
        self.started.lock().unwrap().push(ctx.clone());
    }

    fn on_session_finished(&self, _ctx: &SessionContext, stats: SessionStats) {
        self.finished.lock().unwrap().push(stats);
    }

    fn on_failure(&self, _ctx: &SessionContext, severity: ReaderSeverity, _error: &ReaderError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &SessionContext, severity: ReaderSeverity, _error: &ReaderError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

async fn read_all(reader: &CsvReader) {
    let cancel = CancellationToken::new();
    while reader.connect(&cancel).await.is_ok() {
        while !matches!(reader.read(&cancel).await, Err(ReaderError::NotConnected)) {}
    }
}

#[tokio::test]
async fn observer_sees_sessions_and_failures_without_alert_below_threshold() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = ReaderOptions::default()
        .with_strict(true)
        .with_observer(obs.clone());
    let reader = CsvReader::new(InMemorySource::new(vec!["a,b\n1\n2,3\n", "a\nx\n"]), opts);

    read_all(&reader).await;

    let started = obs.started.lock().unwrap().clone();
    assert_eq!(
        started.iter().map(|c| (c.session_id, c.source.as_str())).collect::<Vec<_>>(),
        vec![(1, "memory-0"), (2, "memory-1")]
    );
    assert_eq!(
        obs.finished.lock().unwrap().clone(),
        vec![
            SessionStats {
                records: 1,
                errors: 1,
                exhausted: true
            },
            SessionStats {
                records: 1,
                errors: 0,
                exhausted: true
            },
        ]
    );
    assert_eq!(obs.failures.lock().unwrap().clone(), vec![ReaderSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn observer_alerts_at_or_above_threshold() {
    let obs = Arc::new(RecordingObserver::default());
    let opts = ReaderOptions {
        strict: true,
        observer: Some(obs.clone()),
        alert_at_or_above: ReaderSeverity::Error,
        ..Default::default()
    };
    let reader = CsvReader::new(InMemorySource::new(vec![&b"a,b\n\xff,1\n"[..]]), opts);

    read_all(&reader).await;

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![ReaderSeverity::Error]);
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![ReaderSeverity::Error]);
}

#[tokio::test]
async fn composite_observer_fans_out() {
    let a = Arc::new(RecordingObserver::default());
    let b = Arc::new(RecordingObserver::default());
    let composite = CompositeObserver::new(vec![a.clone() as Arc<dyn ReaderObserver>, b.clone()]);
    let opts = ReaderOptions::default().with_observer(Arc::new(composite));
    let reader = CsvReader::new(InMemorySource::new(vec!["a\n1\n"]), opts);

    read_all(&reader).await;

    assert_eq!(a.started.lock().unwrap().len(), 1);
    assert_eq!(b.started.lock().unwrap().len(), 1);
    assert_eq!(a.finished.lock().unwrap().len(), 1);
    assert_eq!(b.finished.lock().unwrap().len(), 1);
}

#[test]
fn severity_classification() {
    assert_eq!(ReaderSeverity::for_error(&ReaderError::Timeout), ReaderSeverity::Info);
    assert_eq!(ReaderSeverity::for_error(&ReaderError::provider("x")), ReaderSeverity::Warning);
    assert_eq!(
        ReaderSeverity::for_error(&ReaderError::Io(std::io::Error::other("disk"))),
        ReaderSeverity::Critical
    );
    assert_eq!(
        ReaderSeverity::for_error(&ReaderError::Parse {
            line: 3,
            message: "bad".to_string()
        }),
        ReaderSeverity::Error
    );
    assert!(ReaderSeverity::Critical > ReaderSeverity::Error);
}

#[derive(Default)]
struct FailureCounter {
    calls: Mutex<usize>,
}

impl ReaderObserver for FailureCounter {
    fn on_failure(&self, _ctx: &SessionContext, _severity: ReaderSeverity, _error: &ReaderError) {
        *self.calls.lock().unwrap() += 1;
    }
}

#[tokio::test]
async fn default_on_alert_forwards_to_on_failure() {
    let obs = Arc::new(FailureCounter::default());
    let opts = ReaderOptions {
        strict: true,
        observer: Some(obs.clone()),
        alert_at_or_above: ReaderSeverity::Error,
        ..Default::default()
    };
    let reader = CsvReader::new(InMemorySource::new(vec!["a,b\n1\n"]), opts);

    read_all(&reader).await;

    // One failure callback plus the forwarded alert.
    assert_eq!(*obs.calls.lock().unwrap(), 2);
}
