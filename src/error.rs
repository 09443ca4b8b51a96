use std::error::Error as StdError;

use thiserror::Error;

/// Convenience result type for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Error type returned by the record source.
///
/// A single enum shared by the source providers, the parse worker and the
/// lifecycle controller. Per-record failures travel on the error lane as values of this type.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// The provider has no more sources, or the reader was closed.
    #[error("reader closed: no more sources")]
    Closed,

    /// The current session ended without an error; call `connect` again.
    #[error("not connected")]
    NotConnected,

    /// The caller's cancellation fired before a record or error arrived.
    #[error("read timed out")]
    Timeout,

    /// Failure reported by a [`crate::ingestion::SourceProvider`].
    #[error("source provider error: {0}")]
    Provider(Box<dyn StdError + Send + Sync + 'static>),

    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader error, including strict-mode field count mismatches.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A record could not be decoded under strict mode.
    #[error("failed to parse record at line {line}: {message}")]
    Parse { line: u64, message: String },

    /// A structured record could not be encoded as JSON.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Configuration rejected before the reader was built.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl ReaderError {
    /// Wrap an arbitrary provider failure.
    pub fn provider(err: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self::Provider(err.into())
    }

    /// Returns `true` when no further sources can be read.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
