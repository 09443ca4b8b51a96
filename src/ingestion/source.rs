//! Source providers: where the byte streams come from.
//!
//! The reader never tracks which sources remain; it only asks a [`SourceProvider`] for the next
//! one and treats `Ok(None)` as exhaustion.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ReaderError, ReaderResult};

/// Readable resource backing one source.
pub type ByteStream = Box<dyn Read + Send + 'static>;

/// Interrupts a blocked read on a [`SourceStream`].
pub type CloseHandle = Box<dyn FnOnce() + Send + 'static>;

/// A named byte stream handed out by a provider.
pub struct SourceStream {
    /// Label used in logs and observer callbacks (e.g. the file path).
    pub name: String,
    /// The bytes to parse. Dropped (and thereby closed) when its session ends.
    pub reader: ByteStream,
    pub(crate) closer: Option<CloseHandle>,
}

impl SourceStream {
    pub fn new(name: impl Into<String>, reader: impl Read + Send + 'static) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
            closer: None,
        }
    }

    /// Attach a hook run once when the session reading this stream is torn down.
    ///
    /// Streams that can block indefinitely (sockets, pipes) should use it to make a pending
    /// `read` return, so the worker exits and the stream is dropped. Regular files don't need one.
    pub fn with_closer(mut self, closer: impl FnOnce() + Send + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }
}

impl fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStream")
            .field("name", &self.name)
            .field("closer_set", &self.closer.is_some())
            .finish()
    }
}

/// Supplies byte streams to a [`crate::ingestion::CsvReader`], one per `connect`.
#[async_trait]
pub trait SourceProvider: Send + 'static {
    /// Next source, or `Ok(None)` once exhausted.
    ///
    /// Must be safe to call repeatedly; after returning `Ok(None)` it should keep doing so.
    async fn next_source(&mut self, cancel: &CancellationToken) -> ReaderResult<Option<SourceStream>>;

    /// Called whenever a session is torn down. Must be idempotent.
    async fn release(&mut self) {}
}

/// Opens files from an ordered list of paths, one per call.
#[derive(Debug, Clone)]
pub struct PathQueue {
    remaining: VecDeque<PathBuf>,
}

impl PathQueue {
    /// Queue the given paths as-is.
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            remaining: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Queue paths, expanding glob patterns.
    ///
    /// Entries without glob metacharacters are queued verbatim (existence is checked when they
    /// are opened). A pattern that matches nothing is rejected.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> ReaderResult<Self> {
        let mut remaining = VecDeque::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if !is_glob(pattern) {
                remaining.push_back(PathBuf::from(pattern));
                continue;
            }
            let entries = glob::glob(pattern).map_err(|e| ReaderError::Config {
                message: format!("invalid path pattern '{pattern}': {e}"),
            })?;
            let mut matched = entries
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ReaderError::Io(e.into_error()))?;
            if matched.is_empty() {
                return Err(ReaderError::Config {
                    message: format!("path pattern '{pattern}' matched no files"),
                });
            }
            matched.sort();
            remaining.extend(matched);
        }
        Ok(Self { remaining })
    }

    /// Paths not yet handed out.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

#[async_trait]
impl SourceProvider for PathQueue {
    async fn next_source(&mut self, _cancel: &CancellationToken) -> ReaderResult<Option<SourceStream>> {
        let Some(path) = self.remaining.pop_front() else {
            return Ok(None);
        };
        debug!(path = %path.display(), "opening source file");
        let file = File::open(&path)?;
        Ok(Some(SourceStream::new(path.display().to_string(), file)))
    }
}

/// Serves in-memory buffers in order.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    remaining: VecDeque<(String, Vec<u8>)>,
}

impl InMemorySource {
    /// Sources are named `memory-0`, `memory-1`, ... in order.
    pub fn new(sources: impl IntoIterator<Item = impl Into<Vec<u8>>>) -> Self {
        let remaining = sources
            .into_iter()
            .enumerate()
            .map(|(i, bytes)| (format!("memory-{i}"), bytes.into()))
            .collect();
        Self { remaining }
    }

    /// Append a named buffer.
    pub fn push(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.remaining.push_back((name.into(), bytes.into()));
    }
}

#[async_trait]
impl SourceProvider for InMemorySource {
    async fn next_source(&mut self, _cancel: &CancellationToken) -> ReaderResult<Option<SourceStream>> {
        Ok(self
            .remaining
            .pop_front()
            .map(|(name, bytes)| SourceStream::new(name, Cursor::new(bytes))))
    }
}
