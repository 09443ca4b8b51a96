//! Reader entrypoints and implementations.
//!
//! Most callers should build a [`CsvReader`], either directly over a [`SourceProvider`] or from
//! a [`CsvFileConfig`], which:
//!
//! - opens sources one after another via the provider
//! - parses each source on a background worker ([`csv::RecordParser`])
//! - optionally reports session events, failures and alerts to a [`ReaderObserver`]
//!
//! Building blocks are also available under:
//! - [`csv`]
//! - [`source`]

pub mod config;
pub mod csv;
pub mod observability;
pub mod reader;
pub mod source;

pub use config::CsvFileConfig;
pub use observability::{
    CompositeObserver, ReaderObserver, ReaderSeverity, SessionContext, SessionStats, TracingObserver,
};
pub use reader::{CsvReader, LifecycleState, ReaderOptions};
pub use source::{ByteStream, CloseHandle, InMemorySource, PathQueue, SourceProvider, SourceStream};
