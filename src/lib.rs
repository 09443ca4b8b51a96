//! `csv-record-source` turns a sequence of byte streams (usually CSV files) into a cancellable,
//! backpressure-aware stream of structured records.
//!
//! The primary entrypoint is [`ingestion::CsvReader`], which asks a
//! [`ingestion::SourceProvider`] for one source at a time and parses it on a background worker.
//!
//! ## Record shapes
//!
//! Every row is delivered as a single-part [`types::Message`] whose part holds a
//! [`types::StructuredRecord`]:
//!
//! - **Mapped** (`{"name":"alice","age":"30"}`) when a header row was captured and it has at
//!   least as many names as the row has fields
//! - **Positional** (`["alice","30"]`) when headers are disabled, or the row is wider than the
//!   header
//!
//! The shape is decided per row, so one source can yield both.
//!
//! ## Lifecycle
//!
//! - [`ingestion::CsvReader::connect`] opens the next source (replacing the current one).
//!   [`ReaderError::Closed`] means there are no more sources.
//! - [`ingestion::CsvReader::read`] waits for the next record. [`ReaderError::NotConnected`]
//!   means the current source is finished and `connect` should be called again;
//!   [`ReaderError::Timeout`] means the caller's token fired first.
//! - [`ingestion::CsvReader::close_async`] shuts down in the background.
//!
//! ## Quick example: read every record from in-memory sources
//!
//! ```rust
//! use csv_record_source::ingestion::{CsvReader, InMemorySource, ReaderOptions};
//! use csv_record_source::ReaderError;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ReaderError> {
//! let provider = InMemorySource::new(vec!["name,age\nalice,30\n", "name,age\nbob,41\n"]);
//! let reader = CsvReader::new(provider, ReaderOptions::default());
//! let cancel = CancellationToken::new();
//!
//! let mut names = Vec::new();
//! loop {
//!     match reader.connect(&cancel).await {
//!         Ok(()) => {}
//!         Err(ReaderError::Closed) => break,
//!         Err(e) => return Err(e),
//!     }
//!     loop {
//!         match reader.read(&cancel).await {
//!             Ok((msg, _ack)) => {
//!                 let part = msg.get(0).unwrap();
//!                 names.push(part.structured().get("name").unwrap().to_string());
//!             }
//!             Err(ReaderError::NotConnected) => break,
//!             Err(e) => return Err(e),
//!         }
//!     }
//! }
//! assert_eq!(names, vec!["alice", "bob"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Reading files from configuration
//!
//! ```no_run
//! use csv_record_source::ingestion::{CsvFileConfig, ReaderOptions};
//!
//! # fn main() -> Result<(), csv_record_source::ReaderError> {
//! let conf = CsvFileConfig::from_json_str(r#"{"paths": ["data/*.csv"], "delimiter": ";"}"#)?;
//! let reader = conf.build_reader(ReaderOptions::default().with_strict(true))?;
//! # let _ = reader;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: reader, source providers, parser, configuration and observability
//! - [`execution`]: parse workers and reader metrics
//! - [`types`]: records, messages and acknowledgments
//! - [`error`]: error types used across the crate

pub mod error;
pub mod execution;
pub mod ingestion;
pub mod types;

pub use error::{ReaderError, ReaderResult};
