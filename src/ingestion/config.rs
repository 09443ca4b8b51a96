//! File input configuration.

use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, ReaderResult};

use super::reader::{CsvReader, ReaderOptions};
use super::source::PathQueue;

/// Configuration for reading one or more CSV files in sequence.
///
/// Files are read in order; once the list is exhausted the reader closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvFileConfig {
    /// File paths or glob patterns, read in order.
    pub paths: Vec<String>,
    /// Delimiter splitting values in each record. Must be a single character.
    pub delimiter: String,
}

impl Default for CsvFileConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            delimiter: ",".to_string(),
        }
    }
}

impl CsvFileConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> ReaderResult<Self> {
        serde_json::from_str(s).map_err(|e| ReaderError::Config {
            message: format!("failed to parse csv file config: {e}"),
        })
    }

    /// Check the configuration and return the delimiter byte.
    ///
    /// # Errors
    ///
    /// [`ReaderError::Config`] if `paths` is empty, or `delimiter` is not exactly one
    /// single-byte character.
    pub fn validate(&self) -> ReaderResult<u8> {
        let mut chars = self.delimiter.chars();
        let delim = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(ReaderError::Config {
                    message: "delimiter value must be exactly one character".to_string(),
                });
            }
        };
        if !delim.is_ascii() {
            return Err(ReaderError::Config {
                message: format!("delimiter '{delim}' must be a single-byte character"),
            });
        }

        if self.paths.is_empty() {
            return Err(ReaderError::Config {
                message: "requires at least one input file path".to_string(),
            });
        }
        Ok(delim as u8)
    }

    /// Validate, expand path patterns and build a reader over the files.
    ///
    /// The delimiter from this config overrides `options.delimiter`.
    pub fn build_reader(&self, options: ReaderOptions) -> ReaderResult<CsvReader> {
        let delimiter = self.validate()?;
        let provider = PathQueue::from_patterns(&self.paths)?;
        Ok(CsvReader::new(provider, options.with_delimiter(delimiter)))
    }
}
