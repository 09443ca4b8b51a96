//! CSV record parsing.
//!
//! [`RecordParser`] reads delimited records from any [`std::io::Read`] and yields
//! [`StructuredRecord`]s, applying header capture and the strict/lenient field policy.

use std::io::{self, Read};

use csv::ByteRecord;

use crate::error::{ReaderError, ReaderResult};
use crate::types::{HeaderSet, StructuredRecord};

/// Parsing policy for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Field delimiter byte.
    pub delimiter: u8,
    /// Treat the first record of each source as column names.
    pub expect_headers: bool,
    /// Reject records whose field count differs from the first record, malformed quoting and
    /// non-UTF-8 fields.
    pub strict: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            expect_headers: true,
            strict: false,
        }
    }
}

/// Iterator over the structured records of a single byte stream.
///
/// Rules:
///
/// - With `expect_headers`, the first record read becomes the [`HeaderSet`] and is not yielded.
/// - Strict mode yields an error for a ragged, badly quoted or undecodable record and carries on
///   with the next.
/// - Lenient mode accepts ragged records and stray quotes and decodes invalid UTF-8 lossily; only
///   a failure that leaves the record empty is yielded as an error.
/// - An I/O error is yielded once and ends iteration.
pub struct RecordParser<R> {
    rdr: csv::Reader<RawCapture<R>>,
    record: ByteRecord,
    config: ParserConfig,
    headers: Option<HeaderSet>,
    done: bool,
}

impl<R: Read> RecordParser<R> {
    /// Build a parser over `reader`.
    pub fn new(reader: R, config: ParserConfig) -> Self {
        let capture = RawCapture {
            inner: reader,
            enabled: config.strict,
            bytes: Vec::new(),
            base: 0,
        };
        let rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(config.delimiter)
            .flexible(!config.strict)
            .from_reader(capture);
        Self {
            rdr,
            record: ByteRecord::new(),
            config,
            headers: None,
            done: false,
        }
    }

    /// Headers captured so far, if any.
    pub fn headers(&self) -> Option<&HeaderSet> {
        self.headers.as_ref()
    }

    fn line(&self) -> u64 {
        self.record.position().map(|p| p.line()).unwrap_or(0)
    }

    fn decode_fields(&self) -> ReaderResult<Vec<String>> {
        if !self.config.strict {
            return Ok(self
                .record
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect());
        }
        self.record
            .iter()
            .enumerate()
            .map(|(idx, f)| {
                std::str::from_utf8(f)
                    .map(str::to_owned)
                    .map_err(|e| ReaderError::Parse {
                        line: self.line(),
                        message: format!("field {idx} is not valid UTF-8: {e}"),
                    })
            })
            .collect()
    }

    /// Check the raw bytes of the record just read for quoting errors, then forget them.
    fn check_quoting(&mut self) -> ReaderResult<()> {
        let line = self.line();
        let start = self.record.position().map_or(0, |p| p.byte());
        let end = self.rdr.position().byte();
        let delimiter = self.config.delimiter;

        let capture = self.rdr.get_mut();
        let violation = capture
            .slice(start, end)
            .and_then(|raw| quote_violation(raw, delimiter));
        capture.discard_until(end);

        match violation {
            Some(message) => Err(ReaderError::Parse { line, message }),
            None => Ok(()),
        }
    }

    fn read_fields(&mut self) -> Option<ReaderResult<Vec<String>>> {
        match self.rdr.read_byte_record(&mut self.record) {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                if self.config.strict {
                    if let Err(e) = self.check_quoting() {
                        return Some(Err(e));
                    }
                }
                Some(self.decode_fields())
            }
            Err(err) if err.is_io_error() => {
                self.done = true;
                Some(Err(err.into()))
            }
            Err(err) if self.config.strict || self.record.is_empty() => {
                let end = self.rdr.position().byte();
                self.rdr.get_mut().discard_until(end);
                Some(Err(err.into()))
            }
            // Lenient: keep whatever the reader recovered.
            Err(_) => Some(self.decode_fields()),
        }
    }
}

impl<R: Read> Iterator for RecordParser<R> {
    type Item = ReaderResult<StructuredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            let fields = match self.read_fields()? {
                Ok(fields) => fields,
                Err(e) => return Some(Err(e)),
            };

            if self.config.expect_headers && self.headers.is_none() {
                self.headers = Some(HeaderSet::new(fields));
                continue;
            }

            let structured = match &self.headers {
                Some(h) => h.structure(fields),
                None => StructuredRecord::Positional(fields),
            };
            return Some(Ok(structured));
        }
    }
}

/// Keeps the bytes the csv reader has pulled but not yet finished with, so strict mode can look
/// at a record as it appeared in the stream. `base` is the stream offset of `bytes[0]`.
struct RawCapture<R> {
    inner: R,
    enabled: bool,
    bytes: Vec<u8>,
    base: u64,
}

impl<R> RawCapture<R> {
    fn slice(&self, start: u64, end: u64) -> Option<&[u8]> {
        let from = usize::try_from(start.checked_sub(self.base)?).ok()?;
        let to = usize::try_from(end.checked_sub(self.base)?).ok()?;
        self.bytes.get(from..to)
    }

    fn discard_until(&mut self, end: u64) {
        let n = end.saturating_sub(self.base).min(self.bytes.len() as u64);
        self.bytes.drain(..n as usize);
        self.base += n;
    }
}

impl<R: Read> Read for RawCapture<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if self.enabled {
            self.bytes.extend_from_slice(&buf[..n]);
        }
        Ok(n)
    }
}

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Find the first quoting error in one raw record.
///
/// Quotes are only allowed around a whole field, with `""` as an escaped quote inside. A quote
/// in an unquoted field, anything but a delimiter after a closing quote, or a quote that is
/// never closed is an error.
fn quote_violation(raw: &[u8], delimiter: u8) -> Option<String> {
    let raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
    let is_term = |b: &u8| *b == b'\r' || *b == b'\n';
    let first = raw.iter().position(|b| !is_term(b))?;
    let last = raw.iter().rposition(|b| !is_term(b))?;
    let raw = &raw[first..=last];

    let mut i = 0;
    let mut field = 0;
    loop {
        if raw.get(i) == Some(&b'"') {
            i += 1;
            loop {
                let Some(p) = raw[i..].iter().position(|&b| b == b'"') else {
                    return Some(format!("field {field}: quoted field is never closed"));
                };
                i += p + 1;
                if raw.get(i) == Some(&b'"') {
                    i += 1;
                    continue;
                }
                break;
            }
            match raw.get(i) {
                None => return None,
                Some(&b) if b == delimiter => {}
                Some(_) => return Some(format!("field {field}: extraneous data after closing quote")),
            }
        } else {
            let end = raw[i..].iter().position(|&b| b == delimiter).map_or(raw.len(), |p| i + p);
            if raw[i..end].contains(&b'"') {
                return Some(format!("field {field}: bare quote in unquoted field"));
            }
            if end == raw.len() {
                return None;
            }
            i = end;
        }
        // Step over the delimiter.
        i += 1;
        field += 1;
    }
}
