use std::io::{self, Read};

use csv_record_source::ingestion::csv::{ParserConfig, RecordParser};
use csv_record_source::types::StructuredRecord;
use csv_record_source::ReaderError;
use serde_json::json;

fn parse(input: &[u8], config: ParserConfig) -> Vec<Result<StructuredRecord, ReaderError>> {
    RecordParser::new(input, config).collect()
}

fn strict() -> ParserConfig {
    ParserConfig {
        strict: true,
        ..Default::default()
    }
}

#[test]
fn header_row_maps_records_in_header_order() {
    let rows = parse(b"name,age\nalice,30\nbob,41\n", ParserConfig::default());

    assert_eq!(rows.len(), 2);
    let first = rows[0].as_ref().unwrap();
    assert!(first.is_mapped());
    assert_eq!(first.to_json_value(), json!({"name": "alice", "age": "30"}));
    assert_eq!(
        serde_json::to_string(first).unwrap(),
        r#"{"name":"alice","age":"30"}"#
    );
    assert_eq!(rows[1].as_ref().unwrap().get("name"), Some("bob"));
}

#[test]
fn headers_are_captured_but_not_yielded() {
    let mut parser = RecordParser::new(&b"a,b\n"[..], ParserConfig::default());
    assert!(parser.next().is_none());
    let names: Vec<&str> = parser.headers().unwrap().names().collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn headers_disabled_yields_positional_records() {
    let config = ParserConfig {
        expect_headers: false,
        ..Default::default()
    };
    let rows = parse(b"x,y\n1,2\n", config);

    assert_eq!(
        rows.into_iter().map(Result::unwrap).collect::<Vec<_>>(),
        vec![
            StructuredRecord::Positional(vec!["x".into(), "y".into()]),
            StructuredRecord::Positional(vec!["1".into(), "2".into()]),
        ]
    );
}

#[test]
fn wider_row_falls_back_to_positional_then_mapping_resumes() {
    let rows = parse(b"a,b\n1,2,3\n4,5\n", ParserConfig::default());

    assert_eq!(
        rows[0].as_ref().unwrap(),
        &StructuredRecord::Positional(vec!["1".into(), "2".into(), "3".into()])
    );
    assert_eq!(rows[1].as_ref().unwrap().to_json_value(), json!({"a": "4", "b": "5"}));
}

#[test]
fn narrower_row_maps_the_fields_it_has() {
    let rows = parse(b"a,b,c\n1\n", ParserConfig::default());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].as_ref().unwrap().to_json_value(), json!({"a": "1"}));
}

#[test]
fn strict_ragged_row_yields_one_error_and_parsing_continues() {
    let rows = parse(b"a,b\n1\n2,3\n", strict());

    assert_eq!(rows.len(), 2);
    match &rows[0] {
        Err(ReaderError::Csv(e)) => assert!(!e.is_io_error()),
        other => panic!("expected csv error, got {other:?}"),
    }
    assert_eq!(rows[1].as_ref().unwrap().to_json_value(), json!({"a": "2", "b": "3"}));
}

#[test]
fn strict_rejects_invalid_utf8_with_line_number() {
    let rows = parse(b"a,b\n\xff,2\nok,3\n", strict());

    match &rows[0] {
        Err(ReaderError::Parse { line, message }) => {
            assert_eq!(*line, 2);
            assert!(message.contains("field 0"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
    assert_eq!(rows[1].as_ref().unwrap().get("a"), Some("ok"));
}

#[test]
fn lenient_decodes_invalid_utf8_lossily() {
    let rows = parse(b"a,b\n\xff,2\n", ParserConfig::default());
    assert_eq!(rows[0].as_ref().unwrap().get("a"), Some("\u{FFFD}"));
}

#[test]
fn custom_delimiter_and_quoted_fields() {
    let config = ParserConfig {
        delimiter: b';',
        ..Default::default()
    };
    let rows = parse(b"name;note\nalice;\"x;y\"\n", config);
    assert_eq!(rows[0].as_ref().unwrap().get("note"), Some("x;y"));
}

#[test]
fn empty_input_yields_nothing() {
    assert!(parse(b"", ParserConfig::default()).is_empty());
    assert!(parse(b"", strict()).is_empty());
}

struct BrokenPipe {
    served: bool,
}

impl Read for BrokenPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.served {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        }
        self.served = true;
        let data = b"a,b\n1,2\n";
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }
}

#[test]
fn io_error_is_yielded_once_and_ends_iteration() {
    let mut parser = RecordParser::new(BrokenPipe { served: false }, ParserConfig::default());

    assert_eq!(parser.next().unwrap().unwrap().get("a"), Some("1"));
    match parser.next() {
        Some(Err(ReaderError::Csv(e))) => assert!(e.is_io_error()),
        other => panic!("expected io error, got {other:?}"),
    }
    assert!(parser.next().is_none());
}

#[test]
fn strict_rejects_bare_quote_and_continues() {
    let rows = parse(b"a,b\n1,x\"y\n2,3\n", strict());

    assert_eq!(rows.len(), 2);
    match &rows[0] {
        Err(ReaderError::Parse { line, message }) => {
            assert_eq!(*line, 2);
            assert!(message.contains("bare quote"), "{message}");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
    assert_eq!(rows[1].as_ref().unwrap().to_json_value(), json!({"a": "2", "b": "3"}));
}

#[test]
fn strict_rejects_data_after_closing_quote() {
    let rows = parse(b"a,b\n\"1\"x,2\n", strict());

    assert_eq!(rows.len(), 1);
    match &rows[0] {
        Err(ReaderError::Parse { line, message }) => {
            assert_eq!(*line, 2);
            assert!(message.contains("after closing quote"), "{message}");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn strict_rejects_unterminated_quote() {
    let rows = parse(b"a,b\n1,\"open\n", strict());

    assert_eq!(rows.len(), 1);
    assert!(matches!(&rows[0], Err(ReaderError::Parse { .. })));
}

#[test]
fn strict_accepts_well_formed_quoting() {
    let input = b"name,note\r\n\"alice\",\"says \"\"hi\"\", twice\"\r\nbob,\"two\nlines\"\r\n";
    let rows = parse(input, strict());

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].as_ref().unwrap().get("note"), Some("says \"hi\", twice"));
    assert_eq!(rows[1].as_ref().unwrap().get("note"), Some("two\nlines"));
}

#[test]
fn lenient_keeps_stray_quotes() {
    let rows = parse(b"a,b\n1,x\"y\n", ParserConfig::default());
    assert_eq!(rows[0].as_ref().unwrap().get("b"), Some("x\"y"));
}
