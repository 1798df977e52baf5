use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::{ParseError, ParseErrorKind, StructuredSink, XmlParser};

/// One event as observed by [`RecordingSink`]. Typed leaves are recorded in
/// their canonical string form since the parser itself only ever renders
/// strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartObject(String),
    EndObject,
    StartList(String),
    EndList,
    RenderString(String, String),
}

pub fn obj(name: &str) -> Event {
    Event::StartObject(name.to_string())
}

pub fn list(name: &str) -> Event {
    Event::StartList(name.to_string())
}

pub fn string(name: &str, value: &str) -> Event {
    Event::RenderString(name.to_string(), value.to_string())
}

/// Records every event it receives, for comparison against an expectation.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<Event>,
}

impl RecordingSink {
    fn leaf(&mut self, name: &str, value: impl ToString) {
        self.events
            .push(Event::RenderString(name.to_string(), value.to_string()));
    }
}

impl StructuredSink for RecordingSink {
    fn start_object(&mut self, name: &str) {
        self.events.push(Event::StartObject(name.to_string()));
    }

    fn end_object(&mut self) {
        self.events.push(Event::EndObject);
    }

    fn start_list(&mut self, name: &str) {
        self.events.push(Event::StartList(name.to_string()));
    }

    fn end_list(&mut self) {
        self.events.push(Event::EndList);
    }

    fn render_string(&mut self, name: &str, value: &str) {
        self.leaf(name, value);
    }

    fn render_bool(&mut self, name: &str, value: bool) {
        self.leaf(name, value);
    }

    fn render_int32(&mut self, name: &str, value: i32) {
        self.leaf(name, value);
    }

    fn render_uint32(&mut self, name: &str, value: u32) {
        self.leaf(name, value);
    }

    fn render_int64(&mut self, name: &str, value: i64) {
        self.leaf(name, value);
    }

    fn render_uint64(&mut self, name: &str, value: u64) {
        self.leaf(name, value);
    }

    fn render_float(&mut self, name: &str, value: f32) {
        self.leaf(name, value);
    }

    fn render_double(&mut self, name: &str, value: f64) {
        self.leaf(name, value);
    }

    fn render_bytes(&mut self, name: &str, value: &[u8]) {
        self.leaf(name, alloc::format!("{value:?}"));
    }

    fn render_null(&mut self, name: &str) {
        self.leaf(name, "null");
    }
}

/// Parses `bytes` in two pieces cut at `split`, then finishes.
pub fn parse_split(bytes: &[u8], split: usize) -> Result<Vec<Event>, ParseError> {
    let mut parser = XmlParser::new(RecordingSink::default());
    parser.parse(&bytes[..split])?;
    parser.parse(&bytes[split..])?;
    parser.finish_parse()?;
    assert_eq!(parser.recursion_depth(), 0);
    Ok(parser.into_sink().events)
}

/// Parses `bytes` one byte at a time, then finishes.
pub fn parse_bytewise(bytes: &[u8]) -> Result<Vec<Event>, ParseError> {
    let mut parser = XmlParser::new(RecordingSink::default());
    for byte in bytes {
        parser.parse(core::slice::from_ref(byte))?;
    }
    parser.finish_parse()?;
    Ok(parser.into_sink().events)
}

/// Asserts that `xml` parses to `expected` when split at every byte position
/// and when fed one byte at a time. Splits land mid-token and mid-code-point,
/// which is exactly what the leftover machinery must be transparent to.
pub fn assert_parses(xml: &str, expected: &[Event]) {
    let bytes = xml.as_bytes();
    for split in 0..=bytes.len() {
        let events =
            parse_split(bytes, split).unwrap_or_else(|err| panic!("split at {split}: {err}"));
        assert_eq!(events, expected, "split at {split} of {xml:?}");
    }
    let events = parse_bytewise(bytes).unwrap_or_else(|err| panic!("bytewise: {err}"));
    assert_eq!(events, expected, "bytewise feed of {xml:?}");
}

/// Asserts that parsing `bytes` fails with `kind` at every split point, and
/// that the message carries the expected prefix.
pub fn assert_parse_fails(bytes: &[u8], kind: ParseErrorKind, message_prefix: &str) {
    for split in 0..=bytes.len() {
        let err = parse_split(bytes, split).expect_err("expected the parse to fail");
        assert_eq!(err.kind(), kind, "split at {split}: {err}");
        assert!(
            err.message().starts_with(message_prefix),
            "split at {split}: message {:?} does not start with {:?}",
            err.message(),
            message_prefix,
        );
    }
}
