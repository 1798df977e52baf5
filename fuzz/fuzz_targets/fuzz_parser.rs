#![no_main]

use libfuzzer_sys::fuzz_target;
use xmlmodem::{ParserOptions, StructuredSink, XmlParser};

const HEADER: usize = 5; // 1 flag byte + 4-byte split seed

/// Discards every event; the target only cares that the parser never
/// panics, loops, or emits after a fatal error.
struct DiscardSink;

impl StructuredSink for DiscardSink {
    fn start_object(&mut self, _name: &str) {}
    fn end_object(&mut self) {}
    fn start_list(&mut self, _name: &str) {}
    fn end_list(&mut self) {}
    fn render_string(&mut self, _name: &str, _value: &str) {}
    fn render_bool(&mut self, _name: &str, _value: bool) {}
    fn render_int32(&mut self, _name: &str, _value: i32) {}
    fn render_uint32(&mut self, _name: &str, _value: u32) {}
    fn render_int64(&mut self, _name: &str, _value: i64) {}
    fn render_uint64(&mut self, _name: &str, _value: u64) {}
    fn render_float(&mut self, _name: &str, _value: f32) {}
    fn render_double(&mut self, _name: &str, _value: f64) {}
    fn render_bytes(&mut self, _name: &str, _value: &[u8]) {}
    fn render_null(&mut self, _name: &str) {}
}

/// Split `data` into chunks of deterministic pseudo-random sizes derived
/// from `seed`. Chunks may cut UTF-8 sequences, tokens, and escapes — the
/// parser must absorb any byte-level split.
fn split_into_chunks(data: &[u8], seed: u64) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut state = seed | 1;
    while start < data.len() {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let remaining = data.len() - start;
        let size = (state as usize % remaining) + 1;
        chunks.push(&data[start..start + size]);
        start += size;
    }
    chunks
}

fuzz_target!(|data: &[u8]| {
    if data.len() < HEADER {
        return;
    }
    let flags = data[0];
    let split_seed = u64::from(u32::from_le_bytes(data[1..5].try_into().unwrap()));
    let data = &data[HEADER..];
    if data.is_empty() {
        return;
    }

    let mut parser = XmlParser::with_options(
        DiscardSink,
        ParserOptions {
            coerce_to_utf8: flags & 1 != 0,
            allow_no_root_element: flags & 2 != 0,
            max_recursion_depth: if flags & 4 != 0 { 8 } else { 100 },
            ..Default::default()
        },
    );

    for chunk in split_into_chunks(data, split_seed) {
        if parser.parse(chunk).is_err() {
            return;
        }
    }
    let _ = parser.finish_parse();
});
