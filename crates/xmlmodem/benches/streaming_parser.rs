//! Benchmark – `xmlmodem::XmlParser`
#![allow(missing_docs)]

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use xmlmodem::{StructuredSink, XmlParser};

/// Produce a deterministic XML document of at least `entries` list items:
/// a root element holding a list of small attribute-bearing objects.
fn make_xml_payload(entries: usize) -> String {
    let mut xml = String::with_capacity(entries * 48);
    xml.push_str("<root label=\"benchmark\"><_list_entries>");
    for i in 0..entries {
        xml.push_str(&format!(
            "<entries id=\"{i}\" name=\"entry number {i}\"></entries>"
        ));
    }
    xml.push_str("</_list_entries></root>");
    xml
}

/// Counts events so Criterion has a value to black-box; discards payloads.
#[derive(Default)]
struct CountingSink {
    events: usize,
}

impl StructuredSink for CountingSink {
    fn start_object(&mut self, _name: &str) {
        self.events += 1;
    }

    fn end_object(&mut self) {
        self.events += 1;
    }

    fn start_list(&mut self, _name: &str) {
        self.events += 1;
    }

    fn end_list(&mut self) {
        self.events += 1;
    }

    fn render_string(&mut self, _name: &str, _value: &str) {
        self.events += 1;
    }

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

/// Run the parser by feeding `parts` chunks that together form `payload`.
/// Returns the number of events produced so the result can be black-boxed.
fn run_streaming_parser(payload: &str, parts: usize) -> usize {
    assert!(parts > 0);
    let chunk_size = payload.len().div_ceil(parts);

    let mut parser = XmlParser::new(CountingSink::default());
    for chunk in payload.as_bytes().chunks(chunk_size) {
        parser.parse(chunk).expect("benchmark payload is valid");
    }
    parser.finish_parse().expect("benchmark payload is valid");
    parser.into_sink().events
}

fn bench_streaming_parser(c: &mut Criterion) {
    let payload = make_xml_payload(2_000);

    let mut group = c.benchmark_group("xml_streaming_parser");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(criterion::Throughput::Bytes(payload.len() as u64));

    for parts in [1usize, 16, 256] {
        group.bench_with_input(
            BenchmarkId::new("chunked", parts),
            &parts,
            |b, &parts| {
                b.iter(|| run_streaming_parser(black_box(&payload), parts));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_streaming_parser);
criterion_main!(benches);
