//! Re-indent an XML document by streaming it through the parser into a
//! pretty-printing writer.
//!
//! ```sh
//! cargo run --example transcode
//! ```

use xmlmodem::{WriterOptions, XmlParser, XmlWriter};

fn main() {
    let compact =
        "<root version=\"3\"><_list_items><items>alpha</items><items>beta</items></_list_items></root>";

    let writer = XmlWriter::with_options(
        Vec::new(),
        WriterOptions {
            indent_string: String::from("  "),
            ..Default::default()
        },
    );
    let mut parser = XmlParser::new(writer);

    // Feed in small chunks to show that chunking is transparent.
    for chunk in xmlmodem::produce_chunks(compact, 8) {
        parser.parse(chunk.as_bytes()).expect("valid XML");
    }
    parser.finish_parse().expect("complete XML");

    let pretty = parser.into_sink().into_inner();
    println!("{}", String::from_utf8(pretty).expect("writer emits UTF-8"));
}
