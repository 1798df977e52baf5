//! The structured XML writer implementation.
//!
//! [`XmlWriter`] translates [`StructuredSink`] events into XML bytes. Scalar
//! leaves with a non-empty name become attributes on the enclosing tag;
//! nested objects and lists become child elements; a scalar with an empty
//! name becomes text content, or — inside a list — an `<anonymous>` wrapper
//! element holding the positional value.
//!
//! # Examples
//!
//! ```
//! use xmlmodem::XmlWriter;
//!
//! let mut writer = XmlWriter::new(Vec::new());
//! writer
//!     .start_object("")
//!     .render_string("name", "value")
//!     .start_object("nested")
//!     .render_int32("light", 299_792_458)
//!     .end_object()
//!     .start_object("text")
//!     .render_string("", "abc")
//!     .end_object()
//!     .end_object();
//! assert_eq!(
//!     String::from_utf8(writer.into_inner()).unwrap(),
//!     "<root name=\"value\"><nested light=\"299792458\"></nested><text>abc</text></root>",
//! );
//! ```
//!
//! The writer does not validate that the event stream it is given actually
//! results in well-formed XML: passing an empty name where one is required,
//! or rendering an attribute after a child element, produces invalid output
//! rather than an error. Note that 64-bit integers are rendered as quoted
//! strings; consumers parsing XML through a 64-bit-float number type would
//! otherwise lose precision.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

use crate::escape::write_escaped_string;
use crate::options::WriterOptions;
use crate::sink::StructuredSink;

/// A byte-oriented output the writer streams into.
pub trait ByteSink {
    /// Appends `bytes` to the output.
    fn append(&mut self, bytes: &[u8]);
}

impl ByteSink for Vec<u8> {
    fn append(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}

/// One open element. The frame at the bottom of the stack is a sentinel
/// representing "outside the document"; it never corresponds to a tag.
#[derive(Debug)]
struct Frame {
    name: String,
    is_list: bool,
    has_child: bool,
    /// An `<anonymous>` wrapper is currently open for a positional child of
    /// this list element.
    anonymous: bool,
    list_child_needs_end_tag: bool,
}

impl Frame {
    fn new(name: String, is_list: bool) -> Self {
        Self {
            name,
            is_list,
            has_child: false,
            anonymous: false,
            list_child_needs_end_tag: false,
        }
    }
}

/// Adapts a [`ByteSink`] to `core::fmt::Write` for the escaper.
struct FmtBytes<'a, W: ByteSink>(&'a mut W);

impl<W: ByteSink> fmt::Write for FmtBytes<'_, W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.append(s.as_bytes());
        Ok(())
    }
}

/// A [`StructuredSink`] implementation that outputs XML, either compact or
/// pretty-printed.
///
/// See the [module documentation](self) for the encoding rules.
pub struct XmlWriter<W: ByteSink> {
    out: W,
    elements: Vec<Frame>,
    indent: String,
    use_websafe_base64_for_bytes: bool,
    /// The current open tag's `>` has not been written yet (attributes may
    /// still be appended to it).
    tag_needs_closed: bool,
    /// The most recent emission began a new element; governs newline
    /// placement in pretty-printed output.
    start_element: bool,
}

impl<W: ByteSink> XmlWriter<W> {
    /// Creates a compact writer with default options.
    pub fn new(out: W) -> Self {
        Self::with_options(out, WriterOptions::default())
    }

    /// Creates a writer with the given options. A non-empty
    /// `indent_string` enables pretty-printing.
    pub fn with_options(out: W, options: WriterOptions) -> Self {
        Self {
            out,
            elements: vec![Frame::new(String::new(), false)],
            indent: options.indent_string,
            use_websafe_base64_for_bytes: options.use_websafe_base64_for_bytes,
            tag_needs_closed: false,
            start_element: false,
        }
    }

    /// Consumes the writer and returns the underlying output.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Begins a nested object.
    ///
    /// An empty `name` becomes `root` at the top level; inside a list
    /// element it reuses the list's base name, so list entries are tagged
    /// after the list itself.
    pub fn start_object(&mut self, name: &str) -> &mut Self {
        self.start_element = true;
        let tag_name = if name.is_empty() {
            if self.is_root() {
                String::from("root")
            } else if self.top().is_list {
                self.top().name.clone()
            } else {
                String::new()
            }
        } else {
            name.to_string()
        };
        self.write_prefix(&tag_name, false);
        self.out.append(b"<");
        self.out.append(tag_name.as_bytes());
        self.tag_needs_closed = true;
        self.push(tag_name, false);
        self
    }

    /// Closes the most recently started object.
    pub fn end_object(&mut self) -> &mut Self {
        self.start_element = false;
        self.write_close_tag();
        let name = core::mem::take(&mut self.top_mut().name);
        if !name.is_empty() {
            self.out.append(b"</");
            self.out.append(name.as_bytes());
            self.out.append(b">");
        }
        self.pop();
        self.write_suffix();
        if self.is_root() {
            self.new_line(false);
        }
        self
    }

    /// Begins a list named `name`, emitted as `<_list_name>`.
    pub fn start_list(&mut self, name: &str) -> &mut Self {
        self.start_element = true;
        self.write_prefix(name, false);
        self.out.append(b"<_list_");
        self.out.append(name.as_bytes());
        self.out.append(b">");
        self.push(name.to_string(), true);
        self
    }

    /// Closes the most recently started list.
    pub fn end_list(&mut self) -> &mut Self {
        self.start_element = false;
        self.write_close_tag();
        let name = core::mem::take(&mut self.top_mut().name);
        self.out.append(b"</_list_");
        self.out.append(name.as_bytes());
        self.out.append(b">");
        self.pop();
        self.write_suffix();
        if self.is_root() {
            self.new_line(false);
        }
        self
    }

    /// Renders a boolean as `true` / `false`.
    pub fn render_bool(&mut self, name: &str, value: bool) -> &mut Self {
        self.render_simple(name, if value { "true" } else { "false" })
    }

    /// Renders a 32-bit signed integer in shortest decimal form.
    pub fn render_int32(&mut self, name: &str, value: i32) -> &mut Self {
        self.render_simple(name, &value.to_string())
    }

    /// Renders a 32-bit unsigned integer in shortest decimal form.
    pub fn render_uint32(&mut self, name: &str, value: u32) -> &mut Self {
        self.render_simple(name, &value.to_string())
    }

    /// Renders a 64-bit signed integer. The logical shape is a string:
    /// attribute values are quoted as usual and text content is emitted
    /// verbatim.
    pub fn render_int64(&mut self, name: &str, value: i64) -> &mut Self {
        self.render_simple(name, &value.to_string())
    }

    /// Renders a 64-bit unsigned integer, always quoted.
    pub fn render_uint64(&mut self, name: &str, value: u64) -> &mut Self {
        self.write_prefix(name, true);
        self.out.append(b"\"");
        self.out.append(value.to_string().as_bytes());
        self.out.append(b"\"");
        self.write_suffix();
        self
    }

    /// Renders a double: shortest round-trippable decimal when finite,
    /// otherwise the quoted strings `NaN` / `Infinity` / `-Infinity`.
    pub fn render_double(&mut self, name: &str, value: f64) -> &mut Self {
        if value.is_finite() {
            return self.render_simple(name, ryu::Buffer::new().format_finite(value));
        }
        self.render_string(name, nonfinite_name(value.is_nan(), value > 0.0))
    }

    /// Renders a float; see [`render_double`](Self::render_double).
    pub fn render_float(&mut self, name: &str, value: f32) -> &mut Self {
        if value.is_finite() {
            return self.render_simple(name, ryu::Buffer::new().format_finite(value));
        }
        self.render_string(name, nonfinite_name(value.is_nan(), value > 0.0))
    }

    /// Renders a string leaf, escaped per the shared escape dialect.
    pub fn render_string(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_prefix(name, true);
        if !name.is_empty() {
            self.out.append(b"\"");
        }
        write_escaped_string(value, &mut FmtBytes(&mut self.out))
            .expect("writing to a byte sink cannot fail");
        if !name.is_empty() {
            self.out.append(b"\"");
        }
        self.write_suffix();
        self
    }

    /// Renders binary data as base64 text, using the URL-safe alphabet when
    /// the corresponding option is set.
    pub fn render_bytes(&mut self, name: &str, value: &[u8]) -> &mut Self {
        self.write_prefix(name, true);
        let encoded = if self.use_websafe_base64_for_bytes {
            URL_SAFE.encode(value)
        } else {
            STANDARD.encode(value)
        };
        if !name.is_empty() {
            self.out.append(b"\"");
        }
        self.out.append(encoded.as_bytes());
        if !name.is_empty() {
            self.out.append(b"\"");
        }
        self.write_suffix();
        self
    }

    /// Renders an explicit `null`.
    pub fn render_null(&mut self, name: &str) -> &mut Self {
        self.render_simple(name, "null")
    }

    /// Renders a null as the empty string.
    pub fn render_null_as_empty(&mut self, name: &str) -> &mut Self {
        self.render_simple(name, "")
    }

    /// Emits `<!--comments-->` verbatim.
    pub fn render_comments(&mut self, comments: &str) -> &mut Self {
        self.out.append(b"<!--");
        self.out.append(comments.as_bytes());
        self.out.append(b"-->");
        self
    }

    /// Renders a pre-formatted simple value: quoted when named (an
    /// attribute), raw when positional (text content), never escaped.
    fn render_simple(&mut self, name: &str, value: &str) -> &mut Self {
        self.write_prefix(name, true);
        if !name.is_empty() {
            self.out.append(b"\"");
        }
        self.out.append(value.as_bytes());
        if !name.is_empty() {
            self.out.append(b"\"");
        }
        self.write_suffix();
        self
    }

    fn is_root(&self) -> bool {
        self.elements.len() == 1
    }

    fn top(&self) -> &Frame {
        self.elements.last().expect("the sentinel frame is never popped")
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.elements.last_mut().expect("the sentinel frame is never popped")
    }

    fn push(&mut self, name: String, is_list: bool) {
        self.top_mut().has_child = true;
        self.elements.push(Frame::new(name, is_list));
    }

    fn pop(&mut self) {
        if self.elements.len() > 1 {
            self.elements.pop();
        }
    }

    /// In pretty-print mode, writes a newline followed by one indent per
    /// nesting level (one less when closing an element).
    fn new_line(&mut self, pop: bool) {
        if self.indent.is_empty() {
            return;
        }
        let level = self.elements.len().saturating_sub(1 + usize::from(pop));
        self.out.append(b"\n");
        for _ in 0..level {
            self.out.append(self.indent.as_bytes());
        }
    }

    /// Finishes the pending open tag and positions the cursor for whatever
    /// comes next. `render` is true when the caller is about to render a
    /// scalar leaf rather than open or close an element.
    fn write_prefix(&mut self, name: &str, render: bool) {
        if self.tag_needs_closed && !render {
            self.out.append(b">");
            self.tag_needs_closed = false;
        }

        if !render && !self.is_root() {
            if self.start_element {
                self.new_line(false);
                self.start_element = false;
            } else if self.top().has_child {
                self.new_line(true);
            }
        }

        if render && self.top().is_list {
            // A positional leaf inside a list gets its own wrapper element.
            self.new_line(false);
            self.out.append(b"<anonymous");
            let top = self.top_mut();
            top.anonymous = true;
            top.has_child = true;
            top.list_child_needs_end_tag = true;
            self.tag_needs_closed = true;
        }

        if render {
            if name.is_empty() {
                self.out.append(b">");
                self.tag_needs_closed = false;
            } else {
                self.out.append(b" ");
                write_escaped_string(name, &mut FmtBytes(&mut self.out))
                    .expect("writing to a byte sink cannot fail");
                self.out.append(b"=");
            }
        } else if self.tag_needs_closed {
            self.out.append(b">");
            self.tag_needs_closed = false;
        }
    }

    /// Closes the `<anonymous>` wrapper opened for the preceding positional
    /// list child, if any.
    fn write_suffix(&mut self) {
        if self.top().is_list && self.top().list_child_needs_end_tag {
            self.write_close_tag();
            self.out.append(b"</");
            if self.top().anonymous {
                self.out.append(b"anonymous");
                self.top_mut().anonymous = false;
            } else {
                let name = self.top().name.clone();
                self.out.append(name.as_bytes());
            }
            self.out.append(b">");
            self.top_mut().list_child_needs_end_tag = false;
        }
    }

    fn write_close_tag(&mut self) {
        if self.tag_needs_closed {
            self.out.append(b">");
            self.tag_needs_closed = false;
        }
        if !self.is_root() {
            if self.start_element {
                self.new_line(false);
                self.start_element = false;
            } else if self.top().has_child && !self.top().anonymous {
                self.new_line(true);
            }
        }
    }
}

fn nonfinite_name(is_nan: bool, is_positive: bool) -> &'static str {
    if is_nan {
        "NaN"
    } else if is_positive {
        "Infinity"
    } else {
        "-Infinity"
    }
}

impl<W: ByteSink> StructuredSink for XmlWriter<W> {
    fn start_object(&mut self, name: &str) {
        XmlWriter::start_object(self, name);
    }

    fn end_object(&mut self) {
        XmlWriter::end_object(self);
    }

    fn start_list(&mut self, name: &str) {
        XmlWriter::start_list(self, name);
    }

    fn end_list(&mut self) {
        XmlWriter::end_list(self);
    }

    fn render_string(&mut self, name: &str, value: &str) {
        XmlWriter::render_string(self, name, value);
    }

    fn render_bool(&mut self, name: &str, value: bool) {
        XmlWriter::render_bool(self, name, value);
    }

    fn render_int32(&mut self, name: &str, value: i32) {
        XmlWriter::render_int32(self, name, value);
    }

    fn render_uint32(&mut self, name: &str, value: u32) {
        XmlWriter::render_uint32(self, name, value);
    }

    fn render_int64(&mut self, name: &str, value: i64) {
        XmlWriter::render_int64(self, name, value);
    }

    fn render_uint64(&mut self, name: &str, value: u64) {
        XmlWriter::render_uint64(self, name, value);
    }

    fn render_float(&mut self, name: &str, value: f32) {
        XmlWriter::render_float(self, name, value);
    }

    fn render_double(&mut self, name: &str, value: f64) {
        XmlWriter::render_double(self, name, value);
    }

    fn render_bytes(&mut self, name: &str, value: &[u8]) {
        XmlWriter::render_bytes(self, name, value);
    }

    fn render_null(&mut self, name: &str) {
        XmlWriter::render_null(self, name);
    }
}
