//! The structured-sink event vocabulary shared by the parser and the writer.
//!
//! A [`StructuredSink`] consumes an ordered stream of tree-shaped write
//! events: every `start_*` call is matched by its corresponding `end_*` call
//! in LIFO order, and leaves are rendered with one of the `render_*` calls.
//! An empty `name` means the value is positional (a list element or text
//! content) rather than a named field.
//!
//! [`XmlParser`](crate::XmlParser) emits only the structural events and
//! `render_string`; [`XmlWriter`](crate::XmlWriter) consumes the full set,
//! which lets a typed producer (such as a message-schema adapter) drive it
//! directly.
//!
//! # Examples
//!
//! ```
//! use xmlmodem::{StructuredSink, XmlWriter};
//!
//! fn emit<S: StructuredSink>(sink: &mut S) {
//!     sink.start_object("");
//!     sink.render_string("greeting", "hello");
//!     sink.end_object();
//! }
//!
//! let mut writer = XmlWriter::new(Vec::new());
//! emit(&mut writer);
//! assert_eq!(writer.into_inner(), br#"<root greeting="hello"></root>"#);
//! ```

/// A consumer of structured write events.
///
/// Implementations must tolerate any event order the producer issues; in
/// particular the parser reports document structure as it is encountered and
/// never retracts an event it has already emitted.
pub trait StructuredSink {
    /// Begins a nested object. An empty `name` denotes an anonymous object,
    /// such as the document root or a list element.
    fn start_object(&mut self, name: &str);

    /// Closes the most recently started object.
    fn end_object(&mut self);

    /// Begins a homogeneous sequence named `name`.
    fn start_list(&mut self, name: &str);

    /// Closes the most recently started list.
    fn end_list(&mut self);

    /// Renders a UTF-8 string leaf. An empty `name` denotes positional or
    /// textual content.
    fn render_string(&mut self, name: &str, value: &str);

    /// Renders a boolean leaf.
    fn render_bool(&mut self, name: &str, value: bool);

    /// Renders a 32-bit signed integer leaf.
    fn render_int32(&mut self, name: &str, value: i32);

    /// Renders a 32-bit unsigned integer leaf.
    fn render_uint32(&mut self, name: &str, value: u32);

    /// Renders a 64-bit signed integer leaf.
    fn render_int64(&mut self, name: &str, value: i64);

    /// Renders a 64-bit unsigned integer leaf.
    fn render_uint64(&mut self, name: &str, value: u64);

    /// Renders a single-precision floating point leaf.
    fn render_float(&mut self, name: &str, value: f32);

    /// Renders a double-precision floating point leaf.
    fn render_double(&mut self, name: &str, value: f64);

    /// Renders a binary leaf.
    fn render_bytes(&mut self, name: &str, value: &[u8]);

    /// Renders an explicit null leaf.
    fn render_null(&mut self, name: &str);
}

impl<S: StructuredSink + ?Sized> StructuredSink for &mut S {
    fn start_object(&mut self, name: &str) {
        (**self).start_object(name);
    }

    fn end_object(&mut self) {
        (**self).end_object();
    }

    fn start_list(&mut self, name: &str) {
        (**self).start_list(name);
    }

    fn end_list(&mut self) {
        (**self).end_list();
    }

    fn render_string(&mut self, name: &str, value: &str) {
        (**self).render_string(name, value);
    }

    fn render_bool(&mut self, name: &str, value: bool) {
        (**self).render_bool(name, value);
    }

    fn render_int32(&mut self, name: &str, value: i32) {
        (**self).render_int32(name, value);
    }

    fn render_uint32(&mut self, name: &str, value: u32) {
        (**self).render_uint32(name, value);
    }

    fn render_int64(&mut self, name: &str, value: i64) {
        (**self).render_int64(name, value);
    }

    fn render_uint64(&mut self, name: &str, value: u64) {
        (**self).render_uint64(name, value);
    }

    fn render_float(&mut self, name: &str, value: f32) {
        (**self).render_float(name, value);
    }

    fn render_double(&mut self, name: &str, value: f64) {
        (**self).render_double(name, value);
    }

    fn render_bytes(&mut self, name: &str, value: &[u8]) {
        (**self).render_bytes(name, value);
    }

    fn render_null(&mut self, name: &str) {
        (**self).render_null(name);
    }
}
