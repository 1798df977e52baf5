//! An incremental / online XML stream parser and a structured XML writer,
//! joined by a shared [`StructuredSink`] event vocabulary.
//!
//! [`XmlParser`] consumes XML in arbitrarily sized byte chunks and drives a
//! [`StructuredSink`] with the document's structure; [`XmlWriter`] consumes
//! the same vocabulary and produces XML bytes, compact or pretty-printed.
//! The two never call each other directly, so either half can be paired with
//! a different peer (for example a schema adapter that transcodes events to
//! a binary message format).

#![no_std]
#![allow(missing_docs)]
extern crate alloc;

#[cfg(test)]
extern crate std;

mod chunk_utils;
mod escape;
mod utf8;

mod error;
mod options;
mod parser;
mod sink;
mod writer;

pub use chunk_utils::{produce_chunks, produce_prefixes};
pub use error::{ParseError, ParseErrorKind};
pub use options::{ParserOptions, WriterOptions};
pub use parser::XmlParser;
pub use sink::StructuredSink;
pub use writer::{ByteSink, XmlWriter};

#[cfg(test)]
mod tests;
