//! The XML streaming parser implementation.
//!
//! [`XmlParser`] consumes XML in arbitrarily sized byte chunks and drives a
//! [`StructuredSink`] with the document's structure. The state machine is an
//! explicit stack rather than recursion so that running out of bytes in the
//! middle of any token can *cancel* the current step: the state is pushed
//! back, unconsumed input is stashed in a leftover buffer, and the next
//! [`parse`](XmlParser::parse) call resumes exactly where the previous one
//! stopped. Cancellation is internal — callers only ever observe `Ok` (wait
//! for more input) or a fatal [`ParseError`].
//!
//! # Examples
//!
//! ```
//! use xmlmodem::{XmlParser, XmlWriter};
//!
//! // Writers speak the same event vocabulary, so one can serve as the sink.
//! let mut parser = XmlParser::new(XmlWriter::new(Vec::new()));
//! parser.parse(b"<root greeting=\"hel").unwrap();
//! parser.parse(b"lo\"></root>").unwrap();
//! parser.finish_parse().unwrap();
//! let bytes = parser.into_sink().into_inner();
//! assert_eq!(bytes, br#"<root greeting="hello"></root>"#);
//! ```

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{ParseError, ParseErrorKind};
use crate::escape::{
    MAX_HIGH_SURROGATE, MAX_LOW_SURROGATE, MIN_HIGH_SURROGATE, MIN_LOW_SURROGATE,
    MIN_SUPPLEMENTARY_CODE_POINT,
};
use crate::options::ParserOptions;
use crate::sink::StructuredSink;
use crate::utf8;

/// Number of bytes in an escaped UTF-16 code unit (`\` `u` X X X X).
const UNICODE_ESCAPED_LEN: usize = 6;

/// Bytes of context included either side of the cursor in error snippets.
const CONTEXT_LENGTH: usize = 20;

/// One step of parsing still to be done. The stack of these is the parser's
/// entire control state, which is what makes chunk-boundary resumption
/// possible without unwinding through recursive calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    /// Expects a `<`.
    BeginElement,
    /// Expects a tag name, `/`, `!` or `?`.
    StartTag,
    /// Expects a space or `>`.
    BeginElementMid,
    /// Expects an attribute key or `/`.
    AttrKey,
    /// Expects a `=`.
    AttrMid,
    /// Expects a single or double quote.
    AttrValue,
    /// Expects a `>`.
    BeginElementClose,
    /// Expects text or `<`.
    Text,
    /// Expects a `<`.
    EndElement,
    /// Expects a `/`.
    EndElementMid,
    /// Expects a tag name.
    EndTag,
    /// Expects a `>`.
    EndElementClose,
}

/// Classification of the byte at the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenType {
    /// `<`
    OpenTag,
    /// `>`
    CloseTag,
    /// `/`
    EndTagSlash,
    /// `?`
    Declaration,
    /// `!`
    Comment,
    /// `"` or `'`
    BeginString,
    /// A single space between attributes.
    AttrSeparator,
    /// `=`
    AttrValueSeparator,
    /// A letter or underscore opening a key or tag name.
    BeginKey,
    /// Anything else; only meaningful as text content.
    BeginText,
    /// Out of input.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Object,
    List,
}

/// One open element: the base tag name (with any `_list_` prefix stripped)
/// and whether it was opened as a list.
#[derive(Debug)]
struct ElementFrame {
    tag_name: String,
    kind: ElementKind,
}

/// A string field that borrows from the current chunk while it can and is
/// promoted to owned storage when the chunk is about to be discarded.
#[derive(Debug, Default)]
enum Span {
    #[default]
    None,
    /// Byte range into the chunk being parsed.
    Borrowed(usize, usize),
    Owned(String),
}

impl Span {
    fn resolve<'a>(&'a self, xml: &'a str) -> &'a str {
        match self {
            Span::None => "",
            Span::Borrowed(start, end) => &xml[*start..*end],
            Span::Owned(value) => value,
        }
    }

    /// Copies a borrowed range out of `xml` into owned storage. Called on
    /// cancellation, before the chunk the range points into goes away.
    fn stabilize(&mut self, xml: &str) {
        if let Span::Borrowed(start, end) = *self {
            *self = Span::Owned(String::from(&xml[start..end]));
        }
    }
}

/// Outcome of a single state-machine step that did not complete normally.
#[derive(Debug)]
enum Interrupt {
    /// The step ran out of input mid-token; retry once more bytes arrive.
    Cancelled,
    /// The input is invalid.
    Failed(ParseError),
}

type ParseStep = Result<(), Interrupt>;

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\x0B' | b'\x0C' | b'\r')
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// The five entity references text content may contain.
const PREDEFINED_ENTITIES: [&[u8]; 5] = [b"&lt;", b"&gt;", b"&amp;", b"&apos;", b"&quot;"];

/// Why a text scan could not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextFailure {
    /// An `&` that does not begin a predefined entity.
    Invalid,
    /// The chunk ended inside what may yet become a predefined entity.
    Incomplete,
}

fn is_valid_code_point(code: u32) -> bool {
    code < MIN_HIGH_SURROGATE || (code > MAX_LOW_SURROGATE && code <= 0x0010_FFFF)
}

/// An XML parser that consumes a stream of chunks rather than needing the
/// entire document up front.
///
/// ```
/// use xmlmodem::{XmlParser, XmlWriter};
///
/// let mut parser = XmlParser::new(XmlWriter::new(Vec::new()));
/// parser.parse(b"<root></root>")?;
/// parser.finish_parse()?;
/// # Ok::<(), xmlmodem::ParseError>(())
/// ```
///
/// A parser instance may only be driven by one caller at a time; separate
/// instances share no state.
pub struct XmlParser<S: StructuredSink> {
    /// The sink receiving parse events.
    sink: S,
    /// Parsing still to be done. When this runs empty a single root value
    /// has been parsed.
    stack: Vec<ParseState>,
    /// Unparsed bytes carried between `parse` calls: the tail of a token we
    /// could not finish, or a structurally incomplete UTF-8 sequence.
    leftover: Vec<u8>,
    /// Cursor into the chunk currently being parsed.
    pos: usize,
    /// The last attribute key read; key and value parsing are separate
    /// steps, possibly in different chunks.
    key: Span,
    /// Accumulates decoded string content when a value contains escapes or
    /// spans chunks; empty when the value can borrow from the input.
    parsed_storage: String,
    /// The quote character that opened the string currently being parsed.
    /// `None` when no string parse is in progress.
    string_open: Option<u8>,
    /// Set during `finish_parse`, promoting cancellations to fatal errors.
    finishing: bool,
    options: ParserOptions,
    recursion_depth: usize,
    /// Open elements, innermost last.
    elements: Vec<ElementFrame>,
}

impl<S: StructuredSink> XmlParser<S> {
    /// Creates a parser with default options that writes events to `sink`.
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, ParserOptions::default())
    }

    /// Creates a parser with the given options.
    pub fn with_options(sink: S, options: ParserOptions) -> Self {
        Self {
            sink,
            stack: vec![ParseState::BeginElement],
            leftover: Vec::new(),
            pos: 0,
            key: Span::None,
            parsed_storage: String::new(),
            string_open: None,
            finishing: false,
            options,
            recursion_depth: 0,
            elements: Vec::new(),
        }
    }

    /// Adjusts the maximum object nesting depth. XML nested deeper fails to
    /// parse.
    pub fn set_max_recursion_depth(&mut self, depth: usize) {
        self.options.max_recursion_depth = depth;
    }

    /// The current object nesting depth. Zero after a complete document.
    #[must_use]
    pub fn recursion_depth(&self) -> usize {
        self.recursion_depth
    }

    /// Gives access to the sink the parser writes to.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consumes the parser and returns its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Parses a chunk of XML. Events for everything that could be fully
    /// recognized are emitted to the sink; the remainder is buffered until
    /// more input arrives via `parse` or the stream ends via
    /// [`finish_parse`](Self::finish_parse).
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the input seen so far is invalid.
    /// Incomplete input is never an error here.
    pub fn parse(&mut self, chunk: &[u8]) -> Result<(), ParseError> {
        if self.leftover.is_empty() {
            self.parse_input(chunk)
        } else {
            let mut merged = core::mem::take(&mut self.leftover);
            merged.extend_from_slice(chunk);
            self.parse_input(&merged)
        }
    }

    /// Signals end of input and parses everything still buffered.
    ///
    /// # Errors
    ///
    /// Conditions that `parse` would wait out — an unterminated string, a
    /// half-read tag name, trailing bytes that never became a token — are
    /// fatal here, as is input that was not valid UTF-8 (unless coercion is
    /// enabled).
    pub fn finish_parse(&mut self) -> Result<(), ParseError> {
        // Nothing expected and nothing left to parse: all done.
        if self.stack.is_empty() && self.leftover.is_empty() && self.elements.is_empty() {
            return Ok(());
        }

        // A stream with no root element: acceptable only when the caller
        // opted in and nothing beyond whitespace was ever seen.
        if self.options.allow_no_root_element
            && self.elements.is_empty()
            && self.stack.len() == 1
            && self.stack[0] == ParseState::BeginElement
            && self.leftover.iter().copied().all(is_space)
        {
            self.leftover.clear();
            return Ok(());
        }

        let leftover = core::mem::take(&mut self.leftover);
        let coerced;
        let xml: &str = if utf8::is_structurally_valid(&leftover) {
            core::str::from_utf8(&leftover).unwrap_or("")
        } else if self.options.coerce_to_utf8 {
            coerced = utf8::replace_invalid(&leftover, &self.options.utf8_replacement_character);
            &coerced
        } else {
            self.pos = 0;
            return Err(self.report_failure_lossy(
                &leftover,
                "Encountered non UTF-8 code points.",
                ParseErrorKind::NonUtf8,
            ));
        };

        self.pos = 0;
        self.finishing = true;
        self.run_parser(xml)?;
        self.skip_whitespace(xml);
        if self.pos < xml.len() {
            return Err(self.report_failure(
                xml,
                "Parsing terminated before end of input.",
                ParseErrorKind::ParsingTerminatedBeforeEndOfInput,
            ));
        }
        Ok(())
    }

    /// Parses `input` after leftover merging: runs the parser over the
    /// structurally valid UTF-8 prefix and holds the rest back.
    fn parse_input(&mut self, input: &[u8]) -> Result<(), ParseError> {
        let (valid, rest) = utf8::split_valid_prefix(input);
        if valid.is_empty() {
            self.leftover.extend_from_slice(input);
            return Ok(());
        }
        let status = self.parse_chunk(valid);
        self.leftover.extend_from_slice(rest);
        status
    }

    fn parse_chunk(&mut self, chunk: &str) -> Result<(), ParseError> {
        self.pos = 0;
        self.finishing = false;
        self.run_parser(chunk)?;

        self.skip_whitespace(chunk);
        if self.pos < chunk.len() {
            if self.stack.is_empty() {
                // A root value has been parsed in full but bytes remain.
                return Err(self.report_failure(
                    chunk,
                    "Parsing terminated before end of input.",
                    ParseErrorKind::ParsingTerminatedBeforeEndOfInput,
                ));
            }
            self.leftover.extend_from_slice(&chunk.as_bytes()[self.pos..]);
        }
        Ok(())
    }

    /// Runs the state machine until the stack empties or input runs out. On
    /// cancellation the interrupted state is pushed back so the cursor's
    /// pre-attempt position is preserved through the leftover buffer.
    fn run_parser(&mut self, xml: &str) -> Result<(), ParseError> {
        while let Some(&state) = self.stack.last() {
            let token = if self.string_open.is_some() {
                TokenType::BeginString
            } else {
                self.next_token_type(xml, state)
            };
            self.stack.pop();
            let result = match state {
                ParseState::BeginElement => self.parse_begin_element(xml, token),
                ParseState::StartTag => self.parse_start_tag(xml, token),
                ParseState::BeginElementMid => self.parse_begin_element_mid(xml, token),
                ParseState::AttrKey => self.parse_attr_key(xml, token),
                ParseState::AttrMid => self.parse_attr_mid(xml, token),
                ParseState::AttrValue => self.parse_attr_value(xml, token),
                ParseState::BeginElementClose => self.parse_begin_element_close(xml, token),
                ParseState::Text => self.parse_text(xml, token),
                ParseState::EndElement => self.parse_end_element(xml, token),
                ParseState::EndElementMid => self.parse_end_element_mid(xml, token),
                ParseState::EndTag => self.parse_end_tag(xml, token),
                ParseState::EndElementClose => self.parse_end_element_close(xml, token),
            };
            match result {
                Ok(()) => {}
                Err(Interrupt::Cancelled) => {
                    debug_assert!(!self.finishing, "cancellation while finishing");
                    self.stack.push(state);
                    self.key.stabilize(xml);
                    return Ok(());
                }
                Err(Interrupt::Failed(error)) => return Err(error),
            }
        }
        Ok(())
    }

    // ----------------------------------------------------------------------
    // State handlers
    // ----------------------------------------------------------------------

    fn parse_begin_element(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::OpenTag => {
                self.advance(xml);
                self.stack.push(ParseState::StartTag);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected an open tag.",
                ParseErrorKind::ExpectedOpenTag,
            )),
            _ => Err(self.fail(xml, "Expected an open tag.", ParseErrorKind::ExpectedOpenTag)),
        }
    }

    fn parse_start_tag(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::Declaration => {
                self.parse_declaration(xml)?;
                // The construct replaced an element; expect the next `<`.
                self.stack.push(ParseState::BeginElement);
                Ok(())
            }
            TokenType::Comment => {
                self.parse_comments(xml)?;
                self.stack.push(ParseState::BeginElement);
                Ok(())
            }
            TokenType::BeginKey => self.parse_start_tag_name(xml),
            TokenType::EndTagSlash => {
                // `</...` — an implicit close of the current content run.
                self.advance(xml);
                if self.stack.last() == Some(&ParseState::Text) {
                    self.stack.pop();
                }
                self.stack.push(ParseState::EndTag);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected a tag name.",
                ParseErrorKind::ExpectedTagName,
            )),
            _ => Err(self.fail(xml, "Expected a tag name.", ParseErrorKind::ExpectedTagName)),
        }
    }

    fn parse_begin_element_mid(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::AttrSeparator => {
                self.advance(xml);
                self.stack.push(ParseState::AttrKey);
                Ok(())
            }
            TokenType::CloseTag => {
                self.advance(xml);
                self.stack.push(ParseState::Text);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected a space or a close tag.",
                ParseErrorKind::ExpectedSpaceOrCloseTag,
            )),
            _ => Err(self.fail(
                xml,
                "Expected a space or a close tag.",
                ParseErrorKind::ExpectedSpaceOrCloseTag,
            )),
        }
    }

    fn parse_attr_key(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::EndTagSlash => {
                self.advance(xml);
                self.stack.push(ParseState::BeginElementClose);
                Ok(())
            }
            TokenType::BeginKey => {
                self.parse_key(xml)?;
                self.stack.push(ParseState::AttrMid);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected a begin key or a slash.",
                ParseErrorKind::ExpectedBeginKeyOrSlash,
            )),
            _ => Err(self.fail(
                xml,
                "Expected a begin key or a slash.",
                ParseErrorKind::ExpectedBeginKeyOrSlash,
            )),
        }
    }

    fn parse_attr_mid(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::AttrValueSeparator => {
                self.advance(xml);
                self.stack.push(ParseState::AttrValue);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected a equal mark.",
                ParseErrorKind::ExpectedEqualMark,
            )),
            _ => Err(self.fail(
                xml,
                "Expected a equal mark.",
                ParseErrorKind::ExpectedEqualMark,
            )),
        }
    }

    fn parse_attr_value(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::BeginString => {
                let parsed = self.parse_string_helper(xml)?;
                let key = core::mem::take(&mut self.key);
                self.sink.render_string(key.resolve(xml), parsed.resolve(xml));
                self.stack.push(ParseState::BeginElementMid);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected a quote before attribute value.",
                ParseErrorKind::ExpectedQuoteBeforeAttrValue,
            )),
            _ => Err(self.fail(
                xml,
                "Expected a quote before attribute value.",
                ParseErrorKind::ExpectedQuoteBeforeAttrValue,
            )),
        }
    }

    fn parse_begin_element_close(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::CloseTag => {
                self.advance(xml);
                self.stack.push(ParseState::Text);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected a close tag.",
                ParseErrorKind::ExpectedCloseTag,
            )),
            _ => Err(self.fail(
                xml,
                "Expected a close tag in begin element.",
                ParseErrorKind::ExpectedCloseTagInBeginElement,
            )),
        }
    }

    fn parse_text(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::OpenTag => {
                self.advance(xml);
                self.stack.push(ParseState::Text);
                self.stack.push(ParseState::StartTag);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected an open tag.",
                ParseErrorKind::ExpectedOpenTag,
            )),
            _ => self.parse_text_value(xml),
        }
    }

    fn parse_text_value(&mut self, xml: &str) -> ParseStep {
        let original = self.pos;
        let (start, end) = match self.consume_text(xml) {
            Ok(range) => range,
            Err(TextFailure::Incomplete) if !self.finishing => return Err(Interrupt::Cancelled),
            Err(_) => return Err(self.fail(xml, "Invalid text.", ParseErrorKind::InvalidText)),
        };
        // Consumed everything but more data may follow: the text might not
        // be complete yet, so rewind and wait.
        if !self.finishing && self.pos >= xml.len() {
            self.pos = original;
            return Err(Interrupt::Cancelled);
        }
        self.sink.render_string("", &xml[start..end]);
        self.stack.push(ParseState::EndElement);
        Ok(())
    }

    fn parse_end_element(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::OpenTag => {
                self.advance(xml);
                self.stack.push(ParseState::EndElementMid);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected an open tag.",
                ParseErrorKind::ExpectedOpenTag,
            )),
            _ => Err(self.fail(
                xml,
                "Expected a open tag in end element.",
                ParseErrorKind::ExpectedOpenTagInEndElement,
            )),
        }
    }

    fn parse_end_element_mid(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::EndTagSlash => {
                self.advance(xml);
                self.stack.push(ParseState::EndTag);
                Ok(())
            }
            TokenType::Unknown => {
                Err(self.report_unknown(xml, "Expected a slash.", ParseErrorKind::ExpectedSlash))
            }
            _ => Err(self.fail(
                xml,
                "Expected an end tag slash.",
                ParseErrorKind::ExpectedEndTagSlash,
            )),
        }
    }

    fn parse_end_tag(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::BeginKey => {
                let original = self.pos;
                let Some((start, end)) = self.consume_name(xml) else {
                    return Err(self.fail(
                        xml,
                        "Invalid end tag name.",
                        ParseErrorKind::InvalidEndTagName,
                    ));
                };
                if !self.finishing && self.pos >= xml.len() {
                    self.pos = original;
                    return Err(Interrupt::Cancelled);
                }
                let tag_name = &xml[start..end];
                let (base, end_list) = match tag_name.strip_prefix("_list_") {
                    Some(base) => (base, true),
                    None => (tag_name, false),
                };
                let matches = self.elements.last().is_some_and(|frame| {
                    frame.tag_name == base && (frame.kind == ElementKind::List) == end_list
                });
                if !matches {
                    return Err(self.fail(
                        xml,
                        "Tag name not match.",
                        ParseErrorKind::TagNameNotMatch,
                    ));
                }
                if end_list {
                    self.sink.end_list();
                } else {
                    if base != "anonymous" {
                        self.sink.end_object();
                    }
                    self.recursion_depth -= 1;
                }
                self.elements.pop();
                self.stack.push(ParseState::EndElementClose);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected a tag name.",
                ParseErrorKind::ExpectedTagName,
            )),
            _ => Err(self.fail(
                xml,
                "Expected a tag name in end tag.",
                ParseErrorKind::ExpectedTagNameInEndTag,
            )),
        }
    }

    fn parse_end_element_close(&mut self, xml: &str, token: TokenType) -> ParseStep {
        match token {
            TokenType::CloseTag => {
                self.advance(xml);
                Ok(())
            }
            TokenType::Unknown => Err(self.report_unknown(
                xml,
                "Expected a close tag.",
                ParseErrorKind::ExpectedCloseTag,
            )),
            _ => Err(self.fail(
                xml,
                "Expected an close tag in end element.",
                ParseErrorKind::ExpectedCloseInEndElement,
            )),
        }
    }

    // ----------------------------------------------------------------------
    // Names, keys, text
    // ----------------------------------------------------------------------

    fn parse_start_tag_name(&mut self, xml: &str) -> ParseStep {
        let original = self.pos;
        let Some((start, end)) = self.consume_name(xml) else {
            return Err(self.fail(xml, "Invalid tag name.", ParseErrorKind::InvalidTagName));
        };
        if !self.finishing && self.pos >= xml.len() {
            self.pos = original;
            return Err(Interrupt::Cancelled);
        }
        let tag_name = &xml[start..end];
        if let Some(base) = tag_name.strip_prefix("_list_") {
            self.sink.start_list(base);
            self.elements.push(ElementFrame {
                tag_name: String::from(base),
                kind: ElementKind::List,
            });
        } else {
            let parent_is_list = self
                .elements
                .last()
                .is_some_and(|frame| frame.kind == ElementKind::List);
            if tag_name != "anonymous" {
                // `root` at the top level and children of lists are
                // anonymous objects; the enclosing structure names them.
                if parent_is_list || (tag_name == "root" && self.elements.is_empty()) {
                    self.sink.start_object("");
                } else {
                    self.sink.start_object(tag_name);
                }
            }
            self.increment_recursion_depth(xml, start, end)?;
            self.elements.push(ElementFrame {
                tag_name: String::from(tag_name),
                kind: ElementKind::Object,
            });
        }
        self.stack.push(ParseState::BeginElementMid);
        Ok(())
    }

    fn parse_key(&mut self, xml: &str) -> ParseStep {
        let original = self.pos;
        if self.consume_name(xml).is_none() {
            return Err(self.fail(xml, "Invalid key.", ParseErrorKind::InvalidKey));
        }
        // Consumed everything but more data may follow: the key might not be
        // complete, so rewind and wait.
        if !self.finishing && self.pos >= xml.len() {
            self.pos = original;
            return Err(Interrupt::Cancelled);
        }
        self.key = Span::Borrowed(original, self.pos);
        Ok(())
    }

    /// Consumes a tag name or attribute key: a letter or underscore followed
    /// by letters, digits, underscores and hyphens.
    fn consume_name(&mut self, xml: &str) -> Option<(usize, usize)> {
        let bytes = xml.as_bytes();
        let start = self.pos;
        match bytes.get(start) {
            Some(&b) if is_name_start(b) => {}
            _ => return None,
        }
        let mut end = start + 1;
        while end < bytes.len() && is_name_byte(bytes[end]) {
            end += 1;
        }
        self.pos = end;
        Some((start, end))
    }

    /// Consumes text content up to the next `<`. Every `&` must begin one of
    /// the five predefined entities; entities are validated but passed
    /// through undecoded.
    fn consume_text(&mut self, xml: &str) -> Result<(usize, usize), TextFailure> {
        let bytes = xml.as_bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return Err(TextFailure::Invalid);
        }
        let mut end = start;
        while end < bytes.len() {
            match bytes[end] {
                b'<' if end > start => break,
                b'&' => {
                    let rest = &bytes[end..];
                    if PREDEFINED_ENTITIES.iter().any(|e| rest.starts_with(e)) {
                        end += 1;
                    } else if PREDEFINED_ENTITIES.iter().any(|e| e.starts_with(rest)) {
                        // The chunk ends inside a would-be entity.
                        return Err(TextFailure::Incomplete);
                    } else {
                        return Err(TextFailure::Invalid);
                    }
                }
                _ => end += 1,
            }
        }
        self.pos = end;
        Ok((start, end))
    }

    // ----------------------------------------------------------------------
    // Strings and escapes
    // ----------------------------------------------------------------------

    /// Parses a quoted string value, decoding escapes. Returns a span that
    /// borrows from `xml` when no decoding was needed and the value did not
    /// cross a chunk boundary.
    fn parse_string_helper(&mut self, xml: &str) -> Result<Span, Interrupt> {
        let bytes = xml.as_bytes();
        // If we haven't seen the start quote, grab it and remember it so a
        // resumed parse skips straight back into the string.
        let open = match self.string_open {
            Some(open) => open,
            None => {
                let open = bytes[self.pos];
                self.string_open = Some(open);
                self.advance(xml);
                open
            }
        };
        // Track where we last copied from so unescaped runs copy at most
        // once, directly out of the input.
        let mut last = self.pos;
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            if b == b'\\' {
                if last < self.pos {
                    self.parsed_storage.push_str(&xml[last..self.pos]);
                }
                // A lone backslash at the end of the chunk: wait or fail.
                if self.pos + 1 >= bytes.len() {
                    if !self.finishing {
                        return Err(Interrupt::Cancelled);
                    }
                    return Err(self.fail(
                        xml,
                        "Closing quote expected in string.",
                        ParseErrorKind::ExpectedClosingQuote,
                    ));
                }
                if bytes[self.pos + 1] == b'u' {
                    self.parse_unicode_escape(xml)?;
                    last = self.pos;
                    continue;
                }
                match bytes[self.pos + 1] {
                    b'b' => self.parsed_storage.push('\u{0008}'),
                    b'f' => self.parsed_storage.push('\u{000C}'),
                    b'n' => self.parsed_storage.push('\n'),
                    b'r' => self.parsed_storage.push('\r'),
                    b't' => self.parsed_storage.push('\t'),
                    b'v' => self.parsed_storage.push('\u{000B}'),
                    _ => {
                        // Any other escaped character stands for itself.
                        let Some(c) = xml[self.pos + 1..].chars().next() else {
                            return Err(self.fail(
                                xml,
                                "Closing quote expected in string.",
                                ParseErrorKind::ExpectedClosingQuote,
                            ));
                        };
                        self.parsed_storage.push(c);
                        self.pos += 1 + c.len_utf8();
                        last = self.pos;
                        continue;
                    }
                }
                self.pos += 2;
                last = self.pos;
                continue;
            }
            if b == open {
                let parsed = if self.parsed_storage.is_empty() {
                    // Nothing was decoded; reuse the input buffer.
                    Span::Borrowed(last, self.pos)
                } else {
                    if last < self.pos {
                        self.parsed_storage.push_str(&xml[last..self.pos]);
                    }
                    Span::Owned(core::mem::take(&mut self.parsed_storage))
                };
                self.string_open = None;
                self.advance(xml);
                return Ok(parsed);
            }
            self.advance(xml);
        }
        // Ran out of input: keep what we have and wait, or fail at finish.
        if last < self.pos {
            self.parsed_storage.push_str(&xml[last..self.pos]);
        }
        if !self.finishing {
            return Err(Interrupt::Cancelled);
        }
        self.string_open = None;
        Err(self.fail(
            xml,
            "Closing quote expected in string.",
            ParseErrorKind::ExpectedClosingQuote,
        ))
    }

    /// Decodes a `\uXXXX` escape (cursor on the backslash), recognizing
    /// UTF-16 surrogate pairs as a single supplementary code point.
    fn parse_unicode_escape(&mut self, xml: &str) -> ParseStep {
        let bytes = xml.as_bytes();
        if bytes.len() - self.pos < UNICODE_ESCAPED_LEN {
            if !self.finishing {
                return Err(Interrupt::Cancelled);
            }
            return Err(self.fail(xml, "Illegal hex string.", ParseErrorKind::IllegalHexString));
        }
        let mut code: u32 = 0;
        for i in 2..UNICODE_ESCAPED_LEN {
            let Some(digit) = (bytes[self.pos + i] as char).to_digit(16) else {
                return Err(self.fail(
                    xml,
                    "Invalid escape sequence.",
                    ParseErrorKind::InvalidEscapeSequence,
                ));
            };
            code = (code << 4) + digit;
        }
        if (MIN_HIGH_SURROGATE..=MAX_HIGH_SURROGATE).contains(&code) {
            if bytes.len() - self.pos < 2 * UNICODE_ESCAPED_LEN {
                if !self.finishing {
                    return Err(Interrupt::Cancelled);
                }
                if !self.options.coerce_to_utf8 {
                    return Err(self.fail(
                        xml,
                        "Missing low surrogate.",
                        ParseErrorKind::MissingLowSurrogate,
                    ));
                }
            } else if bytes[self.pos + UNICODE_ESCAPED_LEN] == b'\\'
                && bytes[self.pos + UNICODE_ESCAPED_LEN + 1] == b'u'
            {
                let mut low: u32 = 0;
                for i in UNICODE_ESCAPED_LEN + 2..2 * UNICODE_ESCAPED_LEN {
                    let Some(digit) = (bytes[self.pos + i] as char).to_digit(16) else {
                        return Err(self.fail(
                            xml,
                            "Invalid escape sequence.",
                            ParseErrorKind::InvalidEscapeSequence,
                        ));
                    };
                    low = (low << 4) + digit;
                }
                if (MIN_LOW_SURROGATE..=MAX_LOW_SURROGATE).contains(&low) {
                    // Fold the UTF-16 surrogate pair into one code point and
                    // advance past the first code unit escape.
                    code = (((code & 0x3FF) << 10) | (low & 0x3FF)) + MIN_SUPPLEMENTARY_CODE_POINT;
                    self.pos += UNICODE_ESCAPED_LEN;
                } else if !self.options.coerce_to_utf8 {
                    return Err(self.fail(
                        xml,
                        "Invalid low surrogate.",
                        ParseErrorKind::InvalidLowSurrogate,
                    ));
                }
            } else if !self.options.coerce_to_utf8 {
                return Err(self.fail(
                    xml,
                    "Missing low surrogate.",
                    ParseErrorKind::MissingLowSurrogate,
                ));
            }
        }
        if !self.options.coerce_to_utf8 && !is_valid_code_point(code) {
            return Err(self.fail(
                xml,
                "Invalid unicode code point.",
                ParseErrorKind::InvalidUnicode,
            ));
        }
        // Under coercion an unpaired surrogate can reach this point; it has
        // no char representation, so substitute U+FFFD.
        self.parsed_storage
            .push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
        self.pos += UNICODE_ESCAPED_LEN;
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Comments and declarations
    // ----------------------------------------------------------------------

    /// Consumes `<!--...-->` with the cursor on the `!`. On cancellation the
    /// cursor rewinds to the `!` so the comment is rescanned whole.
    fn parse_comments(&mut self, xml: &str) -> ParseStep {
        let bytes = xml.as_bytes();
        let original = self.pos;
        if bytes.len() - self.pos < 3 {
            if !self.finishing {
                self.pos = original;
                return Err(Interrupt::Cancelled);
            }
            return Err(self.fail(xml, "Illegal comment.", ParseErrorKind::IllegalComment));
        }
        if bytes[self.pos + 1] != b'-' || bytes[self.pos + 2] != b'-' {
            return Err(self.fail(
                xml,
                "Dash expected in comment.",
                ParseErrorKind::ExpectedDashInComment,
            ));
        }
        self.pos += 3;
        while self.pos < bytes.len() {
            if bytes[self.pos] == b'-' {
                if bytes.len() - self.pos < 3 {
                    if !self.finishing {
                        self.pos = original;
                        return Err(Interrupt::Cancelled);
                    }
                    return Err(self.fail(
                        xml,
                        "Illegal close comment.",
                        ParseErrorKind::IllegalCloseComment,
                    ));
                }
                if bytes[self.pos + 1] != b'-' || bytes[self.pos + 2] != b'>' {
                    return Err(self.fail(
                        xml,
                        "Illegal close comment.",
                        ParseErrorKind::IllegalCloseComment,
                    ));
                }
                self.pos += 3;
                return Ok(());
            }
            self.advance(xml);
        }
        if !self.finishing {
            self.pos = original;
            return Err(Interrupt::Cancelled);
        }
        Err(self.fail(
            xml,
            "Close dash expected in comment.",
            ParseErrorKind::ExpectedCloseDashInComment,
        ))
    }

    /// Consumes `<?...?>` with the cursor on the first `?`. On cancellation
    /// the cursor rewinds so the declaration is rescanned whole.
    fn parse_declaration(&mut self, xml: &str) -> ParseStep {
        let bytes = xml.as_bytes();
        let original = self.pos;
        self.pos += 1;
        while self.pos < bytes.len() {
            if bytes[self.pos] == b'?' {
                if bytes.len() - self.pos < 2 {
                    if !self.finishing {
                        self.pos = original;
                        return Err(Interrupt::Cancelled);
                    }
                    return Err(self.fail(
                        xml,
                        "Illegal close declaration.",
                        ParseErrorKind::IllegalCloseDeclaration,
                    ));
                }
                if bytes[self.pos + 1] != b'>' {
                    return Err(self.fail(
                        xml,
                        "Illegal close declaration.",
                        ParseErrorKind::IllegalCloseDeclaration,
                    ));
                }
                self.pos += 2;
                return Ok(());
            }
            self.advance(xml);
        }
        if !self.finishing {
            self.pos = original;
            return Err(Interrupt::Cancelled);
        }
        Err(self.fail(
            xml,
            "Close question mark expected in comment.",
            ParseErrorKind::ExpectedCloseQuestionMarkInDeclaration,
        ))
    }

    // ----------------------------------------------------------------------
    // Cursor and tokens
    // ----------------------------------------------------------------------

    /// Advances the cursor by one UTF-8 character.
    fn advance(&mut self, xml: &str) {
        if let Some(c) = xml[self.pos..].chars().next() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self, xml: &str) {
        let bytes = xml.as_bytes();
        while self.pos < bytes.len() && is_space(bytes[self.pos]) {
            self.advance(xml);
        }
    }

    /// Skips whitespace before classifying a token. Between attributes
    /// (`BeginElementMid`) one space is reserved so the attribute separator
    /// stays observable as a token.
    fn skip_whitespace_in(&mut self, xml: &str, state: ParseState) {
        let bytes = xml.as_bytes();
        while self.pos < bytes.len() && is_space(bytes[self.pos]) {
            if state == ParseState::BeginElementMid {
                match bytes.get(self.pos + 1) {
                    None => break,
                    Some(&next) if !is_space(next) => break,
                    Some(_) => {}
                }
            }
            self.advance(xml);
        }
    }

    fn next_token_type(&mut self, xml: &str, state: ParseState) -> TokenType {
        self.skip_whitespace_in(xml, state);
        let Some(&b) = xml.as_bytes().get(self.pos) else {
            // Out of data; the caller re-pushes the state and we try again
            // when more arrives.
            return TokenType::Unknown;
        };
        match b {
            b'"' | b'\'' => TokenType::BeginString,
            b'<' => TokenType::OpenTag,
            b'>' => TokenType::CloseTag,
            b'/' => TokenType::EndTagSlash,
            b'?' => TokenType::Declaration,
            b'!' => TokenType::Comment,
            b' ' => TokenType::AttrSeparator,
            b'=' => TokenType::AttrValueSeparator,
            _ if is_name_start(b) => TokenType::BeginKey,
            // Not necessarily invalid, just not parseable as anything but
            // text from here.
            _ => TokenType::BeginText,
        }
    }

    // ----------------------------------------------------------------------
    // Failure reporting
    // ----------------------------------------------------------------------

    fn increment_recursion_depth(&mut self, xml: &str, start: usize, end: usize) -> ParseStep {
        self.recursion_depth += 1;
        if self.recursion_depth > self.options.max_recursion_depth {
            let message = format!(
                "Message too deep. Max recursion depth reached for tag '{}'",
                &xml[start..end]
            );
            return Err(Interrupt::Failed(self.report_failure(
                xml,
                &message,
                ParseErrorKind::RecursionDepthExceeded,
            )));
        }
        Ok(())
    }

    fn fail(&self, xml: &str, message: &str, kind: ParseErrorKind) -> Interrupt {
        Interrupt::Failed(self.report_failure(xml, message, kind))
    }

    /// A failure on an UNKNOWN token: outside of `finish_parse` it is a
    /// cancellation, otherwise a fatal error noting end-of-input when the
    /// cursor is exhausted.
    fn report_unknown(&self, xml: &str, message: &str, kind: ParseErrorKind) -> Interrupt {
        if !self.finishing {
            return Interrupt::Cancelled;
        }
        if self.pos >= xml.len() {
            let message = format!("Unexpected end of string. {message}");
            return Interrupt::Failed(self.report_failure(xml, &message, kind));
        }
        Interrupt::Failed(self.report_failure(xml, message, kind))
    }

    fn report_failure(&self, xml: &str, message: &str, kind: ParseErrorKind) -> ParseError {
        let mut begin = self.pos.saturating_sub(CONTEXT_LENGTH);
        while begin > 0 && !xml.is_char_boundary(begin) {
            begin -= 1;
        }
        let mut end = core::cmp::min(self.pos + CONTEXT_LENGTH, xml.len());
        while end < xml.len() && !xml.is_char_boundary(end) {
            end += 1;
        }
        Self::build_error(&xml[begin..end], self.pos - begin, message, kind)
    }

    /// Like [`report_failure`](Self::report_failure) for input that is not
    /// valid UTF-8.
    fn report_failure_lossy(&self, bytes: &[u8], message: &str, kind: ParseErrorKind) -> ParseError {
        let begin = self.pos.saturating_sub(CONTEXT_LENGTH);
        let end = core::cmp::min(self.pos + CONTEXT_LENGTH, bytes.len());
        let segment = String::from_utf8_lossy(&bytes[begin..end]);
        Self::build_error(&segment, self.pos - begin, message, kind)
    }

    fn build_error(segment: &str, caret: usize, message: &str, kind: ParseErrorKind) -> ParseError {
        let mut context = String::with_capacity(segment.len() + caret + 2);
        context.push_str(segment);
        context.push('\n');
        for _ in 0..caret {
            context.push(' ');
        }
        context.push('^');
        ParseError {
            kind,
            message: String::from(message),
            context,
        }
    }
}
