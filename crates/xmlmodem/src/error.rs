use alloc::string::String;

use thiserror::Error;

/// Stable identifier for each way a parse can fail.
///
/// The groups mirror where in the pipeline the failure was detected:
/// structural errors come from the element state machine, lexical errors
/// from string and text scanning, comment/declaration errors from prolog
/// handling, and envelope errors from the chunk driver itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseErrorKind {
    // Structural.
    ExpectedOpenTag,
    ExpectedCloseTag,
    ExpectedSlash,
    ExpectedEqualMark,
    ExpectedQuoteBeforeAttrValue,
    ExpectedSpaceOrCloseTag,
    ExpectedBeginKeyOrSlash,
    ExpectedEndTagSlash,
    ExpectedCloseInEndElement,
    ExpectedOpenTagInEndElement,
    ExpectedCloseTagInBeginElement,
    ExpectedTagName,
    ExpectedTagNameInEndTag,
    InvalidKey,
    InvalidTagName,
    InvalidEndTagName,
    TagNameNotMatch,

    // Lexical.
    InvalidText,
    ExpectedClosingQuote,
    IllegalHexString,
    InvalidEscapeSequence,
    MissingLowSurrogate,
    InvalidLowSurrogate,
    InvalidUnicode,

    // Comments and declarations.
    IllegalComment,
    ExpectedDashInComment,
    IllegalCloseComment,
    ExpectedCloseDashInComment,
    IllegalDeclaration,
    ExpectedQuestionMarkInComment,
    IllegalCloseDeclaration,
    ExpectedCloseQuestionMarkInDeclaration,

    // Envelope.
    NonUtf8,
    ParsingTerminatedBeforeEndOfInput,
    RecursionDepthExceeded,
}

/// A fatal parse failure.
///
/// Carries a stable [`ParseErrorKind`], a human-readable message, and a
/// context snippet of up to twenty bytes either side of the cursor with a
/// caret marking the failure position:
///
/// ```text
/// Tag name not match.
/// <root></true>
///        ^
/// ```
///
/// Cancellation — the parser running out of bytes mid-token between chunks —
/// is internal to the parser and never surfaces as a `ParseError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}\n{context}")]
pub struct ParseError {
    pub(crate) kind: ParseErrorKind,
    pub(crate) message: String,
    pub(crate) context: String,
}

impl ParseError {
    /// The stable failure code.
    #[must_use]
    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// The human-readable message, without the context snippet.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The formatted context snippet (`segment`, newline, caret line).
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }
}
