use alloc::string::String;

/// Configuration options for the XML stream parser.
///
/// # Examples
///
/// ```
/// use xmlmodem::ParserOptions;
///
/// let options = ParserOptions {
///     max_recursion_depth: 16,
///     ..Default::default()
/// };
/// assert!(!options.coerce_to_utf8);
/// ```
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Maximum nesting depth of object elements. XML nested deeper than this
    /// fails to parse. List elements do not count towards the depth.
    ///
    /// # Default
    ///
    /// `100`
    pub max_recursion_depth: usize,

    /// Whether to accept input that is not valid UTF-8, replacing each
    /// offending byte with [`utf8_replacement_character`].
    ///
    /// When `false`, input that is still structurally invalid at
    /// [`finish_parse`] fails with [`ParseErrorKind::NonUtf8`].
    ///
    /// [`utf8_replacement_character`]: Self::utf8_replacement_character
    /// [`finish_parse`]: crate::XmlParser::finish_parse
    /// [`ParseErrorKind::NonUtf8`]: crate::ParseErrorKind::NonUtf8
    ///
    /// # Default
    ///
    /// `false`
    pub coerce_to_utf8: bool,

    /// Replacement text substituted for each invalid byte when
    /// [`coerce_to_utf8`] is set.
    ///
    /// [`coerce_to_utf8`]: Self::coerce_to_utf8
    ///
    /// # Default
    ///
    /// `" "`
    pub utf8_replacement_character: String,

    /// Whether an input consisting solely of whitespace (or nothing at all)
    /// is accepted, producing an empty event stream. Without this flag a
    /// missing root element is an error at [`finish_parse`].
    ///
    /// [`finish_parse`]: crate::XmlParser::finish_parse
    ///
    /// # Default
    ///
    /// `false`
    pub allow_no_root_element: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: 100,
            coerce_to_utf8: false,
            utf8_replacement_character: String::from(" "),
            allow_no_root_element: false,
        }
    }
}

/// Configuration options for the XML writer.
#[derive(Debug, Clone, Default)]
pub struct WriterOptions {
    /// Indentation inserted per nesting level. A non-empty string enables
    /// pretty-printing; the default (empty) produces compact output.
    pub indent_string: String,

    /// Whether `render_bytes` uses the URL-safe base64 alphabet with padding
    /// instead of the standard alphabet.
    ///
    /// # Default
    ///
    /// `false`
    pub use_websafe_base64_for_bytes: bool,
}
