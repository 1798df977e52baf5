//! JSON-style string escaping used when emitting XML attribute values and
//! text content.
//!
//! The writer and the parser agree on this escape dialect: control
//! characters use their short escapes, `<` and `>` are written as unicode
//! escapes so emitted values can never open a tag, and characters outside
//! the basic multilingual plane are written as UTF-16 surrogate-pair escapes
//! that the parser folds back into a single code point.

use core::fmt;

pub(crate) const MIN_HIGH_SURROGATE: u32 = 0xD800;
pub(crate) const MAX_HIGH_SURROGATE: u32 = 0xDBFF;
pub(crate) const MIN_LOW_SURROGATE: u32 = 0xDC00;
pub(crate) const MAX_LOW_SURROGATE: u32 = 0xDFFF;
pub(crate) const MIN_SUPPLEMENTARY_CODE_POINT: u32 = 0x10000;

/// Writes `src` to `f` with all characters that could corrupt an XML
/// attribute value or text run escaped.
pub(crate) fn write_escaped_string<W: fmt::Write>(src: &str, f: &mut W) -> fmt::Result {
    for c in src.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '<' => f.write_str("\\u003c")?,
            '>' => f.write_str("\\u003e")?,
            '\u{0008}' => f.write_str("\\b")?,
            '\t' => f.write_str("\\t")?,
            '\n' => f.write_str("\\n")?,
            '\u{000B}' => f.write_str("\\v")?,
            '\u{000C}' => f.write_str("\\f")?,
            '\r' => f.write_str("\\r")?,
            // Unicode line separators break pre-2019 JSON-dialect consumers.
            '\u{2028}' | '\u{2029}' => write!(f, "\\u{:04x}", c as u32)?,
            c if (c as u32) < 0x20 => write!(f, "\\u{:04x}", c as u32)?,
            c if (c as u32) >= MIN_SUPPLEMENTARY_CODE_POINT => {
                let v = c as u32 - MIN_SUPPLEMENTARY_CODE_POINT;
                let high = MIN_HIGH_SURROGATE + (v >> 10);
                let low = MIN_LOW_SURROGATE + (v & 0x3FF);
                write!(f, "\\u{high:04x}\\u{low:04x}")?;
            }
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Convenience wrapper around [`write_escaped_string`] returning a `String`.
#[cfg(test)]
pub(crate) fn escape_string(src: &str) -> alloc::string::String {
    let mut result = alloc::string::String::with_capacity(src.len());
    write_escaped_string(src, &mut result).expect("writing to a String cannot fail");
    result
}
