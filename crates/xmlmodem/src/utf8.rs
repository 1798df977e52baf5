//! Structural UTF-8 validation for the chunk driver.
//!
//! The parser only ever runs over the longest structurally valid UTF-8
//! prefix of the bytes it has accumulated; anything after that prefix stays
//! in the leftover buffer until more bytes arrive or the stream is finished.

use alloc::string::String;

/// Splits `bytes` into its longest structurally valid UTF-8 prefix and the
/// remaining tail. A multi-byte sequence truncated at the end of `bytes` is
/// part of the tail, not the prefix.
pub(crate) fn split_valid_prefix(bytes: &[u8]) -> (&str, &[u8]) {
    match core::str::from_utf8(bytes) {
        Ok(valid) => (valid, &[]),
        Err(err) => {
            let (head, tail) = bytes.split_at(err.valid_up_to());
            // The prefix up to `valid_up_to` is valid by construction.
            (core::str::from_utf8(head).unwrap_or(""), tail)
        }
    }
}

/// Whether `bytes` is entirely structurally valid UTF-8.
pub(crate) fn is_structurally_valid(bytes: &[u8]) -> bool {
    core::str::from_utf8(bytes).is_ok()
}

/// Copies `bytes` into a `String`, substituting `replacement` for every byte
/// that does not belong to a valid sequence.
pub(crate) fn replace_invalid(bytes: &[u8], replacement: &str) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    while !rest.is_empty() {
        let (valid, tail) = split_valid_prefix(rest);
        out.push_str(valid);
        if tail.is_empty() {
            break;
        }
        out.push_str(replacement);
        rest = &tail[1..];
    }
    out
}
