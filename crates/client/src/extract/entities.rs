//! Byte normalization at the fetch → parse boundary.

use std::fmt::Write;

/// Decode a response body and escape every non-ASCII character as a decimal
/// numeric character reference (`é` → `&#233;`).
///
/// The parser then only ever sees ASCII, so it cannot mis-guess the document
/// encoding; it decodes the references back when building text and
/// attribute values. Invalid UTF-8 sequences become U+FFFD.
pub fn encode_numeric_entities(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let _ = write!(out, "&#{};", u32::from(c));
        }
    }

    out
}
