//! PostgreSQL COPY text format encoding.
//!
//! One encoded line per row: tab-separated fields, `\N` for SQL NULL, and
//! the literal characters `\`, tab, newline and carriage return escaped so
//! the server-side decode restores the original bytes. Pre-hex-encoded
//! binary values are emitted as `\x<hex>` for `bytea` hex input.

/// A single field value, pre-shaped by the data pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyValue {
    /// SQL NULL.
    Null,

    /// An ordinary textual value; escaped on encode.
    Text(String),

    /// Hex digits of a binary value (`HEX(...)` from the source). Encoded
    /// as a `bytea` hex literal.
    Hex(String),
}

/// Encode one row as a COPY text line, including the trailing newline.
pub fn encode_row(values: &[CopyValue]) -> String {
    let mut line = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            line.push('\t');
        }
        match value {
            CopyValue::Null => line.push_str("\\N"),
            CopyValue::Hex(digits) => {
                // The field content is \x<hex>; the backslash itself must
                // be escaped on the wire.
                line.push_str("\\\\x");
                line.push_str(digits);
            }
            CopyValue::Text(text) => push_escaped(&mut line, text),
        }
    }
    line.push('\n');
    line
}

fn push_escaped(out: &mut String, field: &str) {
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
}
