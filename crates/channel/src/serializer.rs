//! Event to JSON fragment serialization.
//!
//! Output is pure ASCII: control characters use the standard JSON escapes and
//! every non-ASCII character is written as `\uXXXX` (surrogate pairs above
//! the BMP). Values JSON cannot represent are rejected up front instead of
//! being silently rewritten to `null`.

use std::io::{self, Write};

use pulse_protocol::{Event, Value};
use serde::Serialize;
use serde_json::ser::Formatter;
use thiserror::Error;

/// Deepest nesting accepted inside one event.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializationFailure {
    #[error("non-finite number {0}")]
    NonFinite(f64),
    #[error("nesting exceeds {0} levels")]
    TooDeep(usize),
    #[error("encoding failed: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("field `{field}` cannot be serialized: {reason}")]
pub struct SerializationError {
    /// Path to the offending value, e.g. `request.headers[2].value`.
    pub field: String,
    pub reason: SerializationFailure,
}

/// Serialize `event` as a standalone JSON object.
pub fn serialize(event: &Event) -> Result<Vec<u8>, SerializationError> {
    let mut out = Vec::with_capacity(64 * event.len().max(1));
    serialize_into(&mut out, event)?;
    Ok(out)
}

/// Append the JSON object for `event` to `out`.
///
/// On error `out` is left exactly as it was.
pub fn serialize_into(out: &mut Vec<u8>, event: &Event) -> Result<(), SerializationError> {
    for (key, value) in event.iter() {
        validate(value, &mut key.to_owned(), 1)?;
    }

    let start = out.len();
    let mut ser = serde_json::Serializer::with_formatter(&mut *out, AsciiFormatter);
    if let Err(e) = event.serialize(&mut ser) {
        out.truncate(start);
        return Err(SerializationError {
            field: String::new(),
            reason: SerializationFailure::Encoding(e.to_string()),
        });
    }
    Ok(())
}

fn validate(value: &Value, path: &mut String, depth: usize) -> Result<(), SerializationError> {
    if depth > MAX_DEPTH {
        return Err(SerializationError {
            field: path.clone(),
            reason: SerializationFailure::TooDeep(MAX_DEPTH),
        });
    }

    match value {
        Value::Float(f) if !f.is_finite() => Err(SerializationError {
            field: path.clone(),
            reason: SerializationFailure::NonFinite(*f),
        }),
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                let len = path.len();
                path.push_str(&format!("[{i}]"));
                validate(item, path, depth + 1)?;
                path.truncate(len);
            }
            Ok(())
        }
        Value::Object(fields) => {
            for (key, item) in fields {
                let len = path.len();
                path.push('.');
                path.push_str(key);
                validate(item, path, depth + 1)?;
                path.truncate(len);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Compact formatter that escapes everything outside ASCII.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0u16; 2];
        let mut run_start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[run_start..idx])?;
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            run_start = idx + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[run_start..])
    }
}

#[cfg(test)]
#[path = "serializer_tests.rs"]
mod tests;
