//! Record codec
//!
//! A record is one text line: `<key>=<value>\n`. Bytes that would break the
//! framing are backslash-escaped:
//!
//! | raw      | escaped |
//! |----------|---------|
//! | `\`      | `\\`    |
//! | `=`      | `\=`    |
//! | newline  | `\n`    |
//! | CR       | `\r`    |
//!
//! The first unescaped `=` splits key from value, and an encoded line never
//! contains a raw newline.
//!
//! Lines written before escaping was introduced are plain `key=value`. When a
//! line is not valid escaped text (for example a value holding `C:\dir`), it
//! is read in that plain form instead: split on the first `=`, no unescaping.

use crate::error::{CaskError, Result};

/// Separates key from value (and key from offset in the index file)
pub const SEPARATOR: u8 = b'=';

/// Terminates every record line
pub const DELIMITER: u8 = b'\n';

const ESCAPE: u8 = b'\\';

/// A key/value pair as stored in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: String,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Serialize to a complete line, delimiter included
    pub fn encode(&self) -> Vec<u8> {
        let mut line = Vec::with_capacity(self.key.len() + self.value.len() + 2);
        encode_line(&mut line, &self.key, &self.value);
        line
    }

    /// Parse a line with or without its trailing delimiter
    ///
    /// Falls back to the unescaped legacy form when the line is not valid
    /// escaped text.
    pub fn decode(line: &[u8]) -> Option<Self> {
        let (key, value) = decode_line(line).or_else(|| decode_legacy_line(line))?;
        Some(Self { key, value })
    }
}

/// Append `escape(left) = escape(right) \n` to `out`
pub(crate) fn encode_line(out: &mut Vec<u8>, left: &str, right: &str) {
    escape_into(out, left);
    out.push(SEPARATOR);
    escape_into(out, right);
    out.push(DELIMITER);
}

/// Split a line on its first unescaped separator and unescape both halves
pub(crate) fn decode_line(line: &[u8]) -> Option<(String, String)> {
    let line = line.strip_suffix(&[DELIMITER]).unwrap_or(line);

    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut seen_separator = false;
    let mut bytes = line.iter().copied();

    while let Some(byte) = bytes.next() {
        let out = if seen_separator { &mut right } else { &mut left };
        match byte {
            ESCAPE => {
                let unescaped = match bytes.next()? {
                    b'\\' => b'\\',
                    b'=' => b'=',
                    b'n' => b'\n',
                    b'r' => b'\r',
                    _ => return None,
                };
                out.push(unescaped);
            }
            SEPARATOR if !seen_separator => seen_separator = true,
            DELIMITER | b'\r' => return None,
            other => out.push(other),
        }
    }

    if !seen_separator {
        return None;
    }

    Some((String::from_utf8(left).ok()?, String::from_utf8(right).ok()?))
}

/// Split on the first `=` and take both halves verbatim
fn decode_legacy_line(line: &[u8]) -> Option<(String, String)> {
    let line = line.strip_suffix(&[DELIMITER]).unwrap_or(line);
    if line.contains(&DELIMITER) {
        return None;
    }

    let split = line.iter().position(|&byte| byte == SEPARATOR)?;
    let (key, value) = (&line[..split], &line[split + 1..]);
    Some((
        String::from_utf8(key.to_vec()).ok()?,
        String::from_utf8(value.to_vec()).ok()?,
    ))
}

fn escape_into(out: &mut Vec<u8>, text: &str) {
    for &byte in text.as_bytes() {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'=' => out.extend_from_slice(b"\\="),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            other => out.push(other),
        }
    }
}

/// Keys must be non-empty; values may be anything
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CaskError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}
