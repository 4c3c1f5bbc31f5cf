//! String pool extraction and NUL-terminated string helpers.

use std::collections::BTreeMap;

use serde::Serialize;

/// Printable ASCII runs of a payload, keyed by their starting byte offset.
///
/// Other tables refer to strings by a small integer that turns out to be an offset
/// into the string table payload, so lookups are by exact offset, not by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StringPool {
    entries: BTreeMap<usize, String>,
}

/// One printable run found in a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEntry {
    pub byte_offset: usize,
    pub text: String,
}

fn is_printable(byte: u8) -> bool {
    (32..=126).contains(&byte)
}

impl StringPool {
    /// Indexes every run of one or more printable bytes in `payload`.
    pub fn build(payload: &[u8]) -> Self {
        let entries = printable_runs(payload, 1)
            .map(|entry| (entry.byte_offset, entry.text))
            .collect();
        Self { entries }
    }

    /// The string starting exactly at `offset`, if any.
    pub fn get(&self, offset: usize) -> Option<&str> {
        self.entries.get(&offset).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Iterates printable runs of at least `min_len` bytes, in payload order.
pub fn printable_runs(payload: &[u8], min_len: usize) -> impl Iterator<Item = StringEntry> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos < payload.len() {
            if !is_printable(payload[pos]) {
                pos += 1;
                continue;
            }
            let start = pos;
            while pos < payload.len() && is_printable(payload[pos]) {
                pos += 1;
            }
            if pos - start >= min_len {
                // Printable ASCII is always valid UTF-8.
                let text = String::from_utf8_lossy(&payload[start..pos]).into_owned();
                return Some(StringEntry {
                    byte_offset: start,
                    text,
                });
            }
        }
        None
    })
}

/// Reads a NUL-terminated string starting at `start`.
///
/// Returns the text and its length in bytes (terminator excluded), or `None` when no
/// terminator exists before the end of `block`.
pub fn read_c_string(block: &[u8], start: usize) -> Option<(String, usize)> {
    let tail = block.get(start..)?;
    let len = tail.iter().position(|&byte| byte == 0)?;
    let text = String::from_utf8_lossy(&tail[..len]).into_owned();
    Some((text, len))
}

/// Advance after a string of `len` bytes in an 8-byte aligned string block.
///
/// Always moves to the next multiple of 8 strictly past `len`, which leaves room for
/// the terminator even when `len` is already aligned.
pub fn align8_step(len: usize) -> usize {
    len + (8 - len % 8)
}
