//! Key/value codec
//!
//! Percent-style escaping that keeps every delimiter byte out of stored keys
//! and values.
//!
//! ## Alphabet
//! - `A-Z a-z 0-9 - _ . ~` are stored as-is
//! - every other byte is stored as `%XX` (uppercase hex)
//!
//! Decoding is lenient: a `%` that is not followed by two hex digits is kept
//! literally.

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Escape prefix
pub const ESCAPE: u8 = b'%';

/// True for bytes stored without escaping
pub fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~')
}

/// True for every byte that can occur in encoded output
pub fn is_encoded_byte(byte: u8) -> bool {
    is_unreserved(byte) || byte == ESCAPE
}

/// Encode arbitrary bytes into the delimiter-free form
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &byte in data {
        if is_unreserved(byte) {
            out.push(byte);
        } else {
            out.push(ESCAPE);
            out.push(HEX[(byte >> 4) as usize]);
            out.push(HEX[(byte & 0x0F) as usize]);
        }
    }
    out
}

/// Decode bytes produced by [`encode`]
pub fn decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        if data[i] == ESCAPE && i + 2 < data.len() {
            if let (Some(hi), Some(lo)) = (hex_value(data[i + 1]), hex_value(data[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(data[i]);
        i += 1;
    }
    out
}

/// True when `pos` falls inside an escape token of encoded `data`
///
/// Escape tokens are exactly three bytes and `%` never appears elsewhere, so
/// a position is mid-token when one of the two preceding bytes is `%`.
pub fn is_mid_token(data: &[u8], pos: usize) -> bool {
    (pos >= 1 && data[pos - 1] == ESCAPE) || (pos >= 2 && data[pos - 2] == ESCAPE)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
