//! Record and search result types

use bytes::{BufMut, Bytes, BytesMut};

/// One stored record in its encoded form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Encoded key
    pub key: Vec<u8>,
    /// Encoded value
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// Exact on-disk length including both delimiters
    pub fn len(&self, field_delimiter: &[u8], record_delimiter: &[u8]) -> u64 {
        (self.key.len() + field_delimiter.len() + self.value.len() + record_delimiter.len()) as u64
    }

    /// On-disk bytes: `key + field_delimiter + value + record_delimiter`
    pub fn to_bytes(&self, field_delimiter: &[u8], record_delimiter: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.len(field_delimiter, record_delimiter) as usize);
        buf.put_slice(&self.key);
        buf.put_slice(field_delimiter);
        buf.put_slice(&self.value);
        buf.put_slice(record_delimiter);
        buf.freeze()
    }
}

/// Outcome of a binary search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The record starts at this offset
    Found(u64),
    /// The key is absent and belongs at this offset
    Missing(u64),
}

impl Location {
    pub fn is_found(&self) -> bool {
        matches!(self, Location::Found(_))
    }

    /// Record start or insertion offset
    pub fn position(&self) -> u64 {
        match *self {
            Location::Found(pos) | Location::Missing(pos) => pos,
        }
    }
}

/// Where a key falls relative to the current search window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Equal to the window's first key
    IsStart,
    /// Sorts before the window's first key
    BeforeStart,
    /// Equal to the key just past the window
    IsEnd,
    /// Sorts after the key just past the window
    AfterEnd,
    /// Strictly inside the window
    Between,
}
