//! Locator
//!
//! Binary search over raw byte ranges of a sorted record file. There is no
//! index: every probe lands on an arbitrary byte offset and walks to the next
//! record delimiter to find a record boundary.

use std::cmp::Ordering;

use tracing::trace;

use crate::config::StoreConfig;
use crate::error::{FlatError, Result};

use super::file::{find, rfind, PositionalFile};
use super::record::{Location, Probe, Record};

/// Smallest block read while scanning forward for a delimiter
const MIN_SCAN_BLOCK: u64 = 4096;

/// Binary-search view over a [`PositionalFile`]
pub struct Locator<'a> {
    file: &'a mut PositionalFile,
    config: &'a StoreConfig,
}

impl<'a> Locator<'a> {
    pub fn new(file: &'a mut PositionalFile, config: &'a StoreConfig) -> Self {
        Self { file, config }
    }

    // =========================================================================
    // Record Reads
    // =========================================================================

    /// Read the comparable key of the record starting at `pos`
    ///
    /// At most `max_key_length` bytes are returned. A key longer than that is
    /// cut to its comparable prefix; a window that runs into a record
    /// delimiter or EOF before any field delimiter is a read-boundary error.
    pub fn read_key(&mut self, pos: u64) -> Result<Vec<u8>> {
        let config = self.config;
        self.file.seek_exact(pos)?;
        let (key, found) = self
            .file
            .read_until(&config.field_delimiter, config.max_key_length as u64)?;

        if find(&key, &config.record_delimiter).is_some() {
            return Err(FlatError::ReadBoundary(format!(
                "record at offset {} has no field delimiter",
                pos
            )));
        }
        if !found && key.len() < config.max_key_length {
            return Err(FlatError::ReadBoundary(format!(
                "no field delimiter within {} bytes at offset {}",
                config.max_key_length + config.field_delimiter.len(),
                pos
            )));
        }
        Ok(key)
    }

    /// Read the whole record starting at `pos`
    pub fn read_pair(&mut self, pos: u64) -> Result<Record> {
        let config = self.config;
        let end = self.file.seek_end()?;
        if pos >= end {
            return Err(FlatError::ReadBoundary(format!(
                "no record at offset {} (file size {})",
                pos, end
            )));
        }

        self.file.seek_exact(pos)?;
        let (line, terminated) = self.file.read_until(&config.record_delimiter, end - pos)?;
        if !terminated {
            return Err(FlatError::ReadBoundary(format!(
                "record at offset {} is not terminated",
                pos
            )));
        }

        let split = find(&line, &config.field_delimiter).ok_or_else(|| {
            FlatError::ReadBoundary(format!("record at offset {} has no field delimiter", pos))
        })?;
        let value = line[split + config.field_delimiter.len()..].to_vec();
        let mut key = line;
        key.truncate(split);
        Ok(Record::new(key, value))
    }

    /// Read the encoded value of the record starting at `pos`
    pub fn read_data(&mut self, pos: u64) -> Result<Vec<u8>> {
        Ok(self.read_pair(pos)?.value)
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    /// Byte-wise three-way comparison
    pub fn compare(a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    /// Classify `key` against the window bounds
    ///
    /// `end_key` is `None` when the window runs to end of file.
    pub fn probe(key: &[u8], start_key: &[u8], end_key: Option<&[u8]>) -> Probe {
        match Self::compare(key, start_key) {
            Ordering::Equal => return Probe::IsStart,
            Ordering::Less => return Probe::BeforeStart,
            Ordering::Greater => {}
        }

        match end_key.map(|end| Self::compare(key, end)) {
            Some(Ordering::Equal) => Probe::IsEnd,
            Some(Ordering::Greater) => Probe::AfterEnd,
            _ => Probe::Between,
        }
    }

    // =========================================================================
    // Binary Search
    // =========================================================================

    /// Find a record boundary roughly midway through `[start_pos, end_pos)`
    ///
    /// The result always follows a real record delimiter and lies strictly
    /// inside the range. `None` means the range holds a single record.
    pub fn middle(&mut self, start_pos: u64, end_pos: u64) -> Result<Option<u64>> {
        let config = self.config;
        let delimiter = config.record_delimiter.as_slice();
        let dlen = delimiter.len() as u64;
        if end_pos <= start_pos || end_pos - start_pos <= dlen {
            return Ok(None);
        }

        let middle_pos = start_pos + (end_pos - start_pos) / 2;
        if let Some(at) = self.find_forward(middle_pos, end_pos)? {
            let next_pos = at + dlen;
            if next_pos < end_pos {
                return Ok(Some(next_pos));
            }
        }

        // Back half is the tail of the last record. Only delimiters that
        // start before middle_pos are left.
        let front_len = middle_pos - start_pos;
        if front_len <= config.middle_buffer_size.max(2 * dlen) {
            let front_end = (middle_pos + dlen - 1).min(end_pos);
            self.file.seek_exact(start_pos)?;
            let chunk = self.file.read((front_end - start_pos) as usize)?;
            let split = rfind(&chunk, delimiter)
                .map(|offset| start_pos + offset as u64 + dlen)
                .filter(|&pos| pos < end_pos);
            return Ok(split);
        }

        Ok(self
            .middle(start_pos, middle_pos + dlen)?
            .filter(|&pos| pos < end_pos))
    }

    /// Locate `key` or the offset where it must be inserted
    ///
    /// Only the first `max_key_length` bytes of `key` take part.
    pub fn seek(&mut self, key: &[u8]) -> Result<Location> {
        let key = &key[..key.len().min(self.config.max_key_length)];

        let mut start_pos = 0;
        let mut end_pos = self.file.seek_end()?;
        if end_pos == 0 {
            return Ok(Location::Missing(0));
        }

        let mut start_key = self.read_key(start_pos)?;
        let mut end_key: Option<Vec<u8>> = None;

        loop {
            let probe = Self::probe(key, &start_key, end_key.as_deref());
            trace!(start_pos, end_pos, ?probe, "probe");
            match probe {
                Probe::IsStart => return Ok(Location::Found(start_pos)),
                Probe::BeforeStart => return Ok(Location::Missing(start_pos)),
                Probe::IsEnd => return Ok(Location::Found(end_pos)),
                Probe::AfterEnd => return Ok(Location::Missing(end_pos)),
                Probe::Between => {}
            }

            // A window without a split point is the single record at
            // start_pos, already known to sort before the key.
            let Some(middle_pos) = self.middle(start_pos, end_pos)? else {
                return Ok(Location::Missing(end_pos));
            };

            let middle_key = self.read_key(middle_pos)?;
            match Self::compare(key, &middle_key) {
                Ordering::Equal => return Ok(Location::Found(middle_pos)),
                Ordering::Less => {
                    end_pos = middle_pos;
                    end_key = Some(middle_key);
                }
                Ordering::Greater => {
                    start_pos = middle_pos;
                    start_key = middle_key;
                }
            }
        }
    }

    /// Offset of the first delimiter lying wholly inside `[from, to)`
    fn find_forward(&mut self, from: u64, to: u64) -> Result<Option<u64>> {
        let delimiter = self.config.record_delimiter.as_slice();
        let dlen = delimiter.len() as u64;
        let block = self.config.middle_buffer_size.max(MIN_SCAN_BLOCK).max(2 * dlen);

        let mut pos = from;
        while pos < to {
            let want = block.min(to - pos);
            self.file.seek_exact(pos)?;
            let chunk = self.file.read(want as usize)?;
            if let Some(i) = find(&chunk, delimiter) {
                return Ok(Some(pos + i as u64));
            }
            if (chunk.len() as u64) < want || pos + want >= to {
                break;
            }
            // Overlap so a delimiter split across blocks is still seen
            pos += want - (dlen - 1);
        }
        Ok(None)
    }
}
