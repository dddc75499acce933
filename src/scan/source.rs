//! Direct line source
//!
//! Reads delimiter-terminated lines straight from the store file, tracking
//! its own offset so lookups issued mid-scan don't disturb it.

use tracing::debug;

use crate::error::Result;
use crate::storage::{find, PositionalFile, SeekMode};

/// Bytes pulled from the file per refill
const REFILL_BLOCK: u64 = 64 * 1024;

/// Sequential reader over `[0, end)` of the store file
pub struct DirectLines {
    offset: u64,
    end: u64,
    buf: Vec<u8>,
    scanned: usize,
}

impl DirectLines {
    /// Read up to `end`, the file size when the scan began
    pub fn new(end: u64) -> Self {
        Self {
            offset: 0,
            end,
            buf: Vec::new(),
            scanned: 0,
        }
    }

    /// Next line without its delimiter, or `None` once drained
    pub fn next_line(&mut self, file: &mut PositionalFile, delimiter: &[u8]) -> Result<Option<Vec<u8>>> {
        loop {
            if let Some(i) = find(&self.buf[self.scanned..], delimiter) {
                let at = self.scanned + i;
                let line = self.buf[..at].to_vec();
                self.buf.drain(..at + delimiter.len());
                self.scanned = 0;
                return Ok(Some(line));
            }
            self.scanned = self.buf.len().saturating_sub(delimiter.len() - 1);

            if self.offset >= self.end {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                self.scanned = 0;
                return Ok(Some(std::mem::take(&mut self.buf)));
            }

            let want = REFILL_BLOCK.min(self.end - self.offset);
            let chunk = match file.seek_set(self.offset, SeekMode::Fail)? {
                Some(_) => file.read(want as usize)?,
                None => Vec::new(),
            };
            if chunk.is_empty() {
                // File shrank under us; the buffered tail is a cut record
                debug!(offset = self.offset, end = self.end, "store shrank during scan");
                self.end = self.offset;
                self.buf.clear();
                self.scanned = 0;
                continue;
            }
            self.offset += chunk.len() as u64;
            self.buf.extend_from_slice(&chunk);
        }
    }
}
