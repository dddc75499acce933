//! Record Mutator
//!
//! In-place byte-span replacement. Insert, update and delete are all one
//! `subst` call: the tail of the file slides to its new offset and the file
//! is truncated when it shrinks.
//!
//! Callers must hold the exclusive lock.

use tracing::debug;

use crate::config::{StoreConfig, SyncStrategy};
use crate::error::{FlatError, Result};

use super::file::{PositionalFile, SeekMode};

/// Byte-span mutator over a [`PositionalFile`]
pub struct RecordMutator<'a> {
    file: &'a mut PositionalFile,
    config: &'a StoreConfig,
}

impl<'a> RecordMutator<'a> {
    pub fn new(file: &'a mut PositionalFile, config: &'a StoreConfig) -> Self {
        Self { file, config }
    }

    /// Copy `len` bytes from `read_pos` to `write_pos`
    ///
    /// The span is staged in memory, so the tail of the file must fit in RAM.
    pub fn shift(&mut self, read_pos: u64, write_pos: u64, len: u64) -> Result<()> {
        if read_pos == write_pos || len == 0 {
            return Ok(());
        }

        self.file.seek_exact(read_pos)?;
        let data = self.file.read(len as usize)?;
        if (data.len() as u64) < len {
            return Err(FlatError::InvalidState(format!(
                "shift wanted {} bytes at {}, file had {}",
                len,
                read_pos,
                data.len()
            )));
        }

        self.file.seek_set(write_pos, SeekMode::Extend)?;
        self.file.write(&data)?;
        Ok(())
    }

    /// Replace `old_len` bytes at `pos` with `new_data`
    pub fn subst(&mut self, pos: u64, old_len: u64, new_data: &[u8]) -> Result<()> {
        let new_len = new_data.len() as u64;
        let end = self.file.seek_end()?;

        let rest = end.checked_sub(pos).and_then(|r| r.checked_sub(old_len)).ok_or_else(|| {
            FlatError::InvalidState(format!(
                "illegal subst: {}+{} exceeds file size {} (new length {})",
                pos, old_len, end, new_len
            ))
        })?;

        debug!(pos, old_len, new_len, rest, "subst");

        if old_len != new_len {
            self.shift(pos + old_len, pos + new_len, rest)?;
            if new_len < old_len {
                self.file.truncate(end - (old_len - new_len))?;
            }
        }

        if new_len > 0 {
            self.file.seek_exact(pos)?;
            self.file.write(new_data)?;
        }

        if self.config.sync_strategy == SyncStrategy::EveryWrite {
            self.file.sync()?;
        }
        Ok(())
    }
}
