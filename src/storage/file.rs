//! Positional File
//!
//! Exclusive owner of one open store file: verified seeks, looping
//! reads/writes, advisory whole-file locks, truncate/extend.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use tracing::{debug, error, trace, warn};

use crate::error::{FlatError, Result};

/// Block size used by bounded delimiter reads
const READ_BLOCK: usize = 4096;

/// What `seek_set` does when the target lies past the end of the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekMode {
    /// Stop at the current end of file
    #[default]
    Clamp,

    /// Report failure to the caller as `Ok(None)`
    Fail,

    /// Treat as a broken invariant and return a `Seek` error
    Fatal,

    /// Zero-pad the file up to the target
    Extend,
}

/// Advisory lock currently held on the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Shared,
    Exclusive,
}

/// One open store file
pub struct PositionalFile {
    file: File,
    path: PathBuf,
    lock_state: LockState,
    seek_retries: usize,
}

impl PositionalFile {
    /// Open a file for reading and writing, creating it if absent
    pub fn open(path: &Path, seek_retries: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .map_err(|source| FlatError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            lock_state: LockState::Unlocked,
            seek_retries: seek_retries.max(1),
        })
    }

    /// Path the file was opened with
    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Positioning
    // =========================================================================

    /// Current cursor position
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    /// Move the cursor to the end and return the file size
    pub fn seek_end(&mut self) -> Result<u64> {
        Ok(self.file.seek(SeekFrom::End(0))?)
    }

    /// Position the cursor exactly at `pos`
    ///
    /// Every attempt is verified by reading the cursor back. Targets past the
    /// end of file are resolved by `mode`. Returns the resulting position, or
    /// `None` in [`SeekMode::Fail`] when the target is out of range.
    pub fn seek_set(&mut self, pos: u64, mode: SeekMode) -> Result<Option<u64>> {
        let mut target = pos;
        let end = self.seek_end()?;
        if target > end {
            match mode {
                SeekMode::Clamp => target = end,
                SeekMode::Fail => return Ok(None),
                SeekMode::Fatal => {
                    error!(pos, end, path = %self.path.display(), "seek outside of file size");
                    return Err(FlatError::Seek(format!(
                        "can't seek to {}: outside of file size {}",
                        pos, end
                    )));
                }
                SeekMode::Extend => {
                    debug!(from = end, to = target, "extending file with zero padding");
                    self.file.set_len(target)?;
                }
            }
        }

        for attempt in 0..self.seek_retries {
            self.file.seek(SeekFrom::Start(0))?;
            let reached = self.file.seek(SeekFrom::Start(target))?;
            if reached == target && self.position()? == target {
                return Ok(Some(target));
            }
            warn!(attempt, target, reached, "seek verification failed, retrying");
        }

        Err(FlatError::Seek(format!(
            "can't seek to {} after {} attempts",
            target, self.seek_retries
        )))
    }

    /// Seek that must land exactly on `pos`
    pub(crate) fn seek_exact(&mut self, pos: u64) -> Result<()> {
        match self.seek_set(pos, SeekMode::Fail)? {
            Some(_) => Ok(()),
            None => Err(FlatError::Seek(format!(
                "position {} is past the end of {}",
                pos,
                self.path.display()
            ))),
        }
    }

    // =========================================================================
    // Bounded I/O
    // =========================================================================

    /// Read up to `len` bytes from the cursor, stopping early only at EOF
    pub fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match self.file.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        data.truncate(filled);
        Ok(data)
    }

    /// Write all of `data` at the cursor
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut written = 0;
        while written < data.len() {
            match self.file.write(&data[written..]) {
                Ok(0) => {
                    return Err(FlatError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "file accepted no bytes",
                    )))
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.file.flush()?;
        Ok(written)
    }

    /// Read from the cursor up to `max` bytes, stopping before `delimiter`
    ///
    /// Returns the bytes and whether the delimiter was found. When found, the
    /// cursor is left just past the delimiter.
    pub fn read_until(&mut self, delimiter: &[u8], max: u64) -> Result<(Vec<u8>, bool)> {
        let start = self.position()?;
        let limit = max as usize + delimiter.len();
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let scan_from = buf.len().saturating_sub(delimiter.len().saturating_sub(1));
            let want = READ_BLOCK.min(limit - buf.len());
            let chunk = if want > 0 { self.read(want)? } else { Vec::new() };
            let at_eof = chunk.len() < want;
            buf.extend_from_slice(&chunk);

            if let Some(i) = find(&buf[scan_from..], delimiter) {
                let i = scan_from + i;
                buf.truncate(i);
                self.seek_exact(start + (i + delimiter.len()) as u64)?;
                return Ok((buf, true));
            }

            if at_eof || buf.len() >= limit {
                buf.truncate(max as usize);
                self.seek_exact(start + buf.len() as u64)?;
                return Ok((buf, false));
            }
        }
    }

    /// Resize the file
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        trace!(len, "truncating");
        self.file.set_len(len)?;
        Ok(())
    }

    /// Flush file data to the device
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    // =========================================================================
    // Advisory Locking
    // =========================================================================

    /// Current advisory lock
    pub fn lock_state(&self) -> LockState {
        self.lock_state
    }

    /// Take a whole-file lock, blocking until it is granted
    pub fn lock(&mut self, exclusive: bool) -> Result<()> {
        let wanted = if exclusive {
            LockState::Exclusive
        } else {
            LockState::Shared
        };
        if self.lock_state != wanted {
            sys::lock(&self.file, exclusive)?;
            self.lock_state = wanted;
        }
        Ok(())
    }

    /// Release the whole-file lock
    pub fn unlock(&mut self) -> Result<()> {
        if self.lock_state != LockState::Unlocked {
            sys::unlock(&self.file)?;
            self.lock_state = LockState::Unlocked;
        }
        Ok(())
    }

    /// Hold a lock for the lifetime of the returned guard
    ///
    /// An already held lock that is at least as strong is reused. Dropping
    /// the guard restores the state that was in place before.
    pub fn locked(&mut self, exclusive: bool) -> Result<LockGuard<'_>> {
        let previous = self.lock_state;
        let sufficient = match previous {
            LockState::Exclusive => true,
            LockState::Shared => !exclusive,
            LockState::Unlocked => false,
        };
        if !sufficient {
            self.lock(exclusive)?;
        }
        Ok(LockGuard {
            file: self,
            previous,
        })
    }
}

/// Scoped advisory lock over a [`PositionalFile`]
pub struct LockGuard<'a> {
    file: &'a mut PositionalFile,
    previous: LockState,
}

impl Deref for LockGuard<'_> {
    type Target = PositionalFile;

    fn deref(&self) -> &PositionalFile {
        &*self.file
    }
}

impl DerefMut for LockGuard<'_> {
    fn deref_mut(&mut self) -> &mut PositionalFile {
        &mut *self.file
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.file.lock_state == self.previous {
            return;
        }
        let restored = match self.previous {
            LockState::Unlocked => self.file.unlock(),
            LockState::Shared => self.file.lock(false),
            LockState::Exclusive => self.file.lock(true),
        };
        if let Err(e) = restored {
            warn!(path = %self.file.path.display(), "failed to restore lock state: {}", e);
        }
    }
}

/// First occurrence of `needle` in `haystack`
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Last occurrence of `needle` in `haystack`
pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

// =============================================================================
// Platform Locking
// =============================================================================

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io;
    use std::os::unix::io::AsRawFd;

    fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
        loop {
            // SAFETY: the descriptor is owned by `file` and stays open for the call
            let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    pub fn lock(file: &File, exclusive: bool) -> io::Result<()> {
        flock(file, if exclusive { libc::LOCK_EX } else { libc::LOCK_SH })
    }

    pub fn unlock(file: &File) -> io::Result<()> {
        flock(file, libc::LOCK_UN)
    }
}

#[cfg(not(unix))]
mod sys {
    use std::fs::File;
    use std::io;

    pub fn lock(_file: &File, _exclusive: bool) -> io::Result<()> {
        tracing::trace!("advisory locking unavailable on this platform");
        Ok(())
    }

    pub fn unlock(_file: &File) -> io::Result<()> {
        Ok(())
    }
}
