//! Store Module
//!
//! The public API over one store file.
//!
//! ## Responsibilities
//! - Encode keys and values before they touch the file
//! - Take the right advisory lock for each operation
//! - Route lookups through the Locator and changes through the RecordMutator
//! - Drive begin/next/end scans

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::codec;
use crate::config::{StoreConfig, SyncStrategy};
use crate::error::{FlatError, Result};
use crate::permissions::{PermissionSetter, PlatformPermissions};
use crate::scan::{
    ActiveScan, GrepFilter, LineFilter, MatchSpec, NoFilter, ScanItem, SelectMode, Selection,
};
use crate::storage::{Location, Locator, PositionalFile, Record, RecordMutator};

/// An open sorted key-value file
///
/// ## Concurrency Model
///
/// - Every method takes `&mut self`; one `Store` is one cursor and one lock
///   state, share it between threads only behind a mutex
/// - Across processes, all accessors coordinate through advisory locks:
///   shared for `get` and scans, exclusive for `put`/`del`/`reset`
/// - A lock taken for a single call is released on every exit path
pub struct Store {
    /// Store configuration
    config: StoreConfig,

    /// The store file
    file: PositionalFile,

    /// Scan accelerator
    filter: Arc<dyn LineFilter>,

    /// Applied after open and on `chmod()`
    permissions: Arc<dyn PermissionSetter>,

    /// Scan started by `begin()` and not yet ended
    scan: Option<ActiveScan>,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// Uses `grep` as the scan prefilter when `config.prefilter` is set and
    /// platform permissions.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let filter: Arc<dyn LineFilter> = if config.prefilter {
            Arc::new(GrepFilter::locate())
        } else {
            Arc::new(NoFilter)
        };
        Self::open_with(path, config, filter, Arc::new(PlatformPermissions))
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, StoreConfig::default())
    }

    /// Open with explicit collaborators
    pub fn open_with(
        path: impl AsRef<Path>,
        config: StoreConfig,
        filter: Arc<dyn LineFilter>,
        permissions: Arc<dyn PermissionSetter>,
    ) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let file = PositionalFile::open(path, config.seek_retries)?;

        let store = Self {
            config,
            file,
            filter,
            permissions,
            scan: None,
        };

        if let Err(e) = store.chmod() {
            warn!(path = %path.display(), "failed to apply mode {:o}: {}", store.config.mode, e);
        }

        info!(path = %path.display(), filter = store.filter.name(), "store opened");
        Ok(store)
    }

    /// Reapply the configured permission bits
    pub fn chmod(&self) -> Result<()> {
        self.permissions.apply(self.file.path(), self.config.mode)
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Get a value by key
    ///
    /// A missing key is `Ok(None)`.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let encoded_key = codec::encode(key);
        let mut file = self.file.locked(false)?;
        let mut locator = Locator::new(&mut file, &self.config);

        match locator.seek(&encoded_key)? {
            Location::Found(pos) => {
                let data = locator.read_data(pos)?;
                Ok(Some(codec::decode(&data)))
            }
            Location::Missing(_) => Ok(None),
        }
    }

    /// Insert or replace a key-value pair
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(FlatError::EmptyKey);
        }

        let record = Record::new(codec::encode(key), codec::encode(value));
        let config = &self.config;
        let mut file = self.file.locked(true)?;

        let mut locator = Locator::new(&mut file, config);
        let location = locator.seek(&record.key)?;
        let old_len = match location {
            Location::Found(pos) => locator
                .read_pair(pos)?
                .len(&config.field_delimiter, &config.record_delimiter),
            Location::Missing(_) => 0,
        };

        let bytes = record.to_bytes(&config.field_delimiter, &config.record_delimiter);
        debug!(?location, old_len, new_len = bytes.len(), "put");
        RecordMutator::new(&mut file, config).subst(location.position(), old_len, &bytes)
    }

    /// Delete a key
    ///
    /// Returns whether a record was removed; a missing key leaves the file
    /// untouched.
    pub fn del(&mut self, key: &[u8]) -> Result<bool> {
        if key.is_empty() {
            return Err(FlatError::EmptyKey);
        }

        let encoded_key = codec::encode(key);
        let config = &self.config;
        let mut file = self.file.locked(true)?;

        let mut locator = Locator::new(&mut file, config);
        let Location::Found(pos) = locator.seek(&encoded_key)? else {
            return Ok(false);
        };
        let old_len = locator
            .read_pair(pos)?
            .len(&config.field_delimiter, &config.record_delimiter);

        debug!(pos, old_len, "del");
        RecordMutator::new(&mut file, config).subst(pos, old_len, &[])?;
        Ok(true)
    }

    /// Remove every record
    pub fn reset(&mut self) -> Result<()> {
        let mut file = self.file.locked(true)?;
        file.truncate(0)?;
        if self.config.sync_strategy == SyncStrategy::EveryWrite {
            file.sync()?;
        }
        info!(path = %file.path().display(), "store reset");
        Ok(())
    }

    // =========================================================================
    // Scanning
    // =========================================================================

    /// Start an incremental scan
    ///
    /// Ends any unfinished scan first. The shared lock is held until `end()`.
    pub fn begin(&mut self, spec: &MatchSpec, mode: SelectMode, case_sensitive: bool) -> Result<()> {
        self.end()?;
        self.file.lock(false)?;

        match ActiveScan::start(
            &mut self.file,
            &self.config,
            self.filter.as_ref(),
            spec,
            mode,
            case_sensitive,
        ) {
            Ok(scan) => {
                self.scan = Some(scan);
                Ok(())
            }
            Err(e) => {
                if let Err(unlock_err) = self.file.unlock() {
                    warn!("failed to release scan lock: {}", unlock_err);
                }
                Err(e)
            }
        }
    }

    /// Next matching record of the active scan
    ///
    /// `Ok(None)` when drained or when no scan is active.
    pub fn next(&mut self) -> Result<Option<ScanItem>> {
        match self.scan.as_mut() {
            Some(scan) => scan.next(&mut self.file, &self.config),
            None => Ok(None),
        }
    }

    /// Finish the active scan and release the lock
    pub fn end(&mut self) -> Result<()> {
        let closed = match self.scan.take() {
            Some(mut scan) => scan.close(),
            None => Ok(()),
        };
        self.file.unlock()?;
        closed
    }

    /// Run a whole scan and collect its results
    pub fn select(&mut self, spec: &MatchSpec, mode: SelectMode, case_sensitive: bool) -> Result<Selection> {
        self.begin(spec, mode, case_sensitive)?;
        let collected = self.collect(mode);
        let ended = self.end();
        let selection = collected?;
        ended?;
        Ok(selection)
    }

    fn collect(&mut self, mode: SelectMode) -> Result<Selection> {
        let mut selection = Selection::empty(mode);
        while let Some(item) = self.next()? {
            selection.push(item);
        }
        Ok(selection)
    }

    /// Whether a scan is between `begin()` and `end()`
    pub fn is_scanning(&self) -> bool {
        self.scan.is_some()
    }

    /// Whether the active scan reads through the prefilter
    pub fn is_prefiltered(&self) -> bool {
        self.scan.as_ref().is_some_and(ActiveScan::is_filtered)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Close the store, ending any scan and releasing the lock
    pub fn close(mut self) -> Result<()> {
        self.end()?;
        info!(path = %self.file.path().display(), "store closed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Path the store was opened with
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Get the configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current size of the store file in bytes
    pub fn file_size(&mut self) -> Result<u64> {
        self.file.seek_end()
    }

    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.file_size()? == 0)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.end() {
            warn!(path = %self.file.path().display(), "failed to release store: {}", e);
        }
    }
}
