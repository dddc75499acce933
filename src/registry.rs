//! Store Registry
//!
//! Caller-owned map from file path to one shared open [`Store`], for call
//! sites that address stores by file name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::scan::{MatchSpec, ScanItem, SelectMode, Selection};
use crate::store::Store;

/// Shared handle to a registered store
pub type SharedStore = Arc<Mutex<Store>>;

/// Registry of open stores keyed by canonical path
///
/// ## Concurrency:
/// - `stores`: Protected by a Mutex, held only while looking up or inserting
/// - Each store has its own Mutex; operations on different files don't contend
pub struct StoreRegistry {
    /// Config used for stores opened through the registry
    config: StoreConfig,

    /// Open stores
    stores: Mutex<HashMap<PathBuf, SharedStore>>,
}

impl StoreRegistry {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Return the registered store for `path`, opening it on first use
    pub fn open(&self, path: impl AsRef<Path>) -> Result<SharedStore> {
        let path = path.as_ref();
        let mut stores = self.stores.lock();

        if let Ok(canonical) = fs::canonicalize(path) {
            if let Some(store) = stores.get(&canonical) {
                return Ok(Arc::clone(store));
            }
        }

        let store = Store::open(path, self.config.clone())?;
        let canonical = fs::canonicalize(path)?;
        debug!(path = %canonical.display(), "registered store");

        let shared = Arc::new(Mutex::new(store));
        stores.insert(canonical, Arc::clone(&shared));
        Ok(shared)
    }

    // =========================================================================
    // File-name Convenience API
    // =========================================================================

    pub fn get(&self, path: impl AsRef<Path>, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.open(path)?.lock().get(key)
    }

    pub fn put(&self, path: impl AsRef<Path>, key: &[u8], value: &[u8]) -> Result<()> {
        self.open(path)?.lock().put(key, value)
    }

    pub fn del(&self, path: impl AsRef<Path>, key: &[u8]) -> Result<bool> {
        self.open(path)?.lock().del(key)
    }

    pub fn select(
        &self,
        path: impl AsRef<Path>,
        spec: &MatchSpec,
        mode: SelectMode,
        case_sensitive: bool,
    ) -> Result<Selection> {
        self.open(path)?.lock().select(spec, mode, case_sensitive)
    }

    /// Start an incremental scan on the store for `path`
    ///
    /// The scan state lives in the shared store, so `next`/`end` must name
    /// the same file.
    pub fn begin(
        &self,
        path: impl AsRef<Path>,
        spec: &MatchSpec,
        mode: SelectMode,
        case_sensitive: bool,
    ) -> Result<()> {
        self.open(path)?.lock().begin(spec, mode, case_sensitive)
    }

    pub fn next(&self, path: impl AsRef<Path>) -> Result<Option<ScanItem>> {
        self.open(path)?.lock().next()
    }

    pub fn end(&self, path: impl AsRef<Path>) -> Result<()> {
        self.open(path)?.lock().end()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Forget the store for `path`, closing it if no other handle remains
    ///
    /// Returns whether a store was registered.
    pub fn close(&self, path: impl AsRef<Path>) -> Result<bool> {
        let Ok(canonical) = fs::canonicalize(path.as_ref()) else {
            return Ok(false);
        };
        let removed = self.stores.lock().remove(&canonical);
        match removed {
            Some(shared) => {
                if let Ok(store) = Arc::try_unwrap(shared) {
                    store.into_inner().close()?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close every registered store
    pub fn close_all(&self) -> Result<()> {
        let drained: Vec<SharedStore> = self.stores.lock().drain().map(|(_, s)| s).collect();
        for shared in drained {
            if let Ok(store) = Arc::try_unwrap(shared) {
                store.into_inner().close()?;
            }
        }
        Ok(())
    }

    /// Number of registered stores
    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
