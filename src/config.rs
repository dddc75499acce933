//! Configuration for flatkv
//!
//! Centralized store configuration with sensible defaults.

use crate::codec;
use crate::error::{FlatError, Result};
use crate::storage::find;

/// Default maximum number of encoded key bytes used for comparison
pub const DEFAULT_MAX_KEY_LENGTH: usize = 1024;

/// Default front-half size below which `middle()` reads the chunk whole
pub const DEFAULT_MIDDLE_BUFFER_SIZE: u64 = 10240;

/// Default number of verified seek attempts
pub const DEFAULT_SEEK_RETRIES: usize = 10;

/// Configuration for a single store file
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // -------------------------------------------------------------------------
    // Record Format
    // -------------------------------------------------------------------------
    /// Terminates every record (default `\n`)
    pub record_delimiter: Vec<u8>,

    /// Separates the encoded key from the encoded value (default `\t`)
    pub field_delimiter: Vec<u8>,

    /// Encoded key bytes that take part in comparisons
    pub max_key_length: usize,

    // -------------------------------------------------------------------------
    // File Configuration
    // -------------------------------------------------------------------------
    /// Permission bits applied after every open
    pub mode: u32,

    /// Durability of each mutation
    pub sync_strategy: SyncStrategy,

    // -------------------------------------------------------------------------
    // Locator Tuning
    // -------------------------------------------------------------------------
    /// Front-half size (bytes) that `middle()` reads whole instead of recursing
    pub middle_buffer_size: u64,

    /// Attempts made by `seek_set` before giving up
    pub seek_retries: usize,

    // -------------------------------------------------------------------------
    // Scan Configuration
    // -------------------------------------------------------------------------
    /// Try the external line filter before falling back to a direct read
    pub prefilter: bool,
}

/// Sync strategy applied after each substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStrategy {
    /// Leave written bytes in the OS page cache
    OsBuffered,

    /// fdatasync after every mutation (safest, slowest)
    EveryWrite,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            record_delimiter: b"\n".to_vec(),
            field_delimiter: b"\t".to_vec(),
            max_key_length: DEFAULT_MAX_KEY_LENGTH,
            mode: 0o644,
            sync_strategy: SyncStrategy::OsBuffered,
            middle_buffer_size: DEFAULT_MIDDLE_BUFFER_SIZE,
            seek_retries: DEFAULT_SEEK_RETRIES,
            prefilter: true,
        }
    }
}

impl StoreConfig {
    /// Create a new config builder
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Check that the delimiters can never appear inside encoded data
    pub fn validate(&self) -> Result<()> {
        for (name, delimiter) in [
            ("record", &self.record_delimiter),
            ("field", &self.field_delimiter),
        ] {
            if delimiter.is_empty() {
                return Err(FlatError::Config(format!("{} delimiter is empty", name)));
            }
            if let Some(byte) = delimiter.iter().find(|b| codec::is_encoded_byte(**b)) {
                return Err(FlatError::Config(format!(
                    "{} delimiter contains byte 0x{:02X} which may appear in encoded data",
                    name, byte
                )));
            }
        }

        if find(&self.record_delimiter, &self.field_delimiter).is_some()
            || find(&self.field_delimiter, &self.record_delimiter).is_some()
        {
            return Err(FlatError::Config(
                "record and field delimiters must not overlap".to_string(),
            ));
        }

        if self.max_key_length == 0 {
            return Err(FlatError::Config("max_key_length must be positive".to_string()));
        }

        if self.seek_retries == 0 {
            return Err(FlatError::Config("seek_retries must be positive".to_string()));
        }

        Ok(())
    }
}

/// Builder for StoreConfig
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the record delimiter
    pub fn record_delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.config.record_delimiter = delimiter.into();
        self
    }

    /// Set the key/value delimiter
    pub fn field_delimiter(mut self, delimiter: impl Into<Vec<u8>>) -> Self {
        self.config.field_delimiter = delimiter.into();
        self
    }

    /// Set the number of encoded key bytes used for comparison
    pub fn max_key_length(mut self, len: usize) -> Self {
        self.config.max_key_length = len;
        self
    }

    /// Set the permission bits applied on open
    pub fn mode(mut self, mode: u32) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the sync strategy
    pub fn sync_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.config.sync_strategy = strategy;
        self
    }

    /// Set the `middle()` whole-read threshold (in bytes)
    pub fn middle_buffer_size(mut self, size: u64) -> Self {
        self.config.middle_buffer_size = size;
        self
    }

    /// Set the number of verified seek attempts
    pub fn seek_retries(mut self, retries: usize) -> Self {
        self.config.seek_retries = retries;
        self
    }

    /// Enable or disable the external scan prefilter
    pub fn prefilter(mut self, enabled: bool) -> Self {
        self.config.prefilter = enabled;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
