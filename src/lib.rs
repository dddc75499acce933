//! # flatkv
//!
//! An embedded, file-backed, sorted key-value store:
//! - One plain text file, one record per line, sorted by encoded key
//! - Binary search over raw byte offsets (no index)
//! - In-place insert/update/delete by shifting the file tail
//! - AND/OR substring scans with an optional `grep` prefilter
//! - Cross-process coordination through advisory file locks
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Store (get / put / del)                      │
//! │             (begin / next / end / select)                    │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐                ┌─────────────────┐
//!   │     Locator     │                │      Scan       │
//!   │ (binary search) │                │ (AND/OR match)  │
//!   └────────┬────────┘                └───┬─────────┬───┘
//!            │                             │         │
//!            ▼                             │         ▼
//!   ┌─────────────────┐                    │  ┌─────────────┐
//!   │  RecordMutator  │                    │  │  Prefilter  │
//!   │     (subst)     │                    │  │   (grep)    │
//!   └────────┬────────┘                    │  └─────────────┘
//!            ▼                             ▼
//!   ┌─────────────────────────────────────────────────────┐
//!   │        PositionalFile (seek / read / write / lock)   │
//!   └─────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod storage;
pub mod scan;
pub mod permissions;
pub mod store;
pub mod registry;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{FlatError, Result};
pub use config::{StoreConfig, SyncStrategy};
pub use scan::{MatchSet, MatchSpec, ScanItem, SelectMode, Selection};
pub use store::Store;
pub use registry::StoreRegistry;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of flatkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
