//! Storage Module
//!
//! The on-disk engine: one plain file of sorted records, searched and
//! mutated in place.
//!
//! ## Responsibilities
//! - Verified positioning and looping I/O on the store file
//! - Advisory whole-file locking
//! - Binary search for a key or its insertion point (no index)
//! - Span replacement for insert/update/delete
//!
//! ## File Format
//! ```text
//! ┌──────────────┬─────┬────────────────┬─────┐
//! │ Encoded Key  │ \t  │ Encoded Value  │ \n  │   record 1
//! ├──────────────┼─────┼────────────────┼─────┤
//! │ Encoded Key  │ \t  │ Encoded Value  │ \n  │   record 2
//! └──────────────┴─────┴────────────────┴─────┘
//!   ... sorted ascending by encoded key, no header or footer
//! ```

mod file;
mod locator;
mod mutator;
mod record;

pub use file::{LockGuard, LockState, PositionalFile, SeekMode};
pub use locator::Locator;
pub use mutator::RecordMutator;
pub use record::{Location, Probe, Record};

pub(crate) use file::find;
