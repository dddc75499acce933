//! Scan Module
//!
//! Linear AND/OR substring search over every record.
//!
//! ## Match Specification
//! ```text
//! [ ["dog", "Fido"], ["cat", "Felix"], "zebra" ]
//!      └── AND ──┘      └── AND ──┘     (one term)
//!   └──────────────────── OR ────────────────────┘
//! ```
//!
//! ## Sources
//! - Prefiltered: an injected [`LineFilter`] yields candidate lines
//! - Direct: the store file is read from offset 0
//!
//! Either way every line goes through the same [`Predicate`].

mod matcher;
mod prefilter;
mod source;

pub use matcher::{MatchSet, MatchSpec, Predicate, ScanItem, SelectMode, Selection};
pub use prefilter::{FilteredLines, GrepFilter, InProcessFilter, LineFilter, NoFilter};
pub use source::DirectLines;

use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::Result;
use crate::storage::PositionalFile;

/// Where an active scan reads its lines from
enum LineSource {
    Filtered(FilteredLines),
    Direct(DirectLines),
}

/// State of one begin/next/end cycle
pub(crate) struct ActiveScan {
    predicate: Predicate,
    mode: SelectMode,
    source: LineSource,
}

impl ActiveScan {
    /// Pick a source and prepare the predicate
    ///
    /// The prefilter is only tried for plain newline-delimited files.
    pub fn start(
        file: &mut PositionalFile,
        config: &StoreConfig,
        filter: &dyn LineFilter,
        spec: &MatchSpec,
        mode: SelectMode,
        case_sensitive: bool,
    ) -> Result<Self> {
        let predicate = Predicate::new(spec, case_sensitive);
        let size = file.seek_end()?;

        let filtered = if config.prefilter && config.record_delimiter == b"\n" {
            filter.spawn(file.path(), &predicate.patterns(), case_sensitive)?
        } else {
            None
        };

        let source = match filtered {
            Some(lines) => {
                debug!(filter = filter.name(), case_sensitive, "scan using prefilter");
                LineSource::Filtered(lines)
            }
            None => {
                debug!(size, case_sensitive, "scan reading file directly");
                file.seek_exact(0)?;
                LineSource::Direct(DirectLines::new(size))
            }
        };

        Ok(Self {
            predicate,
            mode,
            source,
        })
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self.source, LineSource::Filtered(_))
    }

    /// Next matching record, decoded per the scan mode
    pub fn next(&mut self, file: &mut PositionalFile, config: &StoreConfig) -> Result<Option<ScanItem>> {
        loop {
            let line = match &mut self.source {
                LineSource::Filtered(lines) => lines.next_line(&config.record_delimiter)?,
                LineSource::Direct(lines) => lines.next_line(file, &config.record_delimiter)?,
            };
            let Some(line) = line else {
                return Ok(None);
            };

            if let Some(item) = self.predicate.evaluate(&line, &config.field_delimiter, self.mode) {
                return Ok(Some(item));
            }
            trace!(len = line.len(), "line skipped");
        }
    }

    /// Release the prefilter process, if any
    pub fn close(&mut self) -> Result<()> {
        match &mut self.source {
            LineSource::Filtered(lines) => lines.close(),
            LineSource::Direct(_) => Ok(()),
        }
    }
}
