//! Scan prefilters
//!
//! A prefilter narrows the store file down to lines containing at least one
//! pattern before the shared predicate runs. It may return false positives
//! but never drops a matching line, so a scan yields the same records with or
//! without one.
//!
//! ## Implementations
//! - [`GrepFilter`]: external `grep -F` process reading the file
//! - [`InProcessFilter`]: the same filtering done in memory
//! - [`NoFilter`]: always unavailable, scans read the file directly

use std::env;
use std::fs;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, warn};

use crate::error::{FlatError, Result};
use crate::storage::find;

/// Directories searched for the filter program besides `$PATH`
const FALLBACK_DIRS: &[&str] = &[
    "/bin",
    "/sbin",
    "/usr/bin",
    "/usr/sbin",
    "/usr/share/bin",
    "/usr/local/bin",
];

/// Line-filtering capability used to accelerate scans
pub trait LineFilter: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Start filtering `path` for lines containing any of `patterns`
    ///
    /// `Ok(None)` means the filter is unavailable and the caller should read
    /// the file directly.
    fn spawn(
        &self,
        path: &Path,
        patterns: &[Vec<u8>],
        case_sensitive: bool,
    ) -> Result<Option<FilteredLines>>;
}

// =============================================================================
// Filtered Output
// =============================================================================

/// Newline-terminated output of a running prefilter
pub struct FilteredLines {
    reader: Box<dyn BufRead + Send>,
    child: Option<Child>,
}

impl FilteredLines {
    /// Wrap an in-memory or otherwise ready reader
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
        }
    }

    fn from_child(mut child: Child) -> Result<Self> {
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FlatError::Prefilter("filter process has no stdout".to_string()))?;
        Ok(Self {
            reader: Box::new(BufReader::new(stdout)),
            child: Some(child),
        })
    }

    /// Next line without its delimiter, or `None` once drained
    pub fn next_line(&mut self, delimiter: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(&last) = delimiter.last() else {
            return Err(FlatError::Prefilter("empty line delimiter".to_string()));
        };

        let mut line = Vec::new();
        loop {
            let n = self.reader.read_until(last, &mut line)?;
            if n == 0 {
                break;
            }
            if line.ends_with(delimiter) {
                line.truncate(line.len() - delimiter.len());
                return Ok(Some(line));
            }
        }

        if !line.is_empty() {
            return Ok(Some(line));
        }
        self.finish()?;
        Ok(None)
    }

    /// Reap a drained process; exit status 1 only means "no lines"
    fn finish(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            let status = child.wait()?;
            match status.code() {
                Some(0) | Some(1) => {}
                code => {
                    return Err(FlatError::Prefilter(format!(
                        "filter process exited with {:?}",
                        code
                    )))
                }
            }
        }
        Ok(())
    }

    /// Stop the process if it is still running and reap it
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                // Already-exited races surface as InvalidInput; nothing to do
                let _ = child.kill();
            }
            child.wait()?;
        }
        Ok(())
    }
}

impl Drop for FilteredLines {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close prefilter: {}", e);
        }
    }
}

// =============================================================================
// grep
// =============================================================================

/// Prefilter backed by an external `grep -F`
#[derive(Debug, Clone)]
pub struct GrepFilter {
    program: Option<PathBuf>,
}

impl GrepFilter {
    /// Look for `grep` on `$PATH` and the usual system directories
    pub fn locate() -> Self {
        let program = find_program("grep");
        debug!(?program, "located prefilter program");
        Self { program }
    }

    /// Use a specific program
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    pub fn program(&self) -> Option<&Path> {
        self.program.as_deref()
    }
}

impl Default for GrepFilter {
    fn default() -> Self {
        Self::locate()
    }
}

impl LineFilter for GrepFilter {
    fn name(&self) -> &str {
        "grep"
    }

    fn spawn(
        &self,
        path: &Path,
        patterns: &[Vec<u8>],
        case_sensitive: bool,
    ) -> Result<Option<FilteredLines>> {
        let Some(program) = &self.program else {
            return Ok(None);
        };
        if patterns.is_empty() {
            return Ok(None);
        }

        let mut command = Command::new(program);
        command.arg("-F").arg("-a");
        if !case_sensitive {
            command.arg("-i");
        }
        for pattern in patterns {
            // Encoded patterns are plain ASCII
            command.arg("-e").arg(String::from_utf8_lossy(pattern).as_ref());
        }
        command
            .arg("--")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        match command.spawn() {
            Ok(child) => FilteredLines::from_child(child).map(Some),
            Err(e) => {
                warn!(program = %program.display(), "prefilter unavailable: {}", e);
                Ok(None)
            }
        }
    }
}

fn find_program(name: &str) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).collect())
        .unwrap_or_default();
    dirs.extend(FALLBACK_DIRS.iter().map(PathBuf::from));

    dirs.into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// =============================================================================
// In-process
// =============================================================================

/// Prefilter that reads the file into memory and keeps candidate lines
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessFilter;

impl LineFilter for InProcessFilter {
    fn name(&self) -> &str {
        "in-process"
    }

    fn spawn(
        &self,
        path: &Path,
        patterns: &[Vec<u8>],
        case_sensitive: bool,
    ) -> Result<Option<FilteredLines>> {
        let content = fs::read(path)?;
        let patterns: Vec<Vec<u8>> = if case_sensitive {
            patterns.to_vec()
        } else {
            patterns.iter().map(|p| p.to_ascii_lowercase()).collect()
        };

        let mut out = Vec::with_capacity(content.len());
        for line in content.split_inclusive(|&b| b == b'\n') {
            let folded;
            let haystack = if case_sensitive {
                line
            } else {
                folded = line.to_ascii_lowercase();
                folded.as_slice()
            };
            let hit = patterns
                .iter()
                .any(|p| p.is_empty() || find(haystack, p).is_some());
            if hit {
                out.extend_from_slice(line);
            }
        }

        Ok(Some(FilteredLines::from_reader(Cursor::new(out))))
    }
}

/// Prefilter that is never available
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl LineFilter for NoFilter {
    fn name(&self) -> &str {
        "none"
    }

    fn spawn(&self, _path: &Path, _patterns: &[Vec<u8>], _case_sensitive: bool) -> Result<Option<FilteredLines>> {
        Ok(None)
    }
}
