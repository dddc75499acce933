//! File permission setters
//!
//! Applied to the store file after every open.

use std::path::Path;

use crate::error::Result;

/// Applies permission bits to a file
pub trait PermissionSetter: Send + Sync {
    fn apply(&self, path: &Path, mode: u32) -> Result<()>;
}

/// Unix mode bits; does nothing on platforms without them
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformPermissions;

impl PermissionSetter for PlatformPermissions {
    #[cfg(unix)]
    fn apply(&self, path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn apply(&self, _path: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }
}

/// Leaves permissions untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermissions;

impl PermissionSetter for NoPermissions {
    fn apply(&self, _path: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }
}
