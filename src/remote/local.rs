//! Local filesystem helpers for cache files.
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;
use snafu::ResultExt;

use crate::error::{CacheIoSnafu, StorageResult};

/// Removes a temporary file on drop unless disarmed.
/// Used so a failed download never leaves a partial file behind.
pub(crate) struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Call after a successful rename.
    pub(crate) fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort; the caller is already reporting an error.
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Sibling path used while downloading into `target`.
pub(crate) fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    target.with_file_name(format!(".{name}.part.{}", std::process::id()))
}

pub(crate) fn create_parent_dir(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context(CacheIoSnafu {
            path: parent.to_path_buf(),
        })?;
    }
    Ok(())
}

/// Local modification time, or `None` if the file does not exist.
pub(crate) fn local_mtime(path: &Path) -> StorageResult<Option<DateTime<Utc>>> {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let modified = meta.modified().context(CacheIoSnafu {
                path: path.to_path_buf(),
            })?;
            Ok(Some(DateTime::<Utc>::from(modified)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).context(CacheIoSnafu {
            path: path.to_path_buf(),
        }),
    }
}

/// Set both access and modification time of `path` to exactly `t`.
pub(crate) fn set_local_mtime(path: &Path, t: DateTime<Utc>) -> StorageResult<()> {
    let ft = FileTime::from_unix_time(t.timestamp(), t.timestamp_subsec_nanos());
    filetime::set_file_times(path, ft, ft).context(CacheIoSnafu {
        path: path.to_path_buf(),
    })
}
