use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::{CacheNaming, Settings};
use crate::error::{StorageError, StorageResult};
use crate::remote::fs::{RemoteFs, remote_mtime};
use crate::remote::local::{local_mtime, set_local_mtime};
use crate::remote::RemoteId;

/// Maps remote objects to local cache files and keeps them fresh by
/// comparing modification times.
///
/// A refreshed cache file always carries the remote object's mtime, so
/// later freshness checks are exact comparisons.
#[derive(Debug, Clone)]
pub struct RemoteCache {
    fs: Arc<dyn RemoteFs>,
    cache_root: PathBuf,
    naming: CacheNaming,
}

/// Outcome of a successful [`RemoteCache::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub remote_id: RemoteId,
    pub cache_path: PathBuf,
    pub remote_mtime: DateTime<Utc>,
    /// Whether this call downloaded the object.
    pub refreshed: bool,
}

impl RemoteCache {
    pub fn new(fs: Arc<dyn RemoteFs>, settings: &Settings) -> Self {
        Self {
            fs,
            cache_root: settings.cache_root.clone(),
            naming: settings.cache_naming,
        }
    }

    pub fn fs(&self) -> &Arc<dyn RemoteFs> {
        &self.fs
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Local file backing `id`. Pure; does not touch the filesystem.
    ///
    /// With [`CacheNaming::Basename`] two objects with the same file name
    /// under different remote directories map to the same file.
    pub fn cache_path(&self, id: &RemoteId) -> PathBuf {
        match self.naming {
            CacheNaming::Basename => self.cache_root.join(id.name()),
            CacheNaming::Hashed => {
                let scope = id
                    .parent()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| format!("{}://", id.protocol()));
                let digest = format!("{:x}", Sha256::digest(scope.as_bytes()));
                self.cache_root.join(&digest[..16]).join(id.name())
            }
        }
    }

    /// Make sure the cache file for `id` exists and is not older than the
    /// remote object, downloading it when needed.
    pub fn resolve(&self, id: &RemoteId) -> StorageResult<CacheEntry> {
        self.refresh(id, false)
    }

    /// Like [`RemoteCache::resolve`], but with `force` always re-downloads.
    pub fn refresh(&self, id: &RemoteId, force: bool) -> StorageResult<CacheEntry> {
        if !self.fs.exists(id)? {
            return Err(StorageError::RemoteObjectMissing { id: id.to_string() });
        }
        let remote = remote_mtime(self.fs.as_ref(), id)?;
        let cache_path = self.cache_path(id);
        let local = local_mtime(&cache_path)?;

        let stale = match local {
            None => true,
            Some(local) => remote > local,
        };
        let refreshed = stale || force;
        if refreshed {
            info!(
                id = %id,
                cache = %cache_path.display(),
                forced = force,
                "refreshing cache file"
            );
            self.fs.get(id, &cache_path)?;
            set_local_mtime(&cache_path, remote)?;
        } else {
            debug!(id = %id, cache = %cache_path.display(), "cache is fresh");
        }

        let local = local_mtime(&cache_path)?.ok_or_else(|| StorageError::CacheIo {
            path: cache_path.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "cache file missing after refresh",
            ),
        })?;
        if local != remote {
            return Err(StorageError::CacheIntegrity {
                path: cache_path,
                local,
                remote,
            });
        }

        Ok(CacheEntry {
            remote_id: id.clone(),
            cache_path,
            remote_mtime: remote,
            refreshed,
        })
    }
}
