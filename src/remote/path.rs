use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StorageResult;
use crate::remote::cache::RemoteCache;
use crate::remote::RemoteId;

/// A path-like handle to a remote object that resolves to a local cache
/// file on demand.
///
/// Joining is pure. Only [`CachingPath::as_local_path`] performs I/O, and
/// only file objects are downloaded; directory prefixes are not cached.
#[derive(Debug, Clone)]
pub struct CachingPath {
    id: RemoteId,
    cache: Arc<RemoteCache>,
}

impl CachingPath {
    pub fn new(id: RemoteId, cache: Arc<RemoteCache>) -> Self {
        Self { id, cache }
    }

    pub fn parse(s: &str, cache: Arc<RemoteCache>) -> StorageResult<Self> {
        Ok(Self::new(RemoteId::parse(s)?, cache))
    }

    pub fn remote_id(&self) -> &RemoteId {
        &self.id
    }

    pub fn cache(&self) -> &Arc<RemoteCache> {
        &self.cache
    }

    pub fn name(&self) -> &str {
        self.id.name()
    }

    pub fn suffix(&self) -> &str {
        self.id.suffix()
    }

    /// Child handle sharing this handle's cache.
    pub fn join(&self, segment: &str) -> CachingPath {
        Self {
            id: self.id.join(segment),
            cache: self.cache.clone(),
        }
    }

    pub fn is_file(&self) -> StorageResult<bool> {
        self.cache.fs().is_file(&self.id)
    }

    pub fn exists(&self) -> StorageResult<bool> {
        self.cache.fs().exists(&self.id)
    }

    /// Local filesystem path for this object, refreshing the cache file
    /// first when the object is a file. Idempotent while the remote
    /// object is unchanged.
    pub fn as_local_path(&self) -> StorageResult<PathBuf> {
        if self.is_file()? {
            Ok(self.cache.resolve(&self.id)?.cache_path)
        } else {
            Ok(self.cache.cache_path(&self.id))
        }
    }
}

impl fmt::Display for CachingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}
