use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use futures::StreamExt;
use serde_json::{Map, Value};
use snafu::ResultExt;
use tracing::debug;
use url::Url;
use zarrs::storage::storage_adapter::async_to_sync::AsyncToSyncStorageAdapter;
use zarrs::storage::{
    AsyncReadableWritableListableStorage,
    ReadableWritableListableStorage,
};
use zarrs_object_store::AsyncObjectStore;
use zarrs_object_store::object_store;
use zarrs_object_store::object_store::path::Path as ObjectPath;
use zarrs_object_store::object_store::prefix::PrefixStore;
use zarrs_object_store::object_store::{ObjectMeta, ObjectStore};

use crate::config::Settings;
use crate::error::{
    CacheIoSnafu, ObjectStoreSnafu, StorageError, StorageResult,
};
use crate::remote::adapters::{RemoteRuntime, TimeoutStore, TokioBlockOn};
use crate::remote::fs::{MtimeFallback, ReadSeek, RemoteFs};
use crate::remote::local::{TempFileGuard, create_parent_dir, partial_path};
use crate::remote::RemoteId;

/// [`RemoteFs`] over any `object_store` backend (S3, GCS, Azure, HTTP,
/// local files, in-memory).
pub struct ObjectStoreFs {
    store: Arc<dyn ObjectStore>,
    protocol: String,
    /// Leading part of [`RemoteId::path`] that the store is rooted at
    /// (the bucket for bucketed protocols).
    root: String,
    direct_mtime: bool,
    fallback: MtimeFallback,
    rt: RemoteRuntime,
}

impl std::fmt::Debug for ObjectStoreFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreFs")
            .field("store", &self.store.to_string())
            .field("protocol", &self.protocol)
            .field("root", &self.root)
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl ObjectStoreFs {
    /// Wrap an existing store. `root` is the leading part of identifier
    /// paths that the store is rooted at (`""` when keys are full paths).
    pub fn new(
        store: Arc<dyn ObjectStore>,
        protocol: impl Into<String>,
        root: impl Into<String>,
        settings: &Settings,
    ) -> StorageResult<Self> {
        let protocol = protocol.into();
        let fallback = default_fallback(&protocol);
        Ok(Self {
            store,
            root: root.into().trim_matches('/').to_string(),
            protocol,
            direct_mtime: true,
            fallback,
            rt: RemoteRuntime::new(settings.fetch_timeout)?,
        })
    }

    /// Build a backend from a URL such as `s3://bucket` or `gs://bucket/prefix`.
    ///
    /// Supported schemes are those of `object_store::parse_url`.
    pub fn from_url(url: &str, settings: &Settings) -> StorageResult<Self> {
        let id = RemoteId::parse(url)?;
        let parsed = Url::parse(url).map_err(|e| StorageError::InvalidRemoteId {
            id: url.to_string(),
            msg: e.to_string(),
        })?;
        let (store, prefix) = object_store::parse_url(&parsed)
            .context(ObjectStoreSnafu { id: url })?;
        let prefix = prefix.as_ref().trim_matches('/');
        let root = id
            .path()
            .strip_suffix(prefix)
            .unwrap_or(id.path())
            .trim_end_matches('/')
            .to_string();
        debug!(url, root = %root, "opened object store backend");
        Self::new(Arc::from(store), id.protocol(), root, settings)
    }

    /// Take modification times from a metadata field instead of the
    /// store's native `last_modified`.
    pub fn with_metadata_mtime(mut self, key: impl Into<String>) -> Self {
        self.direct_mtime = false;
        self.fallback = MtimeFallback::MetadataField(key.into());
        self
    }

    fn key(&self, id: &RemoteId) -> StorageResult<ObjectPath> {
        if id.protocol() != self.protocol {
            return Err(StorageError::ProtocolMismatch {
                expected: self.protocol.clone(),
                got: id.protocol().to_string(),
            });
        }
        let path = id.path();
        if self.root.is_empty() {
            return Ok(ObjectPath::from(path));
        }
        match path.strip_prefix(self.root.as_str()) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => {
                Ok(ObjectPath::from(rest.trim_start_matches('/')))
            }
            _ => Err(StorageError::InvalidRemoteId {
                id: id.to_string(),
                msg: format!("outside backend root '{}'", self.root),
            }),
        }
    }

    fn head(&self, id: &RemoteId) -> StorageResult<Option<ObjectMeta>> {
        let key = self.key(id)?;
        let id_str = id.to_string();
        self.rt.block_on("head", &id_str, async {
            match self.store.head(&key).await {
                Ok(meta) => Ok(Some(meta)),
                Err(object_store::Error::NotFound { .. }) => Ok(None),
                Err(e) => Err(e).context(ObjectStoreSnafu { id: id_str.as_str() }),
            }
        })
    }

    fn head_existing(&self, id: &RemoteId) -> StorageResult<ObjectMeta> {
        self.head(id)?.ok_or_else(|| StorageError::RemoteObjectMissing {
            id: id.to_string(),
        })
    }
}

fn default_fallback(protocol: &str) -> MtimeFallback {
    match protocol {
        "gs" | "gcs" => MtimeFallback::MetadataField("updated".to_string()),
        _ => MtimeFallback::Unavailable,
    }
}

impl RemoteFs for ObjectStoreFs {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn exists(&self, id: &RemoteId) -> StorageResult<bool> {
        if self.head(id)?.is_some() {
            return Ok(true);
        }
        let key = self.key(id)?;
        let id_str = id.to_string();
        self.rt.block_on("list", &id_str, async {
            let listing = self
                .store
                .list_with_delimiter(Some(&key))
                .await
                .context(ObjectStoreSnafu { id: id_str.as_str() })?;
            Ok(!listing.objects.is_empty() || !listing.common_prefixes.is_empty())
        })
    }

    fn is_file(&self, id: &RemoteId) -> StorageResult<bool> {
        Ok(self.head(id)?.is_some())
    }

    fn modified(&self, id: &RemoteId) -> StorageResult<Option<DateTime<Utc>>> {
        if !self.direct_mtime {
            return Ok(None);
        }
        Ok(Some(self.head_existing(id)?.last_modified))
    }

    fn info(&self, id: &RemoteId) -> StorageResult<Map<String, Value>> {
        let meta = self.head_existing(id)?;
        let mut info = Map::new();
        info.insert("name".into(), Value::from(id.to_string()));
        info.insert("type".into(), Value::from("file"));
        info.insert("size".into(), Value::from(meta.size as u64));
        info.insert(
            "updated".into(),
            Value::from(meta.last_modified.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        if let Some(etag) = meta.e_tag {
            info.insert("etag".into(), Value::from(etag));
        }
        if let Some(version) = meta.version {
            info.insert("version".into(), Value::from(version));
        }
        Ok(info)
    }

    fn mtime_fallback(&self) -> MtimeFallback {
        self.fallback.clone()
    }

    fn get(&self, id: &RemoteId, local: &Path) -> StorageResult<()> {
        let key = self.key(id)?;
        let id_str = id.to_string();
        create_parent_dir(local)?;
        let mut guard = TempFileGuard::new(partial_path(local));
        let tmp = guard.path().to_path_buf();

        let written = self.rt.block_on("get", &id_str, async {
            let result = match self.store.get(&key).await {
                Ok(r) => r,
                Err(object_store::Error::NotFound { .. }) => {
                    return Err(StorageError::RemoteObjectMissing { id: id_str.clone() });
                }
                Err(e) => {
                    return Err(e).context(ObjectStoreSnafu { id: id_str.as_str() });
                }
            };
            let mut file = std::fs::File::create(&tmp)
                .context(CacheIoSnafu { path: tmp.clone() })?;
            let mut stream = result.into_stream();
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.context(ObjectStoreSnafu { id: id_str.as_str() })?;
                file.write_all(&chunk)
                    .context(CacheIoSnafu { path: tmp.clone() })?;
                written += chunk.len() as u64;
            }
            file.sync_all().context(CacheIoSnafu { path: tmp.clone() })?;
            Ok(written)
        })?;

        std::fs::rename(&tmp, local).context(CacheIoSnafu {
            path: local.to_path_buf(),
        })?;
        guard.disarm();
        debug!(id = %id_str, bytes = written, local = %local.display(), "downloaded object");
        Ok(())
    }

    fn open_stream(&self, id: &RemoteId) -> StorageResult<Box<dyn ReadSeek>> {
        let meta = self.head_existing(id)?;
        Ok(Box::new(ObjectReader {
            store: self.store.clone(),
            key: self.key(id)?,
            id: id.to_string(),
            size: meta.size as u64,
            pos: 0,
            rt: self.rt.clone(),
        }))
    }

    fn open_mapped_store(
        &self,
        id: &RemoteId,
    ) -> StorageResult<ReadableWritableListableStorage> {
        let prefix = self.key(id)?;
        let store = match self.rt.timeout() {
            Some(after) => Arc::new(TimeoutStore::new(self.store.clone(), after)) as Arc<dyn ObjectStore>,
            None => self.store.clone(),
        };
        let prefixed = PrefixStore::new(store, prefix);
        let async_store: AsyncReadableWritableListableStorage =
            Arc::new(AsyncObjectStore::new(prefixed));
        let sync_store = AsyncToSyncStorageAdapter::new(
            async_store,
            TokioBlockOn(self.rt.runtime()),
        );
        Ok(Arc::new(sync_store))
    }
}

/// Random-access reader issuing one ranged GET per `read` call.
struct ObjectReader {
    store: Arc<dyn ObjectStore>,
    key: ObjectPath,
    id: String,
    size: u64,
    pos: u64,
    rt: RemoteRuntime,
}

impl Read for ObjectReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let end = self.size.min(self.pos + buf.len() as u64);
        let range = self.pos..end;
        let bytes = self
            .rt
            .block_on("get_range", &self.id, async {
                self.store
                    .get_range(&self.key, range)
                    .await
                    .context(ObjectStoreSnafu { id: self.id.as_str() })
            })
            .map_err(io::Error::other)?;
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ObjectReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => Some(p),
            SeekFrom::End(off) => self.size.checked_add_signed(off),
            SeekFrom::Current(off) => self.pos.checked_add_signed(off),
        };
        match target {
            Some(p) => {
                self.pos = p;
                Ok(p)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of object",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fs::remote_mtime;
    use std::time::{Duration, Instant};

    use object_store::PutPayload;
    use object_store::memory::InMemory;
    use object_store::throttle::{ThrottleConfig, ThrottledStore};
    use zarrs::storage::{ReadableStorageTraits, StoreKey};

    fn memory_fs() -> (Arc<InMemory>, ObjectStoreFs) {
        let mem = Arc::new(InMemory::new());
        let fs = ObjectStoreFs::new(mem.clone(), "memory", "bucket", &Settings::default())
            .unwrap();
        (mem, fs)
    }

    fn put(fs: &ObjectStoreFs, mem: &InMemory, key: &str, body: &'static [u8]) {
        fs.rt
            .block_on("put", key, async {
                mem.put(&ObjectPath::from(key), PutPayload::from_static(body))
                    .await
                    .context(ObjectStoreSnafu { id: key })
            })
            .unwrap();
    }

    #[test]
    fn files_and_directories() {
        let (mem, fs) = memory_fs();
        put(&fs, &mem, "dir/a.h5ad", b"hello");
        let file = RemoteId::new("memory", "bucket/dir/a.h5ad");
        let dir = RemoteId::new("memory", "bucket/dir");
        let missing = RemoteId::new("memory", "bucket/nope");
        assert!(fs.exists(&file).unwrap());
        assert!(fs.is_file(&file).unwrap());
        assert!(fs.exists(&dir).unwrap());
        assert!(!fs.is_file(&dir).unwrap());
        assert!(!fs.exists(&missing).unwrap());
    }

    #[test]
    fn rejects_foreign_identifiers() {
        let (_mem, fs) = memory_fs();
        assert!(matches!(
            fs.is_file(&RemoteId::new("s3", "bucket/x")),
            Err(StorageError::ProtocolMismatch { .. })
        ));
        assert!(matches!(
            fs.is_file(&RemoteId::new("memory", "other/x")),
            Err(StorageError::InvalidRemoteId { .. })
        ));
    }

    #[test]
    fn get_downloads_whole_object() {
        let (mem, fs) = memory_fs();
        put(&fs, &mem, "a.bin", b"0123456789");
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("nested").join("a.bin");
        fs.get(&RemoteId::new("memory", "bucket/a.bin"), &local).unwrap();
        assert_eq!(std::fs::read(&local).unwrap(), b"0123456789");
        let leftovers: Vec<_> = std::fs::read_dir(local.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn get_missing_is_distinct_from_io_failure() {
        let (_mem, fs) = memory_fs();
        let dir = tempfile::tempdir().unwrap();
        let err = fs
            .get(&RemoteId::new("memory", "bucket/none"), &dir.path().join("none"))
            .unwrap_err();
        assert!(matches!(err, StorageError::RemoteObjectMissing { .. }));
    }

    #[test]
    fn stream_supports_seek_and_read() {
        let (mem, fs) = memory_fs();
        put(&fs, &mem, "a.bin", b"0123456789");
        let mut stream = fs.open_stream(&RemoteId::new("memory", "bucket/a.bin")).unwrap();
        stream.seek(SeekFrom::Start(6)).unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"6789");
        stream.seek(SeekFrom::End(-10)).unwrap();
        let mut head = [0u8; 3];
        stream.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"012");
        assert!(stream.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn metadata_fallback_matches_native_mtime() {
        let (mem, fs) = memory_fs();
        put(&fs, &mem, "a.bin", b"x");
        let id = RemoteId::new("memory", "bucket/a.bin");
        let native = remote_mtime(&fs, &id).unwrap();
        let fs = fs.with_metadata_mtime("updated");
        assert_eq!(fs.modified(&id).unwrap(), None);
        assert_eq!(remote_mtime(&fs, &id).unwrap(), native);
    }

    #[test]
    fn stalled_store_times_out_through_the_mapped_store() {
        let mem = InMemory::new();
        let config = ThrottleConfig {
            wait_get_per_call: Duration::from_secs(3600),
            wait_list_with_delimiter_per_call: Duration::from_secs(3600),
            ..ThrottleConfig::default()
        };
        let stalled = Arc::new(ThrottledStore::new(mem, config));
        let settings = Settings::default().with_fetch_timeout(Duration::from_millis(50));
        let fs = ObjectStoreFs::new(stalled, "memory", "bucket", &settings).unwrap();
        let id = RemoteId::new("memory", "bucket/pbmc.zarr");

        let started = Instant::now();
        let mapped = fs.open_mapped_store(&id).unwrap();
        assert!(mapped.get(&StoreKey::new("zarr.json").unwrap()).is_err());
        assert!(matches!(fs.exists(&id), Err(StorageError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[test]
    fn fallback_is_selected_per_protocol() {
        assert_eq!(
            default_fallback("gs"),
            MtimeFallback::MetadataField("updated".to_string())
        );
        assert_eq!(default_fallback("s3"), MtimeFallback::Unavailable);
    }
}
