//! The remote object protocol the cache and container readers depend on.
use std::fmt::Debug;
use std::io::{Read, Seek};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use zarrs::storage::ReadableWritableListableStorage;

use crate::error::{StorageError, StorageResult};
use crate::remote::RemoteId;

/// A seekable byte stream over one object.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Where the modification time comes from when a backend has no direct
/// query for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MtimeFallback {
    /// Read this key from [`RemoteFs::info`] and parse it as a timestamp.
    MetadataField(String),
    /// The backend exposes no usable timestamp; resolution fails.
    Unavailable,
}

/// Synchronous access to a remote object store.
///
/// Every call performs its network operation at most once.
pub trait RemoteFs: Send + Sync + Debug {
    /// Protocol this backend serves, e.g. `"s3"`.
    fn protocol(&self) -> &str;

    /// Whether `id` names an existing object or directory prefix.
    fn exists(&self, id: &RemoteId) -> StorageResult<bool>;

    /// Whether `id` names an object (as opposed to a directory prefix).
    fn is_file(&self, id: &RemoteId) -> StorageResult<bool>;

    /// Direct modification time query. `Ok(None)` means the backend does
    /// not support it and [`RemoteFs::mtime_fallback`] applies.
    fn modified(&self, id: &RemoteId) -> StorageResult<Option<DateTime<Utc>>>;

    /// Generic object metadata.
    fn info(&self, id: &RemoteId) -> StorageResult<Map<String, Value>>;

    fn mtime_fallback(&self) -> MtimeFallback {
        MtimeFallback::Unavailable
    }

    /// Download the whole object to `local`, replacing any existing file.
    fn get(&self, id: &RemoteId, local: &Path) -> StorageResult<()>;

    /// Open a random-access byte stream over the object.
    fn open_stream(&self, id: &RemoteId) -> StorageResult<Box<dyn ReadSeek>>;

    /// Open a key-value store rooted at `id`; chunks are fetched on demand.
    fn open_mapped_store(
        &self,
        id: &RemoteId,
    ) -> StorageResult<ReadableWritableListableStorage>;
}

/// Modification time of `id`, falling back to the backend's metadata field.
pub fn remote_mtime(
    fs: &dyn RemoteFs,
    id: &RemoteId,
) -> StorageResult<DateTime<Utc>> {
    if let Some(t) = fs.modified(id)? {
        return Ok(t);
    }
    match fs.mtime_fallback() {
        MtimeFallback::MetadataField(key) => {
            let info = fs.info(id)?;
            let raw = info.get(&key).ok_or_else(|| {
                StorageError::MtimeUnavailable {
                    id: id.to_string(),
                    reason: format!("metadata has no '{key}' field"),
                }
            })?;
            parse_timestamp(raw).ok_or_else(|| StorageError::MtimeUnavailable {
                id: id.to_string(),
                reason: format!("unparseable '{key}' value {raw}"),
            })
        }
        MtimeFallback::Unavailable => Err(StorageError::MtimeUnavailable {
            id: id.to_string(),
            reason: format!(
                "protocol '{}' has no modification time source",
                fs.protocol()
            ),
        }),
    }
}

/// Parse an ISO-8601 / RFC 3339 string or a numeric epoch (seconds).
///
/// Strings without an offset are taken as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            Utc.timestamp_opt(whole as i64, nanos.min(999_999_999))
                .single()
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                return Some(t.with_timezone(&Utc));
            }
            const NAIVE: [&str; 3] = [
                "%Y-%m-%dT%H:%M:%S%.f",
                "%Y-%m-%d %H:%M:%S%.f",
                "%Y-%m-%dT%H:%M:%S",
            ];
            NAIVE.iter().find_map(|fmt| {
                NaiveDateTime::parse_from_str(s, fmt)
                    .ok()
                    .map(|t| t.and_utc())
            })
        }
        _ => None,
    }
}
