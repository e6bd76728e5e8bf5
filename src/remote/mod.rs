//! Remote objects and their local cache.
//!
//! - [`RemoteId`]: protocol-aware identifier (`s3://bucket/key`).
//! - [`RemoteFs`]: the synchronous object store protocol, implemented for
//!   every `object_store` backend by [`ObjectStoreFs`].
//! - [`RemoteCache`]: remote identifier to local file, refreshed by mtime.
//! - [`CachingPath`]: path-like handle that resolves through the cache.
pub(crate) mod adapters;
mod cache;
mod fs;
mod id;
pub(crate) mod local;
mod object_store_fs;
mod path;

pub use cache::{CacheEntry, RemoteCache};
pub use fs::{MtimeFallback, ReadSeek, RemoteFs, parse_timestamp, remote_mtime};
pub use id::RemoteId;
pub use object_store_fs::ObjectStoreFs;
pub use path::CachingPath;
