use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use snafu::prelude::*;

use crate::subset::Axis;

/// Error type for cache resolution, container reads and subsetting.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display(
        "unsupported container format for {reference}: expected .h5ad, .zarr or .zrad suffix, not {suffix:?}"
    ))]
    UnsupportedFormat { reference: String, suffix: String },

    #[snafu(display("remote object does not exist: {id}"))]
    RemoteObjectMissing { id: String },

    #[snafu(display(
        "cache integrity violated for {}: local mtime {local} != remote mtime {remote}",
        path.display()
    ))]
    CacheIntegrity {
        path: PathBuf,
        local: DateTime<Utc>,
        remote: DateTime<Utc>,
    },

    #[snafu(display("failed to read element '{element}': {msg}"))]
    BackendRead { element: String, msg: String },

    #[snafu(display(
        "{axis} index {index} is out of range for length {len}"
    ))]
    IndexOutOfRange { axis: Axis, index: i64, len: usize },

    #[snafu(display("{axis} label '{label}' not found"))]
    UnknownLabel { axis: Axis, label: String },

    #[snafu(display(
        "{axis} boolean mask has length {got}, expected {expected}"
    ))]
    SelectorLength {
        axis: Axis,
        expected: usize,
        got: usize,
    },

    #[snafu(display("invalid {axis} selector: {msg}"))]
    InvalidSelector { axis: Axis, msg: String },

    #[snafu(display(
        "no modification time available for {id}: {reason}"
    ))]
    MtimeUnavailable { id: String, reason: String },

    #[snafu(display("{op} on {id} timed out after {after:?}"))]
    Timeout {
        op: &'static str,
        id: String,
        after: Duration,
    },

    #[snafu(display("invalid remote identifier '{id}': {msg}"))]
    InvalidRemoteId { id: String, msg: String },

    #[snafu(display(
        "backend serves protocol '{expected}', got identifier with '{got}'"
    ))]
    ProtocolMismatch { expected: String, got: String },

    #[snafu(display(
        "refusing to read {elems} elements from '{element}' (limit {max}); set LNDB_MAX_READ_ELEMS to override"
    ))]
    ReadTooLarge {
        element: String,
        elems: u128,
        max: usize,
    },

    #[snafu(display("container handle is closed"))]
    Closed,

    #[snafu(display(
        "{format} containers are not available in this build"
    ))]
    BackendUnavailable { format: String },

    #[snafu(display("local I/O error at {}: {source}", path.display()))]
    CacheIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("object store error for {id}: {source}"))]
    ObjectStore {
        id: String,
        #[snafu(source(from(zarrs_object_store::object_store::Error, Box::new)))]
        source: Box<zarrs_object_store::object_store::Error>,
    },

    #[snafu(display("failed to start runtime for remote I/O: {source}"))]
    Runtime { source: std::io::Error },
}

impl StorageError {
    pub(crate) fn backend_read(
        element: impl Into<String>,
        msg: impl std::fmt::Display,
    ) -> StorageError {
        StorageError::BackendRead {
            element: element.into(),
            msg: msg.to_string(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
