//! Read-side abstraction over the two container layouts.
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;

use crate::container::column_data::ColumnData;
use crate::container::format::ContainerFormat;
use crate::container::path::ElemPath;
use crate::error::{StorageError, StorageResult};
use crate::remote::ReadSeek;
use crate::subset::{IndexSet, runs};

/// What a path inside a container points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Group,
    Array { shape: Vec<u64>, dtype: String },
    Missing,
}

/// Hierarchical, read-only element access shared by the Zarr and HDF5
/// backends. Dtypes are reported with Zarr v3 identifiers.
pub(crate) trait ElementStore: Send + Sync {
    fn format(&self) -> ContainerFormat;

    fn kind(&self, path: &ElemPath) -> StorageResult<NodeKind>;

    /// Attributes of a group or array; empty when it has none.
    fn attrs(&self, path: &ElemPath) -> StorageResult<Map<String, Value>>;

    /// Names of the direct children of a group, sorted.
    fn children(&self, path: &ElemPath) -> StorageResult<Vec<String>>;

    /// Read the hyper-rectangle `ranges` (one range per dimension) of an
    /// array, flattened in row-major order.
    fn read_block(&self, path: &ElemPath, ranges: &[Range<u64>]) -> StorageResult<ColumnData>;
}

/// Fail with [`StorageError::ReadTooLarge`] when a block exceeds `max` elements.
pub(crate) fn check_read_size(
    path: &ElemPath,
    ranges: &[Range<u64>],
    max: usize,
) -> StorageResult<()> {
    let elems = ranges
        .iter()
        .map(|r| u128::from(r.end.saturating_sub(r.start)))
        .product::<u128>();
    if elems > max as u128 {
        return Err(StorageError::ReadTooLarge {
            element: path.to_string(),
            elems,
            max,
        });
    }
    Ok(())
}

pub(crate) fn array_info(
    store: &dyn ElementStore,
    path: &ElemPath,
) -> StorageResult<(Vec<u64>, String)> {
    match store.kind(path)? {
        NodeKind::Array { shape, dtype } => Ok((shape, dtype)),
        NodeKind::Group => Err(StorageError::backend_read(
            path.to_string(),
            "expected an array, found a group",
        )),
        NodeKind::Missing => Err(StorageError::backend_read(
            path.to_string(),
            "element does not exist",
        )),
    }
}

pub(crate) fn read_all(store: &dyn ElementStore, path: &ElemPath) -> StorageResult<ColumnData> {
    let (shape, _) = array_info(store, path)?;
    let ranges: Vec<Range<u64>> = shape.iter().map(|&n| 0..n).collect();
    store.read_block(path, &ranges)
}

/// Read the positions `index` of a one-dimensional array of length `len`,
/// one block per run of consecutive positions.
pub(crate) fn read_1d(
    store: &dyn ElementStore,
    path: &ElemPath,
    len: usize,
    index: &IndexSet,
) -> StorageResult<ColumnData> {
    let Some(positions) = index.as_slice() else {
        return store.read_block(path, &[0..len as u64]);
    };
    if let Some(&bad) = positions.iter().find(|&&p| p >= len) {
        return Err(StorageError::backend_read(
            path.to_string(),
            format!("position {bad} out of bounds for length {len}"),
        ));
    }
    let runs = runs(positions);
    debug!(element = %path, runs = runs.len(), "partial 1-d read");

    let mut out: Option<ColumnData> = None;
    for run in runs {
        let block = store.read_block(path, &[run.start as u64..run.end as u64])?;
        match out.as_mut() {
            None => out = Some(block),
            Some(acc) => {
                if !acc.try_extend(block) {
                    return Err(StorageError::backend_read(
                        path.to_string(),
                        "inconsistent dtype between blocks",
                    ));
                }
            }
        }
    }
    match out {
        Some(col) => Ok(col),
        None => {
            let (_, dtype) = array_info(store, path)?;
            ColumnData::empty_for_dtype(&dtype).ok_or_else(|| {
                StorageError::backend_read(path.to_string(), format!("unsupported dtype: {dtype}"))
            })
        }
    }
}

pub(crate) fn attr_str<'a>(attrs: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(Value::as_str)
}

/// `[rows, cols]` from a `shape`-style attribute.
pub(crate) fn attr_shape2(attrs: &Map<String, Value>, key: &str) -> Option<[usize; 2]> {
    let arr = attrs.get(key)?.as_array()?;
    match arr.as_slice() {
        [r, c] => Some([
            usize::try_from(r.as_u64()?).ok()?,
            usize::try_from(c.as_u64()?).ok()?,
        ]),
        _ => None,
    }
}

/// An open store plus, for random-access files, the byte stream it was
/// validated through. Both are released together.
pub(crate) struct OpenBackend {
    pub(crate) store: Arc<dyn ElementStore>,
    pub(crate) stream: Option<Box<dyn ReadSeek>>,
}

/// The single shared handle of one opened container. Element handles keep
/// an `Arc<Backend>` and fail with [`StorageError::Closed`] once it is
/// closed.
pub(crate) struct Backend {
    reference: String,
    state: RwLock<Option<OpenBackend>>,
}

impl Backend {
    pub(crate) fn new(reference: String, open: OpenBackend) -> Self {
        Self {
            reference,
            state: RwLock::new(Some(open)),
        }
    }

    pub(crate) fn reference(&self) -> &str {
        &self.reference
    }

    pub(crate) fn store(&self) -> StorageResult<Arc<dyn ElementStore>> {
        self.state
            .read()
            .as_ref()
            .map(|open| open.store.clone())
            .ok_or(StorageError::Closed)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.read().is_none()
    }

    /// Release the store and stream. Returns whether this call closed it.
    pub(crate) fn close(&self) -> bool {
        let taken = self.state.write().take();
        match taken {
            Some(open) => {
                let had_stream = open.stream.is_some();
                drop(open);
                debug!(reference = %self.reference, had_stream, "closed container backend");
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("reference", &self.reference)
            .field("format", &self.store().ok().map(|s| s.format()))
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_size_limit() {
        let p = ElemPath::parse("X");
        assert!(check_read_size(&p, &[0..10, 0..10], 100).is_ok());
        let err = check_read_size(&p, &[0..10, 0..11], 100).unwrap_err();
        assert!(matches!(err, StorageError::ReadTooLarge { elems: 110, .. }));
    }

    #[test]
    fn shape_attribute() {
        let attrs = serde_json::json!({"shape": [3, 4], "bad": [1]});
        let attrs = attrs.as_object().unwrap();
        assert_eq!(attr_shape2(attrs, "shape"), Some([3, 4]));
        assert_eq!(attr_shape2(attrs, "bad"), None);
        assert_eq!(attr_shape2(attrs, "missing"), None);
    }
}
