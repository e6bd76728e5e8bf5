use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::group::Group;
use zarrs::storage::{
    ListableStorageTraits, ReadableStorageTraits, ReadableWritableListableStorage,
    ReadableWritableListableStorageTraits, StoreKey, StorePrefix,
};

use crate::container::column_data::ColumnData;
use crate::container::format::ContainerFormat;
use crate::container::path::ElemPath;
use crate::container::store::{ElementStore, NodeKind, check_read_size};
use crate::error::{StorageError, StorageResult};

type ZarrArray = Array<dyn ReadableWritableListableStorageTraits>;

/// Node type declared by the metadata document at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeMeta {
    Array,
    Group,
}

/// Zarr (v2 or v3) container over any zarrs storage: a local directory or
/// a remote prefix mapped through an object store.
pub(crate) struct ZarrStore {
    storage: ReadableWritableListableStorage,
    max_read_elems: usize,
}

impl ZarrStore {
    pub(crate) fn new(storage: ReadableWritableListableStorage, max_read_elems: usize) -> Self {
        Self {
            storage,
            max_read_elems,
        }
    }

    pub(crate) fn open_local(path: &Path, max_read_elems: usize) -> StorageResult<Self> {
        let store = zarrs::filesystem::FilesystemStore::new(path)
            .map_err(|e| StorageError::backend_read(path.display().to_string(), e))?;
        Ok(Self::new(Arc::new(store), max_read_elems))
    }

    fn open_array(&self, path: &ElemPath) -> StorageResult<ZarrArray> {
        Array::open(self.storage.clone(), &path.to_node_path())
            .map_err(|e| StorageError::backend_read(path.to_string(), e))
    }

    fn metadata_key(path: &ElemPath, name: &str) -> StorageResult<StoreKey> {
        let key = if path.is_root() {
            name.to_string()
        } else {
            format!("{}/{name}", path.components().join("/"))
        };
        StoreKey::new(key).map_err(|e| StorageError::backend_read(path.to_string(), e))
    }

    fn has_key(&self, path: &ElemPath, name: &str) -> StorageResult<bool> {
        let key = Self::metadata_key(path, name)?;
        let bytes = self
            .storage
            .get(&key)
            .map_err(|e| StorageError::backend_read(path.to_string(), e))?;
        Ok(bytes.is_some())
    }

    /// Look up the v3 `zarr.json`, then the v2 `.zarray`/`.zgroup`. Only an
    /// absent document means the node is missing; storage failures and
    /// unreadable metadata are errors.
    fn node_meta(&self, path: &ElemPath) -> StorageResult<Option<NodeMeta>> {
        let key = Self::metadata_key(path, "zarr.json")?;
        let v3 = self
            .storage
            .get(&key)
            .map_err(|e| StorageError::backend_read(path.to_string(), e))?;
        if let Some(bytes) = v3 {
            let doc: Value = serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::backend_read(path.to_string(), format!("invalid zarr.json: {e}"))
            })?;
            return match doc.get("node_type").and_then(Value::as_str) {
                Some("array") => Ok(Some(NodeMeta::Array)),
                Some("group") => Ok(Some(NodeMeta::Group)),
                other => Err(StorageError::backend_read(
                    path.to_string(),
                    format!("zarr.json has unknown node_type {other:?}"),
                )),
            };
        }
        if self.has_key(path, ".zarray")? {
            return Ok(Some(NodeMeta::Array));
        }
        if self.has_key(path, ".zgroup")? {
            return Ok(Some(NodeMeta::Group));
        }
        Ok(None)
    }

    fn open_group(&self, path: &ElemPath) -> StorageResult<Group<dyn ReadableWritableListableStorageTraits>> {
        Group::open(self.storage.clone(), &path.to_node_path())
            .map_err(|e| StorageError::backend_read(path.to_string(), e))
    }

    fn prefix(path: &ElemPath) -> StorageResult<StorePrefix> {
        if path.is_root() {
            return Ok(StorePrefix::root());
        }
        StorePrefix::new(format!("{}/", path.components().join("/")))
            .map_err(|e| StorageError::backend_read(path.to_string(), e))
    }
}

impl ElementStore for ZarrStore {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Zarr
    }

    fn kind(&self, path: &ElemPath) -> StorageResult<NodeKind> {
        match self.node_meta(path)? {
            Some(NodeMeta::Array) => {
                let array = self.open_array(path)?;
                Ok(NodeKind::Array {
                    shape: array.shape().to_vec(),
                    dtype: array.data_type().name(),
                })
            }
            Some(NodeMeta::Group) => {
                self.open_group(path)?;
                Ok(NodeKind::Group)
            }
            None => Ok(NodeKind::Missing),
        }
    }

    fn attrs(&self, path: &ElemPath) -> StorageResult<Map<String, Value>> {
        match self.node_meta(path)? {
            Some(NodeMeta::Array) => Ok(self.open_array(path)?.attributes().clone()),
            Some(NodeMeta::Group) => Ok(self.open_group(path)?.attributes().clone()),
            None => Err(StorageError::backend_read(path.to_string(), "element does not exist")),
        }
    }

    fn children(&self, path: &ElemPath) -> StorageResult<Vec<String>> {
        let prefix = Self::prefix(path)?;
        let listing = self
            .storage
            .list_dir(&prefix)
            .map_err(|e| StorageError::backend_read(path.to_string(), e))?;
        let mut names: Vec<String> = listing
            .prefixes()
            .iter()
            .filter_map(|p| {
                let rest = p.as_str().strip_prefix(prefix.as_str())?;
                let name = rest.trim_end_matches('/');
                (!name.is_empty() && !name.starts_with('.')).then(|| name.to_string())
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn read_block(&self, path: &ElemPath, ranges: &[Range<u64>]) -> StorageResult<ColumnData> {
        check_read_size(path, ranges, self.max_read_elems)?;
        let array = self.open_array(path)?;
        let dtype = array.data_type().name();
        if ranges.iter().any(|r| r.end <= r.start) {
            return ColumnData::empty_for_dtype(&dtype).ok_or_else(|| {
                StorageError::backend_read(path.to_string(), format!("unsupported zarr dtype: {dtype}"))
            });
        }
        let subset = ArraySubset::new_with_ranges(ranges);
        retrieve_subset(&array, &subset).map_err(|e| StorageError::backend_read(path.to_string(), e))
    }
}

/// Typed retrieval, dispatched on the array's dtype identifier.
fn retrieve_subset(array: &ZarrArray, subset: &ArraySubset) -> Result<ColumnData, String> {
    let id = array.data_type().name();
    match id.as_str() {
        "bool" => Ok(ColumnData::Bool(
            array.retrieve_array_subset_elements::<bool>(subset).map_err(to_string_err)?,
        )),
        "int8" => Ok(ColumnData::I8(
            array.retrieve_array_subset_elements::<i8>(subset).map_err(to_string_err)?,
        )),
        "int16" => Ok(ColumnData::I16(
            array.retrieve_array_subset_elements::<i16>(subset).map_err(to_string_err)?,
        )),
        "int32" => Ok(ColumnData::I32(
            array.retrieve_array_subset_elements::<i32>(subset).map_err(to_string_err)?,
        )),
        "int64" => Ok(ColumnData::I64(
            array.retrieve_array_subset_elements::<i64>(subset).map_err(to_string_err)?,
        )),
        "uint8" => Ok(ColumnData::U8(
            array.retrieve_array_subset_elements::<u8>(subset).map_err(to_string_err)?,
        )),
        "uint16" => Ok(ColumnData::U16(
            array.retrieve_array_subset_elements::<u16>(subset).map_err(to_string_err)?,
        )),
        "uint32" => Ok(ColumnData::U32(
            array.retrieve_array_subset_elements::<u32>(subset).map_err(to_string_err)?,
        )),
        "uint64" => Ok(ColumnData::U64(
            array.retrieve_array_subset_elements::<u64>(subset).map_err(to_string_err)?,
        )),
        "float32" => Ok(ColumnData::F32(
            array.retrieve_array_subset_elements::<f32>(subset).map_err(to_string_err)?,
        )),
        "float64" => Ok(ColumnData::F64(
            array.retrieve_array_subset_elements::<f64>(subset).map_err(to_string_err)?,
        )),
        "string" => Ok(ColumnData::Utf8(
            array.retrieve_array_subset_elements::<String>(subset).map_err(to_string_err)?,
        )),
        other => Err(format!("unsupported zarr dtype: {other}")),
    }
}

fn to_string_err<E: std::fmt::Display>(e: E) -> String {
    e.to_string()
}
