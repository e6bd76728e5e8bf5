//! HDF5 (`.h5ad`) backend, compiled with the `hdf5` feature.
use std::ops::Range;
use std::path::Path;

use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Dataset, File, Location};
use hdf5::{Hyperslab, Selection, SliceOrIndex};
use ndarray::IxDyn;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::container::column_data::ColumnData;
use crate::container::format::ContainerFormat;
use crate::container::path::ElemPath;
use crate::container::store::{ElementStore, NodeKind, check_read_size};
use crate::error::{StorageError, StorageResult};

/// Read-only HDF5 file. The HDF5 library is not re-entrant, so every call
/// goes through one lock.
pub(crate) struct H5Store {
    file: Mutex<File>,
    max_read_elems: usize,
}

impl H5Store {
    pub(crate) fn open(path: &Path, max_read_elems: usize) -> StorageResult<Self> {
        let file = File::open(path)
            .map_err(|e| StorageError::backend_read(path.display().to_string(), e))?;
        Ok(Self {
            file: Mutex::new(file),
            max_read_elems,
        })
    }
}

fn h5_err(path: &ElemPath) -> impl Fn(hdf5::Error) -> StorageError + '_ {
    move |e| StorageError::backend_read(path.to_string(), e)
}

fn dtype_identifier(desc: &TypeDescriptor) -> Option<&'static str> {
    Some(match desc {
        TypeDescriptor::Boolean => "bool",
        TypeDescriptor::Integer(IntSize::U1) => "int8",
        TypeDescriptor::Integer(IntSize::U2) => "int16",
        TypeDescriptor::Integer(IntSize::U4) => "int32",
        TypeDescriptor::Integer(IntSize::U8) => "int64",
        TypeDescriptor::Unsigned(IntSize::U1) => "uint8",
        TypeDescriptor::Unsigned(IntSize::U2) => "uint16",
        TypeDescriptor::Unsigned(IntSize::U4) => "uint32",
        TypeDescriptor::Unsigned(IntSize::U8) => "uint64",
        TypeDescriptor::Float(FloatSize::U4) => "float32",
        TypeDescriptor::Float(FloatSize::U8) => "float64",
        TypeDescriptor::VarLenUnicode | TypeDescriptor::VarLenAscii => "string",
        TypeDescriptor::Enum(e) if e.is_boolean() => "bool",
        _ => return None,
    })
}

fn read_typed<T: hdf5::H5Type + Clone>(
    ds: &Dataset,
    ranges: &[Range<u64>],
) -> hdf5::Result<Vec<T>> {
    if ranges.is_empty() {
        return ds.read_raw::<T>();
    }
    let slab: Vec<SliceOrIndex> = ranges
        .iter()
        .map(|r| SliceOrIndex::from(r.start as usize..r.end as usize))
        .collect();
    let sel = Selection::from(Hyperslab::from(slab));
    let arr = ds.read_slice::<T, _, IxDyn>(sel)?;
    Ok(arr.iter().cloned().collect())
}

fn read_dataset(ds: &Dataset, dtype: &str, ranges: &[Range<u64>]) -> hdf5::Result<ColumnData> {
    Ok(match dtype {
        "bool" => ColumnData::Bool(read_typed::<bool>(ds, ranges)?),
        "int8" => ColumnData::I8(read_typed::<i8>(ds, ranges)?),
        "int16" => ColumnData::I16(read_typed::<i16>(ds, ranges)?),
        "int32" => ColumnData::I32(read_typed::<i32>(ds, ranges)?),
        "int64" => ColumnData::I64(read_typed::<i64>(ds, ranges)?),
        "uint8" => ColumnData::U8(read_typed::<u8>(ds, ranges)?),
        "uint16" => ColumnData::U16(read_typed::<u16>(ds, ranges)?),
        "uint32" => ColumnData::U32(read_typed::<u32>(ds, ranges)?),
        "uint64" => ColumnData::U64(read_typed::<u64>(ds, ranges)?),
        "float32" => ColumnData::F32(read_typed::<f32>(ds, ranges)?),
        "float64" => ColumnData::F64(read_typed::<f64>(ds, ranges)?),
        _ => match ds.dtype()?.to_descriptor()? {
            TypeDescriptor::VarLenAscii => ColumnData::Utf8(
                read_typed::<VarLenAscii>(ds, ranges)?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            ),
            _ => ColumnData::Utf8(
                read_typed::<VarLenUnicode>(ds, ranges)?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            ),
        },
    })
}

/// Attribute value as JSON. Scalars become JSON scalars, 1-d arrays become
/// JSON arrays; anything else is skipped.
fn attr_value(loc: &Location, name: &str) -> hdf5::Result<Option<Value>> {
    let attr = loc.attr(name)?;
    let scalar = attr.ndim() == 0;
    let desc = attr.dtype()?.to_descriptor()?;
    let value = match (dtype_identifier(&desc), scalar) {
        (Some("string"), true) => match desc {
            TypeDescriptor::VarLenAscii => {
                Value::from(attr.read_scalar::<VarLenAscii>()?.as_str())
            }
            _ => Value::from(attr.read_scalar::<VarLenUnicode>()?.as_str()),
        },
        (Some("string"), false) => Value::from(
            attr.read_raw::<VarLenUnicode>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
        (Some("bool"), true) => Value::from(attr.read_scalar::<bool>()?),
        (Some("bool"), false) => Value::from(attr.read_raw::<bool>()?),
        (Some(id), true) if id.starts_with("float") => Value::from(attr.read_scalar::<f64>()?),
        (Some(id), false) if id.starts_with("float") => Value::from(attr.read_raw::<f64>()?),
        (Some(id), true) if id.starts_with("uint") => Value::from(attr.read_scalar::<u64>()?),
        (Some(id), false) if id.starts_with("uint") => Value::from(attr.read_raw::<u64>()?),
        (Some(_), true) => Value::from(attr.read_scalar::<i64>()?),
        (Some(_), false) => Value::from(attr.read_raw::<i64>()?),
        (None, _) => return Ok(None),
    };
    Ok(Some(value))
}

fn location_attrs(loc: &Location) -> hdf5::Result<Map<String, Value>> {
    let mut out = Map::new();
    for name in loc.attr_names()? {
        if let Some(v) = attr_value(loc, &name)? {
            out.insert(name, v);
        }
    }
    Ok(out)
}

impl ElementStore for H5Store {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::H5ad
    }

    fn kind(&self, path: &ElemPath) -> StorageResult<NodeKind> {
        let file = self.file.lock();
        if path.is_root() {
            return Ok(NodeKind::Group);
        }
        let node = path.to_node_path();
        if !file.link_exists(&node) {
            return Ok(NodeKind::Missing);
        }
        if let Ok(ds) = file.dataset(&node) {
            let desc = ds.dtype().and_then(|t| t.to_descriptor()).map_err(h5_err(path))?;
            let dtype = dtype_identifier(&desc).unwrap_or("unsupported").to_string();
            let shape = ds.shape().into_iter().map(|n| n as u64).collect();
            return Ok(NodeKind::Array { shape, dtype });
        }
        if file.group(&node).is_ok() {
            return Ok(NodeKind::Group);
        }
        Ok(NodeKind::Missing)
    }

    fn attrs(&self, path: &ElemPath) -> StorageResult<Map<String, Value>> {
        let file = self.file.lock();
        let node = path.to_node_path();
        if let Ok(ds) = file.dataset(&node) {
            return location_attrs(&ds).map_err(h5_err(path));
        }
        let group = file.group(&node).map_err(h5_err(path))?;
        location_attrs(&group).map_err(h5_err(path))
    }

    fn children(&self, path: &ElemPath) -> StorageResult<Vec<String>> {
        let file = self.file.lock();
        let group = file.group(&path.to_node_path()).map_err(h5_err(path))?;
        let mut names = group.member_names().map_err(h5_err(path))?;
        names.sort();
        Ok(names)
    }

    fn read_block(&self, path: &ElemPath, ranges: &[Range<u64>]) -> StorageResult<ColumnData> {
        check_read_size(path, ranges, self.max_read_elems)?;
        let file = self.file.lock();
        let ds = file.dataset(&path.to_node_path()).map_err(h5_err(path))?;
        let desc = ds.dtype().and_then(|t| t.to_descriptor()).map_err(h5_err(path))?;
        let dtype = dtype_identifier(&desc).ok_or_else(|| {
            StorageError::backend_read(path.to_string(), format!("unsupported hdf5 type: {desc}"))
        })?;
        if ranges.iter().any(|r| r.end <= r.start) {
            return ColumnData::empty_for_dtype(dtype).ok_or_else(|| {
                StorageError::backend_read(path.to_string(), format!("unsupported hdf5 type: {desc}"))
            });
        }
        read_dataset(&ds, dtype, ranges).map_err(h5_err(path))
    }
}
