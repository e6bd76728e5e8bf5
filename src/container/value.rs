use serde_json::{Map, Value};

use crate::container::column_data::ColumnData;
use crate::container::path::ElemPath;
use crate::container::store::{ElementStore, NodeKind, read_all};
use crate::error::{StorageError, StorageResult};

fn column_values(col: ColumnData) -> Vec<Value> {
    match col {
        ColumnData::Bool(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::I8(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::I16(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::I32(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::I64(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::U8(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::U16(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::U32(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::U64(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::F32(v) => v.into_iter().map(|x| Value::from(f64::from(x))).collect(),
        ColumnData::F64(v) => v.into_iter().map(Value::from).collect(),
        ColumnData::Utf8(v) => v.into_iter().map(Value::from).collect(),
    }
}

/// Fold a flat row-major buffer into nested arrays of `shape`.
fn nest(flat: &[Value], shape: &[usize]) -> Value {
    match shape {
        [] => flat.first().cloned().unwrap_or(Value::Null),
        [_] => Value::Array(flat.to_vec()),
        [n, rest @ ..] => {
            let stride: usize = rest.iter().product();
            Value::Array(
                (0..*n)
                    .map(|i| nest(&flat[i * stride..(i + 1) * stride], rest))
                    .collect(),
            )
        }
    }
}

/// Materialize the element at `path` as JSON: groups become objects keyed
/// by child name, arrays become (nested) JSON arrays, 0-d arrays scalars.
pub(crate) fn read_value(store: &dyn ElementStore, path: &ElemPath) -> StorageResult<Value> {
    match store.kind(path)? {
        NodeKind::Array { shape, .. } => {
            let flat = column_values(read_all(store, path)?);
            let shape: Vec<usize> = shape.iter().map(|&n| n as usize).collect();
            Ok(nest(&flat, &shape))
        }
        NodeKind::Group => {
            let mut out = Map::new();
            for child in store.children(path)? {
                out.insert(child.clone(), read_value(store, &path.push(&child))?);
            }
            Ok(Value::Object(out))
        }
        NodeKind::Missing => Err(StorageError::backend_read(path.to_string(), "element does not exist")),
    }
}
