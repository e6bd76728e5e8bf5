//! Dataframe groups (`obs`, `var`, dataframes inside maps) as polars frames.
use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use tracing::debug;

use crate::container::column_data::ColumnData;
use crate::container::path::ElemPath;
use crate::container::store::{ElementStore, NodeKind, array_info, attr_str, read_1d, read_all};
use crate::error::{StorageError, StorageResult};
use crate::subset::IndexSet;

const DEFAULT_INDEX: &str = "_index";
const LEGACY_CATEGORIES: &str = "__categories";

fn index_name(store: &dyn ElementStore, path: &ElemPath) -> StorageResult<String> {
    let attrs = store.attrs(path)?;
    Ok(attr_str(&attrs, "_index").unwrap_or(DEFAULT_INDEX).to_string())
}

/// Render any label column as strings.
fn into_labels(col: ColumnData) -> Vec<String> {
    match col {
        ColumnData::Utf8(v) => v,
        ColumnData::F32(v) => v.into_iter().map(|x| x.to_string()).collect(),
        ColumnData::F64(v) => v.into_iter().map(|x| x.to_string()).collect(),
        other => other
            .into_i64_vec()
            .unwrap_or_default()
            .into_iter()
            .map(|x| x.to_string())
            .collect(),
    }
}

/// Row labels of the dataframe at `path`.
pub(crate) fn read_index(store: &dyn ElementStore, path: &ElemPath) -> StorageResult<Vec<String>> {
    let index_path = path.push(&index_name(store, path)?);
    Ok(into_labels(read_all(store, &index_path)?))
}

/// Columns in their stored order: `column-order` when present, otherwise
/// every child except the index, sorted.
fn column_names(store: &dyn ElementStore, path: &ElemPath, index: &str) -> StorageResult<Vec<String>> {
    let attrs = store.attrs(path)?;
    if let Some(order) = attrs.get("column-order").and_then(|v| v.as_array()) {
        return Ok(order
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect());
    }
    if let Some(order) = attrs.get("column-order").and_then(|v| v.as_str()) {
        return Ok(vec![order.to_string()]);
    }
    Ok(store
        .children(path)?
        .into_iter()
        .filter(|c| c != index && c != LEGACY_CATEGORIES)
        .collect())
}

/// Read the dataframe at `path`, restricted to `rows`. The index is the
/// first column.
pub(crate) fn read_frame(
    store: &dyn ElementStore,
    path: &ElemPath,
    rows: &IndexSet,
) -> StorageResult<DataFrame> {
    let index = index_name(store, path)?;
    let index_path = path.push(&index);
    let (shape, _) = array_info(store, &index_path)?;
    let len = shape.first().copied().unwrap_or(0) as usize;

    let mut columns: Vec<Column> = Vec::new();
    let labels = into_labels(read_1d(store, &index_path, len, rows)?);
    columns.push(Series::new(index.as_str().into(), labels).into());

    let names = column_names(store, path, &index)?;
    debug!(element = %path, columns = names.len(), restricted = !rows.is_all(), "reading dataframe");
    for name in names {
        let series = read_column(store, path, &name, len, rows)?;
        columns.push(series.into());
    }
    DataFrame::new(columns).map_err(|e| StorageError::backend_read(path.to_string(), e))
}

fn read_column(
    store: &dyn ElementStore,
    frame: &ElemPath,
    name: &str,
    len: usize,
    rows: &IndexSet,
) -> StorageResult<Series> {
    let path = frame.push(name);
    match store.kind(&path)? {
        NodeKind::Array { .. } => {
            let values = read_1d(store, &path, len, rows)?;
            let legacy = frame.push(LEGACY_CATEGORIES).push(name);
            if matches!(store.kind(&legacy)?, NodeKind::Array { .. }) {
                let categories = into_labels(read_all(store, &legacy)?);
                return decode_categorical(&path, name, values, &categories);
            }
            Ok(values.into_series(name))
        }
        NodeKind::Group => {
            let attrs = store.attrs(&path)?;
            match attr_str(&attrs, "encoding-type") {
                Some("categorical") => {
                    let codes = read_1d(store, &path.push("codes"), len, rows)?;
                    let categories = into_labels(read_all(store, &path.push("categories"))?);
                    decode_categorical(&path, name, codes, &categories)
                }
                Some("nullable-integer") => {
                    let values = read_1d(store, &path.push("values"), len, rows)?
                        .into_i64_vec()
                        .ok_or_else(|| StorageError::backend_read(path.to_string(), "non-numeric values"))?;
                    let mask = read_mask(store, &path, len, rows)?;
                    let out: Vec<Option<i64>> = values
                        .into_iter()
                        .zip(mask)
                        .map(|(v, missing)| (!missing).then_some(v))
                        .collect();
                    Ok(Series::new(name.into(), out))
                }
                Some("nullable-boolean") => {
                    let values = read_1d(store, &path.push("values"), len, rows)?
                        .into_bool_vec()
                        .ok_or_else(|| StorageError::backend_read(path.to_string(), "non-boolean values"))?;
                    let mask = read_mask(store, &path, len, rows)?;
                    let out: Vec<Option<bool>> = values
                        .into_iter()
                        .zip(mask)
                        .map(|(v, missing)| (!missing).then_some(v))
                        .collect();
                    Ok(Series::new(name.into(), out))
                }
                other => Err(StorageError::backend_read(
                    path.to_string(),
                    format!("unsupported column encoding {other:?}"),
                )),
            }
        }
        NodeKind::Missing => Err(StorageError::backend_read(path.to_string(), "column does not exist")),
    }
}

fn read_mask(store: &dyn ElementStore, path: &ElemPath, len: usize, rows: &IndexSet) -> StorageResult<Vec<bool>> {
    read_1d(store, &path.push("mask"), len, rows)?
        .into_bool_vec()
        .ok_or_else(|| StorageError::backend_read(path.to_string(), "non-boolean mask"))
}

/// Codes index into `categories`; negative codes are missing values.
fn decode_categorical(
    path: &ElemPath,
    name: &str,
    codes: ColumnData,
    categories: &[String],
) -> StorageResult<Series> {
    let codes = codes
        .into_i64_vec()
        .ok_or_else(|| StorageError::backend_read(path.to_string(), "non-integer category codes"))?;
    let mut out: Vec<Option<String>> = Vec::with_capacity(codes.len());
    for code in codes {
        if code < 0 {
            out.push(None);
            continue;
        }
        let label = categories.get(code as usize).ok_or_else(|| {
            StorageError::backend_read(
                path.to_string(),
                format!("category code {code} out of range for {} categories", categories.len()),
            )
        })?;
        out.push(Some(label.clone()));
    }
    Ok(Series::new(name.into(), out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{DemoShape, open_demo_backend};

    #[test]
    fn index_labels() {
        let (_dir, backend) = open_demo_backend(DemoShape::new(3, 2));
        let store = backend.store().unwrap();
        assert_eq!(
            read_index(store.as_ref(), &"obs".into()).unwrap(),
            ["cell_0", "cell_1", "cell_2"]
        );
        assert_eq!(read_index(store.as_ref(), &"var".into()).unwrap(), ["gene_0", "gene_1"]);
    }

    #[test]
    fn full_obs_frame() {
        let (_dir, backend) = open_demo_backend(DemoShape::new(4, 2));
        let store = backend.store().unwrap();
        let df = read_frame(store.as_ref(), &"obs".into(), &IndexSet::All).unwrap();
        assert_eq!(df.height(), 4);
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, ["_index", "n_genes", "cell_type", "batch"]);

        let cell_type = df.column("cell_type").unwrap().as_materialized_series().str().unwrap().clone();
        assert_eq!(cell_type.get(0), Some("B"));
        assert_eq!(cell_type.get(1), None);
        assert_eq!(cell_type.get(2), Some("NK"));

        let batch = df.column("batch").unwrap().as_materialized_series().i64().unwrap().clone();
        assert_eq!(batch.get(0), Some(0));
        assert_eq!(batch.get(3), None);
    }

    #[test]
    fn restricted_rows_follow_the_index_order() {
        let (_dir, backend) = open_demo_backend(DemoShape::new(6, 2));
        let store = backend.store().unwrap();
        let df = read_frame(store.as_ref(), &"obs".into(), &IndexSet::explicit(vec![5, 0, 1])).unwrap();
        let index = df.column("_index").unwrap().as_materialized_series().str().unwrap().clone();
        let got: Vec<Option<&str>> = index.into_iter().collect();
        assert_eq!(got, [Some("cell_5"), Some("cell_0"), Some("cell_1")]);
        let n_genes = df.column("n_genes").unwrap().as_materialized_series().i64().unwrap().clone();
        assert_eq!(n_genes.get(0), Some(10));
    }

    #[test]
    fn var_frame_with_boolean_column() {
        let (_dir, backend) = open_demo_backend(DemoShape::new(2, 3));
        let store = backend.store().unwrap();
        let df = read_frame(store.as_ref(), &"var".into(), &IndexSet::All).unwrap();
        let hv = df.column("highly_variable").unwrap().as_materialized_series().bool().unwrap().clone();
        let got: Vec<Option<bool>> = hv.into_iter().collect();
        assert_eq!(got, [Some(true), Some(false), Some(true)]);
    }
}
