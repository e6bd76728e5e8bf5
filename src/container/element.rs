use std::sync::Arc;

use ndarray::ArrayD;
use polars::prelude::DataFrame;
use serde_json::Value;

use crate::container::column_data::is_numeric_dtype;
use crate::container::dense::DenseArray;
use crate::container::frame::read_frame;
use crate::container::path::ElemPath;
use crate::container::sparse::{SparseDataset, SparseFormat, SparseMatrix};
use crate::container::store::{Backend, NodeKind, attr_str};
use crate::container::value::read_value;
use crate::error::{StorageError, StorageResult};
use crate::subset::IndexSet;

/// One stored element, either as a lazy handle (dense or sparse arrays) or
/// materialized (restricted reads, dataframes, everything else).
#[derive(Debug, Clone)]
pub enum Element {
    Dense(DenseArray),
    Sparse(SparseDataset),
    Array(ArrayD<f64>),
    Matrix(SparseMatrix),
    Frame(DataFrame),
    Value(Value),
}

impl Element {
    /// Negotiate the representation of `path`: numeric arrays and
    /// recognized sparse groups stay lazy, dataframes and anything else are
    /// read in full.
    pub(crate) fn open(backend: &Arc<Backend>, path: &ElemPath) -> StorageResult<Element> {
        let store = backend.store()?;
        match store.kind(path)? {
            NodeKind::Array { shape, dtype } if is_numeric_dtype(&dtype) => Ok(Element::Dense(
                DenseArray::new(backend.clone(), path.clone(), shape, dtype),
            )),
            NodeKind::Array { .. } => Ok(Element::Value(read_value(store.as_ref(), path)?)),
            NodeKind::Group => {
                let attrs = store.attrs(path)?;
                if let Some((format, shape)) = SparseFormat::from_attrs(&attrs) {
                    return Ok(Element::Sparse(SparseDataset::new(
                        backend.clone(),
                        path.clone(),
                        format,
                        shape,
                    )));
                }
                if attr_str(&attrs, "encoding-type") == Some("dataframe") {
                    return Ok(Element::Frame(read_frame(store.as_ref(), path, &IndexSet::All)?));
                }
                Ok(Element::Value(read_value(store.as_ref(), path)?))
            }
            NodeKind::Missing => Err(StorageError::backend_read(path.to_string(), "element does not exist")),
        }
    }

    /// Read `path` restricted to `index` (one index set per leading axis).
    /// Dataframes honour the first index set only; generic values are not
    /// aligned to any axis and are read whole.
    pub(crate) fn read_restricted(
        backend: &Arc<Backend>,
        path: &ElemPath,
        index: &[IndexSet],
    ) -> StorageResult<Element> {
        let store = backend.store()?;
        if store.kind(path)? == NodeKind::Group
            && attr_str(&store.attrs(path)?, "encoding-type") == Some("dataframe")
        {
            let rows = index.first().cloned().unwrap_or_default();
            return Ok(Element::Frame(read_frame(store.as_ref(), path, &rows)?));
        }
        match Element::open(backend, path)? {
            Element::Dense(d) => Ok(Element::Array(d.read_selection(index)?)),
            Element::Sparse(s) => {
                let all = IndexSet::All;
                let rows = index.first().unwrap_or(&all);
                let cols = index.get(1).unwrap_or(&all);
                Ok(Element::Matrix(s.read_selection(rows, cols)?))
            }
            other => Ok(other),
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Element::Dense(_) | Element::Sparse(_))
    }

    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            Element::Dense(d) => Some(d.shape().iter().map(|&n| n as usize).collect()),
            Element::Sparse(s) => Some(s.shape().to_vec()),
            Element::Array(a) => Some(a.shape().to_vec()),
            Element::Matrix(m) => Some(m.shape.to_vec()),
            Element::Frame(df) => Some(vec![df.height(), df.width()]),
            Element::Value(_) => None,
        }
    }

    /// Materialize any array-like element as a dense `f64` array.
    pub fn to_dense(&self) -> StorageResult<ArrayD<f64>> {
        match self {
            Element::Dense(d) => d.read_all(),
            Element::Sparse(s) => Ok(s.read_all()?.to_dense().into_dyn()),
            Element::Array(a) => Ok(a.clone()),
            Element::Matrix(m) => Ok(m.to_dense().into_dyn()),
            Element::Frame(_) | Element::Value(_) => Err(StorageError::backend_read(
                self.describe(),
                "element is not array-like",
            )),
        }
    }

    pub fn as_frame(&self) -> Option<&DataFrame> {
        match self {
            Element::Frame(df) => Some(df),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Element::Value(v) => Some(v),
            _ => None,
        }
    }

    fn describe(&self) -> String {
        match self {
            Element::Dense(d) => d.path().to_string(),
            Element::Sparse(s) => s.path().to_string(),
            Element::Frame(_) => "<dataframe>".to_string(),
            _ => "<value>".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{DemoShape, demo_counts, demo_x, open_demo_backend};

    #[test]
    fn negotiation_per_element_kind() {
        let (_dir, backend) = open_demo_backend(DemoShape::new(4, 3));
        assert!(matches!(Element::open(&backend, &"X".into()).unwrap(), Element::Dense(_)));
        assert!(matches!(
            Element::open(&backend, &"layers/counts".into()).unwrap(),
            Element::Sparse(_)
        ));
        assert!(matches!(Element::open(&backend, &"obs".into()).unwrap(), Element::Frame(_)));
        assert!(matches!(Element::open(&backend, &"uns".into()).unwrap(), Element::Value(_)));
        assert!(matches!(
            Element::open(&backend, &"obs/_index".into()).unwrap(),
            Element::Value(_)
        ));
        assert!(matches!(
            Element::open(&backend, &"nope".into()),
            Err(StorageError::BackendRead { .. })
        ));
    }

    #[test]
    fn to_dense_for_lazy_and_materialized() {
        let shape = DemoShape::new(4, 3);
        let (_dir, backend) = open_demo_backend(shape);
        let x = Element::open(&backend, &"X".into()).unwrap();
        assert_eq!(x.to_dense().unwrap(), demo_x(shape).into_dyn());
        let counts = Element::open(&backend, &"layers/counts".into()).unwrap();
        assert_eq!(counts.to_dense().unwrap(), demo_counts(shape).into_dyn());
        let obs = Element::open(&backend, &"obs".into()).unwrap();
        assert!(obs.to_dense().is_err());
    }
}
