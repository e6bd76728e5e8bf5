use std::sync::Arc;

use ndarray::Array2;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use tracing::debug;

use crate::container::path::ElemPath;
use crate::container::store::{Backend, ElementStore, array_info, attr_shape2, attr_str, read_all};
use crate::error::{StorageError, StorageResult};
use crate::subset::{IndexSet, runs};

/// Compressed axis of a sparse matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseFormat {
    /// Rows are compressed (`indptr` has `rows + 1` entries).
    Csr,
    /// Columns are compressed.
    Csc,
}

impl SparseFormat {
    /// Recognize an `encoding-type` group or a legacy `h5sparse_format` one.
    pub(crate) fn from_attrs(attrs: &Map<String, Value>) -> Option<(SparseFormat, [usize; 2])> {
        let (format, shape_key) = match attr_str(attrs, "encoding-type") {
            Some("csr_matrix") => (SparseFormat::Csr, "shape"),
            Some("csc_matrix") => (SparseFormat::Csc, "shape"),
            _ => match attr_str(attrs, "h5sparse_format") {
                Some("csr") => (SparseFormat::Csr, "h5sparse_shape"),
                Some("csc") => (SparseFormat::Csc, "h5sparse_shape"),
                _ => return None,
            },
        };
        Some((format, attr_shape2(attrs, shape_key)?))
    }
}

/// An in-memory compressed sparse matrix in its on-disk layout.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    pub format: SparseFormat,
    pub shape: [usize; 2],
    pub data: Vec<f64>,
    pub indices: Vec<usize>,
    pub indptr: Vec<usize>,
}

impl SparseMatrix {
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.shape[0], self.shape[1]));
        for major in 0..self.indptr.len().saturating_sub(1) {
            for k in self.indptr[major]..self.indptr[major + 1] {
                let minor = self.indices[k];
                let (r, c) = match self.format {
                    SparseFormat::Csr => (major, minor),
                    SparseFormat::Csc => (minor, major),
                };
                out[[r, c]] += self.data[k];
            }
        }
        out
    }
}

/// Lazy handle to a sparse group (`data`, `indices`, `indptr`).
#[derive(Debug, Clone)]
pub struct SparseDataset {
    backend: Arc<Backend>,
    path: ElemPath,
    format: SparseFormat,
    shape: [usize; 2],
}

impl SparseDataset {
    pub(crate) fn new(backend: Arc<Backend>, path: ElemPath, format: SparseFormat, shape: [usize; 2]) -> Self {
        Self {
            backend,
            path,
            format,
            shape,
        }
    }

    pub fn path(&self) -> &ElemPath {
        &self.path
    }

    pub fn format(&self) -> SparseFormat {
        self.format
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    fn major_len(&self) -> usize {
        match self.format {
            SparseFormat::Csr => self.shape[0],
            SparseFormat::Csc => self.shape[1],
        }
    }

    fn minor_len(&self) -> usize {
        match self.format {
            SparseFormat::Csr => self.shape[1],
            SparseFormat::Csc => self.shape[0],
        }
    }

    pub fn read_all(&self) -> StorageResult<SparseMatrix> {
        self.read_selection(&IndexSet::All, &IndexSet::All)
    }

    /// Read the sub-matrix `rows × cols`, keeping the on-disk layout.
    ///
    /// Only the stored entries of the selected major slices are fetched,
    /// one block per run of consecutive major positions.
    pub fn read_selection(&self, rows: &IndexSet, cols: &IndexSet) -> StorageResult<SparseMatrix> {
        let store = self.backend.store()?;
        let (major, minor) = match self.format {
            SparseFormat::Csr => (rows, cols),
            SparseFormat::Csc => (cols, rows),
        };
        let indptr = self.read_usize(store.as_ref(), "indptr", None)?;
        self.check_indptr(store.as_ref(), &indptr)?;

        let (mut data, mut indices, mut out_ptr) = match major.as_slice() {
            None => (
                self.read_f64(store.as_ref(), None)?,
                self.read_usize(store.as_ref(), "indices", None)?,
                indptr,
            ),
            Some(positions) => self.read_major(store.as_ref(), &indptr, positions)?,
        };
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.minor_len()) {
            return Err(StorageError::backend_read(
                self.path.push("indices").to_string(),
                format!("index {bad} out of bounds for length {}", self.minor_len()),
            ));
        }

        if let Some(positions) = minor.as_slice() {
            (data, indices, out_ptr) = filter_minor(&data, &indices, &out_ptr, positions, self.minor_len());
        }

        let shape = [rows.len_or(self.shape[0]), cols.len_or(self.shape[1])];
        Ok(SparseMatrix {
            format: self.format,
            shape,
            data,
            indices,
            indptr: out_ptr,
        })
    }

    /// `indptr` must have one entry per major slice plus one, start at 0,
    /// never decrease and end at the number of stored entries, which
    /// `data` and `indices` must agree on.
    fn check_indptr(&self, store: &dyn ElementStore, indptr: &[usize]) -> StorageResult<()> {
        let path = self.path.push("indptr");
        let invalid = |msg: String| StorageError::backend_read(path.to_string(), msg);
        if indptr.len() != self.major_len() + 1 {
            return Err(invalid(format!(
                "expected {} entries, found {}",
                self.major_len() + 1,
                indptr.len()
            )));
        }
        if let Some(&first) = indptr.first().filter(|&&first| first != 0) {
            return Err(invalid(format!("starts at {first}, expected 0")));
        }
        if let Some(at) = indptr.windows(2).position(|w| w[1] < w[0]) {
            return Err(invalid(format!("decreases at entry {}", at + 1)));
        }
        let nnz = self.stored_len(store, "data")?;
        let n_indices = self.stored_len(store, "indices")?;
        if n_indices != nnz {
            return Err(StorageError::backend_read(
                self.path.push("indices").to_string(),
                format!("{n_indices} entries but data has {nnz}"),
            ));
        }
        match indptr.last() {
            Some(&last) if last != nnz => Err(invalid(format!("ends at {last} but data has {nnz} entries"))),
            _ => Ok(()),
        }
    }

    fn stored_len(&self, store: &dyn ElementStore, name: &str) -> StorageResult<usize> {
        let (shape, _) = array_info(store, &self.path.push(name))?;
        Ok(shape.first().copied().unwrap_or(0) as usize)
    }

    fn read_major(
        &self,
        store: &dyn ElementStore,
        indptr: &[usize],
        positions: &[usize],
    ) -> StorageResult<(Vec<f64>, Vec<usize>, Vec<usize>)> {
        if let Some(&bad) = positions.iter().find(|&&p| p >= self.major_len()) {
            return Err(StorageError::backend_read(
                self.path.to_string(),
                format!("position {bad} out of bounds for length {}", self.major_len()),
            ));
        }
        let major_runs = runs(positions);
        debug!(element = %self.path, runs = major_runs.len(), "partial sparse read");

        let mut data = Vec::new();
        let mut indices = Vec::new();
        let mut out_ptr = Vec::with_capacity(positions.len() + 1);
        out_ptr.push(0);
        for run in major_runs {
            let span = indptr[run.start] as u64..indptr[run.end] as u64;
            data.extend(self.read_f64(store, Some(span.clone()))?);
            indices.extend(self.read_usize(store, "indices", Some(span))?);
            for m in run {
                let last = out_ptr[out_ptr.len() - 1];
                out_ptr.push(last + indptr[m + 1] - indptr[m]);
            }
        }
        Ok((data, indices, out_ptr))
    }

    fn read_f64(&self, store: &dyn ElementStore, span: Option<std::ops::Range<u64>>) -> StorageResult<Vec<f64>> {
        let path = self.path.push("data");
        let col = match span {
            None => read_all(store, &path)?,
            Some(span) => store.read_block(&path, &[span])?,
        };
        col.into_f64_vec()
            .ok_or_else(|| StorageError::backend_read(path.to_string(), "expected numeric values"))
    }

    fn read_usize(
        &self,
        store: &dyn ElementStore,
        name: &str,
        span: Option<std::ops::Range<u64>>,
    ) -> StorageResult<Vec<usize>> {
        let path = self.path.push(name);
        let col = match span {
            None => read_all(store, &path)?,
            Some(span) => store.read_block(&path, &[span])?,
        };
        col.into_usize_vec().ok_or_else(|| {
            StorageError::backend_read(path.to_string(), "expected non-negative integer values")
        })
    }
}

/// Keep only the entries whose minor index is selected, renumbering minor
/// indices to positions in `positions`. A minor index selected twice yields
/// two entries. Entries within each major slice come out sorted.
fn filter_minor(
    data: &[f64],
    indices: &[usize],
    indptr: &[usize],
    positions: &[usize],
    minor_len: usize,
) -> (Vec<f64>, Vec<usize>, Vec<usize>) {
    let mut targets: Vec<SmallVec<[usize; 1]>> = vec![SmallVec::new(); minor_len];
    for (new, &old) in positions.iter().enumerate() {
        if old < minor_len {
            targets[old].push(new);
        }
    }

    let mut out_data = Vec::new();
    let mut out_indices = Vec::new();
    let mut out_ptr = Vec::with_capacity(indptr.len());
    out_ptr.push(0);
    let mut slice: Vec<(usize, f64)> = Vec::new();
    for major in 0..indptr.len().saturating_sub(1) {
        slice.clear();
        for k in indptr[major]..indptr[major + 1] {
            for &new in &targets[indices[k]] {
                slice.push((new, data[k]));
            }
        }
        slice.sort_by_key(|&(i, _)| i);
        for &(i, v) in &slice {
            out_indices.push(i);
            out_data.push(v);
        }
        out_ptr.push(out_data.len());
    }
    (out_data, out_indices, out_ptr)
}
