use std::ops::Range;
use std::sync::Arc;

use ndarray::{ArrayD, Axis as NdAxis, IxDyn, concatenate};
use tracing::debug;

use crate::container::column_data::ColumnData;
use crate::container::path::ElemPath;
use crate::container::store::{Backend, ElementStore};
use crate::error::{StorageError, StorageResult};
use crate::subset::{IndexSet, runs};

/// Lazy handle to a dense numeric array. Nothing is read until one of the
/// `read_*` methods is called.
#[derive(Debug, Clone)]
pub struct DenseArray {
    backend: Arc<Backend>,
    path: ElemPath,
    shape: Vec<u64>,
    dtype: String,
}

impl DenseArray {
    pub(crate) fn new(backend: Arc<Backend>, path: ElemPath, shape: Vec<u64>, dtype: String) -> Self {
        Self {
            backend,
            path,
            shape,
            dtype,
        }
    }

    pub fn path(&self) -> &ElemPath {
        &self.path
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Zarr-style dtype identifier of the stored values.
    pub fn dtype(&self) -> &str {
        &self.dtype
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn read_all(&self) -> StorageResult<ArrayD<f64>> {
        self.read_selection(&[])
    }

    /// Read the block `ranges`, one range per dimension.
    pub fn read_ranges(&self, ranges: &[Range<u64>]) -> StorageResult<ArrayD<f64>> {
        let store = self.backend.store()?;
        self.read_block(store.as_ref(), ranges)
    }

    /// Read positions `index[k]` along each leading axis `k`; trailing axes
    /// without an entry are read in full.
    ///
    /// Axis 0 is read in runs of consecutive positions. Every other axis is
    /// read over the bounding range of its positions and then selected.
    pub fn read_selection(&self, index: &[IndexSet]) -> StorageResult<ArrayD<f64>> {
        if index.len() > self.ndim() {
            return Err(StorageError::backend_read(
                self.path.to_string(),
                format!("{} index sets for a {}-d array", index.len(), self.ndim()),
            ));
        }
        let store = self.backend.store()?;
        if self.ndim() == 0 {
            return self.read_block(store.as_ref(), &[]);
        }

        // Bounding range and offsets into it, per axis.
        let mut bounds: Vec<Range<u64>> = Vec::with_capacity(self.ndim());
        let mut local: Vec<Option<Vec<usize>>> = Vec::with_capacity(self.ndim());
        for (axis, &len) in self.shape.iter().enumerate() {
            match index.get(axis).and_then(IndexSet::as_slice) {
                None => {
                    bounds.push(0..len);
                    local.push(None);
                }
                Some(positions) => {
                    if let Some(&bad) = positions.iter().find(|&&p| p as u64 >= len) {
                        return Err(StorageError::backend_read(
                            self.path.to_string(),
                            format!("position {bad} out of bounds for axis {axis} of length {len}"),
                        ));
                    }
                    let lo = positions.iter().min().copied().unwrap_or(0);
                    let hi = positions.iter().max().map_or(lo, |&m| m + 1);
                    bounds.push(lo as u64..hi as u64);
                    local.push(Some(positions.iter().map(|&p| p - lo).collect()));
                }
            }
        }

        let mut out = match index.first().and_then(IndexSet::as_slice) {
            None => self.read_block(store.as_ref(), &bounds)?,
            Some(rows) => {
                let row_runs = runs(rows);
                debug!(element = %self.path, runs = row_runs.len(), "partial dense read");
                let mut blocks = Vec::with_capacity(row_runs.len());
                for run in &row_runs {
                    let mut ranges = bounds.clone();
                    ranges[0] = run.start as u64..run.end as u64;
                    blocks.push(self.read_block(store.as_ref(), &ranges)?);
                }
                if blocks.is_empty() {
                    let mut dims: Vec<usize> = bounds.iter().map(|r| (r.end - r.start) as usize).collect();
                    dims[0] = 0;
                    ArrayD::zeros(IxDyn(&dims))
                } else {
                    let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
                    concatenate(NdAxis(0), &views)
                        .map_err(|e| StorageError::backend_read(self.path.to_string(), e))?
                }
            }
        };
        // Axis 0 is already in the requested order.
        for (axis, positions) in local.iter().enumerate().skip(1) {
            if let Some(positions) = positions {
                out = out.select(NdAxis(axis), positions);
            }
        }
        Ok(out)
    }

    fn read_block(&self, store: &dyn ElementStore, ranges: &[Range<u64>]) -> StorageResult<ArrayD<f64>> {
        let dims: Vec<usize> = if ranges.is_empty() {
            Vec::new()
        } else {
            ranges.iter().map(|r| r.end.saturating_sub(r.start) as usize).collect()
        };
        let data = store.read_block(&self.path, ranges)?;
        to_ndarray(&self.path, data, &dims)
    }
}

fn to_ndarray(path: &ElemPath, data: ColumnData, dims: &[usize]) -> StorageResult<ArrayD<f64>> {
    let values = data
        .into_f64_vec()
        .ok_or_else(|| StorageError::backend_read(path.to_string(), "expected a numeric array"))?;
    ArrayD::from_shape_vec(IxDyn(dims), values)
        .map_err(|e| StorageError::backend_read(path.to_string(), e))
}
