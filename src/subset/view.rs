use std::fmt;
use std::sync::Arc;

use polars::prelude::DataFrame;
use serde_json::Value;
use tracing::debug;

use crate::container::{ContainerView, Element, MapAccessor, MapSlot};
use crate::error::StorageResult;
use crate::subset::{AnnDataAccess, Axis, IndexSet, Selection, normalize};

/// A row/column restriction of a [`ContainerView`].
///
/// Holds the index sets in the parent's original coordinates plus the
/// resolved axis names; nothing else is read until accessed. Keeps the
/// parent open for as long as it lives.
#[derive(Clone)]
pub struct IndexSubset {
    parent: ContainerView,
    row_index: IndexSet,
    col_index: IndexSet,
    obs_names: Arc<[String]>,
    var_names: Arc<[String]>,
}

impl IndexSubset {
    /// Apply `selection` to a view of `parent` currently restricted to
    /// `rows × cols` whose axis names are `obs_names`/`var_names`.
    pub(crate) fn derive(
        parent: &ContainerView,
        (rows, cols): (&IndexSet, &IndexSet),
        (obs_names, var_names): (&Arc<[String]>, &Arc<[String]>),
        selection: &Selection,
    ) -> StorageResult<IndexSubset> {
        let local_rows = normalize(Axis::Obs, &selection.rows, obs_names)?;
        let local_cols = normalize(Axis::Var, &selection.cols, var_names)?;
        let subset = IndexSubset {
            parent: parent.clone(),
            row_index: rows.compose(local_rows.as_deref()),
            col_index: cols.compose(local_cols.as_deref()),
            obs_names: pick(obs_names, local_rows.as_deref()),
            var_names: pick(var_names, local_cols.as_deref()),
        };
        debug!(
            reference = %parent.reference(),
            n_obs = subset.obs_names.len(),
            n_vars = subset.var_names.len(),
            "derived subset"
        );
        Ok(subset)
    }

    pub fn parent(&self) -> &ContainerView {
        &self.parent
    }

    /// Selected rows in the original container's coordinates.
    pub fn row_index(&self) -> &IndexSet {
        &self.row_index
    }

    /// Selected columns in the original container's coordinates.
    pub fn col_index(&self) -> &IndexSet {
        &self.col_index
    }

    /// Shape of the original container.
    pub fn ref_shape(&self) -> (usize, usize) {
        self.parent.shape()
    }
}

fn pick(names: &Arc<[String]>, local: Option<&[usize]>) -> Arc<[String]> {
    match local {
        None => names.clone(),
        Some(local) => local.iter().map(|&i| names[i].clone()).collect(),
    }
}

impl AnnDataAccess for IndexSubset {
    fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    fn var_names(&self) -> &[String] {
        &self.var_names
    }

    fn shape(&self) -> (usize, usize) {
        let (n_obs, n_vars) = self.ref_shape();
        (self.row_index.len_or(n_obs), self.col_index.len_or(n_vars))
    }

    fn obs(&self) -> StorageResult<DataFrame> {
        self.parent.read_obs(&self.row_index)
    }

    fn var(&self) -> StorageResult<DataFrame> {
        self.parent.read_var(&self.col_index)
    }

    /// Not axis-aligned; identical to the parent's.
    fn uns(&self) -> StorageResult<Value> {
        self.parent.uns()
    }

    fn x(&self) -> StorageResult<Option<Element>> {
        self.parent.read_x(&self.row_index, &self.col_index)
    }

    fn map(&self, slot: MapSlot) -> MapAccessor {
        MapAccessor::new(
            self.parent.backend().clone(),
            slot,
            Some(slot.restriction(&self.row_index, &self.col_index)),
        )
    }

    fn subset(&self, selection: &Selection) -> StorageResult<IndexSubset> {
        IndexSubset::derive(
            &self.parent,
            (&self.row_index, &self.col_index),
            (&self.obs_names, &self.var_names),
            selection,
        )
    }
}

impl fmt::Debug for IndexSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexSubset")
            .field("reference", &self.parent.reference())
            .field("shape", &self.shape())
            .field("ref_shape", &self.ref_shape())
            .finish()
    }
}
