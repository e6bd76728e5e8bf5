use polars::prelude::DataFrame;
use serde_json::Value;

use crate::container::{Element, MapAccessor, MapSlot};
use crate::error::StorageResult;
use crate::subset::{IndexSubset, Selection};

/// The read surface shared by whole containers and their subsets.
///
/// Everything except the axis names is read on demand. Subsets answer with
/// data restricted to their rows and columns.
pub trait AnnDataAccess {
    fn obs_names(&self) -> &[String];

    fn var_names(&self) -> &[String];

    /// `(n_obs, n_vars)`.
    fn shape(&self) -> (usize, usize) {
        (self.obs_names().len(), self.var_names().len())
    }

    fn obs(&self) -> StorageResult<DataFrame>;

    fn var(&self) -> StorageResult<DataFrame>;

    fn uns(&self) -> StorageResult<Value>;

    /// The primary matrix, or `None` if the container has none.
    fn x(&self) -> StorageResult<Option<Element>>;

    fn map(&self, slot: MapSlot) -> MapAccessor;

    fn obsm(&self) -> MapAccessor {
        self.map(MapSlot::Obsm)
    }

    fn varm(&self) -> MapAccessor {
        self.map(MapSlot::Varm)
    }

    fn obsp(&self) -> MapAccessor {
        self.map(MapSlot::Obsp)
    }

    fn varp(&self) -> MapAccessor {
        self.map(MapSlot::Varp)
    }

    fn layers(&self) -> MapAccessor {
        self.map(MapSlot::Layers)
    }

    /// Derive a subset. Selector positions and labels are relative to this
    /// view, never to the original container.
    fn subset(&self, selection: &Selection) -> StorageResult<IndexSubset>;
}
