use std::fmt;
use std::sync::Arc;

use crate::container::element::Element;
use crate::container::path::ElemPath;
use crate::container::store::{Backend, NodeKind};
use crate::error::{StorageError, StorageResult};
use crate::subset::IndexSet;

/// Top-level keyed slots of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapSlot {
    Obsm,
    Varm,
    Obsp,
    Varp,
    Layers,
}

impl MapSlot {
    pub fn name(self) -> &'static str {
        match self {
            MapSlot::Obsm => "obsm",
            MapSlot::Varm => "varm",
            MapSlot::Obsp => "obsp",
            MapSlot::Varp => "varp",
            MapSlot::Layers => "layers",
        }
    }

    /// Index sets a subset with `rows`/`cols` imposes on elements of this
    /// slot, one per leading axis.
    pub(crate) fn restriction(self, rows: &IndexSet, cols: &IndexSet) -> Vec<IndexSet> {
        match self {
            MapSlot::Obsm => vec![rows.clone()],
            MapSlot::Varm => vec![cols.clone()],
            MapSlot::Obsp => vec![rows.clone(), rows.clone()],
            MapSlot::Varp => vec![cols.clone(), cols.clone()],
            MapSlot::Layers => vec![rows.clone(), cols.clone()],
        }
    }
}

impl fmt::Display for MapSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keyed access to one map slot. Listing keys reads no values; with a
/// restriction active, `get` performs a partial read.
#[derive(Debug, Clone)]
pub struct MapAccessor {
    backend: Arc<Backend>,
    slot: MapSlot,
    restriction: Option<Vec<IndexSet>>,
}

impl MapAccessor {
    pub(crate) fn new(backend: Arc<Backend>, slot: MapSlot, restriction: Option<Vec<IndexSet>>) -> Self {
        let restriction = restriction.filter(|r| r.iter().any(|i| !i.is_all()));
        Self {
            backend,
            slot,
            restriction,
        }
    }

    pub fn slot(&self) -> MapSlot {
        self.slot
    }

    pub fn restriction(&self) -> Option<&[IndexSet]> {
        self.restriction.as_deref()
    }

    fn group(&self) -> ElemPath {
        ElemPath::root().push(self.slot.name())
    }

    /// Element names, sorted. An absent slot has no keys.
    pub fn keys(&self) -> StorageResult<Vec<String>> {
        let store = self.backend.store()?;
        let group = self.group();
        match store.kind(&group)? {
            NodeKind::Group => store.children(&group),
            _ => Ok(Vec::new()),
        }
    }

    pub fn contains_key(&self, key: &str) -> StorageResult<bool> {
        let store = self.backend.store()?;
        Ok(store.kind(&self.group().push(key))? != NodeKind::Missing)
    }

    pub fn get(&self, key: &str) -> StorageResult<Element> {
        let path = self.group().push(key);
        if !self.contains_key(key)? {
            return Err(StorageError::backend_read(
                path.to_string(),
                format!("no key '{key}' in {}", self.slot),
            ));
        }
        match &self.restriction {
            None => Element::open(&self.backend, &path),
            Some(index) => Element::read_restricted(&self.backend, &path, index),
        }
    }
}
