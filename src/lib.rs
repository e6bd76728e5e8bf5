//! Cached remote paths and lazy, subsettable access to AnnData containers.
//!
//! Two layers:
//!
//! - [`remote`]: a [`RemoteCache`] that maps remote objects to local files
//!   and refreshes them by modification time, and [`CachingPath`], a
//!   path-like handle over it.
//! - [`container`] and [`subset`]: [`ContainerView`] opens an `.h5ad` or
//!   `.zarr` container (local or remote) and reads its slots on demand;
//!   [`IndexSubset`] restricts it to rows and columns, composing nested
//!   selections against the original container.
//!
//! ```no_run
//! use lndb_storage::{AnnDataAccess, ContainerView, Selection};
//!
//! # fn main() -> lndb_storage::StorageResult<()> {
//! let view = ContainerView::open(std::path::PathBuf::from("pbmc.zarr"))?;
//! let first = view.subset(&Selection::rows(0..1000usize))?;
//! let t_cells = first.subset(&Selection::rows(vec![true; 1000]))?;
//! let counts = t_cells.layers().get("counts")?.to_dense()?;
//! # let _ = counts;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod container;
pub mod error;
pub mod remote;
pub mod subset;

#[cfg(test)]
mod test_utils;

pub use config::{CacheNaming, Settings};
pub use container::{ContainerFormat, ContainerRef, ContainerView, Element, MapAccessor, MapSlot};
pub use error::{StorageError, StorageResult};
pub use remote::{CachingPath, ObjectStoreFs, RemoteCache, RemoteFs, RemoteId};
pub use subset::{AnnDataAccess, AxisSelector, IndexSet, IndexSubset, Selection};
