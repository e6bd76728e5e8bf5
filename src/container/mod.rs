//! Lazy, read-only access to AnnData containers (`.h5ad`, `.zarr`).
//!
//! A [`ContainerView`] opens one backend and reads the axis names up front;
//! every other element is loaded on first access. Numeric arrays and sparse
//! groups come back as lazy handles ([`DenseArray`], [`SparseDataset`]) that
//! read only the block asked for.
mod column_data;
mod dense;
mod element;
mod format;
mod frame;
#[cfg(feature = "hdf5")]
mod h5;
mod maps;
mod memo;
mod path;
mod sparse;
mod store;
mod value;
mod view;
mod zarr;

pub use dense::DenseArray;
pub use element::Element;
pub use format::ContainerFormat;
pub use maps::{MapAccessor, MapSlot};
pub use path::ElemPath;
pub use sparse::{SparseDataset, SparseFormat, SparseMatrix};
pub use view::{ContainerRef, ContainerView};

#[cfg(test)]
pub(crate) use store::{Backend, OpenBackend};
#[cfg(test)]
pub(crate) use zarr::ZarrStore;
