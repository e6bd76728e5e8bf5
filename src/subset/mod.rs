//! Row/column selection over containers.
//!
//! Selectors are normalized to positions local to the view they are applied
//! to, then composed with the view's existing index so every subset stores
//! positions in the original container's coordinates.
mod access;
mod index;
mod selector;
mod view;

use std::fmt;

pub use access::AnnDataAccess;
pub use index::IndexSet;
pub(crate) use index::runs;
pub(crate) use selector::normalize;
pub use selector::{AxisSelector, Selection};
pub use view::IndexSubset;

/// The two annotated axes: observations (rows) and variables (columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Obs,
    Var,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::Obs => "obs",
            Axis::Var => "var",
        })
    }
}
