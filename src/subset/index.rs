use std::ops::Range;
use std::sync::Arc;

/// A row or column index set, expressed against the original container's
/// coordinate space.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IndexSet {
    /// Every position, in order.
    #[default]
    All,
    /// These positions, in this order. May repeat.
    Explicit(Arc<[usize]>),
}

impl IndexSet {
    pub fn explicit(positions: Vec<usize>) -> Self {
        IndexSet::Explicit(positions.into())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, IndexSet::All)
    }

    pub fn as_slice(&self) -> Option<&[usize]> {
        match self {
            IndexSet::All => None,
            IndexSet::Explicit(p) => Some(p),
        }
    }

    /// Resolve positions `local`, given relative to this set, into the
    /// coordinate space this set is expressed in. `None` selects everything
    /// and leaves the set unchanged.
    ///
    /// `local` must already be bounds-checked against [`IndexSet::len_or`].
    pub fn compose(&self, local: Option<&[usize]>) -> IndexSet {
        match (self, local) {
            (_, None) => self.clone(),
            (IndexSet::All, Some(local)) => IndexSet::Explicit(local.into()),
            (IndexSet::Explicit(outer), Some(local)) => {
                IndexSet::Explicit(local.iter().map(|&i| outer[i]).collect())
            }
        }
    }

    /// Number of selected positions; `full` when this is [`IndexSet::All`].
    pub fn len_or(&self, full: usize) -> usize {
        match self {
            IndexSet::All => full,
            IndexSet::Explicit(p) => p.len(),
        }
    }

    pub fn to_vec(&self, full: usize) -> Vec<usize> {
        match self {
            IndexSet::All => (0..full).collect(),
            IndexSet::Explicit(p) => p.to_vec(),
        }
    }
}

/// Split `positions` into maximal runs of consecutive ascending values,
/// preserving order. `[4, 5, 6, 1, 2, 9]` becomes `[4..7, 1..3, 9..10]`.
pub(crate) fn runs(positions: &[usize]) -> Vec<Range<usize>> {
    let mut out: Vec<Range<usize>> = Vec::new();
    for &p in positions {
        match out.last_mut() {
            Some(run) if run.end == p => run.end += 1,
            _ => out.push(p..p + 1),
        }
    }
    out
}
