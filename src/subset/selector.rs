use std::collections::HashMap;
use std::ops::Range;

use crate::error::{StorageError, StorageResult};
use crate::subset::Axis;

/// One axis of a subset request. Positions accept negative values counted
/// from the end; slices follow half-open `start:stop:step` semantics.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AxisSelector {
    #[default]
    All,
    Index(i64),
    Indices(Vec<i64>),
    /// One flag per position of the current view.
    Mask(Vec<bool>),
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
    },
    Label(String),
    Labels(Vec<String>),
}

impl AxisSelector {
    pub fn slice(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        AxisSelector::Slice { start, stop, step }
    }
}

impl From<Range<usize>> for AxisSelector {
    fn from(r: Range<usize>) -> Self {
        AxisSelector::slice(Some(r.start as i64), Some(r.end as i64), None)
    }
}

impl From<Vec<usize>> for AxisSelector {
    fn from(v: Vec<usize>) -> Self {
        AxisSelector::Indices(v.into_iter().map(|i| i as i64).collect())
    }
}

impl From<Vec<bool>> for AxisSelector {
    fn from(v: Vec<bool>) -> Self {
        AxisSelector::Mask(v)
    }
}

impl From<&str> for AxisSelector {
    fn from(s: &str) -> Self {
        AxisSelector::Label(s.to_string())
    }
}

impl From<Vec<&str>> for AxisSelector {
    fn from(v: Vec<&str>) -> Self {
        AxisSelector::Labels(v.into_iter().map(str::to_string).collect())
    }
}

/// A row and column selector pair.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub rows: AxisSelector,
    pub cols: AxisSelector,
}

impl Selection {
    pub fn new(rows: impl Into<AxisSelector>, cols: impl Into<AxisSelector>) -> Self {
        Self {
            rows: rows.into(),
            cols: cols.into(),
        }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn rows(rows: impl Into<AxisSelector>) -> Self {
        Self {
            rows: rows.into(),
            cols: AxisSelector::All,
        }
    }

    pub fn cols(cols: impl Into<AxisSelector>) -> Self {
        Self {
            rows: AxisSelector::All,
            cols: cols.into(),
        }
    }
}

fn position(axis: Axis, index: i64, len: usize) -> StorageResult<usize> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(StorageError::IndexOutOfRange { axis, index, len });
    }
    Ok(resolved as usize)
}

fn slice_positions(
    axis: Axis,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
    len: usize,
) -> StorageResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(StorageError::InvalidSelector {
            axis,
            msg: "slice step cannot be zero".to_string(),
        });
    }
    let n = len as i64;
    let clamp = |v: i64, lo: i64, hi: i64| {
        let v = if v < 0 { v + n } else { v };
        v.clamp(lo, hi)
    };
    // Positions past i64 range end the walk instead of wrapping.
    let walk = |from: i64| std::iter::successors(Some(from), move |&i| i.checked_add(step));
    let out = if step > 0 {
        let start = start.map_or(0, |s| clamp(s, 0, n));
        let stop = stop.map_or(n, |s| clamp(s, 0, n));
        walk(start).take_while(|&i| i < stop).map(|i| i as usize).collect()
    } else {
        let start = start.map_or(n - 1, |s| clamp(s, -1, n - 1));
        let stop = stop.map_or(-1, |s| clamp(s, -1, n - 1));
        walk(start).take_while(|&i| i > stop).map(|i| i as usize).collect()
    };
    Ok(out)
}

fn label_lookup(names: &[String]) -> HashMap<&str, usize> {
    let mut map = HashMap::with_capacity(names.len());
    for (i, n) in names.iter().enumerate() {
        map.entry(n.as_str()).or_insert(i);
    }
    map
}

/// Resolve `selector` to positions within `names` (the labels of the
/// current view along `axis`). `None` means the whole axis, unchanged.
pub(crate) fn normalize(
    axis: Axis,
    selector: &AxisSelector,
    names: &[String],
) -> StorageResult<Option<Vec<usize>>> {
    let len = names.len();
    let positions = match selector {
        AxisSelector::All => return Ok(None),
        AxisSelector::Index(i) => vec![position(axis, *i, len)?],
        AxisSelector::Indices(v) => v
            .iter()
            .map(|&i| position(axis, i, len))
            .collect::<StorageResult<Vec<_>>>()?,
        AxisSelector::Mask(mask) => {
            if mask.len() != len {
                return Err(StorageError::SelectorLength {
                    axis,
                    expected: len,
                    got: mask.len(),
                });
            }
            mask.iter()
                .enumerate()
                .filter_map(|(i, &keep)| keep.then_some(i))
                .collect()
        }
        AxisSelector::Slice { start, stop, step } => {
            let positions = slice_positions(axis, *start, *stop, *step, len)?;
            if positions.len() == len && positions.iter().enumerate().all(|(i, &p)| i == p) {
                return Ok(None);
            }
            positions
        }
        AxisSelector::Label(label) => {
            let pos = names.iter().position(|n| n == label).ok_or_else(|| {
                StorageError::UnknownLabel {
                    axis,
                    label: label.clone(),
                }
            })?;
            vec![pos]
        }
        AxisSelector::Labels(labels) => {
            let lookup = label_lookup(names);
            labels
                .iter()
                .map(|l| {
                    lookup.get(l.as_str()).copied().ok_or_else(|| {
                        StorageError::UnknownLabel {
                            axis,
                            label: l.clone(),
                        }
                    })
                })
                .collect::<StorageResult<Vec<_>>>()?
        }
    };
    Ok(Some(positions))
}
