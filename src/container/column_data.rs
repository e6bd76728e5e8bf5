use polars::prelude::{NamedFrom, Series};

/// A flat, typed buffer read from one array element.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ColumnData {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Utf8(Vec<String>),
}

macro_rules! numeric_as {
    ($value:expr, $t:ty) => {
        match $value {
            ColumnData::I8(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::I16(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::I32(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::I64(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::U8(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::U16(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::U32(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::U64(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::F32(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::F64(v) => Some(v.into_iter().map(|x| x as $t).collect()),
            ColumnData::Bool(v) => Some(v.into_iter().map(|x| u8::from(x) as $t).collect()),
            ColumnData::Utf8(_) => None,
        }
    };
}

impl ColumnData {
    /// Extend this buffer with another of the same type.
    /// Returns `false` (leaving `self` untouched) on a type mismatch.
    pub(crate) fn try_extend(&mut self, other: ColumnData) -> bool {
        match (self, other) {
            (ColumnData::Bool(a), ColumnData::Bool(b)) => a.extend(b),
            (ColumnData::I8(a), ColumnData::I8(b)) => a.extend(b),
            (ColumnData::I16(a), ColumnData::I16(b)) => a.extend(b),
            (ColumnData::I32(a), ColumnData::I32(b)) => a.extend(b),
            (ColumnData::I64(a), ColumnData::I64(b)) => a.extend(b),
            (ColumnData::U8(a), ColumnData::U8(b)) => a.extend(b),
            (ColumnData::U16(a), ColumnData::U16(b)) => a.extend(b),
            (ColumnData::U32(a), ColumnData::U32(b)) => a.extend(b),
            (ColumnData::U64(a), ColumnData::U64(b)) => a.extend(b),
            (ColumnData::F32(a), ColumnData::F32(b)) => a.extend(b),
            (ColumnData::F64(a), ColumnData::F64(b)) => a.extend(b),
            (ColumnData::Utf8(a), ColumnData::Utf8(b)) => a.extend(b),
            _ => return false,
        }
        true
    }

    /// Numeric values widened to f64; booleans become 0/1.
    pub(crate) fn into_f64_vec(self) -> Option<Vec<f64>> {
        match self {
            ColumnData::F64(v) => Some(v),
            other => numeric_as!(other, f64),
        }
    }

    pub(crate) fn into_i64_vec(self) -> Option<Vec<i64>> {
        match self {
            ColumnData::I64(v) => Some(v),
            other => numeric_as!(other, i64),
        }
    }

    pub(crate) fn into_bool_vec(self) -> Option<Vec<bool>> {
        match self {
            ColumnData::Bool(v) => Some(v),
            other => numeric_as!(other, i64).map(|v: Vec<i64>| v.into_iter().map(|x| x != 0).collect()),
        }
    }

    /// Non-negative integer values as positions. Floats and negative
    /// values are rejected.
    pub(crate) fn into_usize_vec(self) -> Option<Vec<usize>> {
        match self {
            ColumnData::F32(_) | ColumnData::F64(_) | ColumnData::Utf8(_) => None,
            other => other
                .into_i64_vec()?
                .into_iter()
                .map(|x| usize::try_from(x).ok())
                .collect(),
        }
    }

    pub(crate) fn into_series(self, name: &str) -> Series {
        match self {
            ColumnData::Bool(v) => Series::new(name.into(), v),
            ColumnData::I8(v) => Series::new(name.into(), v),
            ColumnData::I16(v) => Series::new(name.into(), v),
            ColumnData::I32(v) => Series::new(name.into(), v),
            ColumnData::I64(v) => Series::new(name.into(), v),
            ColumnData::U8(v) => Series::new(name.into(), v),
            ColumnData::U16(v) => Series::new(name.into(), v),
            ColumnData::U32(v) => Series::new(name.into(), v),
            ColumnData::U64(v) => Series::new(name.into(), v),
            ColumnData::F32(v) => Series::new(name.into(), v),
            ColumnData::F64(v) => Series::new(name.into(), v),
            ColumnData::Utf8(v) => Series::new(name.into(), v),
        }
    }

    /// Create an empty buffer matching a dtype identifier
    /// (`"float64"`, `"string"`, ...).
    pub(crate) fn empty_for_dtype(dtype_id: &str) -> Option<Self> {
        match dtype_id {
            "bool" => Some(ColumnData::Bool(Vec::new())),
            "int8" => Some(ColumnData::I8(Vec::new())),
            "int16" => Some(ColumnData::I16(Vec::new())),
            "int32" => Some(ColumnData::I32(Vec::new())),
            "int64" => Some(ColumnData::I64(Vec::new())),
            "uint8" => Some(ColumnData::U8(Vec::new())),
            "uint16" => Some(ColumnData::U16(Vec::new())),
            "uint32" => Some(ColumnData::U32(Vec::new())),
            "uint64" => Some(ColumnData::U64(Vec::new())),
            "float32" => Some(ColumnData::F32(Vec::new())),
            "float64" => Some(ColumnData::F64(Vec::new())),
            "string" => Some(ColumnData::Utf8(Vec::new())),
            _ => None,
        }
    }
}

/// Whether a dtype identifier can be widened to f64.
pub(crate) fn is_numeric_dtype(dtype_id: &str) -> bool {
    dtype_id != "string" && ColumnData::empty_for_dtype(dtype_id).is_some()
}
