//! Fixtures shared by unit tests: a small AnnData Zarr store written from
//! closed-form values, and an in-memory [`RemoteFs`] with call counters.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::NonZeroU64;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, SecondsFormat, Utc};
use ndarray::Array2;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use zarrs::array::{ArrayBuilder, DataType, Element as ZarrElement, FillValue};
use zarrs::filesystem::FilesystemStore;
use zarrs::group::GroupBuilder;
use zarrs::storage::{ReadableWritableListableStorage, ReadableWritableListableStorageTraits};

use crate::config::Settings;
use crate::container::{Backend, OpenBackend, ZarrStore};
use crate::error::{StorageError, StorageResult};
use crate::remote::{MtimeFallback, ReadSeek, RemoteFs, RemoteId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DemoShape {
    pub(crate) n_obs: usize,
    pub(crate) n_var: usize,
}

impl DemoShape {
    pub(crate) fn new(n_obs: usize, n_var: usize) -> Self {
        Self { n_obs, n_var }
    }
}

/// `X[i, j] = 100 i + j`.
pub(crate) fn demo_x(shape: DemoShape) -> Array2<f64> {
    Array2::from_shape_fn((shape.n_obs, shape.n_var), |(i, j)| (i * 100 + j) as f64)
}

fn counts_entry(i: usize, j: usize) -> Option<f64> {
    ((i + j) % 7 == 0).then(|| (i * 100 + j) as f64)
}

fn distances_entry(i: usize, j: usize) -> Option<f64> {
    ((i + j) % 5 == 0).then(|| 1.0 + (i + j) as f64)
}

/// Dense rendering of `layers/counts`.
pub(crate) fn demo_counts(shape: DemoShape) -> Array2<f64> {
    Array2::from_shape_fn((shape.n_obs, shape.n_var), |(i, j)| {
        counts_entry(i, j).unwrap_or(0.0)
    })
}

/// A demo container opened straight into a [`Backend`].
pub(crate) fn open_demo_backend(shape: DemoShape) -> (tempfile::TempDir, Arc<Backend>) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("demo.zarr");
    write_demo_zarr(&root, shape).unwrap();
    let store = ZarrStore::open_local(&root, Settings::default().max_read_elems).unwrap();
    let backend = Backend::new(
        root.display().to_string(),
        OpenBackend {
            store: Arc::new(store),
            stream: None,
        },
    );
    (dir, Arc::new(backend))
}

enum Values {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Str(Vec<String>),
}

impl Values {
    fn strings<S: ToString>(items: impl IntoIterator<Item = S>) -> Self {
        Values::Str(items.into_iter().map(|s| s.to_string()).collect())
    }
}

fn zarr_err(e: impl fmt::Display) -> io::Error {
    io::Error::other(format!("zarr fixture: {e}"))
}

fn node_path(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}

/// Single-chunk grid covering the whole array.
fn whole_array_grid(shape: &[u64]) -> Vec<NonZeroU64> {
    shape
        .iter()
        .map(|&n| NonZeroU64::new(n).unwrap_or(NonZeroU64::MIN))
        .collect()
}

/// Writes Zarr v3 groups and single-chunk arrays under one local root.
pub(crate) struct ZarrWriter {
    store: ReadableWritableListableStorage,
}

impl ZarrWriter {
    pub(crate) fn create(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let store = FilesystemStore::new(root).map_err(zarr_err)?;
        Ok(Self {
            store: Arc::new(store),
        })
    }

    pub(crate) fn group(&self, path: &str, attrs: Value) -> io::Result<()> {
        let group = GroupBuilder::new()
            .attributes(attrs.as_object().cloned().unwrap_or_default())
            .build(self.store.clone(), &node_path(path))
            .map_err(zarr_err)?;
        group.store_metadata().map_err(zarr_err)
    }

    fn typed<T: ZarrElement>(
        &self,
        path: &str,
        shape: &[usize],
        (data_type, fill): (DataType, FillValue),
        values: &[T],
        attrs: Value,
    ) -> io::Result<()> {
        let shape: Vec<u64> = shape.iter().map(|&n| n as u64).collect();
        let array = ArrayBuilder::new(shape.clone(), whole_array_grid(&shape), data_type, fill)
            .attributes(attrs.as_object().cloned().unwrap_or_default())
            .build(self.store.clone(), &node_path(path))
            .map_err(zarr_err)?;
        array.store_metadata().map_err(zarr_err)?;
        if shape.iter().product::<u64>() > 0 {
            array
                .store_array_subset_elements::<T>(&array.subset_all(), values)
                .map_err(zarr_err)?;
        }
        Ok(())
    }

    fn array(&self, path: &str, shape: &[usize], values: Values, attrs: Value) -> io::Result<()> {
        match values {
            Values::Bool(v) => self.typed(path, shape, (DataType::Bool, FillValue::from(false)), &v, attrs),
            Values::I8(v) => self.typed(path, shape, (DataType::Int8, FillValue::from(0i8)), &v, attrs),
            Values::I32(v) => self.typed(path, shape, (DataType::Int32, FillValue::from(0i32)), &v, attrs),
            Values::I64(v) => self.typed(path, shape, (DataType::Int64, FillValue::from(0i64)), &v, attrs),
            Values::F32(v) => self.typed(path, shape, (DataType::Float32, FillValue::from(0.0f32)), &v, attrs),
            Values::F64(v) => self.typed(path, shape, (DataType::Float64, FillValue::from(0.0f64)), &v, attrs),
            Values::Str(v) => self.typed(path, shape, (DataType::String, FillValue::from("")), &v, attrs),
        }
    }

    /// A CSR group from its raw parts, valid or not.
    pub(crate) fn csr_parts(
        &self,
        path: &str,
        shape: [usize; 2],
        data: Vec<f64>,
        indices: Vec<i32>,
        indptr: Vec<i64>,
    ) -> io::Result<()> {
        self.group(
            path,
            json!({"encoding-type": "csr_matrix", "encoding-version": "0.1.0", "shape": shape}),
        )?;
        self.array(&format!("{path}/data"), &[data.len()], Values::F64(data), json!({}))?;
        self.array(&format!("{path}/indices"), &[indices.len()], Values::I32(indices), json!({}))?;
        self.array(&format!("{path}/indptr"), &[indptr.len()], Values::I64(indptr), json!({}))
    }

    fn csr(
        &self,
        path: &str,
        (n_rows, n_cols): (usize, usize),
        entry: impl Fn(usize, usize) -> Option<f64>,
    ) -> io::Result<()> {
        let (data, indices, indptr) = csr_from_entries((n_rows, n_cols), entry);
        self.csr_parts(path, [n_rows, n_cols], data, indices, indptr)
    }
}

/// Row-major CSR parts of the matrix whose stored entries are `entry`.
pub(crate) fn csr_from_entries(
    (n_rows, n_cols): (usize, usize),
    entry: impl Fn(usize, usize) -> Option<f64>,
) -> (Vec<f64>, Vec<i32>, Vec<i64>) {
    let mut data = Vec::new();
    let mut indices = Vec::new();
    let mut indptr = vec![0i64];
    for i in 0..n_rows {
        for j in 0..n_cols {
            if let Some(v) = entry(i, j) {
                data.push(v);
                indices.push(j as i32);
            }
        }
        indptr.push(data.len() as i64);
    }
    (data, indices, indptr)
}

/// Write an AnnData store at `root`:
///
/// - `X`: float64, `100 i + j`
/// - `obs`: `n_genes` (int64, `2 i`), `cell_type` (categorical over
///   `B`/`T`/`NK`, code `i % 3`, missing at row 1), `batch` (nullable
///   integer `i`, missing at row 3)
/// - `var`: `highly_variable` (bool, even columns)
/// - `layers`: `scaled` (float32, `X / 2`) and `counts` (CSR)
/// - `obsm/X_pca`, `varm/loadings`, `obsp/distances` (CSR); no `varp`
/// - `uns`: `cell_type_colors` and `pca/variance_ratio`
pub(crate) fn write_demo_zarr(root: &Path, shape: DemoShape) -> io::Result<()> {
    let DemoShape { n_obs, n_var } = shape;
    let x = demo_x(shape);
    let w = ZarrWriter::create(root)?;

    w.group("", json!({"encoding-type": "anndata", "encoding-version": "0.1.0"}))?;
    w.array(
        "X",
        &[n_obs, n_var],
        Values::F64(x.iter().copied().collect()),
        json!({"encoding-type": "array", "encoding-version": "0.2.0"}),
    )?;

    w.group(
        "obs",
        json!({
            "encoding-type": "dataframe",
            "encoding-version": "0.2.0",
            "_index": "_index",
            "column-order": ["n_genes", "cell_type", "batch"],
        }),
    )?;
    w.array(
        "obs/_index",
        &[n_obs],
        Values::strings((0..n_obs).map(|i| format!("cell_{i}"))),
        json!({"encoding-type": "string-array"}),
    )?;
    w.array(
        "obs/n_genes",
        &[n_obs],
        Values::I64((0..n_obs).map(|i| 2 * i as i64).collect()),
        json!({"encoding-type": "array"}),
    )?;
    w.group("obs/cell_type", json!({"encoding-type": "categorical", "ordered": false}))?;
    w.array("obs/cell_type/categories", &[3], Values::strings(["B", "T", "NK"]), json!({}))?;
    w.array(
        "obs/cell_type/codes",
        &[n_obs],
        Values::I8((0..n_obs).map(|i| if i == 1 { -1 } else { (i % 3) as i8 }).collect()),
        json!({}),
    )?;
    w.group("obs/batch", json!({"encoding-type": "nullable-integer"}))?;
    w.array(
        "obs/batch/values",
        &[n_obs],
        Values::I64((0..n_obs as i64).collect()),
        json!({}),
    )?;
    w.array(
        "obs/batch/mask",
        &[n_obs],
        Values::Bool((0..n_obs).map(|i| i == 3).collect()),
        json!({}),
    )?;

    w.group(
        "var",
        json!({
            "encoding-type": "dataframe",
            "encoding-version": "0.2.0",
            "_index": "_index",
            "column-order": ["highly_variable"],
        }),
    )?;
    w.array(
        "var/_index",
        &[n_var],
        Values::strings((0..n_var).map(|j| format!("gene_{j}"))),
        json!({"encoding-type": "string-array"}),
    )?;
    w.array(
        "var/highly_variable",
        &[n_var],
        Values::Bool((0..n_var).map(|j| j % 2 == 0).collect()),
        json!({"encoding-type": "array"}),
    )?;

    w.group("layers", json!({"encoding-type": "dict"}))?;
    w.array(
        "layers/scaled",
        &[n_obs, n_var],
        Values::F32(x.iter().map(|&v| (v * 0.5) as f32).collect()),
        json!({"encoding-type": "array"}),
    )?;
    w.csr("layers/counts", (n_obs, n_var), counts_entry)?;

    w.group("obsm", json!({"encoding-type": "dict"}))?;
    w.array(
        "obsm/X_pca",
        &[n_obs, 3],
        Values::F64((0..n_obs).flat_map(|i| (0..3).map(move |k| (i * 10 + k) as f64)).collect()),
        json!({"encoding-type": "array"}),
    )?;
    w.group("varm", json!({"encoding-type": "dict"}))?;
    w.array(
        "varm/loadings",
        &[n_var, 2],
        Values::F64((0..n_var).flat_map(|j| [j as f64, -(j as f64)]).collect()),
        json!({"encoding-type": "array"}),
    )?;
    w.group("obsp", json!({"encoding-type": "dict"}))?;
    w.csr("obsp/distances", (n_obs, n_obs), distances_entry)?;

    w.group("uns", json!({"encoding-type": "dict"}))?;
    w.array(
        "uns/cell_type_colors",
        &[3],
        Values::strings(["#1f77b4", "#ff7f0e", "#2ca02c"]),
        json!({"encoding-type": "string-array"}),
    )?;
    w.group("uns/pca", json!({"encoding-type": "dict"}))?;
    w.array(
        "uns/pca/variance_ratio",
        &[2],
        Values::F64(vec![0.5, 0.25]),
        json!({"encoding-type": "array"}),
    )
}

#[cfg(feature = "hdf5")]
mod h5ad {
    use std::path::Path;

    use hdf5::types::VarLenUnicode;
    use hdf5::{File, Group, Location};

    use super::{DemoShape, counts_entry, csr_from_entries, demo_x, distances_entry};

    fn unicode<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> Vec<VarLenUnicode> {
        items
            .into_iter()
            .map(|s| s.as_ref().parse::<VarLenUnicode>().unwrap())
            .collect()
    }

    fn str_attr(loc: &Location, name: &str, value: &str) -> hdf5::Result<()> {
        let value: VarLenUnicode = value.parse().unwrap();
        loc.new_attr::<VarLenUnicode>().shape(()).create(name)?.write_scalar(&value)
    }

    fn group(parent: &Group, name: &str, encoding: &str) -> hdf5::Result<Group> {
        let group = parent.create_group(name)?;
        str_attr(&group, "encoding-type", encoding)?;
        Ok(group)
    }

    fn strings(parent: &Group, name: &str, items: Vec<VarLenUnicode>) -> hdf5::Result<()> {
        parent.new_dataset_builder().with_data(items.as_slice()).create(name)?;
        Ok(())
    }

    fn csr(
        parent: &Group,
        name: &str,
        (n_rows, n_cols): (usize, usize),
        entry: impl Fn(usize, usize) -> Option<f64>,
    ) -> hdf5::Result<()> {
        let (data, indices, indptr) = csr_from_entries((n_rows, n_cols), entry);
        let g = group(parent, name, "csr_matrix")?;
        g.new_attr::<i64>()
            .shape([2])
            .create("shape")?
            .write(&[n_rows as i64, n_cols as i64][..])?;
        g.new_dataset_builder().with_data(data.as_slice()).create("data")?;
        g.new_dataset_builder().with_data(indices.as_slice()).create("indices")?;
        g.new_dataset_builder().with_data(indptr.as_slice()).create("indptr")?;
        Ok(())
    }

    /// The HDF5 counterpart of [`super::write_demo_zarr`]: same names, `X`,
    /// `n_genes` column, layers, maps and `uns/pca`.
    pub(crate) fn write_demo_h5ad(path: &Path, shape: DemoShape) -> hdf5::Result<()> {
        let DemoShape { n_obs, n_var } = shape;
        let file = File::create(path)?;
        str_attr(&file, "encoding-type", "anndata")?;
        let x = demo_x(shape);
        file.new_dataset_builder().with_data(&x).create("X")?;

        let obs = group(&file, "obs", "dataframe")?;
        str_attr(&obs, "_index", "_index")?;
        obs.new_attr::<VarLenUnicode>()
            .shape([1])
            .create("column-order")?
            .write(unicode(["n_genes"]).as_slice())?;
        strings(&obs, "_index", unicode((0..n_obs).map(|i| format!("cell_{i}"))))?;
        let n_genes: Vec<i64> = (0..n_obs).map(|i| 2 * i as i64).collect();
        obs.new_dataset_builder().with_data(n_genes.as_slice()).create("n_genes")?;

        let var = group(&file, "var", "dataframe")?;
        str_attr(&var, "_index", "_index")?;
        strings(&var, "_index", unicode((0..n_var).map(|j| format!("gene_{j}"))))?;

        let layers = group(&file, "layers", "dict")?;
        let scaled = x.mapv(|v| (v * 0.5) as f32);
        layers.new_dataset_builder().with_data(&scaled).create("scaled")?;
        csr(&layers, "counts", (n_obs, n_var), counts_entry)?;

        let obsm = group(&file, "obsm", "dict")?;
        let pca = ndarray::Array2::from_shape_fn((n_obs, 3), |(i, k)| (i * 10 + k) as f64);
        obsm.new_dataset_builder().with_data(&pca).create("X_pca")?;
        let varm = group(&file, "varm", "dict")?;
        let loadings =
            ndarray::Array2::from_shape_fn((n_var, 2), |(j, k)| if k == 0 { j as f64 } else { -(j as f64) });
        varm.new_dataset_builder().with_data(&loadings).create("loadings")?;
        let obsp = group(&file, "obsp", "dict")?;
        csr(&obsp, "distances", (n_obs, n_obs), distances_entry)?;

        let uns = group(&file, "uns", "dict")?;
        strings(&uns, "cell_type_colors", unicode(["#1f77b4", "#ff7f0e", "#2ca02c"]))?;
        let pca_uns = group(&uns, "pca", "dict")?;
        pca_uns.new_dataset_builder().with_data(&[0.5f64, 0.25][..]).create("variance_ratio")?;
        Ok(())
    }
}

#[cfg(feature = "hdf5")]
pub(crate) use h5ad::write_demo_h5ad;

#[derive(Debug, Clone)]
struct FakeObject {
    bytes: Vec<u8>,
    mtime: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum MtimeMode {
    Direct,
    Metadata(String),
    Unavailable,
}

/// A stream that tracks how many of its kind are alive.
struct CountedStream {
    inner: Cursor<Vec<u8>>,
    live: Arc<AtomicUsize>,
}

impl Read for CountedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for CountedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Drop for CountedStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory object store keyed by protocol-stripped path.
///
/// A directory exists when any object lives below it. Directories can also
/// be mounted from local disk to serve [`RemoteFs::open_mapped_store`].
pub(crate) struct FakeRemoteFs {
    protocol: String,
    objects: Mutex<BTreeMap<String, FakeObject>>,
    mounts: Mutex<HashMap<String, PathBuf>>,
    mapped: Mutex<Vec<Weak<dyn ReadableWritableListableStorageTraits>>>,
    mtime_mode: Mutex<MtimeMode>,
    get_calls: AtomicUsize,
    total_calls: AtomicUsize,
    streams_opened: AtomicUsize,
    live_streams: Arc<AtomicUsize>,
}

impl FakeRemoteFs {
    pub(crate) fn new(protocol: &str) -> Self {
        Self {
            protocol: protocol.to_string(),
            objects: Mutex::new(BTreeMap::new()),
            mounts: Mutex::new(HashMap::new()),
            mapped: Mutex::new(Vec::new()),
            mtime_mode: Mutex::new(MtimeMode::Direct),
            get_calls: AtomicUsize::new(0),
            total_calls: AtomicUsize::new(0),
            streams_opened: AtomicUsize::new(0),
            live_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn put_file(&self, id: &RemoteId, bytes: &[u8], mtime: DateTime<Utc>) {
        self.objects.lock().insert(
            id.path().to_string(),
            FakeObject {
                bytes: bytes.to_vec(),
                mtime,
            },
        );
    }

    pub(crate) fn mount_dir(&self, id: &RemoteId, dir: &Path) {
        self.mounts.lock().insert(id.path().to_string(), dir.to_path_buf());
    }

    /// Serve mtimes only through the `key` field of [`RemoteFs::info`].
    pub(crate) fn use_metadata_mtime(&self, key: &str) {
        *self.mtime_mode.lock() = MtimeMode::Metadata(key.to_string());
    }

    pub(crate) fn disable_mtime(&self) {
        *self.mtime_mode.lock() = MtimeMode::Unavailable;
    }

    pub(crate) fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    pub(crate) fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    pub(crate) fn live_mapped_stores(&self) -> usize {
        self.mapped.lock().iter().filter(|w| w.strong_count() > 0).count()
    }

    fn call(&self) {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn object(&self, id: &RemoteId) -> StorageResult<FakeObject> {
        self.objects
            .lock()
            .get(id.path())
            .cloned()
            .ok_or_else(|| StorageError::RemoteObjectMissing { id: id.to_string() })
    }
}

impl fmt::Debug for FakeRemoteFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeRemoteFs")
            .field("protocol", &self.protocol)
            .field("objects", &self.objects.lock().len())
            .finish()
    }
}

impl RemoteFs for FakeRemoteFs {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn exists(&self, id: &RemoteId) -> StorageResult<bool> {
        self.call();
        let path = id.path();
        let prefix = format!("{path}/");
        let objects = self.objects.lock();
        Ok(objects.contains_key(path)
            || objects.keys().any(|k| k.starts_with(&prefix))
            || self.mounts.lock().contains_key(path))
    }

    fn is_file(&self, id: &RemoteId) -> StorageResult<bool> {
        self.call();
        Ok(self.objects.lock().contains_key(id.path()))
    }

    fn modified(&self, id: &RemoteId) -> StorageResult<Option<DateTime<Utc>>> {
        self.call();
        match &*self.mtime_mode.lock() {
            MtimeMode::Direct => Ok(Some(self.object(id)?.mtime)),
            MtimeMode::Metadata(_) | MtimeMode::Unavailable => Ok(None),
        }
    }

    fn info(&self, id: &RemoteId) -> StorageResult<Map<String, Value>> {
        self.call();
        let object = self.object(id)?;
        let mut info = Map::new();
        info.insert("name".into(), Value::from(id.path()));
        info.insert("size".into(), Value::from(object.bytes.len()));
        info.insert("type".into(), Value::from("file"));
        info.insert(
            "updated".into(),
            Value::from(object.mtime.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        Ok(info)
    }

    fn mtime_fallback(&self) -> MtimeFallback {
        match &*self.mtime_mode.lock() {
            MtimeMode::Metadata(key) => MtimeFallback::MetadataField(key.clone()),
            MtimeMode::Direct | MtimeMode::Unavailable => MtimeFallback::Unavailable,
        }
    }

    fn get(&self, id: &RemoteId, local: &Path) -> StorageResult<()> {
        self.call();
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let object = self.object(id)?;
        let io_err = |source| StorageError::CacheIo {
            path: local.to_path_buf(),
            source,
        };
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(local, &object.bytes).map_err(io_err)
    }

    fn open_stream(&self, id: &RemoteId) -> StorageResult<Box<dyn ReadSeek>> {
        self.call();
        let object = self.object(id)?;
        self.streams_opened.fetch_add(1, Ordering::SeqCst);
        self.live_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountedStream {
            inner: Cursor::new(object.bytes),
            live: self.live_streams.clone(),
        }))
    }

    fn open_mapped_store(&self, id: &RemoteId) -> StorageResult<ReadableWritableListableStorage> {
        self.call();
        let dir = self
            .mounts
            .lock()
            .get(id.path())
            .cloned()
            .ok_or_else(|| StorageError::RemoteObjectMissing { id: id.to_string() })?;
        let store = FilesystemStore::new(&dir).map_err(|e| StorageError::backend_read(id.to_string(), e))?;
        let store: ReadableWritableListableStorage = Arc::new(store);
        self.mapped.lock().push(Arc::downgrade(&store));
        Ok(store)
    }
}
