use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use polars::prelude::DataFrame;
use serde_json::Value;
use snafu::ResultExt;
use tracing::{debug, info};

use crate::config::Settings;
use crate::container::element::Element;
use crate::container::format::{ContainerFormat, has_hdf5_signature};
use crate::container::frame::{read_frame, read_index};
use crate::container::maps::{MapAccessor, MapSlot};
use crate::container::memo::Memo;
use crate::container::path::ElemPath;
use crate::container::store::{Backend, NodeKind, OpenBackend};
use crate::container::value::read_value;
use crate::container::zarr::ZarrStore;
use crate::error::{CacheIoSnafu, StorageError, StorageResult};
use crate::remote::{CachingPath, ReadSeek};
use crate::subset::{AnnDataAccess, IndexSet, IndexSubset, Selection};

/// Where a container lives.
#[derive(Debug, Clone)]
pub enum ContainerRef {
    Local(PathBuf),
    Remote(CachingPath),
}

impl ContainerRef {
    fn suffix(&self) -> String {
        match self {
            ContainerRef::Local(path) => path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
            ContainerRef::Remote(path) => path.suffix().to_string(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRef::Local(path) => write!(f, "{}", path.display()),
            ContainerRef::Remote(path) => fmt::Display::fmt(path, f),
        }
    }
}

impl From<PathBuf> for ContainerRef {
    fn from(path: PathBuf) -> Self {
        ContainerRef::Local(path)
    }
}

impl From<&Path> for ContainerRef {
    fn from(path: &Path) -> Self {
        ContainerRef::Local(path.to_path_buf())
    }
}

impl From<CachingPath> for ContainerRef {
    fn from(path: CachingPath) -> Self {
        ContainerRef::Remote(path)
    }
}

struct ViewInner {
    format: ContainerFormat,
    backend: Arc<Backend>,
    obs_names: Arc<[String]>,
    var_names: Arc<[String]>,
    obs: Memo<DataFrame>,
    var: Memo<DataFrame>,
    uns: Memo<Value>,
    x: Memo<Option<Element>>,
}

impl Drop for ViewInner {
    fn drop(&mut self) {
        self.backend.close();
    }
}

/// A read-only, lazily loaded view of a whole container.
///
/// Clones share one open backend. The backend is released by
/// [`ContainerView::close`] or when the last clone (and every subset
/// derived from it) is dropped.
#[derive(Clone)]
pub struct ContainerView {
    inner: Arc<ViewInner>,
}

impl ContainerView {
    /// Open with settings taken from the environment.
    pub fn open(reference: impl Into<ContainerRef>) -> StorageResult<Self> {
        Self::open_with(reference, &Settings::from_env())
    }

    pub fn open_with(reference: impl Into<ContainerRef>, settings: &Settings) -> StorageResult<Self> {
        let reference = reference.into();
        let ref_display = reference.to_string();
        let format = ContainerFormat::from_suffix(&ref_display, &reference.suffix())?;

        let opened = open_backend(&reference, &ref_display, format, settings)?;
        let backend = Arc::new(Backend::new(ref_display.clone(), opened));
        let names = backend.store().and_then(|store| {
            let obs = read_index(store.as_ref(), &ElemPath::parse("obs"))?;
            let var = read_index(store.as_ref(), &ElemPath::parse("var"))?;
            Ok((obs, var))
        });
        let (obs_names, var_names) = match names {
            Ok(names) => names,
            Err(e) => {
                backend.close();
                return Err(e);
            }
        };
        info!(
            reference = %ref_display,
            %format,
            n_obs = obs_names.len(),
            n_vars = var_names.len(),
            "opened container"
        );
        Ok(Self {
            inner: Arc::new(ViewInner {
                format,
                backend,
                obs_names: obs_names.into(),
                var_names: var_names.into(),
                obs: Memo::new(),
                var: Memo::new(),
                uns: Memo::new(),
                x: Memo::new(),
            }),
        })
    }

    pub fn reference(&self) -> &str {
        self.inner.backend.reference()
    }

    pub fn format(&self) -> ContainerFormat {
        self.inner.format
    }

    /// Release the backend handle and stream. Idempotent; element handles
    /// and subsets fail with [`StorageError::Closed`] afterwards.
    pub fn close(&self) {
        if self.inner.backend.close() {
            info!(reference = %self.reference(), "closed container");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.backend.is_closed()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.is_closed() {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    pub(crate) fn backend(&self) -> &Arc<Backend> {
        &self.inner.backend
    }

    /// Observation table restricted to `rows` (original coordinates).
    pub(crate) fn read_obs(&self, rows: &IndexSet) -> StorageResult<DataFrame> {
        self.read_table("obs", rows, &self.inner.obs)
    }

    /// Variable table restricted to `cols` (original coordinates).
    pub(crate) fn read_var(&self, cols: &IndexSet) -> StorageResult<DataFrame> {
        self.read_table("var", cols, &self.inner.var)
    }

    fn read_table(&self, name: &str, index: &IndexSet, memo: &Memo<DataFrame>) -> StorageResult<DataFrame> {
        self.ensure_open()?;
        let path = ElemPath::parse(name);
        if index.is_all() {
            return memo
                .get_or_try_init(|| {
                    let store = self.inner.backend.store()?;
                    read_frame(store.as_ref(), &path, &IndexSet::All)
                })
                .cloned();
        }
        let store = self.inner.backend.store()?;
        read_frame(store.as_ref(), &path, index)
    }

    /// Primary matrix restricted to `rows × cols`; lazy when unrestricted.
    pub(crate) fn read_x(&self, rows: &IndexSet, cols: &IndexSet) -> StorageResult<Option<Element>> {
        self.ensure_open()?;
        if rows.is_all() && cols.is_all() {
            return self
                .inner
                .x
                .get_or_try_init(|| self.open_slot_element("X", None))
                .cloned();
        }
        debug!(reference = %self.reference(), "restricted read of X");
        self.open_slot_element("X", Some(&[rows.clone(), cols.clone()][..]))
    }

    fn open_slot_element(&self, name: &str, index: Option<&[IndexSet]>) -> StorageResult<Option<Element>> {
        let path = ElemPath::parse(name);
        let store = self.inner.backend.store()?;
        if store.kind(&path)? == NodeKind::Missing {
            return Ok(None);
        }
        let element = match index {
            None => Element::open(&self.inner.backend, &path)?,
            Some(index) => Element::read_restricted(&self.inner.backend, &path, index)?,
        };
        Ok(Some(element))
    }
}

impl AnnDataAccess for ContainerView {
    fn obs_names(&self) -> &[String] {
        &self.inner.obs_names
    }

    fn var_names(&self) -> &[String] {
        &self.inner.var_names
    }

    fn obs(&self) -> StorageResult<DataFrame> {
        self.read_obs(&IndexSet::All)
    }

    fn var(&self) -> StorageResult<DataFrame> {
        self.read_var(&IndexSet::All)
    }

    /// Unstructured metadata; an absent `uns` slot is an empty object.
    fn uns(&self) -> StorageResult<Value> {
        self.ensure_open()?;
        self.inner
            .uns
            .get_or_try_init(|| {
                let store = self.inner.backend.store()?;
                let path = ElemPath::parse("uns");
                match store.kind(&path)? {
                    NodeKind::Missing => Ok(Value::Object(Default::default())),
                    _ => read_value(store.as_ref(), &path),
                }
            })
            .cloned()
    }

    fn x(&self) -> StorageResult<Option<Element>> {
        self.read_x(&IndexSet::All, &IndexSet::All)
    }

    fn map(&self, slot: MapSlot) -> MapAccessor {
        MapAccessor::new(self.inner.backend.clone(), slot, None)
    }

    fn subset(&self, selection: &Selection) -> StorageResult<IndexSubset> {
        IndexSubset::derive(
            self,
            (&IndexSet::All, &IndexSet::All),
            (&self.inner.obs_names, &self.inner.var_names),
            selection,
        )
    }
}

impl fmt::Debug for ContainerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerView")
            .field("reference", &self.reference())
            .field("format", &self.inner.format)
            .field("shape", &self.shape())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn open_backend(
    reference: &ContainerRef,
    display: &str,
    format: ContainerFormat,
    settings: &Settings,
) -> StorageResult<OpenBackend> {
    match format {
        ContainerFormat::Zarr => {
            let store = match reference {
                ContainerRef::Local(path) => ZarrStore::open_local(path, settings.max_read_elems)?,
                ContainerRef::Remote(path) => {
                    let fs = path.cache().fs();
                    if !fs.exists(path.remote_id())? {
                        return Err(StorageError::RemoteObjectMissing {
                            id: path.remote_id().to_string(),
                        });
                    }
                    ZarrStore::new(fs.open_mapped_store(path.remote_id())?, settings.max_read_elems)
                }
            };
            Ok(OpenBackend {
                store: Arc::new(store),
                stream: None,
            })
        }
        ContainerFormat::H5ad => {
            let (local, mut stream) = h5ad_source(reference)?;
            let is_hdf5 = has_hdf5_signature(&mut *stream)
                .map_err(|e| StorageError::backend_read(display, e))?;
            if !is_hdf5 {
                return Err(StorageError::backend_read(display, "missing HDF5 signature"));
            }
            open_h5(local, stream, settings)
        }
    }
}

fn open_file(path: &Path) -> StorageResult<Box<dyn ReadSeek>> {
    let file = std::fs::File::open(path).context(CacheIoSnafu { path })?;
    Ok(Box::new(file))
}

/// HDF5 reads a seekable local file, so remote objects are resolved
/// through the cache first and the signature is checked on the local copy.
#[cfg(feature = "hdf5")]
fn h5ad_source(reference: &ContainerRef) -> StorageResult<(PathBuf, Box<dyn ReadSeek>)> {
    let local = match reference {
        ContainerRef::Local(path) => path.clone(),
        ContainerRef::Remote(path) => path.as_local_path()?,
    };
    let stream = open_file(&local)?;
    Ok((local, stream))
}

/// Without HDF5 support only the signature is read, so a remote object is
/// checked through a ranged stream rather than downloaded.
#[cfg(not(feature = "hdf5"))]
fn h5ad_source(reference: &ContainerRef) -> StorageResult<((), Box<dyn ReadSeek>)> {
    let stream = match reference {
        ContainerRef::Local(path) => open_file(path)?,
        ContainerRef::Remote(path) => path.cache().fs().open_stream(path.remote_id())?,
    };
    Ok(((), stream))
}

#[cfg(feature = "hdf5")]
fn open_h5(local: PathBuf, stream: Box<dyn ReadSeek>, settings: &Settings) -> StorageResult<OpenBackend> {
    let store = crate::container::h5::H5Store::open(&local, settings.max_read_elems)?;
    Ok(OpenBackend {
        store: Arc::new(store),
        stream: Some(stream),
    })
}

#[cfg(not(feature = "hdf5"))]
fn open_h5(_local: (), stream: Box<dyn ReadSeek>, _settings: &Settings) -> StorageResult<OpenBackend> {
    drop(stream);
    Err(StorageError::BackendUnavailable {
        format: ContainerFormat::H5ad.to_string(),
    })
}
