use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use snafu::ResultExt;
use tokio::runtime::Runtime;
use zarrs::storage::storage_adapter::async_to_sync::AsyncToSyncBlockOn;
use zarrs_object_store::object_store::path::Path as ObjectPath;
use zarrs_object_store::object_store::{
    self, GetOptions, GetResult, ListResult, MultipartUpload, ObjectMeta, ObjectStore,
    PutMultipartOptions, PutOptions, PutPayload, PutResult, Result as ObjectStoreResult,
};

use crate::error::{RuntimeSnafu, StorageError, StorageResult};

/// Drives async object store calls from synchronous zarrs storage traits.
///
/// `block_on` has no error channel, so timeouts for these calls are
/// enforced one layer down by [`TimeoutStore`].
pub(crate) struct TokioBlockOn(pub(crate) Arc<Runtime>);

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        self.0.block_on(future)
    }
}

/// Runtime shared by one remote backend, with an optional per-call timeout.
#[derive(Debug, Clone)]
pub(crate) struct RemoteRuntime {
    rt: Arc<Runtime>,
    timeout: Option<Duration>,
}

impl RemoteRuntime {
    pub(crate) fn new(timeout: Option<Duration>) -> StorageResult<Self> {
        let rt = Runtime::new().context(RuntimeSnafu)?;
        Ok(Self {
            rt: Arc::new(rt),
            timeout,
        })
    }

    pub(crate) fn runtime(&self) -> Arc<Runtime> {
        self.rt.clone()
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Block the calling thread on `fut`, failing with
    /// [`StorageError::Timeout`] if the configured timeout elapses first.
    pub(crate) fn block_on<T, F>(
        &self,
        op: &'static str,
        id: &str,
        fut: F,
    ) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        match self.timeout {
            None => self.rt.block_on(fut),
            Some(after) => self.rt.block_on(async {
                match tokio::time::timeout(after, fut).await {
                    Ok(out) => out,
                    Err(_) => Err(StorageError::Timeout {
                        op,
                        id: id.to_string(),
                        after,
                    }),
                }
            }),
        }
    }
}

/// Fails any call of the wrapped store that has not answered within
/// `after`. Listing streams are passed through unbounded; each call bounds
/// the time until the response starts, not the body transfer.
#[derive(Debug)]
pub(crate) struct TimeoutStore {
    inner: Arc<dyn ObjectStore>,
    after: Duration,
}

impl TimeoutStore {
    pub(crate) fn new(inner: Arc<dyn ObjectStore>, after: Duration) -> Self {
        Self { inner, after }
    }

    async fn bounded<T>(&self, call: impl Future<Output = ObjectStoreResult<T>>) -> ObjectStoreResult<T> {
        match tokio::time::timeout(self.after, call).await {
            Ok(out) => out,
            Err(_) => Err(object_store::Error::Generic {
                store: "timeout",
                source: format!("no response from {} within {:?}", self.inner, self.after).into(),
            }),
        }
    }
}

impl fmt::Display for TimeoutStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeoutStore({}, {:?})", self.inner, self.after)
    }
}

#[async_trait::async_trait]
impl ObjectStore for TimeoutStore {
    async fn put_opts(
        &self,
        location: &ObjectPath,
        payload: PutPayload,
        opts: PutOptions,
    ) -> ObjectStoreResult<PutResult> {
        self.bounded(self.inner.put_opts(location, payload, opts)).await
    }

    async fn put_multipart_opts(
        &self,
        location: &ObjectPath,
        opts: PutMultipartOptions,
    ) -> ObjectStoreResult<Box<dyn MultipartUpload>> {
        self.bounded(self.inner.put_multipart_opts(location, opts)).await
    }

    async fn get_opts(&self, location: &ObjectPath, options: GetOptions) -> ObjectStoreResult<GetResult> {
        self.bounded(self.inner.get_opts(location, options)).await
    }

    async fn delete(&self, location: &ObjectPath) -> ObjectStoreResult<()> {
        self.bounded(self.inner.delete(location)).await
    }

    fn list(&self, prefix: Option<&ObjectPath>) -> BoxStream<'static, ObjectStoreResult<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&ObjectPath>) -> ObjectStoreResult<ListResult> {
        self.bounded(self.inner.list_with_delimiter(prefix)).await
    }

    async fn copy(&self, from: &ObjectPath, to: &ObjectPath) -> ObjectStoreResult<()> {
        self.bounded(self.inner.copy(from, to)).await
    }

    async fn copy_if_not_exists(&self, from: &ObjectPath, to: &ObjectPath) -> ObjectStoreResult<()> {
        self.bounded(self.inner.copy_if_not_exists(from, to)).await
    }
}
