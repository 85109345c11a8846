use std::{any::Any, sync::Arc};

use thiserror::Error;

use crate::{
    bin::{BlobCodec, CacheError, write_blob},
    format::AssetFormat,
    id::AssetId,
    io::{AssetBlob, AssetIoError},
    manager::AssetManager,
    store::CacheRequest,
};

/// A boxed runtime asset value, attached to the handle once loading finishes.
pub type AssetValue = Box<dyn Any + Send + Sync>;

/// Errors surfaced by the manager when a load terminates unsuccessfully.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open asset source: {0}")]
    SourceOpen(#[from] AssetIoError),
    #[error("format '{0}' cannot be loaded directly")]
    UnsupportedFormat(AssetFormat),
    /// A cached binary failed to decode. The manager discards the blob and
    /// retries from the source instead of failing the asset.
    #[error("malformed cache blob: {0}")]
    MalformedCache(#[from] CacheError),
    #[error("{0}")]
    Loader(Box<dyn core::error::Error + Send + Sync>),
}

impl LoadError {
    /// Wrap a loader specific error.
    pub fn loader(err: impl core::error::Error + Send + Sync + 'static) -> Self {
        Self::Loader(Box::new(err))
    }
}

/// Outcome of starting a load.
pub enum Load {
    /// The value was produced synchronously.
    Done(AssetValue),
    /// The load needs more ticks (waiting on dependency assets); the task is
    /// polled once per reconciliation tick until it resolves.
    Pending(Box<dyn LoadTask>),
}

/// Progress of a multi-frame load.
pub enum TaskState {
    Pending,
    Done(AssetValue),
}

/// An in-flight multi-frame load. Tasks never block: a task waiting on a
/// dependency returns [`TaskState::Pending`] and is revisited next tick.
pub trait LoadTask: Send + Sync {
    fn poll(&mut self, ctx: &mut LoadContext) -> Result<TaskState, LoadError>;
}

/// A format specific loader, invoked by the manager when a load starts.
pub trait AssetLoader: Send + Sync + 'static {
    fn load(&self, ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError>;
}

/// Loader table indexed by source format. An empty slot makes loads of that
/// format fail with [`LoadError::UnsupportedFormat`].
pub(crate) struct LoaderRegistry {
    loaders: Vec<Option<Arc<dyn AssetLoader>>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut loaders = Vec::new();
        loaders.resize_with(AssetFormat::COUNT, || None);
        Self { loaders }
    }
}

impl LoaderRegistry {
    pub fn set(&mut self, format: AssetFormat, loader: Arc<dyn AssetLoader>) {
        self.loaders[format.index()] = Some(loader);
    }

    pub fn get(&self, format: AssetFormat) -> Option<Arc<dyn AssetLoader>> {
        self.loaders[format.index()].clone()
    }
}

/// The loader's window onto the manager while a load is in progress: it can
/// resolve and acquire dependency assets, inspect their state, and queue a
/// cache blob for the asset being loaded. Also the hook point for import
/// environment extensions.
pub struct LoadContext<'a> {
    pub(crate) manager: &'a mut AssetManager,
    pub(crate) asset: AssetId,
    pub(crate) id: Arc<str>,
}

impl LoadContext<'_> {
    /// Id of the asset being loaded.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle of the asset being loaded.
    pub fn asset(&self) -> AssetId {
        self.asset
    }

    /// Resolve an id to its stable handle, creating the record on first use.
    pub fn lookup(&mut self, id: &str) -> AssetId {
        self.manager.lookup(id)
    }

    /// Queue an acquire for a dependency; takes effect at the next tick.
    pub fn acquire(&self, asset: AssetId) {
        self.manager.acquire(asset);
    }

    /// Queue a release for a previously acquired dependency.
    pub fn release(&self, asset: AssetId) {
        self.manager.release(asset);
    }

    /// Record that the asset being loaded depends on `dependency`: when the
    /// dependency changes (or fails), this asset is invalidated with it.
    pub fn register_dep(&mut self, dependency: AssetId) {
        let dependent = self.asset;
        self.manager.register_dep(dependent, dependency);
    }

    pub fn is_loaded(&self, asset: AssetId) -> bool {
        self.manager.is_loaded(asset)
    }

    pub fn is_failed(&self, asset: AssetId) -> bool {
        self.manager.is_failed(asset)
    }

    /// Read the runtime value of a loaded asset.
    pub fn get<T: 'static>(&self, asset: AssetId) -> Option<&T> {
        self.manager.get(asset)
    }

    /// Serialize `value` and queue it to be persisted by the cache writer at
    /// the end of the tick.
    pub fn cache<T: BlobCodec>(&mut self, value: &T) {
        let blob = write_blob(value);
        let asset = self.asset;
        if let Some(record) = self.manager.record_mut(asset) {
            record.cache_request = Some(CacheRequest {
                meta: T::meta(),
                blob,
            });
        }
    }
}

/// Runtime value of `raw` assets: the source bytes, verbatim.
pub struct RawAsset {
    pub data: Box<[u8]>,
}

/// Loader for the catch-all `raw` format.
pub struct RawLoader;

impl AssetLoader for RawLoader {
    fn load(&self, _ctx: &mut LoadContext, blob: AssetBlob) -> Result<Load, LoadError> {
        Ok(Load::Done(Box::new(RawAsset { data: blob.data })))
    }
}
