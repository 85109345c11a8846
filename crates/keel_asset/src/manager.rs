use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use bitflags::bitflags;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, warn};

use crate::{
    event::AssetEvent,
    format::AssetFormat,
    id::{AssetId, id_hash},
    io::AssetIo,
    loader::{AssetLoader, Load, LoadContext, LoadError, TaskState},
    store::{AssetFlags, AssetRecord, AssetStore, Dirty},
};

/// Time the reconciliation tick may spend starting new loads before deferring
/// the remaining dirty handles to the next tick. In-flight loads are
/// unaffected.
const MAX_LOAD_TIME_PER_TICK: Duration = Duration::from_millis(2);

/// Ticks to delay unloading of released assets. This prevents loading the
/// same asset multiple times when different systems request and release it in
/// quick succession.
const MAX_UNLOAD_DELAY: u16 = 500;

/// Maximum number of handles a single query yields.
pub const ASSET_QUERY_MAX_RESULTS: usize = 512;

bitflags! {
    /// Behavior switches supplied by the embedding application.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AssetManagerFlags: u8 {
        /// Poll the io backend for source changes and invalidate affected
        /// assets (and their dependents).
        const TRACK_CHANGES = 1 << 0;
        /// Keep released assets resident for a while before unloading.
        const DELAY_UNLOAD = 1 << 1;
    }
}

enum AssetOp {
    Acquire(AssetId),
    Release(AssetId),
    Reload(AssetId),
}

/// Cloneable submission handle for acquire / release / reload requests.
/// Usable from any thread; requests fold into the owning manager at its next
/// [`AssetManager::tick`].
#[derive(Clone)]
pub struct AssetOps {
    tx: Sender<AssetOp>,
}

impl AssetOps {
    pub fn acquire(&self, asset: AssetId) {
        self.tx.send(AssetOp::Acquire(asset)).unwrap();
    }

    pub fn release(&self, asset: AssetId) {
        self.tx.send(AssetOp::Release(asset)).unwrap();
    }

    pub fn reload(&self, asset: AssetId) {
        self.tx.send(AssetOp::Reload(asset)).unwrap();
    }
}

/// Process-wide asset registry: owns a stable handle per asset id, reconciles
/// reference counts against load state once per tick, dispatches loaders,
/// tracks dependency edges and persists cache blobs.
pub struct AssetManager {
    io: Box<dyn AssetIo>,
    flags: AssetManagerFlags,
    /// `(id hash, handle)` entries, kept sorted on the hash.
    lookup: Vec<(u32, AssetId)>,
    store: AssetStore,
    ops_tx: Sender<AssetOp>,
    ops_rx: Receiver<AssetOp>,
    loaders: crate::loader::LoaderRegistry,
    events: Vec<AssetEvent>,
    /// Reload requests routed through the change propagation pass.
    reload_requests: Vec<AssetId>,
}

impl AssetManager {
    pub fn new(io: impl AssetIo, flags: AssetManagerFlags) -> Self {
        Self::from_boxed(Box::new(io), flags)
    }

    pub fn from_boxed(io: Box<dyn AssetIo>, flags: AssetManagerFlags) -> Self {
        let (ops_tx, ops_rx) = crossbeam_channel::unbounded();
        Self {
            io,
            flags,
            lookup: Vec::new(),
            store: AssetStore::default(),
            ops_tx,
            ops_rx,
            loaders: crate::loader::LoaderRegistry::default(),
            events: Vec::new(),
            reload_requests: Vec::new(),
        }
    }

    /// Register the loader responsible for a source format.
    pub fn register_loader(&mut self, format: AssetFormat, loader: impl AssetLoader) {
        self.loaders.set(format, Arc::new(loader));
    }

    /// Resolve an id to its stable handle, creating the record on first use.
    /// Does not start loading; loads start once the handle is acquired.
    pub fn lookup(&mut self, id: &str) -> AssetId {
        assert!(!id.is_empty(), "asset id cannot be empty");
        let hash = id_hash(id);
        match self.lookup.binary_search_by_key(&hash, |entry| entry.0) {
            Ok(index) => self.lookup[index].1,
            Err(index) => {
                let asset = self.store.alloc(AssetRecord::new(id.into()));
                self.lookup.insert(index, (hash, asset));
                asset
            }
        }
    }

    /// [`AssetManager::lookup`] for possibly-empty ids.
    pub fn maybe_lookup(&mut self, id: &str) -> Option<AssetId> {
        if id.is_empty() {
            None
        } else {
            Some(self.lookup(id))
        }
    }

    /// Queue an acquire; loading begins at the next tick when the reference
    /// count transitions to positive.
    pub fn acquire(&self, asset: AssetId) {
        self.ops_tx.send(AssetOp::Acquire(asset)).unwrap();
    }

    /// Queue a release. An in-flight load is not stopped, but the asset
    /// becomes eligible for unload once the reference count reaches zero.
    pub fn release(&self, asset: AssetId) {
        self.ops_tx.send(AssetOp::Release(asset)).unwrap();
    }

    /// Mark the asset as changed and bypass the normal unload delay, forcing
    /// a reload. Dependents are invalidated along with it.
    pub fn reload(&self, asset: AssetId) {
        self.ops_tx.send(AssetOp::Reload(asset)).unwrap();
    }

    /// A cloneable handle for submitting acquire / release / reload requests
    /// from other threads.
    pub fn ops(&self) -> AssetOps {
        AssetOps {
            tx: self.ops_tx.clone(),
        }
    }

    /// Record a dependency edge: when `dependency` changes or fails,
    /// `dependent` is invalidated with it. Edges are append-only.
    pub fn register_dep(&mut self, dependent: AssetId, dependency: AssetId) {
        if let Some(record) = self.store.record_mut(dependency) {
            record.dependents.add(dependent);
        }
    }

    /// Collect handles for every asset id matching the glob `pattern`,
    /// capped at [`ASSET_QUERY_MAX_RESULTS`].
    pub fn query(&mut self, pattern: &str) -> Vec<AssetId> {
        let mut ids: Vec<String> = Vec::new();
        self.io.query(pattern, &mut |id| {
            if ids.len() != ASSET_QUERY_MAX_RESULTS {
                ids.push(id.to_owned());
            }
        });
        ids.iter().map(|id| self.lookup(id)).collect()
    }

    /// Write new content for the given id through the io backend.
    pub fn save(&mut self, id: &str, data: &[u8]) -> bool {
        debug_assert!(
            id.rsplit_once('.').is_some_and(|(_, ext)| !ext.is_empty()),
            "asset ids must have an extension"
        );
        self.io.save(id, data)
    }

    /// Resolve the id string of a handle.
    pub fn id_of(&self, asset: AssetId) -> Option<&str> {
        self.store.record(asset).map(|record| &*record.id)
    }

    /// Resolve a printable path for the asset, when the backend has one.
    pub fn path_of(&self, asset: AssetId) -> Option<std::path::PathBuf> {
        self.io.path(self.store.record(asset)?.id.as_ref())
    }

    pub fn ref_count(&self, asset: AssetId) -> u32 {
        self.store
            .record(asset)
            .map_or(0, |record| u32::from(record.ref_count))
    }

    pub fn load_count(&self, asset: AssetId) -> u32 {
        self.store
            .record(asset)
            .map_or(0, |record| u32::from(record.load_count))
    }

    pub fn is_loading(&self, asset: AssetId) -> bool {
        self.flags_of(asset).contains(AssetFlags::LOADING)
    }

    pub fn is_loaded(&self, asset: AssetId) -> bool {
        self.flags_of(asset).contains(AssetFlags::LOADED)
    }

    pub fn is_failed(&self, asset: AssetId) -> bool {
        self.flags_of(asset).contains(AssetFlags::FAILED)
    }

    pub fn is_changed(&self, asset: AssetId) -> bool {
        self.flags_of(asset).contains(AssetFlags::CHANGED)
    }

    /// True when the asset carries no load state: not loading, not loaded,
    /// not failed and not pending cleanup.
    pub fn is_idle(&self, asset: AssetId) -> bool {
        !self
            .flags_of(asset)
            .intersects(AssetFlags::ACTIVE | AssetFlags::CLEANUP)
    }

    /// Read the runtime value of a loaded asset.
    pub fn get<T: 'static>(&self, asset: AssetId) -> Option<&T> {
        self.store
            .record(asset)?
            .value
            .as_deref()?
            .downcast_ref::<T>()
    }

    /// Drain the lifecycle events queued since the last call.
    pub fn take_events(&mut self) -> Vec<AssetEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run one reconciliation tick with the default load-start budget.
    pub fn tick(&mut self) {
        self.tick_budgeted(MAX_LOAD_TIME_PER_TICK);
    }

    /// Run one reconciliation tick: fold pending acquire / release requests,
    /// advance load state machines within the load-start budget, poll the io
    /// backend for source changes (propagating to dependents) and flush
    /// pending cache blobs.
    pub fn tick_budgeted(&mut self, load_budget: Duration) {
        self.fold_ops();
        self.reconcile(load_budget);
        self.poll_changes();
        self.flush_cache_requests();
    }

    fn flags_of(&self, asset: AssetId) -> AssetFlags {
        self.store
            .record(asset)
            .map_or(AssetFlags::empty(), |record| record.flags)
    }

    pub(crate) fn record_mut(&mut self, asset: AssetId) -> Option<&mut AssetRecord> {
        self.store.record_mut(asset)
    }

    fn fold_ops(&mut self) {
        while let Ok(op) = self.ops_rx.try_recv() {
            match op {
                AssetOp::Acquire(asset) => {
                    if let Some(record) = self.store.record_mut(asset) {
                        record.dirty.get_or_insert_default().num_acquire += 1;
                    }
                }
                AssetOp::Release(asset) => {
                    if let Some(record) = self.store.record_mut(asset) {
                        record.dirty.get_or_insert_default().num_release += 1;
                    }
                }
                AssetOp::Reload(asset) => self.reload_requests.push(asset),
            }
        }
    }

    fn reconcile(&mut self, load_budget: Duration) {
        let mut load_time = Duration::ZERO;
        for index in 0..self.store.len() {
            let Some(asset) = self.store.id_at(index) else {
                continue;
            };
            let is_dirty = self
                .store
                .record(asset)
                .is_some_and(|record| record.dirty.is_some());
            if is_dirty {
                self.reconcile_asset(asset, load_budget, &mut load_time);
            }
        }
    }

    /// Advance the state machine of a single dirty handle.
    fn reconcile_asset(&mut self, asset: AssetId, load_budget: Duration, load_time: &mut Duration) {
        let record = self.store.record_mut(asset).expect("dirty record exists");
        let dirty = record.dirty.take().unwrap_or_default();

        let folded = u32::from(record.ref_count) + dirty.num_acquire;
        assert!(folded >= dirty.num_release, "unbalanced acquire / release");
        record.ref_count = (folded - dirty.num_release).min(u32::from(u16::MAX)) as u16;

        if record.flags.contains(AssetFlags::FAILED) {
            // The asset failed before but was acquired again; clear the state
            // to retry.
            record.flags -= AssetFlags::FAILED;
            record.error = None;
            record.dirty = Some(Dirty::default());
            return;
        }

        if record.flags.contains(AssetFlags::CLEANUP) {
            record.flags -= AssetFlags::CLEANUP;
            if record.ref_count > 0 {
                record.dirty = Some(Dirty::default());
            }
            return;
        }

        if record.ref_count > 0 && !record.flags.intersects(AssetFlags::ACTIVE) {
            record.unload_ticks = 0;
            // Start loading, unless this tick's load-start budget is already
            // spent; the handle stays dirty and is retried next tick.
            if *load_time < load_budget {
                record.flags |= AssetFlags::LOADING;
                record.flags -= AssetFlags::CHANGED;
                let start = Instant::now();
                self.start_load(asset);
                *load_time += start.elapsed();
            }
            if let Some(record) = self.store.record_mut(asset) {
                record.dirty = Some(Dirty::default());
            }
            return;
        }

        if record.flags.contains(AssetFlags::LOADING) {
            let has_task = record.task.is_some();
            let settled = record.value.is_some() || record.error.is_some();
            if has_task && !settled {
                self.poll_task(asset);
            }
            let record = self.store.record_mut(asset).expect("record exists");

            if let Some(err) = record.error.take() {
                let id = record.id.clone();
                record.task = None;
                record.flags -= AssetFlags::LOADING;

                if matches!(err, LoadError::MalformedCache(_)) {
                    // Drop the stale cache blob and retry from the source.
                    warn!(id = %id, error = %err, "discarding malformed asset cache blob");
                    self.io.discard_cache(&id);
                    if let Some(record) = self.store.record_mut(asset) {
                        record.dirty = Some(Dirty::default());
                    }
                    return;
                }

                let err_text = err.to_string();
                record.flags |= AssetFlags::FAILED;
                record.error = Some(err);
                // Assets depending on this one most likely want to reload as
                // well; let them skip the unload delay.
                let dependents = record.dependents.collect();
                error!(id = %id, asset = ?asset, error = %err_text, "failed to load asset");
                for dependent in dependents {
                    if let Some(dep_record) = self.store.record_mut(dependent) {
                        dep_record.flags |= AssetFlags::INSTANT_UNLOAD;
                    }
                }
                self.events.push(AssetEvent::Failed { id: asset });
                return;
            }

            if record.value.is_some() {
                record.task = None;
                record.flags -= AssetFlags::LOADING;
                record.flags |= AssetFlags::LOADED;
                if record.ref_count == 0 {
                    // Released while the load was in flight; the value is
                    // immediately eligible for unload.
                    record.dirty = Some(Dirty::default());
                }
                self.events.push(AssetEvent::Loaded { id: asset });
                return;
            }

            // Still loading; revisit next tick.
            record.dirty = Some(Dirty::default());
            return;
        }

        if record
            .flags
            .contains(AssetFlags::CHANGED | AssetFlags::LOADED)
        {
            // The source changed while resident: detach the value now and let
            // the (still referenced) handle re-enter the loading path.
            record.value = None;
            record.flags -= AssetFlags::LOADED | AssetFlags::INSTANT_UNLOAD;
            record.flags |= AssetFlags::CLEANUP;
            record.dirty = Some(Dirty::default());
            self.events.push(AssetEvent::Unloaded { id: asset });
            return;
        }

        let unload_delay = if record.flags.contains(AssetFlags::INSTANT_UNLOAD) {
            0
        } else if self.flags.contains(AssetManagerFlags::DELAY_UNLOAD) {
            MAX_UNLOAD_DELAY
        } else {
            0
        };

        if record.ref_count == 0 {
            record.unload_ticks = record.unload_ticks.saturating_add(1);
            if record.unload_ticks >= unload_delay {
                if record.flags.contains(AssetFlags::LOADED) {
                    record.value = None;
                    record.flags -= AssetFlags::LOADED | AssetFlags::INSTANT_UNLOAD;
                    record.flags |= AssetFlags::CLEANUP;
                    record.dirty = Some(Dirty::default());
                    self.events.push(AssetEvent::Unloaded { id: asset });
                }
                // Nothing resident; the handle can rest.
                return;
            }
            record.dirty = Some(Dirty::default());
            return;
        }

        // Loaded with a positive reference count: no further updates needed
        // until the next acquire / release / change.
    }

    fn start_load(&mut self, asset: AssetId) {
        let id = self
            .store
            .record(asset)
            .expect("loading record exists")
            .id
            .clone();

        let blob = match self.io.open(&id) {
            Ok(blob) => blob,
            Err(err) => {
                if let Some(record) = self.store.record_mut(asset) {
                    record.error = Some(LoadError::SourceOpen(err));
                }
                return;
            }
        };

        if self.flags.contains(AssetManagerFlags::TRACK_CHANGES) {
            self.io.watch(&id, asset.to_bits());
        }

        if let Some(record) = self.store.record_mut(asset) {
            record.load_count = record.load_count.saturating_add(1);
            record.load_format = blob.format;
            record.load_mod_time = blob.mod_time;
        }

        debug!(
            id = %id,
            format = %blob.format,
            size = blob.data.len(),
            "asset load started"
        );

        let Some(loader) = self.loaders.get(blob.format) else {
            if let Some(record) = self.store.record_mut(asset) {
                record.error = Some(LoadError::UnsupportedFormat(blob.format));
            }
            return;
        };

        let result = loader.load(
            &mut LoadContext {
                manager: self,
                asset,
                id,
            },
            blob,
        );

        let Some(record) = self.store.record_mut(asset) else {
            return;
        };
        match result {
            Ok(Load::Done(value)) => record.value = Some(value),
            Ok(Load::Pending(task)) => record.task = Some(task),
            Err(err) => record.error = Some(err),
        }
    }

    fn poll_task(&mut self, asset: AssetId) {
        let record = self.store.record_mut(asset).expect("record exists");
        let Some(mut task) = record.task.take() else {
            return;
        };
        let id = record.id.clone();

        let result = task.poll(&mut LoadContext {
            manager: self,
            asset,
            id,
        });

        let Some(record) = self.store.record_mut(asset) else {
            return;
        };
        match result {
            Ok(TaskState::Pending) => record.task = Some(task),
            Ok(TaskState::Done(value)) => record.value = Some(value),
            Err(err) => record.error = Some(err),
        }
    }

    /// Drain change notifications from the io backend and reload requests,
    /// marking affected assets (and their dependents) as changed and
    /// instantly unloadable.
    fn poll_changes(&mut self) {
        let mut changed: Vec<AssetId> = std::mem::take(&mut self.reload_requests);
        if self.flags.contains(AssetManagerFlags::TRACK_CHANGES) {
            while let Some(token) = self.io.poll_changed() {
                changed.push(AssetId::from_bits(token));
            }
        }

        for asset in changed {
            self.mark_changed(asset);
            let dependents = self
                .store
                .record(asset)
                .map(|record| record.dependents.collect())
                .unwrap_or_default();
            for dependent in dependents {
                self.mark_changed(dependent);
            }
        }
    }

    fn mark_changed(&mut self, asset: AssetId) {
        let Some(record) = self.store.record_mut(asset) else {
            return;
        };
        record.flags |= AssetFlags::CHANGED | AssetFlags::INSTANT_UNLOAD;
        record.dirty.get_or_insert_default();
        self.events.push(AssetEvent::Changed { id: asset });
    }

    /// Hand pending cache blobs to the io backend. Runs after reconciliation
    /// so only assets that reached the loaded state are persisted.
    fn flush_cache_requests(&mut self) {
        for index in 0..self.store.len() {
            let Some(asset) = self.store.id_at(index) else {
                continue;
            };
            let Some(record) = self.store.record_mut(asset) else {
                continue;
            };
            let Some(request) = record.cache_request.take() else {
                continue;
            };
            debug_assert!(record.load_count > 0);
            let id = record.id.clone();
            let mod_time = record.load_mod_time;
            self.io.cache(&id, request.meta, mod_time, &request.blob);
        }
    }
}
