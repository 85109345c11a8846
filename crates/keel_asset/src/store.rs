use std::{any::Any, sync::Arc, time::SystemTime};

use bitflags::bitflags;

use crate::{
    bin::BlobMeta,
    format::AssetFormat,
    id::AssetId,
    loader::{LoadError, LoadTask},
};

bitflags! {
    /// Lifecycle state of an asset record. At most one of LOADING / LOADED /
    /// FAILED / CLEANUP is set at any time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct AssetFlags: u8 {
        const LOADING = 1 << 0;
        const LOADED = 1 << 1;
        const FAILED = 1 << 2;
        const CLEANUP = 1 << 3;
        /// The source was modified (or a reload was requested) since the
        /// last load. Cleared when a new load starts.
        const CHANGED = 1 << 4;
        /// Bypass the configured unload delay for the next unload.
        const INSTANT_UNLOAD = 1 << 5;

        const ACTIVE = Self::LOADING.bits() | Self::LOADED.bits() | Self::FAILED.bits();
    }
}

/// Pending acquire / release counts to be folded into the reference count at
/// the next reconciliation. Concurrent submissions combine additively.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Dirty {
    pub num_acquire: u32,
    pub num_release: u32,
}

/// A serialized blob waiting to be handed to the io backend's cache.
pub(crate) struct CacheRequest {
    pub meta: BlobMeta,
    pub blob: Vec<u8>,
}

/// Reverse dependency edges, stored on the dependency side. The single-entry
/// representation avoids an allocation for the overwhelmingly common case of
/// one dependent.
#[derive(Default)]
pub(crate) enum Dependents {
    #[default]
    None,
    Single(AssetId),
    Many(Vec<AssetId>),
}

impl Dependents {
    pub fn add(&mut self, dependent: AssetId) {
        match self {
            Dependents::None => *self = Dependents::Single(dependent),
            Dependents::Single(existing) => {
                if *existing != dependent {
                    *self = Dependents::Many(vec![*existing, dependent]);
                }
            }
            Dependents::Many(entries) => {
                if !entries.contains(&dependent) {
                    entries.push(dependent);
                }
            }
        }
    }

    pub fn collect(&self) -> Vec<AssetId> {
        match self {
            Dependents::None => Vec::new(),
            Dependents::Single(id) => vec![*id],
            Dependents::Many(entries) => entries.clone(),
        }
    }
}

/// Per-handle bookkeeping owned by the manager.
pub(crate) struct AssetRecord {
    pub id: Arc<str>,
    pub ref_count: u16,
    /// Monotonic count of load attempts.
    pub load_count: u16,
    /// Ticks spent at zero reference count since the last release.
    pub unload_ticks: u16,
    pub flags: AssetFlags,
    /// Source format of the last load (valid if `load_count > 0`).
    pub load_format: AssetFormat,
    /// Source modification time of the last load (valid if `load_count > 0`).
    pub load_mod_time: SystemTime,
    /// The loaded runtime value, present exactly while LOADED (and briefly
    /// during the LOADING -> LOADED transition).
    pub value: Option<Box<dyn Any + Send + Sync>>,
    /// In-flight multi-frame load, polled once per tick.
    pub task: Option<Box<dyn LoadTask>>,
    /// Failure reported by the loader or the io backend; sticky until the
    /// failed flag is cleared by a reacquire.
    pub error: Option<LoadError>,
    pub dependents: Dependents,
    pub dirty: Option<Dirty>,
    pub cache_request: Option<CacheRequest>,
}

impl AssetRecord {
    pub fn new(id: Arc<str>) -> Self {
        Self {
            id,
            ref_count: 0,
            load_count: 0,
            unload_ticks: 0,
            flags: AssetFlags::empty(),
            load_format: AssetFormat::Raw,
            load_mod_time: SystemTime::UNIX_EPOCH,
            value: None,
            task: None,
            error: None,
            dependents: Dependents::None,
            dirty: None,
            cache_request: None,
        }
    }
}

struct Slot {
    generation: u32,
    record: AssetRecord,
}

/// Generational storage of asset records. Records are never removed: handles
/// are stable for the lifetime of the process, the generation exists to
/// reject ids minted by a different manager instance.
#[derive(Default)]
pub(crate) struct AssetStore {
    slots: Vec<Slot>,
}

impl AssetStore {
    pub fn alloc(&mut self, record: AssetRecord) -> AssetId {
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            record,
        });
        AssetId {
            index,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn id_at(&self, index: usize) -> Option<AssetId> {
        self.slots.get(index).map(|slot| AssetId {
            index: index as u32,
            generation: slot.generation,
        })
    }

    pub fn record(&self, id: AssetId) -> Option<&AssetRecord> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .map(|slot| &slot.record)
    }

    pub fn record_mut(&mut self, id: AssetId) -> Option<&mut AssetRecord> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .map(|slot| &mut slot.record)
    }
}
