//! Asset storage backends.
//!
//! An [`AssetIo`] implementation is the manager's window onto the outside
//! world: it resolves ids to source blobs, optionally persists cache blobs
//! and save requests, enumerates ids matching a glob and reports source
//! changes for registered watch tokens.

pub mod file;
pub mod memory;
pub mod pack;

use std::{io, path::PathBuf, sync::Arc, time::SystemTime};

use thiserror::Error;

use crate::{bin::BlobMeta, format::AssetFormat};

pub use file::FileAssetIo;
pub use memory::MemoryAssetIo;
pub use pack::PackAssetIo;

/// Errors that occur while opening an asset source.
#[derive(Error, Debug, Clone)]
pub enum AssetIoError {
    /// No source exists for the id.
    #[error("asset not found: {0}")]
    NotFound(String),
    /// Encountered an I/O error while opening the source.
    #[error("i/o error while opening asset: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for AssetIoError {
    fn from(value: io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}

/// Outcome of an [`AssetIo::query`] invocation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum QueryResult {
    Success,
    /// The backend has no query support at all.
    NotSupported,
    /// The backend cannot evaluate this particular pattern.
    PatternNotSupported,
    /// Querying was attempted but failed.
    Error,
}

/// An opened asset source: the raw bytes plus the detected format and the
/// source modification time.
pub struct AssetBlob {
    pub data: Box<[u8]>,
    pub format: AssetFormat,
    pub mod_time: SystemTime,
}

/// Abstract source of named blobs. Implementations have to be thread-safe.
///
/// Only [`AssetIo::open`] is mandatory; every other operation defaults to
/// an inert implementation so minimal backends (such as the in-memory one
/// used by tests) stay small.
pub trait AssetIo: Send + Sync + 'static {
    /// Resolve an id to a printable absolute path, when the backend has one.
    fn path(&self, id: &str) -> Option<PathBuf> {
        let _ = id;
        None
    }

    /// Open the source blob for the given id.
    fn open(&self, id: &str) -> Result<AssetBlob, AssetIoError>;

    /// Persist new content for the given id. Returns true on success.
    fn save(&self, id: &str, data: &[u8]) -> bool {
        let _ = (id, data);
        false
    }

    /// Invoke `handler` with every id matching the glob `pattern`.
    fn query(&self, pattern: &str, handler: &mut dyn FnMut(&str)) -> QueryResult {
        let _ = (pattern, handler);
        QueryResult::NotSupported
    }

    /// Subscribe to change notifications for the given id. The token is
    /// handed back verbatim through [`AssetIo::poll_changed`].
    fn watch(&self, id: &str, token: u64) {
        let _ = (id, token);
    }

    /// Drain one pending change notification, if any.
    fn poll_changed(&self) -> Option<u64> {
        None
    }

    /// Persist a cache blob for the given id. Best effort: failures are
    /// logged by the implementation and otherwise ignored.
    fn cache(&self, id: &str, meta: BlobMeta, mod_time: SystemTime, blob: &[u8]) {
        let _ = (id, meta, mod_time, blob);
    }

    /// Drop any cached blob held for the given id, typically because it
    /// failed to decode.
    fn discard_cache(&self, id: &str) {
        let _ = id;
    }
}
