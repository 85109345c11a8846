//! Asset lifecycle management for the keel engine.
//!
//! An asset is a named blob of source data (a font file, an image, a JSON
//! definition) that is turned into a runtime value by a format specific
//! loader. The [`AssetManager`] owns a stable handle for every asset id,
//! tracks reference counts, drives loads across ticks, detects source
//! changes, propagates invalidation along dependency edges and persists
//! binary cache blobs through the active [`io::AssetIo`] backend.

pub mod io;

mod bin;
mod event;
mod format;
mod glob;
mod id;
mod loader;
mod manager;
mod store;

pub use bin::{BlobCodec, BlobMeta, BlobReader, BlobWriter, CacheError, read_blob, write_blob};
pub use event::AssetEvent;
pub use io::{
    AssetBlob, AssetIo, AssetIoError, FileAssetIo, MemoryAssetIo, PackAssetIo, QueryResult,
};
pub use format::AssetFormat;
pub use glob::glob_match;
pub use id::{AssetId, id_hash};
pub use loader::{
    AssetLoader, Load, LoadContext, LoadError, LoadTask, RawAsset, RawLoader, TaskState,
};
pub use manager::{ASSET_QUERY_MAX_RESULTS, AssetManager, AssetManagerFlags, AssetOps};
