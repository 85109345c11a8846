use std::path::PathBuf;

use crate::io::{AssetBlob, AssetIo, AssetIoError, QueryResult};

/// Pack-file [`AssetIo`] backend: a single archive holding every asset of a
/// shipped build.
///
/// Only the interface is established; opening always reports the asset as
/// missing until the pack format lands.
pub struct PackAssetIo {
    path: PathBuf,
}

impl PackAssetIo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing pack file.
    pub fn pack_path(&self) -> &PathBuf {
        &self.path
    }
}

impl AssetIo for PackAssetIo {
    fn open(&self, id: &str) -> Result<AssetBlob, AssetIoError> {
        // TODO: Implement pack region lookup and mapping.
        Err(AssetIoError::NotFound(id.to_owned()))
    }

    fn query(&self, _pattern: &str, _handler: &mut dyn FnMut(&str)) -> QueryResult {
        // TODO: Implement querying over the pack index.
        QueryResult::PatternNotSupported
    }
}
