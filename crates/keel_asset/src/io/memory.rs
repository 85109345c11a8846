use std::{sync::Arc, time::SystemTime};

use tracing::warn;

use crate::{
    format::AssetFormat,
    id::id_hash,
    io::{AssetBlob, AssetIo, AssetIoError},
};

/// In-memory [`AssetIo`] implementation, primarily intended for unit tests.
///
/// Entries are kept as a `(id hash, bytes)` array sorted on the hash. There is
/// no change detection and no cache.
#[derive(Default, Clone)]
pub struct MemoryAssetIo {
    entries: Arc<[(u32, Arc<[u8]>)]>,
}

impl MemoryAssetIo {
    /// Build a backend from `(id, content)` records.
    pub fn from_records<I, D>(records: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, D)>,
        D: Into<Vec<u8>>,
    {
        let mut entries: Vec<(u32, Arc<[u8]>)> = records
            .into_iter()
            .map(|(id, data)| (id_hash(id), data.into().into()))
            .collect();
        entries.sort_by_key(|(hash, _)| *hash);
        Self {
            entries: entries.into(),
        }
    }
}

impl AssetIo for MemoryAssetIo {
    fn open(&self, id: &str) -> Result<AssetBlob, AssetIoError> {
        let hash = id_hash(id);
        let Ok(index) = self.entries.binary_search_by_key(&hash, |(h, _)| *h) else {
            warn!(id = %id, "failed to find asset entry");
            return Err(AssetIoError::NotFound(id.to_owned()));
        };
        Ok(AssetBlob {
            data: self.entries[index].1.to_vec().into_boxed_slice(),
            format: AssetFormat::from_id(id),
            mod_time: SystemTime::UNIX_EPOCH,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_finds_records_by_id() {
        let io = MemoryAssetIo::from_records([("a.raw", &b"hello"[..]), ("b.tga", &b"tga"[..])]);
        let blob = io.open("a.raw").unwrap();
        assert_eq!(&blob.data[..], b"hello");
        assert_eq!(blob.format, AssetFormat::Raw);
        assert_eq!(io.open("b.tga").unwrap().format, AssetFormat::TexTga);
    }

    #[test]
    fn open_reports_missing_entries() {
        let io = MemoryAssetIo::from_records([("a.raw", &b"hello"[..])]);
        assert!(matches!(
            io.open("missing.raw"),
            Err(AssetIoError::NotFound(_))
        ));
    }
}
