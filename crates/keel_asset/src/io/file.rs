use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
    time::{Duration, SystemTime},
};

use crossbeam_channel::{Receiver, Sender};
use notify_debouncer_full::{
    DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
};
use tracing::warn;

use crate::{
    bin::{BlobMeta, BlobReader, read_blob_header},
    format::AssetFormat,
    glob::glob_match,
    id::id_hash,
    io::{AssetBlob, AssetIo, AssetIoError, QueryResult},
};

/// Debounce window for filesystem events. Holding on to events for a short
/// window removes duplicates and avoids observing half-written files.
const WATCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Directory under the root that holds cache blobs; hidden so queries and
/// editors don't pick it up.
const CACHE_DIR: &str = ".cache";

/// Filesystem [`AssetIo`] implementation rooted at a directory.
///
/// Ids are relative paths (with `/` separators) below the root. Cache blobs
/// are persisted under a hidden subdirectory keyed by the id hash and carry
/// the source modification time they were built from; `open` hands out the
/// cached binary instead of the source while the stamp still matches.
pub struct FileAssetIo {
    root: PathBuf,
    watch: Option<WatchState>,
}

struct WatchState {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    events: Receiver<String>,
    tokens: Mutex<HashMap<String, u64>>,
}

impl FileAssetIo {
    /// Create a backend without change detection.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            watch: None,
        }
    }

    /// Create a backend that watches the root for source changes.
    pub fn with_change_watching(root: impl Into<PathBuf>) -> Result<Self, notify::Error> {
        let root: PathBuf = root.into();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let debouncer = new_watch_debouncer(root.clone(), sender)?;
        Ok(Self {
            root,
            watch: Some(WatchState {
                _debouncer: debouncer,
                events: receiver,
                tokens: Mutex::default(),
            }),
        })
    }

    /// The directory this backend is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cache_blob_path(&self, id: &str) -> PathBuf {
        self.root
            .join(CACHE_DIR)
            .join(format!("{:08x}.blob", id_hash(id)))
    }

    /// Open the cached binary for `id` if one exists and was built from the
    /// present source version.
    fn cache_open(&self, id: &str, source_mod_time: SystemTime) -> Option<AssetBlob> {
        let data = std::fs::read(self.cache_blob_path(id)).ok()?;
        let (stamp, blob) = data.split_first_chunk::<12>()?;
        let secs = u64::from_le_bytes(stamp[0..8].try_into().ok()?);
        let nanos = u32::from_le_bytes(stamp[8..12].try_into().ok()?);
        let cached_mod_time = SystemTime::UNIX_EPOCH + Duration::new(secs, nanos);
        if cached_mod_time != source_mod_time {
            return None; // Cache is from a different source version.
        }
        let meta = read_blob_header(&mut BlobReader::new(blob)).ok()?;
        let format = AssetFormat::from_bin_meta(meta)?;
        Some(AssetBlob {
            data: blob.to_vec().into_boxed_slice(),
            format,
            mod_time: source_mod_time,
        })
    }
}

impl AssetIo for FileAssetIo {
    fn path(&self, id: &str) -> Option<PathBuf> {
        Some(self.root.join(id))
    }

    fn open(&self, id: &str) -> Result<AssetBlob, AssetIoError> {
        let path = self.root.join(id);
        let metadata = std::fs::metadata(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                AssetIoError::NotFound(id.to_owned())
            } else {
                AssetIoError::from(err)
            }
        })?;
        let mod_time = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        if let Some(blob) = self.cache_open(id, mod_time) {
            return Ok(blob);
        }

        let data = std::fs::read(&path).map_err(AssetIoError::from)?;
        Ok(AssetBlob {
            data: data.into_boxed_slice(),
            format: AssetFormat::from_id(id),
            mod_time,
        })
    }

    fn save(&self, id: &str, data: &[u8]) -> bool {
        let path = self.root.join(id);
        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(id = %id, error = %err, "failed to create asset directory");
                return false;
            }
        }
        match std::fs::write(&path, data) {
            Ok(()) => true,
            Err(err) => {
                warn!(id = %id, error = %err, "failed to save asset");
                false
            }
        }
    }

    fn query(&self, pattern: &str, handler: &mut dyn FnMut(&str)) -> QueryResult {
        fn visit(
            dir: &Path,
            root: &Path,
            pattern: &str,
            handler: &mut dyn FnMut(&str),
        ) -> std::io::Result<()> {
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                let name = entry.file_name();
                if name.to_string_lossy().starts_with('.') {
                    continue;
                }
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    visit(&path, root, pattern, handler)?;
                } else if let Ok(relative) = path.strip_prefix(root) {
                    let id = relative.to_string_lossy().replace('\\', "/");
                    if glob_match(pattern, &id, false) {
                        handler(&id);
                    }
                }
            }
            Ok(())
        }

        match visit(&self.root, &self.root, pattern, handler) {
            Ok(()) => QueryResult::Success,
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "asset query failed");
                QueryResult::Error
            }
        }
    }

    fn watch(&self, id: &str, token: u64) {
        if let Some(watch) = &self.watch {
            watch
                .tokens
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id.to_owned(), token);
        }
    }

    fn poll_changed(&self) -> Option<u64> {
        let watch = self.watch.as_ref()?;
        let tokens = watch.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        while let Ok(id) = watch.events.try_recv() {
            if let Some(token) = tokens.get(&id) {
                return Some(*token);
            }
        }
        None
    }

    fn cache(&self, id: &str, _meta: BlobMeta, mod_time: SystemTime, blob: &[u8]) {
        let path = self.cache_blob_path(id);
        if let Err(err) = std::fs::create_dir_all(self.root.join(CACHE_DIR)) {
            warn!(id = %id, error = %err, "failed to create asset cache directory");
            return;
        }
        let elapsed = mod_time
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        let mut data = Vec::with_capacity(12 + blob.len());
        data.extend_from_slice(&elapsed.as_secs().to_le_bytes());
        data.extend_from_slice(&elapsed.subsec_nanos().to_le_bytes());
        data.extend_from_slice(blob);
        if let Err(err) = std::fs::write(&path, &data) {
            warn!(id = %id, error = %err, "failed to persist asset cache blob");
        }
    }

    fn discard_cache(&self, id: &str) {
        let _ = std::fs::remove_file(self.cache_blob_path(id));
    }
}

/// Spin up a debounced filesystem watcher that reports modified asset ids
/// (relative paths) through `sender`.
fn new_watch_debouncer(
    root: PathBuf,
    sender: Sender<String>,
) -> Result<Debouncer<RecommendedWatcher, RecommendedCache>, notify::Error> {
    let handler_root = root.clone();
    let mut debouncer = new_debouncer(
        WATCH_DEBOUNCE,
        None,
        move |result: DebounceEventResult| match result {
            Ok(events) => {
                for event in &events {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        continue;
                    }
                    for path in &event.paths {
                        let Ok(relative) = path.strip_prefix(&handler_root) else {
                            continue;
                        };
                        let id = relative.to_string_lossy().replace('\\', "/");
                        if id.starts_with('.') {
                            continue; // Cache writes must not look like source changes.
                        }
                        sender.send(id).unwrap();
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    warn!(error = %error, "filesystem watcher error");
                }
            }
        },
    )?;
    debouncer.watch(&root, RecursiveMode::Recursive)?;
    Ok(debouncer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "keel-fileio-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn open_reads_source_bytes() {
        let root = temp_root("open");
        std::fs::write(root.join("a.raw"), b"hello").unwrap();

        let io = FileAssetIo::new(&root);
        let blob = io.open("a.raw").unwrap();
        assert_eq!(&blob.data[..], b"hello");
        assert_eq!(blob.format, AssetFormat::Raw);
        assert!(matches!(
            io.open("missing.raw"),
            Err(AssetIoError::NotFound(_))
        ));
    }

    #[test]
    fn save_round_trips() {
        let root = temp_root("save");
        let io = FileAssetIo::new(&root);
        assert!(io.save("nested/dir/b.raw", b"content"));
        assert_eq!(&io.open("nested/dir/b.raw").unwrap().data[..], b"content");
    }

    #[test]
    fn query_matches_globs() {
        let root = temp_root("query");
        let io = FileAssetIo::new(&root);
        assert!(io.save("a.tga", b"x"));
        assert!(io.save("sub/b.tga", b"x"));
        assert!(io.save("sub/c.raw", b"x"));

        let mut ids = Vec::new();
        let result = io.query("*.tga", &mut |id| ids.push(id.to_owned()));
        assert_eq!(result, QueryResult::Success);
        ids.sort();
        assert_eq!(ids, ["a.tga", "sub/b.tga"]);
    }

    #[test]
    fn fresh_cache_blob_is_preferred_over_source() {
        use crate::bin::{BlobCodec, BlobWriter, CacheError, write_blob};

        struct Probe(u32);
        impl BlobCodec for Probe {
            const TYPE_NAME: &'static str = "Texture"; // Resolves to the tex binary format.
            const LAYOUT: &'static str = "Probe{v:u32}";
            fn encode(&self, w: &mut BlobWriter) {
                w.u32(self.0);
            }
            fn decode(r: &mut BlobReader) -> Result<Self, CacheError> {
                Ok(Self(r.u32()?))
            }
        }

        let root = temp_root("cache");
        let io = FileAssetIo::new(&root);
        assert!(io.save("t.tga", b"source-bytes"));
        let mod_time = std::fs::metadata(root.join("t.tga"))
            .unwrap()
            .modified()
            .unwrap();

        // Without a cache blob the source is returned.
        assert_eq!(io.open("t.tga").unwrap().format, AssetFormat::TexTga);

        io.cache("t.tga", Probe::meta(), mod_time, &write_blob(&Probe(7)));
        let blob = io.open("t.tga").unwrap();
        assert_eq!(blob.format, AssetFormat::TexBin);

        // A discarded cache falls back to the source.
        io.discard_cache("t.tga");
        assert_eq!(io.open("t.tga").unwrap().format, AssetFormat::TexTga);
    }
}
