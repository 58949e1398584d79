//! JSON sidecar files next to an engine's data.
//!
//! Layout: `<root>/.meta/<namespace>/<name>.json`. Namespaces can never start
//! with a dot, so the `.meta` tree cannot collide with table data.
//!
//! Writes go to a hidden temp file that is renamed over the record, so a
//! crash leaves either the old or the new record, never a torn one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use fedtable_core::{resolve, Result, StoreEngineKind, TableError, TableId, TableMeta};

use crate::storage::metadata_store::MetadataStore;

/// Directory under the engine root holding sidecar records.
pub const META_DIR: &str = ".meta";

/// Metadata store persisting one JSON file per table.
#[derive(Debug)]
pub struct SidecarMetadataStore {
    root: PathBuf,
    engine: StoreEngineKind,
    sync: bool,
}

impl SidecarMetadataStore {
    /// `root` is the engine root; records live under `root/.meta`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, engine: StoreEngineKind, sync: bool) -> Self {
        Self {
            root: root.into(),
            engine,
            sync,
        }
    }

    fn record_path(&self, id: &TableId) -> PathBuf {
        self.root
            .join(META_DIR)
            .join(id.namespace())
            .join(format!("{}.json", id.name()))
    }

    fn temp_path(&self, id: &TableId) -> PathBuf {
        self.root
            .join(META_DIR)
            .join(id.namespace())
            .join(format!(".{}.json.tmp", id.name()))
    }

    fn address(&self, id: &TableId) -> String {
        resolve(self.engine, id).to_string()
    }

    fn write_atomic(&self, path: &Path, tmp: &Path, bytes: &[u8]) -> io::Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(tmp)?;
        file.write_all(bytes)?;
        if self.sync {
            file.sync_all()?;
        }
        drop(file);

        fs::rename(tmp, path)?;
        if self.sync {
            // Not every platform can open a directory for sync.
            if let Err(e) = File::open(dir).and_then(|handle| handle.sync_all()) {
                debug!(dir = %dir.display(), error = %e, "metadata directory sync skipped");
            }
        }
        Ok(())
    }
}

impl MetadataStore for SidecarMetadataStore {
    fn get(&self, id: &TableId) -> Result<Option<TableMeta>> {
        let bytes = match fs::read(self.record_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TableError::from_io(self.address(id), e)),
        };
        let meta: TableMeta =
            serde_json::from_slice(&bytes).map_err(|e| TableError::Metadata {
                address: self.address(id),
                reason: e.to_string(),
            })?;
        if &meta.id != id {
            return Err(TableError::Metadata {
                address: self.address(id),
                reason: format!("record belongs to {}", meta.id),
            });
        }
        Ok(Some(meta))
    }

    fn put(&self, meta: &TableMeta) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(meta).map_err(|e| TableError::Metadata {
            address: self.address(&meta.id),
            reason: e.to_string(),
        })?;
        let path = self.record_path(&meta.id);
        let tmp = self.temp_path(&meta.id);
        self.write_atomic(&path, &tmp, &bytes).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            TableError::BackendUnavailable {
                address: self.address(&meta.id),
                source: e,
            }
        })
    }

    fn remove(&self, id: &TableId) -> Result<bool> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TableError::from_io(self.address(id), e)),
        }
    }
}
