//! Storage configuration types.
//!
//! [`StorageConfig`] is an explicit value handed to
//! [`StoreEngineRegistry::new`](crate::storage::StoreEngineRegistry::new).
//! Nothing in this crate reads ambient global state.

use std::path::PathBuf;

use fedtable_core::partition::DEFAULT_PARTITIONS;
use fedtable_core::{Result, StoreEngineKind, TableError};

/// How `put_all` accounts for rows when appending to an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountPolicy {
    /// Count = previous count + records written by this call.
    ///
    /// If the artifact existed but its previous count was never measured,
    /// the count stays unknown.
    #[default]
    Cumulative,
    /// Count = records written by the most recent call only.
    PerWrite,
}

/// Where on-disk engines keep table metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataLocation {
    /// JSON sidecar files under `<engine root>/.meta/`.
    #[default]
    Sidecar,
    /// Process-local registry; metadata does not survive a restart.
    InMemory,
}

/// Top-level configuration for the storage layer.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Absolute root directory for the on-disk engines. Each engine gets a
    /// subdirectory named after it. `None` enables only the local engine.
    pub data_root: Option<PathBuf>,
    /// Engine used when the caller does not name one.
    pub default_engine: StoreEngineKind,
    /// Partition count for tables created without one.
    pub default_partitions: u32,
    /// Row-count accounting for repeated appends.
    pub count_policy: CountPolicy,
    /// Metadata placement for on-disk engines.
    pub metadata: MetadataLocation,
    /// Call `fsync` on data and metadata files before reporting success.
    pub sync_writes: bool,
    /// Write buffer size per open stream in bytes.
    pub write_buffer_bytes: usize,
    /// Minimum read buffer size in bytes.
    pub read_buffer_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            default_engine: StoreEngineKind::Local,
            default_partitions: DEFAULT_PARTITIONS,
            count_policy: CountPolicy::default(),
            metadata: MetadataLocation::default(),
            sync_writes: false,
            write_buffer_bytes: 65_536, // 64 KB
            read_buffer_bytes: 65_536,  // 64 KB
        }
    }
}

impl StorageConfig {
    /// Configuration with all engines enabled under `data_root`.
    #[must_use]
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: Some(data_root.into()),
            ..Self::default()
        }
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidArgument`] if the data root is relative,
    /// the default partition count is zero, or a buffer size is zero.
    pub fn validate(&self) -> Result<()> {
        if let Some(root) = &self.data_root {
            if !root.is_absolute() {
                return Err(TableError::InvalidArgument(format!(
                    "data root must be absolute, got {}",
                    root.display()
                )));
            }
        }
        if self.default_partitions == 0 {
            return Err(TableError::InvalidArgument(
                "default partitions must be positive".to_string(),
            ));
        }
        if self.write_buffer_bytes == 0 || self.read_buffer_bytes == 0 {
            return Err(TableError::InvalidArgument(
                "buffer sizes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Root directory of an on-disk engine, if one is configured.
    #[must_use]
    pub fn engine_root(&self, kind: StoreEngineKind) -> Option<PathBuf> {
        self.data_root.as_ref().map(|root| root.join(kind.as_str()))
    }
}
