//! Engine registry and per-engine backend wiring.
//!
//! [`StoreEngineRegistry`] is the dependency injection point: it turns an
//! explicit [`StorageConfig`] into one [`StoreBackend`] per configured
//! [`StoreEngineKind`], each bundling a [`BackendConnector`], a
//! [`MetadataStore`], and the lease registry shared by every [`Table`]
//! handle on that engine.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use fedtable_core::{Result, StoreEngineKind, TableError, TableId};

use crate::config::{MetadataLocation, StorageConfig};
use crate::storage::connector::BackendConnector;
use crate::storage::connectors::{FilesystemConnector, MemoryConnector, PartitionedConnector};
use crate::storage::lease::LeaseRegistry;
use crate::storage::metadata_store::MetadataStore;
use crate::storage::metastores::{InMemoryMetadataStore, SidecarMetadataStore};
use crate::storage::table::Table;

/// Everything a [`Table`] needs to talk to one engine.
pub struct StoreBackend {
    kind: StoreEngineKind,
    connector: Arc<dyn BackendConnector>,
    metadata: Arc<dyn MetadataStore>,
    leases: Arc<LeaseRegistry>,
    config: Arc<StorageConfig>,
}

impl StoreBackend {
    /// Bundles a connector and metadata store. The engine kind is taken
    /// from the connector.
    #[must_use]
    pub fn new(
        connector: Arc<dyn BackendConnector>,
        metadata: Arc<dyn MetadataStore>,
        config: Arc<StorageConfig>,
    ) -> Self {
        let kind = connector.kind();
        Self {
            kind,
            connector,
            metadata,
            leases: Arc::new(LeaseRegistry::new(kind)),
            config,
        }
    }

    #[must_use]
    pub fn kind(&self) -> StoreEngineKind {
        self.kind
    }

    #[must_use]
    pub fn connector(&self) -> &dyn BackendConnector {
        self.connector.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> &dyn MetadataStore {
        self.metadata.as_ref()
    }

    #[must_use]
    pub fn leases(&self) -> &Arc<LeaseRegistry> {
        &self.leases
    }

    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

impl fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBackend")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Registry of configured engines.
#[derive(Debug)]
pub struct StoreEngineRegistry {
    config: Arc<StorageConfig>,
    backends: BTreeMap<StoreEngineKind, Arc<StoreBackend>>,
}

impl StoreEngineRegistry {
    /// Builds a backend for every engine the configuration enables.
    ///
    /// The local engine is always available. On-disk engines are enabled
    /// only when a data root is configured.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidArgument`] if the configuration is invalid.
    pub fn new(config: StorageConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let mut registry = Self {
            config: Arc::clone(&config),
            backends: BTreeMap::new(),
        };

        for kind in StoreEngineKind::ALL {
            if let Some(backend) = build_backend(kind, &config) {
                registry.register(backend);
            } else {
                debug!(engine = %kind, "engine disabled: no data root configured");
            }
        }

        info!(
            engines = ?registry.engines(),
            default_engine = %config.default_engine,
            "storage engines ready"
        );
        Ok(registry)
    }

    /// Adds or replaces the backend for its engine kind.
    pub fn register(&mut self, backend: StoreBackend) {
        self.backends.insert(backend.kind(), Arc::new(backend));
    }

    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Configured engine kinds, in declaration order.
    #[must_use]
    pub fn engines(&self) -> Vec<StoreEngineKind> {
        self.backends.keys().copied().collect()
    }

    #[must_use]
    pub fn supports(&self, kind: StoreEngineKind) -> bool {
        self.backends.contains_key(&kind)
    }

    /// Backend for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnsupportedEngine`] if `kind` is not configured.
    pub fn backend(&self, kind: StoreEngineKind) -> Result<Arc<StoreBackend>> {
        self.backends
            .get(&kind)
            .cloned()
            .ok_or_else(|| TableError::UnsupportedEngine(kind.to_string()))
    }

    /// Builds a table handle on `kind`. No I/O happens.
    ///
    /// Unset identity parts are generated; `partitions` defaults to the
    /// configured value.
    ///
    /// # Errors
    ///
    /// Fails if the engine is not configured, an identity part is invalid,
    /// or `partitions` is zero.
    pub fn table(
        &self,
        kind: StoreEngineKind,
        namespace: Option<&str>,
        name: Option<&str>,
        partitions: Option<u32>,
    ) -> Result<Table> {
        let backend = self.backend(kind)?;
        let id = TableId::new_or_generated(namespace, name)?;
        Table::from_id(
            backend,
            id,
            partitions.unwrap_or(self.config.default_partitions),
        )
    }

    /// Builds a table handle on the configured default engine.
    ///
    /// # Errors
    ///
    /// See [`table`](Self::table).
    pub fn default_table(&self, namespace: Option<&str>, name: Option<&str>) -> Result<Table> {
        self.table(self.config.default_engine, namespace, name, None)
    }
}

fn build_backend(kind: StoreEngineKind, config: &Arc<StorageConfig>) -> Option<StoreBackend> {
    let connector: Arc<dyn BackendConnector> = match kind {
        StoreEngineKind::Local => Arc::new(MemoryConnector::new(config.write_buffer_bytes)),
        StoreEngineKind::DistributedFs => Arc::new(FilesystemConnector::new(
            config.engine_root(kind)?,
            config.sync_writes,
            config.write_buffer_bytes,
        )),
        StoreEngineKind::ComputeNative => Arc::new(PartitionedConnector::new(
            config.engine_root(kind)?,
            config.sync_writes,
            config.write_buffer_bytes,
        )),
    };

    let metadata: Arc<dyn MetadataStore> = match (kind, config.metadata, config.engine_root(kind)) {
        (StoreEngineKind::Local, _, _) | (_, MetadataLocation::InMemory, _) | (_, _, None) => {
            Arc::new(InMemoryMetadataStore::new())
        }
        (_, MetadataLocation::Sidecar, Some(root)) => {
            Arc::new(SidecarMetadataStore::new(root, kind, config.sync_writes))
        }
    };

    Some(StoreBackend::new(connector, metadata, Arc::clone(config)))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn default_config_enables_only_local() {
        let registry = StoreEngineRegistry::new(StorageConfig::default()).unwrap();
        assert_eq!(registry.engines(), vec![StoreEngineKind::Local]);
        assert!(registry.supports(StoreEngineKind::Local));
        assert!(!registry.supports(StoreEngineKind::DistributedFs));

        let err = registry.backend(StoreEngineKind::ComputeNative).unwrap_err();
        assert!(matches!(err, TableError::UnsupportedEngine(_)));
    }

    #[test]
    fn data_root_enables_all_engines() {
        let dir = TempDir::new().unwrap();
        let registry = StoreEngineRegistry::new(StorageConfig::with_data_root(dir.path())).unwrap();
        assert_eq!(registry.engines(), StoreEngineKind::ALL.to_vec());
        for kind in StoreEngineKind::ALL {
            let backend = registry.backend(kind).unwrap();
            assert_eq!(backend.kind(), kind);
            assert_eq!(backend.connector().kind(), kind);
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = StorageConfig {
            default_partitions: 0,
            ..StorageConfig::default()
        };
        assert!(matches!(
            StoreEngineRegistry::new(config).unwrap_err(),
            TableError::InvalidArgument(_)
        ));

        let relative = StorageConfig::with_data_root("relative/root");
        assert!(StoreEngineRegistry::new(relative).is_err());
    }

    #[test]
    fn table_uses_defaults_and_generates_identity() {
        let registry = StoreEngineRegistry::new(StorageConfig {
            default_partitions: 3,
            ..StorageConfig::default()
        })
        .unwrap();

        let table = registry.default_table(Some("x"), None).unwrap();
        assert_eq!(table.namespace(), "x");
        assert_eq!(table.name().len(), 36);
        assert_eq!(table.partitions(), 3);
        assert_eq!(table.storage_engine(), StoreEngineKind::Local);

        let other = registry.default_table(Some("x"), None).unwrap();
        assert_ne!(table.name(), other.name());
    }

    #[test]
    fn table_rejects_zero_partitions_and_bad_names() {
        let registry = StoreEngineRegistry::new(StorageConfig::default()).unwrap();
        assert!(matches!(
            registry
                .table(StoreEngineKind::Local, Some("x"), Some("t"), Some(0))
                .unwrap_err(),
            TableError::InvalidArgument(_)
        ));
        assert!(matches!(
            registry
                .table(StoreEngineKind::Local, Some("../x"), Some("t"), None)
                .unwrap_err(),
            TableError::InvalidIdentifier { .. }
        ));
    }

    #[test]
    fn register_replaces_backend() {
        let mut registry = StoreEngineRegistry::new(StorageConfig::default()).unwrap();
        let config = Arc::new(StorageConfig::default());
        let memory = Arc::new(MemoryConnector::default());
        registry.register(StoreBackend::new(
            memory.clone(),
            Arc::new(InMemoryMetadataStore::new()),
            config,
        ));

        let table = registry
            .table(StoreEngineKind::Local, Some("x"), Some("t"), None)
            .unwrap();
        table.put_all([("k", 1_u32)], 0).unwrap();
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn in_memory_metadata_leaves_no_sidecars() {
        let dir = TempDir::new().unwrap();
        let registry = StoreEngineRegistry::new(StorageConfig {
            metadata: MetadataLocation::InMemory,
            ..StorageConfig::with_data_root(dir.path())
        })
        .unwrap();
        let table = registry
            .table(StoreEngineKind::DistributedFs, Some("x"), Some("t"), None)
            .unwrap();
        table.put_all([("k", 1_u32)], 0).unwrap();
        assert_eq!(table.count().unwrap().exact(), Some(1));
        assert!(!dir.path().join("hdfs").join(".meta").exists());
    }
}
