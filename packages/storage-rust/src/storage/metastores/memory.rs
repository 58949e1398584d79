use dashmap::DashMap;

use fedtable_core::{Result, TableId, TableMeta};

use crate::storage::metadata_store::MetadataStore;

/// Process-local metadata registry. Records vanish with the process.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: DashMap<TableId, TableMeta>,
}

impl InMemoryMetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, id: &TableId) -> Result<Option<TableMeta>> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    fn put(&self, meta: &TableMeta) -> Result<()> {
        self.records.insert(meta.id.clone(), meta.clone());
        Ok(())
    }

    fn remove(&self, id: &TableId) -> Result<bool> {
        Ok(self.records.remove(id).is_some())
    }
}
