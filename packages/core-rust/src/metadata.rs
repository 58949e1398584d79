//! Per-table metadata record.
//!
//! [`TableMeta`] is small and cheap to read: it answers `count()` without
//! touching the bulk data, and carries the optional [`TableSchema`].

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::schema::TableSchema;
use crate::types::{RowCount, StoreEngineKind, TableId};

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
///
/// Millisecond timestamps fit comfortably in i64 until the year 292 million.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Metadata persisted for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub id: TableId,
    pub engine: StoreEngineKind,
    /// Partition hint recorded at the last write or rename.
    pub partitions: u32,
    /// Row count; `None` means never measured.
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchema>,
    /// Creation time (millis since epoch).
    pub created_at: i64,
    /// Last metadata update (millis since epoch).
    pub updated_at: i64,
}

impl TableMeta {
    /// Fresh metadata with an unknown count and no schema.
    #[must_use]
    pub fn new(id: TableId, engine: StoreEngineKind, partitions: u32) -> Self {
        let now = now_millis();
        Self {
            id,
            engine,
            partitions,
            count: None,
            schema: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn row_count(&self) -> RowCount {
        RowCount::from_option(self.count)
    }

    /// Marks the record as modified now.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.created_at);
    }

    /// Copy of this record bound to a new identity and partition hint.
    #[must_use]
    pub fn relocated(&self, id: TableId, partitions: u32) -> Self {
        let mut meta = self.clone();
        meta.id = id;
        meta.partitions = partitions;
        meta.touch();
        meta
    }
}
