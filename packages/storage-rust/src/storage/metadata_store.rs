//! Metadata persistence trait.
//!
//! A [`MetadataStore`] keeps one [`TableMeta`] per table identity, separate
//! from the bulk data, so that row counts and schemas can be answered without
//! scanning records.

use fedtable_core::{Result, TableId, TableMeta};

/// Keyed store of per-table metadata records.
///
/// Used as `Arc<dyn MetadataStore>`. Implementations must make `put`
/// all-or-nothing: a reader sees either the previous record or the new one.
pub trait MetadataStore: Send + Sync {
    /// Load the record for `id`, or `None` if nothing was ever stored.
    fn get(&self, id: &TableId) -> Result<Option<TableMeta>>;

    /// Insert or replace the record keyed by `meta.id`.
    fn put(&self, meta: &TableMeta) -> Result<()>;

    /// Remove the record. Returns `false` if there was none.
    fn remove(&self, id: &TableId) -> Result<bool>;
}
