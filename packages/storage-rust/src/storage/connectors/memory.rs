//! In-memory connector for the local engine, backed by [`DashMap`].
//!
//! Each table is a growable byte buffer of encoded lines. Readers take a
//! snapshot of the buffer when they open, so a read never observes a
//! half-written line. Data lives as long as the connector does.

use std::io::Cursor;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use fedtable_core::{Result, StoreEngineKind, TableError, TableId};

use crate::storage::connector::{BackendConnector, RecordReader, RecordSink};

type Buffer = Arc<Mutex<Vec<u8>>>;

/// Process-local store keyed by table identity.
#[derive(Debug)]
pub struct MemoryConnector {
    tables: DashMap<TableId, Buffer>,
    write_buffer_bytes: usize,
}

impl MemoryConnector {
    /// Creates an empty store.
    #[must_use]
    pub fn new(write_buffer_bytes: usize) -> Self {
        Self {
            tables: DashMap::new(),
            write_buffer_bytes,
        }
    }

    /// Number of tables currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn sink(&self, target: Buffer) -> Box<dyn RecordSink> {
        Box::new(MemorySink {
            target,
            pending: Vec::new(),
            threshold: self.write_buffer_bytes,
        })
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new(65_536)
    }
}

impl BackendConnector for MemoryConnector {
    fn kind(&self) -> StoreEngineKind {
        StoreEngineKind::Local
    }

    fn exists(&self, id: &TableId) -> Result<bool> {
        Ok(self.tables.contains_key(id))
    }

    fn create(&self, id: &TableId, _partitions: u32) -> Result<Box<dyn RecordSink>> {
        let target = match self.tables.entry(id.clone()) {
            Entry::Occupied(_) => {
                return Err(TableError::AlreadyExists {
                    address: self.address(id).to_string(),
                })
            }
            Entry::Vacant(slot) => slot.insert(Buffer::default()).clone(),
        };
        Ok(self.sink(target))
    }

    fn append(&self, id: &TableId, _partitions: u32) -> Result<Box<dyn RecordSink>> {
        let target = self
            .tables
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TableError::NotFound {
                address: self.address(id).to_string(),
            })?;
        Ok(self.sink(target))
    }

    fn open_read(&self, id: &TableId, _buffer_bytes: usize) -> Result<RecordReader> {
        let snapshot = self
            .tables
            .get(id)
            .map(|entry| entry.value().lock().clone())
            .ok_or_else(|| TableError::NotFound {
                address: self.address(id).to_string(),
            })?;
        Ok(Box::new(Cursor::new(snapshot)))
    }

    fn rename(&self, from: &TableId, to: &TableId) -> Result<()> {
        if self.tables.contains_key(to) {
            return Err(TableError::AlreadyExists {
                address: self.address(to).to_string(),
            });
        }
        let Some((_, data)) = self.tables.remove(from) else {
            return Err(TableError::NotFound {
                address: self.address(from).to_string(),
            });
        };
        // The entry guard must be released before re-inserting under `from`.
        let clashed = match self.tables.entry(to.clone()) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&data));
                false
            }
        };
        if clashed {
            self.tables.insert(from.clone(), data);
            return Err(TableError::AlreadyExists {
                address: self.address(to).to_string(),
            });
        }
        Ok(())
    }

    fn delete(&self, id: &TableId) -> Result<bool> {
        Ok(self.tables.remove(id).is_some())
    }
}

/// Write stream staging lines locally and publishing them in batches.
struct MemorySink {
    target: Buffer,
    pending: Vec<u8>,
    threshold: usize,
}

impl MemorySink {
    fn publish(&mut self) {
        if !self.pending.is_empty() {
            self.target.lock().append(&mut self.pending);
        }
    }
}

impl RecordSink for MemorySink {
    fn write(&mut self, _key: &str, line: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(line);
        if self.pending.len() >= self.threshold {
            self.publish();
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MemorySink {
    fn drop(&mut self) {
        self.publish();
    }
}
