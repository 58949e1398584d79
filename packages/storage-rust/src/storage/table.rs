//! The engine-agnostic table handle.
//!
//! A [`Table`] binds a logical identity to one engine's connector, metadata
//! store, and lease registry. Construction does no I/O; the artifact is
//! materialized by the first [`put_all`](Table::put_all).
//!
//! Every operation runs inside an `info_span!("table_op")` that records
//! `duration_ms` and `outcome` once the call returns.

use std::io::BufRead;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info_span, warn};

use fedtable_core::codec::{self, NEWLINE};
use fedtable_core::{
    Result, RowCount, StoreEngineKind, TableAddress, TableError, TableId, TableMeta, TableSchema,
};

use crate::config::CountPolicy;
use crate::storage::connector::{RecordReader, RecordSink};
use crate::storage::factory::StoreBackend;
use crate::storage::lease::{Lease, LeaseMode};

/// Handle to one table on one engine.
///
/// Not `Clone`: [`save_as`](Table::save_as) consumes the handle so that the
/// old identity cannot be used through it afterwards.
#[derive(Debug)]
pub struct Table {
    id: TableId,
    partitions: u32,
    backend: Arc<StoreBackend>,
}

impl Table {
    /// Builds a handle, generating any unset identity part.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidIdentifier`] for an unsafe namespace or
    /// name and [`TableError::InvalidArgument`] if `partitions` is zero.
    pub fn new(
        backend: Arc<StoreBackend>,
        namespace: Option<&str>,
        name: Option<&str>,
        partitions: u32,
    ) -> Result<Self> {
        Self::from_id(backend, TableId::new_or_generated(namespace, name)?, partitions)
    }

    pub(crate) fn from_id(backend: Arc<StoreBackend>, id: TableId, partitions: u32) -> Result<Self> {
        if partitions == 0 {
            return Err(TableError::InvalidArgument(
                "partitions must be positive".to_string(),
            ));
        }
        Ok(Self {
            id,
            partitions,
            backend,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.id.name()
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        self.id.namespace()
    }

    #[must_use]
    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    #[must_use]
    pub fn storage_engine(&self) -> StoreEngineKind {
        self.backend.kind()
    }

    #[must_use]
    pub fn id(&self) -> &TableId {
        &self.id
    }

    /// Canonical address of this table. Pure.
    #[must_use]
    pub fn address(&self) -> TableAddress {
        self.backend.connector().address(&self.id)
    }

    /// Whether the data artifact exists.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::BackendUnavailable`] if the store cannot be queried.
    pub fn exists(&self) -> Result<bool> {
        self.backend.connector().exists(&self.id)
    }

    /// Stored metadata record, if any.
    ///
    /// # Errors
    ///
    /// Fails if the metadata store is unreachable or the record is malformed.
    pub fn meta(&self) -> Result<Option<TableMeta>> {
        self.backend.metadata().get(&self.id)
    }

    /// Row count from metadata. Never scans data.
    ///
    /// A table that was never written, or whose count was never measured,
    /// reports [`RowCount::Unknown`].
    ///
    /// # Errors
    ///
    /// Fails if the metadata store is unreachable or the record is malformed.
    pub fn count(&self) -> Result<RowCount> {
        self.instrumented("count", || {
            Ok(self.meta()?.map_or(RowCount::Unknown, |meta| meta.row_count()))
        })
    }

    /// Stored schema, if any.
    ///
    /// # Errors
    ///
    /// Fails if the metadata store is unreachable or the record is malformed.
    pub fn schema(&self) -> Result<Option<TableSchema>> {
        Ok(self.meta()?.and_then(|meta| meta.schema))
    }

    /// Attaches `schema` to the metadata, creating the record if needed.
    /// An existing count is kept.
    ///
    /// # Errors
    ///
    /// Fails with [`TableError::ConcurrencyViolation`] while another
    /// operation holds the table, or if metadata cannot be read or written.
    pub fn save_schema(&self, schema: TableSchema) -> Result<()> {
        self.instrumented("save_schema", || {
            let _lease = self.lease(LeaseMode::Exclusive, "save_schema")?;
            let metadata = self.backend.metadata();
            let mut meta = metadata.get(&self.id)?.unwrap_or_else(|| {
                TableMeta::new(self.id.clone(), self.backend.kind(), self.partitions)
            });
            meta.schema = Some(schema);
            meta.touch();
            metadata.put(&meta)
        })
    }

    /// Writes `records` in input order and returns how many were written.
    ///
    /// Appends if the artifact exists, creates it otherwise. The sink is
    /// flushed every `chunk_size` records (`0` flushes only at close).
    /// Metadata is committed only after the sink closed successfully; the
    /// resulting count follows the configured [`CountPolicy`]. If the call
    /// fails once the sink is open, some records may already be stored, so
    /// the count is reset to [`RowCount::Unknown`].
    ///
    /// # Errors
    ///
    /// - [`TableError::Encoding`] for a reserved key or unserializable value.
    /// - [`TableError::BackendUnavailable`] if the store fails.
    /// - [`TableError::ConcurrencyViolation`] while another operation holds
    ///   the table.
    pub fn put_all<I, K, V>(&self, records: I, chunk_size: usize) -> Result<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Serialize,
    {
        self.instrumented("put_all", || {
            let _lease = self.lease(LeaseMode::Exclusive, "put_all")?;
            let connector = self.backend.connector();

            let previous = self.backend.metadata().get(&self.id)?;
            let existed = connector.exists(&self.id)?;
            let sink = if existed {
                connector.append(&self.id, self.partitions)?
            } else {
                connector.create(&self.id, self.partitions)?
            };

            let committed = write_records(sink, records, chunk_size).and_then(|written| {
                self.commit_write(previous.as_ref(), existed, written)?;
                Ok(written)
            });
            if committed.is_err() {
                self.forget_count(previous.as_ref(), existed);
            }
            committed
        })
    }

    fn commit_write(&self, previous: Option<&TableMeta>, existed: bool, written: u64) -> Result<()> {
        let policy = self.backend.config().count_policy;
        let count = match (existed, policy) {
            (false, _) | (true, CountPolicy::PerWrite) => Some(written),
            (true, CountPolicy::Cumulative) => previous
                .and_then(|meta| meta.count)
                .map(|count| count.saturating_add(written)),
        };
        if count.is_none() {
            debug!(table = %self.id, "previous count unknown; count stays unknown");
        }
        self.backend.metadata().put(&self.next_meta(previous, existed, count))
    }

    /// Best-effort reset of the count after a write that may have stored
    /// part of its input.
    fn forget_count(&self, previous: Option<&TableMeta>, existed: bool) {
        let meta = self.next_meta(previous, existed, None);
        match self.backend.metadata().put(&meta) {
            Ok(()) => debug!(table = %self.id, "write failed; count marked unknown"),
            Err(e) => warn!(table = %self.id, error = %e, "write failed and count could not be marked unknown"),
        }
    }

    fn next_meta(&self, previous: Option<&TableMeta>, existed: bool, count: Option<u64>) -> TableMeta {
        let mut meta = match previous {
            Some(previous) => {
                let mut meta = previous.clone();
                if !existed {
                    meta.partitions = self.partitions;
                }
                meta.touch();
                meta
            }
            None => TableMeta::new(self.id.clone(), self.backend.kind(), self.partitions),
        };
        meta.count = count;
        meta
    }

    /// Opens a lazy, single-pass stream of the stored records.
    ///
    /// `min_chunk_size` is a lower bound on the read buffer in bytes. The
    /// stream holds a shared lease until it is exhausted, fails, or is
    /// dropped.
    ///
    /// # Errors
    ///
    /// [`TableError::NotFound`] if the table was never written, plus the
    /// lease and backend errors of [`put_all`](Self::put_all). Per-record
    /// failures are yielded by the iterator.
    pub fn collect<V: DeserializeOwned>(&self, min_chunk_size: usize) -> Result<Collect<V>> {
        self.instrumented("collect", || {
            let lease = self.lease(LeaseMode::Shared, "collect")?;
            let buffer_bytes = min_chunk_size.max(self.backend.config().read_buffer_bytes);
            let reader = self.backend.connector().open_read(&self.id, buffer_bytes)?;
            Ok(Collect {
                open: Some(OpenStream {
                    reader,
                    _lease: lease,
                }),
                address: self.address().to_string(),
                line: Vec::new(),
                line_no: 0,
                records: 0,
                _value: PhantomData,
            })
        })
    }

    /// Removes data and metadata. Destroying a missing table succeeds.
    ///
    /// # Errors
    ///
    /// Fails with [`TableError::ConcurrencyViolation`] while another
    /// operation (including a live [`Collect`]) holds the table, or with
    /// [`TableError::BackendUnavailable`].
    pub fn destroy(&self) -> Result<()> {
        self.instrumented("destroy", || {
            let _lease = self.lease(LeaseMode::Exclusive, "destroy")?;
            let data = self.backend.connector().delete(&self.id)?;
            let meta = self.backend.metadata().remove(&self.id)?;
            if !data && !meta {
                debug!(table = %self.id, "destroy: nothing stored");
            }
            Ok(())
        })
    }

    /// Moves data and metadata to `namespace/name` and returns the new handle.
    ///
    /// `partitions` defaults to this table's value. Metadata is written at
    /// the destination before the data moves and is withdrawn again if the
    /// move fails, so a failed call leaves the table readable under its old
    /// identity.
    ///
    /// # Errors
    ///
    /// - [`TableError::AlreadyExists`] if the destination has data or
    ///   metadata, including when it is this table's own identity.
    /// - [`TableError::NotFound`] if this table has no data.
    /// - [`TableError::ConcurrencyViolation`] if either identity is in use.
    /// - [`TableError::BackendUnavailable`] if the data or the destination
    ///   metadata cannot be written.
    pub fn save_as(self, name: &str, namespace: &str, partitions: Option<u32>) -> Result<Table> {
        let target = Self::from_id(
            Arc::clone(&self.backend),
            TableId::new(namespace, name)?,
            partitions.unwrap_or(self.partitions),
        )?;

        self.instrumented("save_as", || {
            if target.id == self.id {
                return Err(TableError::AlreadyExists {
                    address: target.address().to_string(),
                });
            }
            let _source = self.lease(LeaseMode::Exclusive, "save_as")?;
            let _target = target.lease(LeaseMode::Exclusive, "save_as")?;

            let connector = self.backend.connector();
            let metadata = self.backend.metadata();
            if connector.exists(&target.id)? || metadata.get(&target.id)?.is_some() {
                return Err(TableError::AlreadyExists {
                    address: target.address().to_string(),
                });
            }
            if !connector.exists(&self.id)? {
                return Err(TableError::NotFound {
                    address: self.address().to_string(),
                });
            }

            let previous = metadata.get(&self.id)?;
            if let Some(meta) = &previous {
                metadata.put(&meta.relocated(target.id.clone(), target.partitions))?;
            }
            if let Err(e) = connector.rename(&self.id, &target.id) {
                if previous.is_some() {
                    if let Err(cleanup) = metadata.remove(&target.id) {
                        warn!(to = %target.id, error = %cleanup, "move failed; destination metadata left behind");
                    }
                }
                return Err(e);
            }
            if previous.is_some() {
                if let Err(e) = metadata.remove(&self.id) {
                    warn!(from = %self.id, to = %target.id, error = %e, "table moved; stale source metadata left behind");
                }
            }
            Ok(())
        })?;

        Ok(target)
    }

    fn lease(&self, mode: LeaseMode, operation: &'static str) -> Result<Lease> {
        self.backend.leases().acquire(&self.id, mode, operation)
    }

    fn instrumented<T>(&self, operation: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let span = info_span!(
            "table_op",
            operation,
            engine = %self.backend.kind(),
            table = %self.id,
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        let _entered = span.enter();
        let start = Instant::now();

        let result = f();

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        span.record("duration_ms", duration_ms);
        span.record("outcome", outcome);

        match &result {
            Ok(_) => debug!(operation, duration_ms, "table operation complete"),
            Err(e) => warn!(operation, duration_ms, error = %e, "table operation failed"),
        }
        result
    }
}

/// Encodes and writes `records`, then closes the sink.
fn write_records<I, K, V>(mut sink: Box<dyn RecordSink>, records: I, chunk_size: usize) -> Result<u64>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Serialize,
{
    let mut line = Vec::new();
    let mut written: u64 = 0;
    let mut since_flush = 0_usize;
    for (key, value) in records {
        let key = key.as_ref();
        line.clear();
        codec::encode_into(&mut line, key, &value).map_err(|source| TableError::Encoding {
            key: key.to_string(),
            source,
        })?;
        sink.write(key, &line)?;
        written += 1;
        since_flush += 1;
        if chunk_size > 0 && since_flush >= chunk_size {
            sink.flush()?;
            since_flush = 0;
        }
    }
    sink.close()?;
    Ok(written)
}

struct OpenStream {
    reader: RecordReader,
    _lease: Lease,
}

/// Lazy stream of `(key, value)` records returned by [`Table::collect`].
///
/// Yields records in storage order and skips blank lines. After the end of
/// the stream or the first error it releases the read handle and the lease
/// and yields `None` forever.
pub struct Collect<V> {
    open: Option<OpenStream>,
    address: String,
    line: Vec<u8>,
    line_no: u64,
    records: u64,
    _value: PhantomData<fn() -> V>,
}

impl<V> Collect<V> {
    /// Records yielded so far.
    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Whether the stream still holds its read handle.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn finish(&mut self) {
        self.open = None;
    }
}

impl<V: DeserializeOwned> Iterator for Collect<V> {
    type Item = Result<(String, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let open = self.open.as_mut()?;
            self.line.clear();
            match open.reader.read_until(NEWLINE, &mut self.line) {
                Ok(0) => {
                    self.finish();
                    return None;
                }
                Ok(_) => {
                    self.line_no += 1;
                    if codec::is_blank(&self.line) {
                        continue;
                    }
                    return match codec::decode(&self.line) {
                        Ok(record) => {
                            self.records += 1;
                            Some(Ok(record))
                        }
                        Err(source) => {
                            self.finish();
                            Some(Err(TableError::Decoding {
                                address: self.address.clone(),
                                line: self.line_no,
                                source,
                            }))
                        }
                    };
                }
                Err(source) => {
                    self.finish();
                    return Some(Err(TableError::BackendUnavailable {
                        address: self.address.clone(),
                        source,
                    }));
                }
            }
        }
    }
}

impl<V: DeserializeOwned> FusedIterator for Collect<V> {}

impl<V> Drop for Collect<V> {
    fn drop(&mut self) {
        if self.open.is_some() {
            debug!(
                address = %self.address,
                records = self.records,
                "collect dropped before end of stream"
            );
        }
    }
}
