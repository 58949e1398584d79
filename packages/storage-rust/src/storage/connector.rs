//! Backend connector trait and stream handle types.
//!
//! Defines [`BackendConnector`], the innermost storage layer. A connector
//! knows one physical engine and exposes the primitive capabilities the
//! [`Table`](super::Table) contract is built from: existence check, create,
//! append, streaming read, rename, and delete. It never encodes or decodes
//! records itself; it moves already-encoded lines.

use std::io::BufRead;

use fedtable_core::{resolve, Result, StoreEngineKind, TableAddress, TableId};

/// Buffered, line-readable stream over a table's physical artifact.
///
/// Dropping the reader releases the underlying handle.
pub type RecordReader = Box<dyn BufRead + Send>;

/// Open write stream into a table's physical artifact.
///
/// Lines are written in call order. [`close`](RecordSink::close) flushes and
/// releases the handle and is the only way to learn whether the final flush
/// succeeded. A sink dropped without `close` still flushes on a best-effort
/// basis and releases its handle.
pub trait RecordSink: Send {
    /// Write one encoded line. `key` is the record key, for engines that
    /// route by key.
    fn write(&mut self, key: &str, line: &[u8]) -> Result<()>;

    /// Push buffered bytes to the backend.
    fn flush(&mut self) -> Result<()>;

    /// Flush, make durable where configured, and release the handle.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Per-engine adapter onto a physical store.
///
/// Implementations are addressed by [`TableId`] and map it to their own
/// physical layout. Used as `Arc<dyn BackendConnector>`.
pub trait BackendConnector: Send + Sync {
    /// Engine this connector serves.
    fn kind(&self) -> StoreEngineKind;

    /// Canonical address of `id` on this engine. Pure, no I/O.
    fn address(&self, id: &TableId) -> TableAddress {
        resolve(self.kind(), id)
    }

    /// Whether a physical artifact exists for `id`.
    fn exists(&self, id: &TableId) -> Result<bool>;

    /// Create a new artifact and open it for writing.
    ///
    /// Fails with `AlreadyExists` if an artifact is already present.
    fn create(&self, id: &TableId, partitions: u32) -> Result<Box<dyn RecordSink>>;

    /// Open an existing artifact for appending.
    ///
    /// Fails with `NotFound` if no artifact is present. `partitions` is the
    /// caller's hint; engines with a physical partition layout keep theirs.
    fn append(&self, id: &TableId, partitions: u32) -> Result<Box<dyn RecordSink>>;

    /// Open the artifact for streaming, line-oriented reads.
    ///
    /// `buffer_bytes` is the requested read buffer capacity.
    fn open_read(&self, id: &TableId, buffer_bytes: usize) -> Result<RecordReader>;

    /// Move the artifact of `from` to `to`.
    ///
    /// Fails with `NotFound` if `from` has no artifact and `AlreadyExists` if
    /// `to` has one. Never overwrites.
    fn rename(&self, from: &TableId, to: &TableId) -> Result<()>;

    /// Remove the artifact. Returns `false` if there was nothing to remove.
    fn delete(&self, id: &TableId) -> Result<bool>;
}
