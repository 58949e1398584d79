//! Single-file-per-table connector for the distributed filesystem engine.
//!
//! Every table is one append-only byte stream at `<root>/<namespace>/<name>`.
//! The root is any mounted hierarchical filesystem path (a FUSE/NFS mount of
//! the cluster filesystem in production, a temp directory in tests).

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fedtable_core::{physical_path, Result, StoreEngineKind, TableAddress, TableError, TableId};

use super::{close_writer, io_error, open_write};
use crate::storage::connector::{BackendConnector, RecordReader, RecordSink};

/// Connector storing each table as one line-oriented file.
#[derive(Debug)]
pub struct FilesystemConnector {
    root: PathBuf,
    sync_writes: bool,
    write_buffer_bytes: usize,
}

impl FilesystemConnector {
    /// Creates a connector rooted at `root`. No I/O happens until first use.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, sync_writes: bool, write_buffer_bytes: usize) -> Self {
        Self {
            root: root.into(),
            sync_writes,
            write_buffer_bytes,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, id: &TableId) -> PathBuf {
        physical_path(&self.root, id)
    }

    fn open_sink(&self, id: &TableId, create: bool) -> Result<Box<dyn RecordSink>> {
        let address = self.address(id);
        let path = self.path(id);
        if create {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| io_error(&address, e))?;
            }
        }
        let file = open_write(&path, create).map_err(|e| io_error(&address, e))?;
        Ok(Box::new(FileSink {
            writer: BufWriter::with_capacity(self.write_buffer_bytes, file),
            address,
            sync: self.sync_writes,
        }))
    }
}

impl BackendConnector for FilesystemConnector {
    fn kind(&self) -> StoreEngineKind {
        StoreEngineKind::DistributedFs
    }

    fn exists(&self, id: &TableId) -> Result<bool> {
        self.path(id)
            .try_exists()
            .map_err(|e| io_error(&self.address(id), e))
    }

    fn create(&self, id: &TableId, _partitions: u32) -> Result<Box<dyn RecordSink>> {
        self.open_sink(id, true)
    }

    fn append(&self, id: &TableId, _partitions: u32) -> Result<Box<dyn RecordSink>> {
        self.open_sink(id, false)
    }

    fn open_read(&self, id: &TableId, buffer_bytes: usize) -> Result<RecordReader> {
        let file = File::open(self.path(id)).map_err(|e| io_error(&self.address(id), e))?;
        Ok(Box::new(BufReader::with_capacity(buffer_bytes.max(1), file)))
    }

    fn rename(&self, from: &TableId, to: &TableId) -> Result<()> {
        let src = self.path(from);
        let dst = self.path(to);
        if !self.exists(from)? {
            return Err(TableError::NotFound {
                address: self.address(from).to_string(),
            });
        }
        // fs::rename silently replaces an existing file on Unix.
        if self.exists(to)? {
            return Err(TableError::AlreadyExists {
                address: self.address(to).to_string(),
            });
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(&self.address(to), e))?;
        }
        fs::rename(&src, &dst).map_err(|e| io_error(&self.address(from), e))
    }

    fn delete(&self, id: &TableId) -> Result<bool> {
        match fs::remove_file(self.path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&self.address(id), e)),
        }
    }
}

/// Buffered write stream into one table file.
struct FileSink {
    writer: BufWriter<File>,
    address: TableAddress,
    sync: bool,
}

impl RecordSink for FileSink {
    fn write(&mut self, _key: &str, line: &[u8]) -> Result<()> {
        self.writer
            .write_all(line)
            .map_err(|e| io_error(&self.address, e))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| io_error(&self.address, e))
    }

    fn close(self: Box<Self>) -> Result<()> {
        let Self {
            writer,
            address,
            sync,
        } = *self;
        close_writer(writer, sync).map_err(|e| io_error(&address, e))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use tempfile::TempDir;

    use super::*;

    fn id(ns: &str, name: &str) -> TableId {
        TableId::new(ns, name).unwrap()
    }

    fn read_all(connector: &FilesystemConnector, id: &TableId) -> String {
        let mut out = String::new();
        connector
            .open_read(id, 16)
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        out
    }

    fn write_lines(sink: Box<dyn RecordSink>, lines: &[&str]) {
        let mut sink = sink;
        for line in lines {
            sink.write("k", line.as_bytes()).unwrap();
        }
        sink.close().unwrap();
    }

    #[test]
    fn create_then_append_preserves_order() {
        let dir = TempDir::new().unwrap();
        let connector = FilesystemConnector::new(dir.path(), false, 64);
        let t = id("x", "t");

        assert!(!connector.exists(&t).unwrap());
        write_lines(connector.create(&t, 1).unwrap(), &["a\n", "b\n"]);
        assert!(connector.exists(&t).unwrap());
        write_lines(connector.append(&t, 1).unwrap(), &["c\n"]);

        assert_eq!(read_all(&connector, &t), "a\nb\nc\n");
        assert!(dir.path().join("x").join("t").is_file());
    }

    #[test]
    fn create_refuses_existing_artifact() {
        let dir = TempDir::new().unwrap();
        let connector = FilesystemConnector::new(dir.path(), false, 64);
        let t = id("x", "t");
        write_lines(connector.create(&t, 1).unwrap(), &[]);

        let err = connector.create(&t, 1).err().unwrap();
        assert!(matches!(err, TableError::AlreadyExists { .. }));
    }

    #[test]
    fn append_to_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let connector = FilesystemConnector::new(dir.path(), false, 64);
        let err = connector.append(&id("x", "nope"), 1).err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn open_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let connector = FilesystemConnector::new(dir.path(), false, 64);
        let err = connector.open_read(&id("x", "nope"), 64).err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn dropped_sink_still_flushes() {
        let dir = TempDir::new().unwrap();
        let connector = FilesystemConnector::new(dir.path(), false, 4096);
        let t = id("x", "t");
        {
            let mut sink = connector.create(&t, 1).unwrap();
            sink.write("k", b"line\n").unwrap();
        }
        assert_eq!(read_all(&connector, &t), "line\n");
    }

    #[test]
    fn sync_writes_close_succeeds() {
        let dir = TempDir::new().unwrap();
        let connector = FilesystemConnector::new(dir.path(), true, 64);
        let t = id("x", "t");
        write_lines(connector.create(&t, 1).unwrap(), &["a\n"]);
        assert_eq!(read_all(&connector, &t), "a\n");
    }

    #[test]
    fn rename_moves_and_refuses_to_clobber() {
        let dir = TempDir::new().unwrap();
        let connector = FilesystemConnector::new(dir.path(), false, 64);
        let a = id("x", "a");
        let b = id("y", "b");
        let c = id("y", "c");
        write_lines(connector.create(&a, 1).unwrap(), &["1\n"]);
        write_lines(connector.create(&c, 1).unwrap(), &["3\n"]);

        connector.rename(&a, &b).unwrap();
        assert!(!connector.exists(&a).unwrap());
        assert_eq!(read_all(&connector, &b), "1\n");

        let err = connector.rename(&b, &c).unwrap_err();
        assert!(matches!(err, TableError::AlreadyExists { .. }));
        assert_eq!(read_all(&connector, &b), "1\n");
        assert_eq!(read_all(&connector, &c), "3\n");

        let err = connector.rename(&a, &id("z", "z")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let connector = FilesystemConnector::new(dir.path(), false, 64);
        let t = id("x", "t");
        write_lines(connector.create(&t, 1).unwrap(), &["a\n"]);

        assert!(connector.delete(&t).unwrap());
        assert!(!connector.delete(&t).unwrap());
        assert!(!connector.exists(&t).unwrap());
    }

    #[test]
    fn root_that_is_a_file_is_backend_unavailable() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let connector = FilesystemConnector::new(&blocker, false, 64);

        let err = connector.create(&id("x", "t"), 1).err().unwrap();
        assert!(matches!(err, TableError::BackendUnavailable { .. }), "{err}");
        assert!(err.is_retryable());
    }
}
