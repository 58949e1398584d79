//! Partitioned connector for the compute-native engine.
//!
//! A table is a directory holding one shard file per partition:
//!
//! ```text
//! <root>/<namespace>/<name>/
//! ├── part-00000
//! ├── part-00001
//! └── ...
//! ```
//!
//! Records are routed to a shard by [`partition_for_key`]. Reads stream the
//! shards in partition order, so storage order equals write order within a
//! partition but not across partitions.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use fedtable_core::partition::{parse_partition_file_name, partition_file_name, partition_for_key};
use fedtable_core::{physical_path, Result, StoreEngineKind, TableAddress, TableError, TableId};

use super::{close_writer, io_error, open_write};
use crate::storage::connector::{BackendConnector, RecordReader, RecordSink};

/// Connector storing each table as a directory of partition shards.
#[derive(Debug)]
pub struct PartitionedConnector {
    root: PathBuf,
    sync_writes: bool,
    write_buffer_bytes: usize,
}

impl PartitionedConnector {
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

    fn dir(&self, id: &TableId) -> PathBuf {
        physical_path(&self.root, id)
    }

    /// Shard files of `id`, sorted by partition index.
    fn shards(&self, id: &TableId) -> Result<Vec<(u32, PathBuf)>> {
        let address = self.address(id);
        let entries = fs::read_dir(self.dir(id)).map_err(|e| io_error(&address, e))?;
        let mut shards = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&address, e))?;
            if let Some(index) = entry.file_name().to_str().and_then(parse_partition_file_name) {
                shards.push((index, entry.path()));
            }
        }
        shards.sort_by_key(|(index, _)| *index);
        Ok(shards)
    }

    fn open_shards<'a>(
        &self,
        address: &TableAddress,
        paths: impl IntoIterator<Item = &'a Path>,
        create: bool,
    ) -> Result<Box<dyn RecordSink>> {
        let writers = paths
            .into_iter()
            .map(|path| {
                open_write(path, create)
                    .map(|file| BufWriter::with_capacity(self.write_buffer_bytes, file))
                    .map_err(|e| io_error(address, e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(PartitionSink {
            writers,
            address: address.clone(),
            sync: self.sync_writes,
        }))
    }
}

impl BackendConnector for PartitionedConnector {
    fn kind(&self) -> StoreEngineKind {
        StoreEngineKind::ComputeNative
    }

    fn exists(&self, id: &TableId) -> Result<bool> {
        self.dir(id)
            .try_exists()
            .map_err(|e| io_error(&self.address(id), e))
    }

    fn create(&self, id: &TableId, partitions: u32) -> Result<Box<dyn RecordSink>> {
        let address = self.address(id);
        let dir = self.dir(id);
        if let Some(parent) = dir.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(&address, e))?;
        }
        fs::create_dir(&dir).map_err(|e| io_error(&address, e))?;
        let paths: Vec<PathBuf> = (0..partitions.max(1))
            .map(|p| dir.join(partition_file_name(p)))
            .collect();
        self.open_shards(&address, paths.iter().map(PathBuf::as_path), true)
    }

    fn append(&self, id: &TableId, partitions: u32) -> Result<Box<dyn RecordSink>> {
        let address = self.address(id);
        let shards = self.shards(id)?;
        if shards.is_empty() {
            let dir = self.dir(id);
            let paths: Vec<PathBuf> = (0..partitions.max(1))
                .map(|p| dir.join(partition_file_name(p)))
                .collect();
            return self.open_shards(&address, paths.iter().map(PathBuf::as_path), true);
        }
        let contiguous = shards
            .iter()
            .enumerate()
            .all(|(position, (index, _))| u32::try_from(position).ok() == Some(*index));
        if !contiguous {
            tracing::warn!(
                table = %address,
                shards = shards.len(),
                "partition shards are not contiguous; routing by shard position"
            );
        }
        if u32::try_from(shards.len()).ok() != Some(partitions) {
            tracing::debug!(
                table = %address,
                physical = shards.len(),
                requested = partitions,
                "appending with the physical partition count"
            );
        }
        self.open_shards(&address, shards.iter().map(|(_, path)| path.as_path()), false)
    }

    fn open_read(&self, id: &TableId, buffer_bytes: usize) -> Result<RecordReader> {
        let address = self.address(id);
        let mut reader: Box<dyn Read + Send> = Box::new(io::empty());
        for (_, path) in self.shards(id)? {
            let file = File::open(&path).map_err(|e| io_error(&address, e))?;
            reader = Box::new(reader.chain(file));
        }
        Ok(Box::new(BufReader::with_capacity(buffer_bytes.max(1), reader)))
    }

    fn rename(&self, from: &TableId, to: &TableId) -> Result<()> {
        if !self.exists(from)? {
            return Err(TableError::NotFound {
                address: self.address(from).to_string(),
            });
        }
        if self.exists(to)? {
            return Err(TableError::AlreadyExists {
                address: self.address(to).to_string(),
            });
        }
        let dst = self.dir(to);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(&self.address(to), e))?;
        }
        fs::rename(self.dir(from), &dst).map_err(|e| io_error(&self.address(from), e))
    }

    fn delete(&self, id: &TableId) -> Result<bool> {
        match fs::remove_dir_all(self.dir(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&self.address(id), e)),
        }
    }
}

/// Write stream fanning records out to one buffered writer per shard.
struct PartitionSink {
    writers: Vec<BufWriter<File>>,
    address: TableAddress,
    sync: bool,
}

impl PartitionSink {
    fn shard_for(&self, key: &str) -> usize {
        let count = u32::try_from(self.writers.len()).unwrap_or(u32::MAX);
        partition_for_key(key, count) as usize
    }
}

impl RecordSink for PartitionSink {
    fn write(&mut self, key: &str, line: &[u8]) -> Result<()> {
        let shard = self.shard_for(key);
        self.writers[shard]
            .write_all(line)
            .map_err(|e| io_error(&self.address, e))
    }

    fn flush(&mut self) -> Result<()> {
        for writer in &mut self.writers {
            writer.flush().map_err(|e| io_error(&self.address, e))?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let Self {
            writers,
            address,
            sync,
        } = *self;
        // Close every shard even if one fails; report the first failure.
        let mut first_error = None;
        for writer in writers {
            if let Err(e) = close_writer(writer, sync) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(io_error(&address, e)),
            None => Ok(()),
        }
    }
}
