//! [`BackendConnector`](super::BackendConnector) implementations.
//!
//! One connector per [`StoreEngineKind`](fedtable_core::StoreEngineKind):
//! [`FilesystemConnector`] for the distributed filesystem engine,
//! [`PartitionedConnector`] for the compute-native engine, and
//! [`MemoryConnector`] for the local engine.

mod filesystem;
mod memory;
mod partitioned;

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::Path;

use fedtable_core::{TableAddress, TableError};

pub use filesystem::FilesystemConnector;
pub use memory::MemoryConnector;
pub use partitioned::PartitionedConnector;

/// Maps an I/O failure on `address` onto the table error taxonomy.
///
/// Unlike [`TableError::from_io`], an `AlreadyExists` I/O error becomes
/// [`TableError::AlreadyExists`].
pub(crate) fn io_error(address: &TableAddress, err: io::Error) -> TableError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        TableError::AlreadyExists {
            address: address.to_string(),
        }
    } else {
        TableError::from_io(address.to_string(), err)
    }
}

/// Opens `path` for writing: create-new when `create` is set, append otherwise.
fn open_write(path: &Path, create: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    if create {
        options.write(true).create_new(true);
    } else {
        options.append(true);
    }
    options.open(path)
}

/// Flushes a buffered file writer, optionally syncs it, and closes it.
fn close_writer(writer: BufWriter<File>, sync: bool) -> io::Result<()> {
    let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    if sync {
        file.sync_all()?;
    }
    Ok(())
}
