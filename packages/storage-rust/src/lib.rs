//! `fedtable` Storage — backend connectors, metadata stores, and the engine-agnostic `Table` contract.

pub mod config;
pub mod storage;

pub use config::{CountPolicy, MetadataLocation, StorageConfig};
pub use storage::{Collect, StoreEngineRegistry, Table};
