//! Layered table storage.
//!
//! - **Connector** ([`BackendConnector`]): one physical engine's primitives
//!   over already-encoded lines
//! - **Metadata** ([`MetadataStore`]): per-table row count and schema, kept
//!   apart from bulk data
//! - **Table** ([`Table`]): the engine-agnostic contract, combining a
//!   connector, a metadata store, and the record codec
//!
//! [`StoreEngineRegistry`] wires one [`StoreBackend`] per configured
//! engine. [`LeaseRegistry`] serializes conflicting operations on the same
//! identity.

pub mod connector;
pub mod connectors;
pub mod factory;
pub mod lease;
pub mod metadata_store;
pub mod metastores;
pub mod table;

pub use connector::*;
pub use connectors::{FilesystemConnector, MemoryConnector, PartitionedConnector};
pub use factory::{StoreBackend, StoreEngineRegistry};
pub use lease::{Lease, LeaseMode, LeaseRegistry};
pub use metadata_store::MetadataStore;
pub use metastores::{InMemoryMetadataStore, SidecarMetadataStore};
pub use table::{Collect, Table};
