//! [`MetadataStore`](super::MetadataStore) implementations.

mod memory;
mod sidecar;

pub use memory::InMemoryMetadataStore;
pub use sidecar::{SidecarMetadataStore, META_DIR};
