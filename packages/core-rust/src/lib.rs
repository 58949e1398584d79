//! `fedtable` Core — table identity, engine kinds, addressing, record codec, and metadata types.

pub mod address;
pub mod codec;
pub mod error;
pub mod hash;
pub mod metadata;
pub mod partition;
pub mod schema;
pub mod types;

pub use address::{physical_path, resolve, TableAddress};
pub use error::{CodecError, Result, TableError};
pub use metadata::TableMeta;
pub use schema::{FieldDef, TableSchema};
pub use types::{RowCount, StoreEngineKind, TableId};
