//! Error taxonomy shared by every table operation.
//!
//! [`TableError`] is what callers see. [`CodecError`] describes a single
//! malformed record and is wrapped into [`TableError::Encoding`] or
//! [`TableError::Decoding`] together with the context of the failing call.

use std::io;

/// Result alias for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// Reasons a single record cannot be encoded or decoded.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("key contains reserved character {found:?}")]
    ReservedCharacter { found: char },
    #[error("line has no key delimiter")]
    MissingDelimiter,
    #[error("key is not valid UTF-8")]
    InvalidKey,
    #[error("payload is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("value could not be serialized: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),
    #[error("value could not be deserialized: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),
}

/// Errors surfaced by table operations.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// The addressed artifact does not exist.
    #[error("table not found: {address}")]
    NotFound { address: String },

    /// The destination identity is already occupied.
    #[error("table already exists: {address}")]
    AlreadyExists { address: String },

    /// The physical store could not be reached. Retryable.
    #[error("backend unavailable for {address}: {source}")]
    BackendUnavailable {
        address: String,
        #[source]
        source: io::Error,
    },

    /// A record could not be turned into a line.
    #[error("cannot encode record with key {key:?}: {source}")]
    Encoding {
        key: String,
        #[source]
        source: CodecError,
    },

    /// A stored line could not be turned back into a record.
    #[error("cannot decode line {line} of {address}: {source}")]
    Decoding {
        address: String,
        line: u64,
        #[source]
        source: CodecError,
    },

    /// Another operation on the same identity is in flight.
    #[error("{operation} rejected: {address} is in use by a concurrent {holder}")]
    ConcurrencyViolation {
        address: String,
        operation: &'static str,
        holder: &'static str,
    },

    /// A namespace or name is not a safe path component.
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidIdentifier {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested engine kind is not configured in this registry.
    #[error("storage engine {0} is not configured")]
    UnsupportedEngine(String),

    /// A metadata record exists but cannot be parsed.
    #[error("malformed metadata for {address}: {reason}")]
    Metadata { address: String, reason: String },
}

impl TableError {
    /// Maps an I/O failure against `address` onto the taxonomy.
    ///
    /// `NotFound` stays `NotFound`; everything else means the store could
    /// not serve the request and is reported as `BackendUnavailable`.
    #[must_use]
    pub fn from_io(address: impl Into<String>, source: io::Error) -> Self {
        let address = address.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound { address }
        } else {
            Self::BackendUnavailable { address, source }
        }
    }

    /// Whether a caller may retry the same call.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Whether this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = TableError::from_io("/x/t", io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[test]
    fn other_io_maps_to_backend_unavailable() {
        let err = TableError::from_io(
            "/x/t",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, TableError::BackendUnavailable { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn only_backend_unavailable_is_retryable() {
        let errors = [
            TableError::NotFound { address: "a".into() },
            TableError::AlreadyExists { address: "a".into() },
            TableError::InvalidArgument("partitions".into()),
            TableError::UnsupportedEngine("hdfs".into()),
        ];
        assert!(errors.iter().all(|e| !e.is_retryable()));
    }

    #[test]
    fn display_includes_context() {
        let err = TableError::Decoding {
            address: "local:///fedtable/x/t".into(),
            line: 3,
            source: CodecError::MissingDelimiter,
        };
        let msg = err.to_string();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("local:///fedtable/x/t"));
        assert!(msg.contains("no key delimiter"));
    }
}
