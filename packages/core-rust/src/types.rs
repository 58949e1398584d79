use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TableError};

/// Closed set of physical storage engines a table can live on.
///
/// A table's engine is fixed when the handle is built; dispatch on it is a
/// `match`, never runtime type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreEngineKind {
    /// Hierarchical append/read byte-stream store (HDFS-like).
    #[serde(rename = "hdfs")]
    DistributedFs,
    /// Partitioned store native to the compute cluster.
    ComputeNative,
    /// Process-local store.
    Local,
}

impl StoreEngineKind {
    /// Every engine kind, in declaration order.
    pub const ALL: [Self; 3] = [Self::DistributedFs, Self::ComputeNative, Self::Local];

    /// Stable lowercase identifier, also used as the address scheme.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DistributedFs => "hdfs",
            Self::ComputeNative => "compute_native",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for StoreEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreEngineKind {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| TableError::UnsupportedEngine(s.to_string()))
    }
}

/// Logical identity of a table: a namespace and a name, like a folder and a file.
///
/// Both parts are validated to be safe single path components so that the
/// `<root>/<namespace>/<name>` mapping stays injective.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    namespace: String,
    name: String,
}

impl TableId {
    /// Builds a validated identity.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidIdentifier`] if either part is not a safe
    /// path component.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();
        validate_component("namespace", &namespace)?;
        validate_component("name", &name)?;
        Ok(Self { namespace, name })
    }

    /// Builds an identity, generating a fresh unique value for each unset part.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::InvalidIdentifier`] if a supplied part is invalid.
    pub fn new_or_generated(namespace: Option<&str>, name: Option<&str>) -> Result<Self> {
        let namespace = namespace.map_or_else(generate_component, str::to_string);
        let name = name.map_or_else(generate_component, str::to_string);
        Self::new(namespace, name)
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

fn generate_component() -> String {
    Uuid::new_v4().to_string()
}

/// Rejects anything that would not be a single, visible path component.
fn validate_component(field: &'static str, value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value.contains('/') || value.contains('\\') {
        Some("must not contain a path separator")
    } else if value.contains("..") {
        Some("must not contain '..'")
    } else if value.starts_with('.') {
        Some("must not start with '.'")
    } else if value.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(TableError::InvalidIdentifier {
            field,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Row count as reported by the metadata store.
///
/// `Unknown` means the table was never measured, which is different from
/// an exactly empty table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCount {
    Unknown,
    Exact(u64),
}

impl RowCount {
    #[must_use]
    pub fn from_option(count: Option<u64>) -> Self {
        count.map_or(Self::Unknown, Self::Exact)
    }

    #[must_use]
    pub fn exact(self) -> Option<u64> {
        match self {
            Self::Unknown => None,
            Self::Exact(n) => Some(n),
        }
    }

    #[must_use]
    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl fmt::Display for RowCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Exact(n) => write!(f, "{n}"),
        }
    }
}
