//! Address resolution from logical identity to physical location.
//!
//! Both functions here are pure: the result depends only on their inputs,
//! never on the working directory or any other process state, so a table
//! can be relocated by moving its root and nothing else.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::{StoreEngineKind, TableId};

/// Logical prefix every table address lives under.
pub const ADDRESS_ROOT: &str = "/fedtable";

/// Canonical location of a table on a given engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableAddress {
    engine: StoreEngineKind,
    path: String,
}

impl TableAddress {
    #[must_use]
    pub fn engine(&self) -> StoreEngineKind {
        self.engine
    }

    /// Engine-independent path, e.g. `/fedtable/x/t`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for TableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.engine, self.path)
    }
}

/// Resolves the canonical address of `id` on `engine`.
#[must_use]
pub fn resolve(engine: StoreEngineKind, id: &TableId) -> TableAddress {
    TableAddress {
        engine,
        path: format!("{ADDRESS_ROOT}/{}/{}", id.namespace(), id.name()),
    }
}

/// Maps `id` onto a directory tree rooted at `root`: `<root>/<namespace>/<name>`.
#[must_use]
pub fn physical_path(root: &Path, id: &TableId) -> PathBuf {
    root.join(id.namespace()).join(id.name())
}
