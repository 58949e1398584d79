//! Per-identity leases guarding concurrent table operations.
//!
//! Readers share a lease; writers (append, destroy, rename, schema update)
//! hold it exclusively. A conflicting request fails immediately with
//! [`TableError::ConcurrencyViolation`] instead of waiting, so callers are
//! never blocked behind a long-running stream.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use fedtable_core::{resolve, Result, StoreEngineKind, TableError, TableId};

/// Holder name reported for shared leases.
const READER: &str = "collect";

/// Requested access level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Default)]
struct LeaseState {
    readers: u32,
    writer: Option<&'static str>,
}

impl LeaseState {
    fn is_idle(&self) -> bool {
        self.readers == 0 && self.writer.is_none()
    }
}

/// Tracks active leases for one engine.
#[derive(Debug)]
pub struct LeaseRegistry {
    engine: StoreEngineKind,
    active: DashMap<TableId, LeaseState>,
}

impl LeaseRegistry {
    #[must_use]
    pub fn new(engine: StoreEngineKind) -> Self {
        Self {
            engine,
            active: DashMap::new(),
        }
    }

    /// Acquire a lease on `id` for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::ConcurrencyViolation`] if the request conflicts
    /// with a lease already held.
    pub fn acquire(
        self: &Arc<Self>,
        id: &TableId,
        mode: LeaseMode,
        operation: &'static str,
    ) -> Result<Lease> {
        let mut state = match self.active.entry(id.clone()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(slot) => slot.insert(LeaseState::default()),
        };

        let holder = match (mode, state.writer) {
            (_, Some(writer)) => Some(writer),
            (LeaseMode::Exclusive, None) if state.readers > 0 => Some(READER),
            _ => None,
        };
        if let Some(holder) = holder {
            drop(state);
            return Err(TableError::ConcurrencyViolation {
                address: resolve(self.engine, id).to_string(),
                operation,
                holder,
            });
        }

        match mode {
            LeaseMode::Shared => state.readers += 1,
            LeaseMode::Exclusive => state.writer = Some(operation),
        }
        drop(state);
        trace!(table = %id, operation, ?mode, "lease acquired");

        Ok(Lease {
            registry: Arc::clone(self),
            id: id.clone(),
            mode,
        })
    }

    /// Whether no lease is held on `id`.
    #[must_use]
    pub fn is_idle(&self, id: &TableId) -> bool {
        !self.active.get(id).is_some_and(|state| !state.is_idle())
    }

    fn release(&self, id: &TableId, mode: LeaseMode) {
        if let Some(mut state) = self.active.get_mut(id) {
            match mode {
                LeaseMode::Shared => state.readers = state.readers.saturating_sub(1),
                LeaseMode::Exclusive => state.writer = None,
            }
        }
        self.active.remove_if(id, |_, state| state.is_idle());
        trace!(table = %id, ?mode, "lease released");
    }
}

/// RAII guard; the lease is released on drop.
#[derive(Debug)]
pub struct Lease {
    registry: Arc<LeaseRegistry>,
    id: TableId,
    mode: LeaseMode,
}

impl Lease {
    #[must_use]
    pub fn mode(&self) -> LeaseMode {
        self.mode
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.registry.release(&self.id, self.mode);
    }
}
