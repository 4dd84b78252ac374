//! Transaction context handed to write-path code.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tokio::sync::{OwnedMutexGuard, OwnedSemaphorePermit};
use tokio::time::Instant;

use crate::{Collection, EntityId, Version};

/// Identifier of an open transaction, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxId(u64);

impl TxId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw identifier.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

pub(crate) type RecordKey = (Collection, EntityId);

/// A write staged in a transaction, applied only on commit.
#[derive(Debug, Clone)]
pub(crate) enum StagedWrite {
    Insert {
        body: Value,
    },
    Update {
        body: Value,
        expected: Version,
        version: Version,
    },
    Delete {
        expected: Version,
    },
}

/// Handle on an open unit-of-work session.
///
/// The context is neither `Clone` nor `Copy`: committing or rolling back
/// consumes it, so no operation can be issued against a terminated
/// transaction. Row locks and the transaction slot are released when the
/// context is dropped.
#[derive(Debug)]
pub struct TxContext {
    id: TxId,
    started_at: Instant,
    pub(crate) writes: HashMap<RecordKey, StagedWrite>,
    pub(crate) order: Vec<RecordKey>,
    pub(crate) observed: HashMap<RecordKey, Version>,
    pub(crate) locked: HashSet<RecordKey>,
    pub(crate) guards: Vec<OwnedMutexGuard<()>>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl TxContext {
    pub(crate) fn new(id: TxId, permit: Option<OwnedSemaphorePermit>) -> Self {
        Self {
            id,
            started_at: Instant::now(),
            writes: HashMap::new(),
            order: Vec::new(),
            observed: HashMap::new(),
            locked: HashSet::new(),
            guards: Vec::new(),
            _permit: permit,
        }
    }

    /// Returns the transaction identifier.
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Returns how long the transaction has been open.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    /// Returns the number of distinct records written so far.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn stage(&mut self, key: RecordKey, write: StagedWrite) {
        if self.writes.insert(key.clone(), write).is_none() {
            self.order.push(key);
        }
    }

    pub(crate) fn staged(&self, key: &RecordKey) -> Option<&StagedWrite> {
        self.writes.get(key)
    }

    pub(crate) fn observe(&mut self, key: RecordKey, version: Version) {
        self.observed.entry(key).or_insert(version);
    }
}
