use std::time::Duration;

use thiserror::Error;

use crate::{Collection, EntityId, TxId, Version};

/// Errors raised when a transaction cannot be opened.
#[derive(Debug, Error)]
pub enum TransactionStartError {
    /// Every transaction slot is in use.
    #[error("too many open transactions (limit {limit})")]
    Exhausted { limit: usize },

    /// The backend refused to open a session.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Reasons a backend rejects a commit.
#[derive(Debug, Error)]
pub enum CommitError {
    /// A record changed after this transaction read it.
    #[error("write conflict on {collection}/{id}: expected version {expected}, found {actual}")]
    Conflict {
        collection: Collection,
        id: EntityId,
        expected: Version,
        actual: Version,
    },

    /// A unique index would be violated.
    #[error("unique index '{index}' violated by {collection}/{id}")]
    ConstraintViolation {
        index: &'static str,
        collection: Collection,
        id: EntityId,
    },

    /// The backend rejected the commit for another reason.
    #[error("commit rejected: {0}")]
    Rejected(String),
}

/// Errors that can occur when interacting with the write store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A transaction could not be opened.
    #[error("Failed to start transaction: {0}")]
    TransactionStart(#[from] TransactionStartError),

    /// The backend rejected a commit; nothing issued against the transaction persisted.
    #[error("Commit of transaction {tx} failed: {cause}")]
    Commit { tx: TxId, cause: CommitError },

    /// The transaction was rolled back because its deadline elapsed.
    #[error("Transaction {tx} exceeded its deadline of {deadline:?}")]
    DeadlineExceeded { tx: TxId, deadline: Duration },

    /// An update or delete named a record that does not exist.
    #[error("Record not found: {collection}/{id}")]
    RecordNotFound { collection: Collection, id: EntityId },

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend failed in a way not covered above.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true for faults that may succeed if the whole write is retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::TransactionStart(_)
                | StoreError::DeadlineExceeded { .. }
                | StoreError::Commit {
                    cause: CommitError::Conflict { .. },
                    ..
                }
        )
    }
}

/// Result type for write-store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
