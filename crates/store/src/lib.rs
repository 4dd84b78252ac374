//! Write-side persistence for the command path.
//!
//! - [`Backend`] is the persistence abstraction: transaction primitives plus
//!   key-based CRUD that always names the [`TxContext`] it writes through
//! - [`InMemoryBackend`] is the process-local implementation
//! - [`UnitOfWork`] owns the transaction lifecycle used by every write handler

pub mod backend;
pub mod context;
pub mod error;
pub mod memory;
pub mod unit_of_work;

pub use backend::{Backend, Collection, Record, UniqueIndex};
pub use common::{EntityId, Version};
pub use context::{TxContext, TxId};
pub use error::{CommitError, Result, StoreError, TransactionStartError};
pub use memory::InMemoryBackend;
pub use unit_of_work::UnitOfWork;
