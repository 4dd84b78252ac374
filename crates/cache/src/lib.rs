//! Key/value cache with per-entry TTL.
//!
//! Expiry is time-driven, never access-driven: an entry past its TTL is absent
//! on the next [`Cache::get`], and an entry within its TTL stays present until
//! it is deleted or replaced. Pending expiries live in one min-heap drained by
//! a single sweeper task instead of one timer per key.

mod expiry;
mod store;

pub use store::{Cache, CacheStats};
