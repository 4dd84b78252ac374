//! Shared types used by both the write side and the read side.

pub mod money;
pub mod page;
pub mod types;

pub use money::{Currency, Money, UnknownCurrency};
pub use page::{Page, PageRequest, Pagination, SortDirection};
pub use types::{EntityId, Version};
