//! Query side of the catalogue.
//!
//! - [`ProductProjector`] folds write-side events into denormalized
//!   [`ProductView`] records and drops their cache entries
//! - [`ProductReadRepository`] serves filtered, cached reads over those records
//! - [`Reconciler`] rebuilds the read store from the write store

pub mod cached;
pub mod error;
pub mod filter;
pub mod projector;
pub mod read_model;
pub mod reconciler;
pub mod repository;

pub use cached::{CachedRead, ReadCache, product_key, top_selling_key};
pub use error::{ProjectionError, ProjectionGapError, Result};
pub use filter::{ProductFilter, ReadSortKey};
pub use projector::{ProductProjector, ProjectionOutcome};
pub use read_model::{
    InMemoryReadStore, InventorySummary, LocationStock, ProductView, ReadStore, SalesStats,
};
pub use reconciler::{Reconciler, ResyncReport};
pub use repository::{
    DEFAULT_PRODUCT_TTL, DEFAULT_TOP_SELLING_TTL, ProductAnalytics, ProductPerformance,
    ProductReadRepository,
};
