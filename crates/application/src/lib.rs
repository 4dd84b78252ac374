//! Application layer of the catalogue service.
//!
//! - [`Mediator`] routes each command or query to the one handler bound to its tag
//! - write handlers run inside a [`store::UnitOfWork`] transaction and publish
//!   a domain event on the [`events::EventBus`] only after it commits
//! - read handlers query either the write store or the cached projections
//! - [`Application`] wires all of it together

pub mod commands;
pub mod error;
pub mod handlers;
pub mod mediator;
pub mod queries;
pub mod wiring;

pub use commands::{
    AdjustInventoryCommand, CreateInventoryCommand, CreateProductCommand, DeleteInventoryCommand,
    DeleteProductCommand, LogoutCommand, ReleaseReservationCommand, ReserveInventoryCommand,
    RevokedToken, UpdateInventoryCommand, UpdateProductCommand,
};
pub use error::{AppError, AppResult, ValidationError};
pub use handlers::{TokenBlacklist, WriteContext};
pub use mediator::{
    Command, CommandHandler, CommandTag, Mediator, Query, QueryHandler, QueryTag, Validate,
};
pub use queries::{
    ComparePerformanceQuery, CqrsStatus, FastGetProductByIdQuery, FastGetProductsQuery,
    GetInventoryByIdQuery, GetInventoryQuery, GetLowStockItemsQuery, GetProductAnalyticsQuery,
    GetProductByIdQuery, GetProductsQuery, GetSystemHealthQuery, GetTopSellingProductsQuery,
    HealthStatus, LowStockItem, ModelTiming, PerformanceComparison, ReadStoreHealth, SyncState,
    SystemHealth,
};
pub use wiring::{Application, Settings};
