//! Command and query dispatch.
//!
//! Every message type is bound to one tag of a closed enumeration, and every
//! tag owns one typed handler slot. Resolving a handler is a field access, so
//! the message type and the handler type can never disagree at runtime.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use common::Page;
use domain::{Inventory, Product};
use projections::{ProductAnalytics, ProductView};

use crate::commands::*;
use crate::queries::*;
use crate::{AppError, AppResult, ValidationError};

/// Self-validation run by the mediator before a handler sees the message.
#[async_trait]
pub trait Validate: Send + Sync {
    async fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, command: C) -> AppResult<C::Output>;
}

#[async_trait]
pub trait QueryHandler<Q: Query>: Send + Sync {
    async fn handle(&self, query: Q) -> AppResult<Q::Output>;
}

/// A message that changes state. Implemented by the dispatch tables below.
pub trait Command: Validate + std::fmt::Debug + Sized + 'static {
    type Output: Send + 'static;
    const TAG: CommandTag;

    #[doc(hidden)]
    fn slot(table: &CommandTable) -> &Option<Arc<dyn CommandHandler<Self>>>;

    #[doc(hidden)]
    fn slot_mut(table: &mut CommandTable) -> &mut Option<Arc<dyn CommandHandler<Self>>>;
}

/// A message that reads state. Implemented by the dispatch tables below.
pub trait Query: Validate + std::fmt::Debug + Sized + 'static {
    type Output: Send + 'static;
    const TAG: QueryTag;

    #[doc(hidden)]
    fn slot(table: &QueryTable) -> &Option<Arc<dyn QueryHandler<Self>>>;

    #[doc(hidden)]
    fn slot_mut(table: &mut QueryTable) -> &mut Option<Arc<dyn QueryHandler<Self>>>;
}

/// Declares a tag enum, its slot table, and the message trait impls.
macro_rules! dispatch_table {
    (
        $(#[$meta:meta])*
        $tag:ident / $table:ident: $message:ident => $handler:ident {
            $($variant:ident($ty:ty) -> $out:ty,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $tag {
            $($variant,)+
        }

        impl $tag {
            pub const ALL: &'static [$tag] = &[$($tag::$variant,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($tag::$variant => stringify!($variant),)+
                }
            }
        }

        impl std::fmt::Display for $tag {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        #[doc(hidden)]
        #[derive(Default)]
        #[allow(non_snake_case)]
        pub struct $table {
            $($variant: Option<Arc<dyn $handler<$ty>>>,)+
        }

        impl $table {
            fn is_bound(&self, tag: $tag) -> bool {
                match tag {
                    $($tag::$variant => self.$variant.is_some(),)+
                }
            }
        }

        $(
            impl $message for $ty {
                type Output = $out;
                const TAG: $tag = $tag::$variant;

                fn slot(table: &$table) -> &Option<Arc<dyn $handler<Self>>> {
                    &table.$variant
                }

                fn slot_mut(table: &mut $table) -> &mut Option<Arc<dyn $handler<Self>>> {
                    &mut table.$variant
                }
            }
        )+
    };
}

dispatch_table! {
    /// Every command the application accepts.
    CommandTag / CommandTable: Command => CommandHandler {
        CreateProduct(CreateProductCommand) -> Product,
        UpdateProduct(UpdateProductCommand) -> Product,
        DeleteProduct(DeleteProductCommand) -> (),
        CreateInventory(CreateInventoryCommand) -> Inventory,
        UpdateInventory(UpdateInventoryCommand) -> Inventory,
        AdjustInventory(AdjustInventoryCommand) -> Inventory,
        ReserveInventory(ReserveInventoryCommand) -> Inventory,
        ReleaseReservation(ReleaseReservationCommand) -> Inventory,
        DeleteInventory(DeleteInventoryCommand) -> (),
        Logout(LogoutCommand) -> usize,
    }
}

dispatch_table! {
    /// Every query the application answers.
    QueryTag / QueryTable: Query => QueryHandler {
        GetProductById(GetProductByIdQuery) -> Product,
        GetProducts(GetProductsQuery) -> Page<Product>,
        GetInventoryById(GetInventoryByIdQuery) -> Inventory,
        GetInventory(GetInventoryQuery) -> Page<Inventory>,
        GetLowStockItems(GetLowStockItemsQuery) -> Page<LowStockItem>,
        FastGetProductById(FastGetProductByIdQuery) -> ProductView,
        FastGetProducts(FastGetProductsQuery) -> Page<ProductView>,
        GetTopSellingProducts(GetTopSellingProductsQuery) -> Vec<ProductView>,
        GetProductAnalytics(GetProductAnalyticsQuery) -> ProductAnalytics,
        ComparePerformance(ComparePerformanceQuery) -> PerformanceComparison,
        GetSystemHealth(GetSystemHealthQuery) -> SystemHealth,
    }
}

/// Routes each command or query to the one handler bound to its tag.
///
/// Handlers are bound during wiring (`&mut self`); afterwards the mediator is
/// shared and only dispatches. It adds no retries, transactions, or caching.
#[derive(Default)]
pub struct Mediator {
    commands: CommandTable,
    queries: QueryTable,
}

impl Mediator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to `C`'s tag. A tag that is already bound keeps its
    /// first handler.
    pub fn register_command_handler<C: Command>(
        &mut self,
        handler: Arc<dyn CommandHandler<C>>,
    ) -> AppResult<()> {
        let slot = C::slot_mut(&mut self.commands);
        if slot.is_some() {
            return Err(AppError::DuplicateRegistration {
                kind: "command",
                tag: C::TAG.as_str(),
            });
        }
        *slot = Some(handler);
        tracing::debug!(command = %C::TAG, "command handler registered");
        Ok(())
    }

    pub fn register_query_handler<Q: Query>(
        &mut self,
        handler: Arc<dyn QueryHandler<Q>>,
    ) -> AppResult<()> {
        let slot = Q::slot_mut(&mut self.queries);
        if slot.is_some() {
            return Err(AppError::DuplicateRegistration {
                kind: "query",
                tag: Q::TAG.as_str(),
            });
        }
        *slot = Some(handler);
        tracing::debug!(query = %Q::TAG, "query handler registered");
        Ok(())
    }

    pub fn has_command_handler(&self, tag: CommandTag) -> bool {
        self.commands.is_bound(tag)
    }

    pub fn has_query_handler(&self, tag: QueryTag) -> bool {
        self.queries.is_bound(tag)
    }

    /// Tags with no handler bound; empty once wiring is complete.
    pub fn unbound(&self) -> Vec<&'static str> {
        let commands = CommandTag::ALL
            .iter()
            .filter(|t| !self.has_command_handler(**t))
            .map(CommandTag::as_str);
        let queries = QueryTag::ALL
            .iter()
            .filter(|t| !self.has_query_handler(**t))
            .map(QueryTag::as_str);
        commands.chain(queries).collect()
    }

    /// Validates `command` and hands it to its handler. The handler's result
    /// is returned unchanged.
    #[tracing::instrument(skip_all, fields(command = %C::TAG))]
    pub async fn send<C: Command>(&self, command: C) -> AppResult<C::Output> {
        let tag = C::TAG.as_str();
        let handler = C::slot(&self.commands)
            .clone()
            .ok_or(AppError::HandlerNotFound {
                kind: "command",
                tag,
            })?;

        if let Err(e) = command.validate().await {
            metrics::counter!("mediator_validation_failures_total", "message" => tag).increment(1);
            tracing::debug!(error = %e, "command rejected by validation");
            return Err(e.into());
        }

        let started = Instant::now();
        let result = handler.handle(command).await;
        metrics::histogram!("mediator_command_duration_seconds", "command" => tag)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(
            "mediator_commands_total",
            "command" => tag,
            "outcome" => outcome(&result)
        )
        .increment(1);
        if let Err(e) = &result {
            tracing::debug!(error = %e, "command failed");
        }
        result
    }

    /// Validates `query` and hands it to its handler.
    #[tracing::instrument(skip_all, fields(query = %Q::TAG))]
    pub async fn query<Q: Query>(&self, query: Q) -> AppResult<Q::Output> {
        let tag = Q::TAG.as_str();
        let handler = Q::slot(&self.queries)
            .clone()
            .ok_or(AppError::HandlerNotFound { kind: "query", tag })?;

        if let Err(e) = query.validate().await {
            metrics::counter!("mediator_validation_failures_total", "message" => tag).increment(1);
            tracing::debug!(error = %e, "query rejected by validation");
            return Err(e.into());
        }

        let result = handler.handle(query).await;
        metrics::counter!(
            "mediator_queries_total",
            "query" => tag,
            "outcome" => outcome(&result)
        )
        .increment(1);
        result
    }
}

fn outcome<T>(result: &AppResult<T>) -> &'static str {
    if result.is_ok() { "ok" } else { "error" }
}
