//! Explicit construction of the whole core. Nothing is looked up globally;
//! every component receives its collaborators here.

use std::sync::Arc;
use std::time::Duration;

use domain::unique_indexes;
use events::EventBus;
use projections::{
    DEFAULT_PRODUCT_TTL, DEFAULT_TOP_SELLING_TTL, InMemoryReadStore, ProductProjector,
    ProductReadRepository, ReadCache, Reconciler, ResyncReport,
};
use store::{InMemoryBackend, UnitOfWork};

use crate::AppResult;
use crate::commands::*;
use crate::handlers::{
    DiagnosticsQueryHandler, InventoryCommandHandler, LogoutHandler, ProductCommandHandler,
    ReadModelQueryHandler, TokenBlacklist, WriteContext, WriteModelQueryHandler,
};
use crate::mediator::Mediator;
use crate::queries::*;

#[derive(Debug, Clone)]
pub struct Settings {
    pub max_open_transactions: usize,
    pub transaction_timeout: Duration,
    pub product_cache_ttl: Duration,
    pub top_selling_cache_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_open_transactions: 64,
            transaction_timeout: Duration::from_secs(5),
            product_cache_ttl: DEFAULT_PRODUCT_TTL,
            top_selling_cache_ttl: DEFAULT_TOP_SELLING_TTL,
        }
    }
}

/// The wired core: one mediator over one write store, one read store, and
/// the cache in front of it.
pub struct Application {
    pub mediator: Arc<Mediator>,
    pub backend: Arc<InMemoryBackend>,
    pub read_store: Arc<InMemoryReadStore>,
    pub read_cache: ReadCache,
    pub blacklist: TokenBlacklist,
    reconciler: Reconciler,
}

impl Application {
    pub fn build(settings: &Settings) -> AppResult<Self> {
        let backend = Arc::new(unique_indexes().into_iter().fold(
            InMemoryBackend::new().with_max_open_transactions(settings.max_open_transactions),
            InMemoryBackend::with_unique_index,
        ));
        let read_store = Arc::new(InMemoryReadStore::new());
        let read_cache = ReadCache::named("read_model");
        let blacklist = TokenBlacklist::new();

        let mut bus = EventBus::new();
        let projector = Arc::new(ProductProjector::new(read_store.clone(), read_cache.clone()));
        projector.subscribe(&mut bus);
        let reconciler = Reconciler::new(backend.clone(), &projector);
        let bus = Arc::new(bus);

        let write = WriteContext {
            uow: UnitOfWork::new(backend.clone()),
            bus: bus.clone(),
            deadline: settings.transaction_timeout,
        };
        let reads = ProductReadRepository::new(read_store.clone(), read_cache.clone())
            .with_ttls(settings.product_cache_ttl, settings.top_selling_cache_ttl);

        let mut mediator = Mediator::new();

        let products = Arc::new(ProductCommandHandler::new(write.clone()));
        mediator.register_command_handler::<CreateProductCommand>(products.clone())?;
        mediator.register_command_handler::<UpdateProductCommand>(products.clone())?;
        mediator.register_command_handler::<DeleteProductCommand>(products)?;

        let inventory = Arc::new(InventoryCommandHandler::new(write));
        mediator.register_command_handler::<CreateInventoryCommand>(inventory.clone())?;
        mediator.register_command_handler::<UpdateInventoryCommand>(inventory.clone())?;
        mediator.register_command_handler::<AdjustInventoryCommand>(inventory.clone())?;
        mediator.register_command_handler::<ReserveInventoryCommand>(inventory.clone())?;
        mediator.register_command_handler::<ReleaseReservationCommand>(inventory.clone())?;
        mediator.register_command_handler::<DeleteInventoryCommand>(inventory)?;

        mediator.register_command_handler::<LogoutCommand>(Arc::new(LogoutHandler::new(
            blacklist.clone(),
        )))?;

        let write_reads = Arc::new(WriteModelQueryHandler::new(backend.clone()));
        mediator.register_query_handler::<GetProductByIdQuery>(write_reads.clone())?;
        mediator.register_query_handler::<GetProductsQuery>(write_reads.clone())?;
        mediator.register_query_handler::<GetInventoryByIdQuery>(write_reads.clone())?;
        mediator.register_query_handler::<GetInventoryQuery>(write_reads.clone())?;
        mediator.register_query_handler::<GetLowStockItemsQuery>(write_reads.clone())?;

        let fast_reads = Arc::new(ReadModelQueryHandler::new(reads));
        mediator.register_query_handler::<FastGetProductByIdQuery>(fast_reads.clone())?;
        mediator.register_query_handler::<FastGetProductsQuery>(fast_reads.clone())?;
        mediator.register_query_handler::<GetTopSellingProductsQuery>(fast_reads.clone())?;
        mediator.register_query_handler::<GetProductAnalyticsQuery>(fast_reads.clone())?;

        let diagnostics = Arc::new(DiagnosticsQueryHandler::new(
            write_reads,
            fast_reads,
            read_store.clone(),
            bus,
        ));
        mediator.register_query_handler::<ComparePerformanceQuery>(diagnostics.clone())?;
        mediator.register_query_handler::<GetSystemHealthQuery>(diagnostics)?;

        debug_assert!(mediator.unbound().is_empty());
        tracing::info!(
            max_open_transactions = settings.max_open_transactions,
            timeout_ms = settings.transaction_timeout.as_millis() as u64,
            "application wired"
        );

        Ok(Self {
            reconciler,
            mediator: Arc::new(mediator),
            backend,
            read_store,
            read_cache,
            blacklist,
        })
    }

    /// Rebuilds the read store from the write store.
    pub async fn resync(&self) -> AppResult<ResyncReport> {
        Ok(self.reconciler.resync().await?)
    }
}
