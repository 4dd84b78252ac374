use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use common::PageRequest;
use domain::ProductQuery;
use events::EventBus;
use projections::{ProductFilter, ReadStore};

use super::{ReadModelQueryHandler, WriteModelQueryHandler};
use crate::AppResult;
use crate::mediator::QueryHandler;
use crate::queries::{
    ComparePerformanceQuery, CqrsStatus, FastGetProductsQuery, GetProductsQuery,
    GetSystemHealthQuery, HealthStatus, ModelTiming, PerformanceComparison, ReadStoreHealth,
    SyncState, SystemHealth,
};

const COMPARISON_PAGE_SIZE: u32 = 50;

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

/// Reports on the read paths: how they compare and whether they are fed.
pub struct DiagnosticsQueryHandler {
    write_reads: Arc<WriteModelQueryHandler>,
    fast_reads: Arc<ReadModelQueryHandler>,
    read_store: Arc<dyn ReadStore>,
    bus: Arc<EventBus>,
}

impl DiagnosticsQueryHandler {
    pub fn new(
        write_reads: Arc<WriteModelQueryHandler>,
        fast_reads: Arc<ReadModelQueryHandler>,
        read_store: Arc<dyn ReadStore>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self {
            write_reads,
            fast_reads,
            read_store,
            bus,
        }
    }
}

#[async_trait]
impl QueryHandler<ComparePerformanceQuery> for DiagnosticsQueryHandler {
    #[tracing::instrument(skip_all, fields(category = ?query.category))]
    async fn handle(&self, query: ComparePerformanceQuery) -> AppResult<PerformanceComparison> {
        let page = PageRequest::new(1, COMPARISON_PAGE_SIZE);
        let fast = FastGetProductsQuery {
            filter: ProductFilter {
                category: query.category.clone(),
                is_active: Some(true),
                ..Default::default()
            },
            page,
        };
        let normal = GetProductsQuery {
            filter: ProductQuery {
                category: query.category,
                is_active: Some(true),
                ..Default::default()
            },
            page,
        };

        let started = Instant::now();
        let fast_page = self.fast_reads.handle(fast).await?;
        let read_elapsed = started.elapsed();

        let started = Instant::now();
        let normal_page = self.write_reads.handle(normal).await?;
        let write_elapsed = started.elapsed();

        let comparison = PerformanceComparison {
            read_model: ModelTiming {
                execution_time_ms: millis(read_elapsed),
                total_results: fast_page.pagination.total,
                source: "denormalized-read-store".into(),
            },
            write_model: ModelTiming {
                execution_time_ms: millis(write_elapsed),
                total_results: normal_page.pagination.total,
                source: "normalized-write-store".into(),
            },
            speedup_ratio: (!read_elapsed.is_zero())
                .then(|| write_elapsed.as_secs_f64() / read_elapsed.as_secs_f64()),
            read_model_faster: read_elapsed < write_elapsed,
        };
        tracing::info!(
            read_ms = comparison.read_model.execution_time_ms,
            write_ms = comparison.write_model.execution_time_ms,
            "performance comparison completed"
        );
        Ok(comparison)
    }
}

#[async_trait]
impl QueryHandler<GetSystemHealthQuery> for DiagnosticsQueryHandler {
    async fn handle(&self, _query: GetSystemHealthQuery) -> AppResult<SystemHealth> {
        let read_store = match self.read_store.count().await {
            Ok(records) => ReadStoreHealth {
                status: HealthStatus::Healthy,
                records: Some(records),
            },
            Err(e) => {
                tracing::warn!(error = %e, "read store health check failed");
                ReadStoreHealth {
                    status: HealthStatus::Degraded,
                    records: None,
                }
            }
        };
        let event_bus = self.bus.stats();
        let read_model_sync = if event_bus.subscriber_count > 0 {
            SyncState::Active
        } else {
            SyncState::Inactive
        };

        Ok(SystemHealth {
            cqrs: CqrsStatus {
                status: read_store.status,
                read_model_sync,
            },
            read_store,
            event_bus,
            checked_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use projections::{InMemoryReadStore, ProductProjector, ProductReadRepository, ReadCache};
    use store::InMemoryBackend;

    use super::*;

    fn handler(bus: EventBus) -> DiagnosticsQueryHandler {
        let read_store = Arc::new(InMemoryReadStore::new());
        let reads = ProductReadRepository::new(read_store.clone(), ReadCache::new());
        DiagnosticsQueryHandler::new(
            Arc::new(WriteModelQueryHandler::new(Arc::new(InMemoryBackend::new()))),
            Arc::new(ReadModelQueryHandler::new(reads)),
            read_store,
            Arc::new(bus),
        )
    }

    #[tokio::test]
    async fn sync_is_inactive_without_subscribers() {
        let health = handler(EventBus::new()).handle(GetSystemHealthQuery).await.unwrap();

        assert_eq!(health.cqrs.status, HealthStatus::Healthy);
        assert_eq!(health.cqrs.read_model_sync, SyncState::Inactive);
        assert_eq!(health.read_store.records, Some(0));
        assert_eq!(health.event_bus.subscriber_count, 0);
    }

    #[tokio::test]
    async fn sync_is_active_once_the_projector_subscribes() {
        let mut bus = EventBus::new();
        Arc::new(ProductProjector::new(Arc::new(InMemoryReadStore::new()), ReadCache::new()))
            .subscribe(&mut bus);

        let health = handler(bus).handle(GetSystemHealthQuery).await.unwrap();
        assert_eq!(health.cqrs.read_model_sync, SyncState::Active);
    }

    #[tokio::test]
    async fn comparison_of_empty_stores_finds_nothing() {
        let comparison = handler(EventBus::new())
            .handle(ComparePerformanceQuery::default())
            .await
            .unwrap();

        assert_eq!(comparison.read_model.total_results, 0);
        assert_eq!(comparison.write_model.total_results, 0);
    }
}
