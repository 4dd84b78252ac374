use std::sync::Arc;
use std::time::Duration;

use common::{EntityId, Money, Page, PageRequest};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::cached::{CachedRead, ReadCache, product_key, top_selling_key};
use crate::filter::ProductFilter;
use crate::read_model::{InventorySummary, ProductView, ReadStore, SalesStats};

pub const DEFAULT_PRODUCT_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_TOP_SELLING_TTL: Duration = Duration::from_secs(600);

/// Days of sales history the performance figures are averaged over.
const SALES_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPerformance {
    /// Units sold per unit on hand.
    pub stock_turnover: f64,
    /// Days the available stock lasts at the average daily sales rate.
    pub days_of_stock: f64,
    pub revenue_per_day: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAnalytics {
    pub product_id: EntityId,
    pub sales: SalesStats,
    pub inventory: InventorySummary,
    pub performance: ProductPerformance,
}

impl ProductAnalytics {
    fn of(view: ProductView) -> Self {
        let sold = view.sales_stats.total_sold as f64;
        let on_hand = f64::from(view.inventory.total_quantity);
        let daily_sales = sold / f64::from(SALES_WINDOW_DAYS);
        let performance = ProductPerformance {
            stock_turnover: if on_hand > 0.0 { sold / on_hand } else { 0.0 },
            days_of_stock: if daily_sales > 0.0 {
                f64::from(view.inventory.available_quantity) / daily_sales
            } else {
                0.0
            },
            revenue_per_day: Money::from_cents(
                view.sales_stats.revenue.cents() / i64::from(SALES_WINDOW_DAYS),
            ),
        };
        Self {
            product_id: view.id,
            sales: view.sales_stats,
            inventory: view.inventory,
            performance,
        }
    }
}

/// Latency-oriented reads over the product projections, fronted by the cache.
#[derive(Clone)]
pub struct ProductReadRepository {
    store: Arc<dyn ReadStore>,
    cache: ReadCache,
    product_ttl: Duration,
    top_selling_ttl: Duration,
}

impl ProductReadRepository {
    pub fn new(store: Arc<dyn ReadStore>, cache: ReadCache) -> Self {
        Self {
            store,
            cache,
            product_ttl: DEFAULT_PRODUCT_TTL,
            top_selling_ttl: DEFAULT_TOP_SELLING_TTL,
        }
    }

    pub fn with_ttls(mut self, product: Duration, top_selling: Duration) -> Self {
        self.product_ttl = product;
        self.top_selling_ttl = top_selling;
        self
    }

    /// Looks a product up, consulting the cache first when `use_cache` is set.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_id(&self, id: &EntityId, use_cache: bool) -> Result<Option<ProductView>> {
        let key = product_key(id);
        if use_cache
            && let Some(CachedRead::Product(view)) = self.cache.get(&key).await
        {
            tracing::debug!("product served from cache");
            return Ok(Some(view.as_ref().clone()));
        }

        let view = self.store.get(id).await?;
        if use_cache && let Some(view) = &view {
            self.cache
                .set(
                    key.clone(),
                    CachedRead::Product(Arc::new(view.clone())),
                    Some(self.product_ttl),
                )
                .await;
            // The projector writes the store before invalidating. A projection
            // that landed after our read either shows up here or invalidates
            // after our fill.
            if self.store.get(id).await?.as_ref() != Some(view) {
                tracing::debug!("read raced a projection, dropping the fill");
                self.cache.delete(&key).await;
            }
        }
        Ok(view)
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn find_all(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<Page<ProductView>> {
        let mut views: Vec<ProductView> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|v| filter.matches(v))
            .collect();
        views.sort_by(|a, b| filter.compare(a, b));
        Ok(Page::from_sorted(views, page))
    }

    /// Active products ordered by units sold, highest first.
    #[tracing::instrument(skip(self))]
    pub async fn find_top_selling(&self, limit: usize) -> Result<Vec<ProductView>> {
        let key = top_selling_key(limit);
        if let Some(CachedRead::Products(views)) = self.cache.get(&key).await {
            return Ok(views.as_ref().clone());
        }

        let mut views: Vec<ProductView> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|v| v.is_active)
            .collect();
        views.sort_by(|a, b| {
            b.sales_stats
                .total_sold
                .cmp(&a.sales_stats.total_sold)
                .then_with(|| a.id.cmp(&b.id))
        });
        views.truncate(limit);

        self.cache
            .set(key, CachedRead::Products(Arc::new(views.clone())), Some(self.top_selling_ttl))
            .await;
        Ok(views)
    }

    pub async fn analytics(&self, id: &EntityId) -> Result<Option<ProductAnalytics>> {
        Ok(self.store.get(id).await?.map(ProductAnalytics::of))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use common::{Currency, SortDirection, Version};
    use events::ProductSnapshot;

    use super::*;
    use crate::filter::ReadSortKey;
    use crate::read_model::InMemoryReadStore;

    fn view(id: &str, sold: u64) -> ProductView {
        let mut view = ProductView::from_snapshot(
            EntityId::new(id),
            &ProductSnapshot {
                name: format!("Product {id}"),
                description: None,
                sku: format!("SKU-{id}"),
                price: Money::from_cents(1000),
                currency: Currency::Usd,
                category: "Tools".into(),
                tags: vec![],
                specifications: BTreeMap::new(),
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            Version::first(),
        );
        view.sales_stats.total_sold = sold;
        view
    }

    async fn repository(views: Vec<ProductView>) -> (ProductReadRepository, InMemoryReadStore) {
        let store = InMemoryReadStore::new();
        store.replace_all(views).await.unwrap();
        let repo = ProductReadRepository::new(Arc::new(store.clone()), ReadCache::new());
        (repo, store)
    }

    #[tokio::test]
    async fn cached_lookup_ignores_later_store_writes() {
        let (repo, store) = repository(vec![view("P1", 0)]).await;
        let id = EntityId::new("P1");

        assert!(repo.find_by_id(&id, true).await.unwrap().is_some());
        let mut renamed = view("P1", 0);
        renamed.name = "Renamed".into();
        store.put(renamed).await.unwrap();

        let cached = repo.find_by_id(&id, true).await.unwrap().unwrap();
        assert_eq!(cached.name, "Product P1");
        let fresh = repo.find_by_id(&id, false).await.unwrap().unwrap();
        assert_eq!(fresh.name, "Renamed");
    }

    #[tokio::test]
    async fn missing_product_is_not_cached() {
        let (repo, store) = repository(vec![]).await;
        let id = EntityId::new("P1");

        assert!(repo.find_by_id(&id, true).await.unwrap().is_none());
        store.put(view("P1", 0)).await.unwrap();
        assert!(repo.find_by_id(&id, true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn top_selling_orders_by_units_sold() {
        let mut retired = view("P4", 100);
        retired.is_active = false;
        let (repo, _) =
            repository(vec![view("P1", 5), view("P2", 50), view("P3", 20), retired]).await;

        let top: Vec<_> = repo
            .find_top_selling(2)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id.to_string())
            .collect();
        assert_eq!(top, ["P2", "P3"]);
    }

    #[tokio::test]
    async fn find_all_filters_sorts_and_pages() {
        let (repo, _) = repository((1..=5).map(|i| view(&format!("P{i}"), i)).collect()).await;
        let filter = ProductFilter::new().sort(ReadSortKey::TotalSold, SortDirection::Desc);

        let page = repo.find_all(&filter, PageRequest::new(2, 2)).await.unwrap();
        let ids: Vec<_> = page.data.iter().map(|v| v.id.to_string()).collect();
        assert_eq!(ids, ["P3", "P2"]);
        assert_eq!(page.pagination.total, 5);
    }

    #[tokio::test]
    async fn analytics_derives_daily_figures() {
        let mut product = view("P1", 60);
        product.sales_stats.revenue = Money::from_cents(3000);
        product.inventory.total_quantity = 30;
        product.inventory.available_quantity = 20;
        let (repo, _) = repository(vec![product]).await;

        let analytics = repo.analytics(&EntityId::new("P1")).await.unwrap().unwrap();
        assert_eq!(analytics.performance.revenue_per_day, Money::from_cents(100));
        assert_eq!(analytics.performance.stock_turnover, 2.0);
        assert_eq!(analytics.performance.days_of_stock, 10.0);
        assert!(repo.analytics(&EntityId::new("nope")).await.unwrap().is_none());
    }
}
