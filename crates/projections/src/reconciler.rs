use std::collections::HashMap;
use std::sync::Arc;

use domain::{InventoryRepository, ProductRepository};
use store::Backend;
use tokio::sync::Mutex;

use crate::cached::ReadCache;
use crate::read_model::{LocationStock, ProductView, ReadStore};
use crate::{ProductProjector, Result};

/// Counts from one resync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResyncReport {
    pub products: usize,
    pub locations: usize,
    /// Views whose product no longer exists in the write store.
    pub deactivated: usize,
    /// Inventory records whose product no longer exists.
    pub orphaned_locations: usize,
}

/// Rebuilds the read store from the write store.
///
/// This is the recovery path for events lost between commit and publication.
/// Sales statistics live only on the read side and are carried over.
/// A resync and the projector's event handling never overlap.
pub struct Reconciler {
    products: ProductRepository,
    inventory: InventoryRepository,
    store: Arc<dyn ReadStore>,
    cache: ReadCache,
    write_gate: Arc<Mutex<()>>,
}

impl Reconciler {
    /// Rebuilds the read store and cache `projector` writes to.
    pub fn new(backend: Arc<dyn Backend>, projector: &ProductProjector) -> Self {
        Self {
            products: ProductRepository::new(backend.clone()),
            inventory: InventoryRepository::new(backend),
            store: projector.store.clone(),
            cache: projector.cache.clone(),
            write_gate: projector.write_gate.clone(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn resync(&self) -> Result<ResyncReport> {
        let _gate = self.write_gate.lock().await;
        let mut previous: HashMap<_, _> = self
            .store
            .list()
            .await?
            .into_iter()
            .map(|v| (v.id.clone(), v))
            .collect();

        let mut report = ResyncReport::default();
        let mut views: HashMap<_, _> = HashMap::new();
        for product in self.products.list_all().await? {
            let snapshot = product.snapshot();
            let mut view =
                ProductView::from_snapshot(product.id.clone(), &snapshot, product.version);
            if let Some(old) = previous.remove(&product.id) {
                view.sales_stats = old.sales_stats;
            }
            views.insert(product.id.clone(), view);
            report.products += 1;
        }

        for record in self.inventory.list_all().await? {
            let Some(view) = views.get_mut(record.product_id()) else {
                tracing::warn!(
                    inventory_id = %record.id(),
                    product_id = %record.product_id(),
                    "inventory without product"
                );
                report.orphaned_locations += 1;
                continue;
            };
            view.upsert_location(
                record.id().clone(),
                LocationStock::from_snapshot(&record.snapshot(), record.version()),
            );
            report.locations += 1;
        }

        for (id, mut stale) in previous {
            if stale.is_active {
                stale.is_active = false;
                report.deactivated += 1;
            }
            views.insert(id, stale);
        }

        self.store.replace_all(views.into_values().collect()).await?;
        self.cache.clear().await;

        tracing::info!(
            products = report.products,
            locations = report.locations,
            deactivated = report.deactivated,
            "read store resynced"
        );
        metrics::counter!("projector_resyncs_total").increment(1);
        Ok(report)
    }
}
