//! Projector behaviour: event ordering, re-delivery, gaps, and cache invalidation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use common::{Currency, EntityId, Money, Version};
use async_trait::async_trait;
use events::{
    DeletedEntity, DomainEvent, EventBus, EventEnvelope, EventType, InventorySnapshot,
    ProductChanges, ProductRevision, ProductSnapshot, StockChange, StockLevel,
};
use projections::{
    CachedRead, InMemoryReadStore, ProductProjector, ProductReadRepository, ProductView,
    ProjectionError, ProjectionOutcome, ReadCache, ReadStore, product_key,
};

struct Fixture {
    projector: Arc<ProductProjector>,
    store: InMemoryReadStore,
    cache: ReadCache,
}

/// Read store that can hold its next `get` or `list` open after reading.
struct Stalling {
    inner: InMemoryReadStore,
    stall_get: AtomicBool,
    stall_list: AtomicBool,
}

impl Stalling {
    const DELAY: Duration = Duration::from_millis(50);

    fn new(inner: InMemoryReadStore) -> Self {
        Self {
            inner,
            stall_get: AtomicBool::new(false),
            stall_list: AtomicBool::new(false),
        }
    }

    fn stall_next_get(&self) {
        self.stall_get.store(true, Ordering::SeqCst);
    }

    fn stall_next_list(&self) {
        self.stall_list.store(true, Ordering::SeqCst);
    }

    async fn pause(flag: &AtomicBool) {
        if flag.swap(false, Ordering::SeqCst) {
            tokio::time::sleep(Self::DELAY).await;
        }
    }
}

#[async_trait]
impl ReadStore for Stalling {
    async fn get(&self, id: &EntityId) -> projections::Result<Option<ProductView>> {
        let view = self.inner.get(id).await?;
        Self::pause(&self.stall_get).await;
        Ok(view)
    }

    async fn put(&self, view: ProductView) -> projections::Result<()> {
        self.inner.put(view).await
    }

    async fn list(&self) -> projections::Result<Vec<ProductView>> {
        let views = self.inner.list().await?;
        Self::pause(&self.stall_list).await;
        Ok(views)
    }

    async fn replace_all(&self, views: Vec<ProductView>) -> projections::Result<()> {
        self.inner.replace_all(views).await
    }

    async fn count(&self) -> projections::Result<usize> {
        self.inner.count().await
    }
}

fn setup() -> Fixture {
    let store = InMemoryReadStore::new();
    let cache = ReadCache::new();
    let projector = Arc::new(ProductProjector::new(Arc::new(store.clone()), cache.clone()));
    Fixture {
        projector,
        store,
        cache,
    }
}

fn product(name: &str) -> ProductSnapshot {
    ProductSnapshot {
        name: name.into(),
        description: None,
        sku: "SKU-P1".into(),
        price: Money::from_cents(2500),
        currency: Currency::Usd,
        category: "Tools".into(),
        tags: vec!["steel".into()],
        specifications: BTreeMap::new(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn stock(product_id: &str, quantity: u32, reserved: u32) -> InventorySnapshot {
    InventorySnapshot {
        product_id: EntityId::new(product_id),
        warehouse_id: "W1".into(),
        location: "A-01".into(),
        quantity,
        reserved_quantity: reserved,
        minimum_stock: 2,
        maximum_stock: None,
        unit_cost: Money::from_cents(1000),
        updated_at: Utc::now(),
    }
}

/// An update that renamed and repriced P1, with its resulting state.
fn revision(name: &str, price: i64) -> ProductRevision {
    let mut snapshot = product(name);
    snapshot.price = Money::from_cents(price);
    ProductRevision {
        changes: ProductChanges {
            name: Some(name.into()),
            price: Some(snapshot.price),
            updated_at: snapshot.updated_at,
            ..Default::default()
        },
        snapshot,
    }
}

fn envelope(event: DomainEvent, version: i64) -> EventEnvelope {
    EventEnvelope::new(event, Version::new(version))
}

fn p1() -> EntityId {
    EntityId::new("P1")
}

fn i1() -> EntityId {
    EntityId::new("I1")
}

async fn view(fx: &Fixture) -> ProductView {
    fx.store.get(&p1()).await.unwrap().unwrap()
}

#[tokio::test]
async fn create_then_inventory_builds_totals() {
    let fx = setup();
    fx.projector
        .project(&envelope(DomainEvent::created(p1(), product("Hammer")), 1))
        .await
        .unwrap();
    fx.projector
        .project(&envelope(DomainEvent::created(i1(), stock("P1", 10, 0)), 1))
        .await
        .unwrap();

    let view = view(&fx).await;
    assert_eq!(view.name, "Hammer");
    assert_eq!(view.inventory.total_quantity, 10);
    assert_eq!(view.inventory.available_quantity, 10);
    assert_eq!(view.inventory.locations.len(), 1);
}

#[tokio::test]
async fn redelivered_events_change_nothing() {
    let fx = setup();
    let created = envelope(DomainEvent::created(p1(), product("Hammer")), 1);
    let renamed = envelope(DomainEvent::updated(p1(), revision("Mallet", 2500)), 2);

    fx.projector.project(&created).await.unwrap();
    fx.projector.project(&renamed).await.unwrap();
    let before = view(&fx).await;

    assert_eq!(
        fx.projector.project(&created).await.unwrap(),
        ProjectionOutcome::AlreadyApplied
    );
    assert_eq!(
        fx.projector.project(&renamed).await.unwrap(),
        ProjectionOutcome::AlreadyApplied
    );
    assert_eq!(view(&fx).await, before);
    assert_eq!(before.name, "Mallet");
}

#[tokio::test]
async fn late_update_does_not_hide_its_fields() {
    let fx = setup();
    fx.projector
        .project(&envelope(DomainEvent::created(p1(), product("Hammer")), 1))
        .await
        .unwrap();

    // v2 renamed; v3 repriced after it and reached the projector first.
    let rename = revision("Mallet", 2500);
    let mut reprice = revision("Mallet", 9999);
    reprice.changes.name = None;
    let v3 = fx
        .projector
        .project(&envelope(DomainEvent::updated(p1(), reprice), 3))
        .await
        .unwrap();
    let v2 = fx
        .projector
        .project(&envelope(DomainEvent::updated(p1(), rename), 2))
        .await
        .unwrap();

    assert_eq!(v3, ProjectionOutcome::Applied { product_id: p1() });
    assert_eq!(v2, ProjectionOutcome::AlreadyApplied);
    let view = view(&fx).await;
    assert_eq!(view.name, "Mallet");
    assert_eq!(view.price, Money::from_cents(9999));
    assert_eq!(view.version, Version::new(3));
}

#[tokio::test]
async fn stale_stock_event_is_skipped() {
    let fx = setup();
    fx.projector
        .project(&envelope(DomainEvent::created(p1(), product("Hammer")), 1))
        .await
        .unwrap();

    let level = |q, r| StockLevel {
        product_id: p1(),
        warehouse_id: "W1".into(),
        change: StockChange::Reserved,
        previous_quantity: 10,
        previous_reserved: 0,
        inventory: stock("P1", q, r),
    };
    fx.projector
        .project(&envelope(DomainEvent::stock_level_changed(i1(), level(10, 4)), 3))
        .await
        .unwrap();
    fx.projector
        .project(&envelope(DomainEvent::stock_level_changed(i1(), level(10, 0)), 2))
        .await
        .unwrap();

    let view = view(&fx).await;
    assert_eq!(view.inventory.reserved_quantity, 4);
    assert_eq!(view.inventory.available_quantity, 6);
}

#[tokio::test]
async fn update_before_create_is_a_gap() {
    let fx = setup();
    let err = fx
        .projector
        .project(&envelope(DomainEvent::updated(p1(), revision("Hammer", 2500)), 2))
        .await
        .unwrap_err();

    let ProjectionError::Gap(gap) = err else {
        panic!("expected a gap, got {err:?}");
    };
    assert_eq!(gap.event_type, EventType::EntityUpdated);
    assert_eq!(gap.product_id, p1());
    assert_eq!(fx.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn gap_is_contained_by_the_bus() {
    let fx = setup();
    let mut bus = EventBus::new();
    fx.projector.subscribe(&mut bus);

    let report = bus
        .publish(&envelope(DomainEvent::created(i1(), stock("P1", 5, 0)), 1))
        .await;

    assert!(report.is_clean());
    assert_eq!(report.delivered, 1);
    assert_eq!(fx.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn product_delete_is_soft() {
    let fx = setup();
    fx.projector
        .project(&envelope(DomainEvent::created(p1(), product("Hammer")), 1))
        .await
        .unwrap();
    fx.projector
        .project(&envelope(DomainEvent::deleted(p1(), DeletedEntity::Product), 2))
        .await
        .unwrap();

    let view = view(&fx).await;
    assert!(!view.is_active);
    assert_eq!(view.name, "Hammer");
}

#[tokio::test]
async fn inventory_delete_drops_location_from_totals() {
    let fx = setup();
    fx.projector
        .project(&envelope(DomainEvent::created(p1(), product("Hammer")), 1))
        .await
        .unwrap();
    fx.projector
        .project(&envelope(DomainEvent::created(i1(), stock("P1", 10, 0)), 1))
        .await
        .unwrap();
    fx.projector
        .project(&envelope(
            DomainEvent::deleted(i1(), DeletedEntity::Inventory { product_id: p1() }),
            2,
        ))
        .await
        .unwrap();

    let view = view(&fx).await;
    assert_eq!(view.inventory.total_quantity, 0);
    assert_eq!(view.inventory.active_locations().count(), 0);
    assert!(!view.inventory.locations[&i1()].active);
}

#[tokio::test]
async fn mutation_invalidates_cached_product() {
    let fx = setup();
    let repo = ProductReadRepository::new(Arc::new(fx.store.clone()), fx.cache.clone());
    fx.projector
        .project(&envelope(DomainEvent::created(p1(), product("Hammer")), 1))
        .await
        .unwrap();

    assert!(repo.find_by_id(&p1(), true).await.unwrap().is_some());
    assert!(matches!(
        fx.cache.get(&product_key(&p1())).await,
        Some(CachedRead::Product(_))
    ));

    fx.projector
        .project(&envelope(DomainEvent::created(i1(), stock("P1", 7, 0)), 1))
        .await
        .unwrap();

    assert!(fx.cache.get(&product_key(&p1())).await.is_none());
    let fresh = repo.find_by_id(&p1(), true).await.unwrap().unwrap();
    assert_eq!(fresh.inventory.total_quantity, 7);
}

#[tokio::test]
async fn read_overlapping_a_projection_does_not_pin_the_old_view() {
    let store = Arc::new(Stalling::new(InMemoryReadStore::new()));
    let cache = ReadCache::new();
    let projector = ProductProjector::new(store.clone(), cache.clone());
    let repo = ProductReadRepository::new(store.clone(), cache.clone());
    projector
        .project(&envelope(DomainEvent::created(p1(), product("Hammer")), 1))
        .await
        .unwrap();

    store.stall_next_get();
    let reader = {
        let repo = repo.clone();
        tokio::spawn(async move { repo.find_by_id(&p1(), true).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    projector
        .project(&envelope(DomainEvent::updated(p1(), revision("Mallet", 2500)), 2))
        .await
        .unwrap();

    let overlapped = reader.await.unwrap().unwrap().unwrap();
    assert_eq!(overlapped.name, "Hammer");
    let next = repo.find_by_id(&p1(), true).await.unwrap().unwrap();
    assert_eq!(next.name, "Mallet");
}

mod resync {
    use domain::{
        Inventory, InventoryRepository, NewInventory, NewProduct, Product, ProductRepository,
    };
    use projections::Reconciler;
    use store::{Backend, InMemoryBackend};

    use super::*;

    async fn seed(backend: &Arc<InMemoryBackend>) {
        let products = ProductRepository::new(backend.clone());
        let inventory = InventoryRepository::new(backend.clone());
        let mut ctx = backend.begin().await.unwrap();
        let product = Product::create(
            p1(),
            NewProduct {
                name: "Hammer".into(),
                description: None,
                sku: "SKU-P1".into(),
                price: Money::from_cents(2500),
                currency: Currency::Usd,
                category: "Tools".into(),
                tags: vec![],
                specifications: BTreeMap::new(),
            },
        )
        .unwrap();
        products.insert(&mut ctx, &product).await.unwrap();
        let record = Inventory::create(
            i1(),
            NewInventory {
                product_id: p1(),
                warehouse_id: "W1".into(),
                location: "A-01".into(),
                quantity: 12,
                minimum_stock: 2,
                maximum_stock: None,
                unit_cost: Money::from_cents(1000),
            },
        )
        .unwrap();
        inventory.insert(&mut ctx, &record).await.unwrap();
        backend.commit(ctx).await.unwrap();
    }

    #[tokio::test]
    async fn resync_rebuilds_views_and_keeps_sales() {
        let backend = Arc::new(InMemoryBackend::new());
        seed(&backend).await;
        let fx = setup();

        let mut stale =
            projections::ProductView::from_snapshot(p1(), &product("Old"), Version::first());
        stale.sales_stats.total_sold = 9;
        fx.store.put(stale).await.unwrap();
        let mut ghost = projections::ProductView::from_snapshot(
            EntityId::new("GONE"),
            &product("Ghost"),
            Version::first(),
        );
        ghost.sku = "SKU-GONE".into();
        fx.store.put(ghost).await.unwrap();
        fx.cache
            .set(product_key(&p1()), CachedRead::Products(Arc::new(vec![])), None)
            .await;

        let reconciler = Reconciler::new(backend.clone(), &fx.projector);
        let report = reconciler.resync().await.unwrap();

        assert_eq!(report.products, 1);
        assert_eq!(report.locations, 1);
        assert_eq!(report.deactivated, 1);
        let rebuilt = view(&fx).await;
        assert_eq!(rebuilt.name, "Hammer");
        assert_eq!(rebuilt.inventory.total_quantity, 12);
        assert_eq!(rebuilt.sales_stats.total_sold, 9);
        assert!(!fx.store.get(&EntityId::new("GONE")).await.unwrap().unwrap().is_active);
        assert!(fx.cache.get(&product_key(&p1())).await.is_none());
    }

    #[tokio::test]
    async fn projector_continues_after_resync() {
        let backend = Arc::new(InMemoryBackend::new());
        seed(&backend).await;
        let fx = setup();
        Reconciler::new(backend, &fx.projector)
            .resync()
            .await
            .unwrap();

        // The seeded inventory record is at version 1; a later event applies.
        fx.projector
            .project(&envelope(DomainEvent::updated(i1(), stock("P1", 20, 0)), 2))
            .await
            .unwrap();
        assert_eq!(view(&fx).await.inventory.total_quantity, 20);
    }

    #[tokio::test]
    async fn events_wait_for_a_running_resync() {
        let backend = Arc::new(InMemoryBackend::new());
        seed(&backend).await;
        let store = Arc::new(Stalling::new(InMemoryReadStore::new()));
        let projector = ProductProjector::new(store.clone(), ReadCache::new());
        let reconciler = Reconciler::new(backend, &projector);
        reconciler.resync().await.unwrap();

        store.stall_next_list();
        let running = tokio::spawn(async move { reconciler.resync().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        projector
            .project(&envelope(DomainEvent::updated(i1(), stock("P1", 20, 0)), 2))
            .await
            .unwrap();
        running.await.unwrap().unwrap();

        let view = store.get(&p1()).await.unwrap().unwrap();
        assert_eq!(view.inventory.total_quantity, 20);
    }
}
