use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use common::{Currency, EntityId, Money, PageRequest, SortDirection, Version};
use criterion::{Criterion, criterion_group, criterion_main};
use events::{DomainEvent, EventEnvelope, InventorySnapshot, ProductSnapshot};
use projections::{
    InMemoryReadStore, ProductFilter, ProductProjector, ProductReadRepository, ReadCache,
    ReadSortKey,
};

fn product(i: usize) -> ProductSnapshot {
    ProductSnapshot {
        name: format!("Product {i}"),
        description: None,
        sku: format!("SKU-{i:05}"),
        price: Money::from_cents(100 + i as i64),
        currency: Currency::Usd,
        category: if i % 2 == 0 { "Tools" } else { "Garden" }.into(),
        tags: vec![],
        specifications: BTreeMap::new(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn stock(product_id: EntityId, quantity: u32) -> InventorySnapshot {
    InventorySnapshot {
        product_id,
        warehouse_id: "W1".into(),
        location: "A-01".into(),
        quantity,
        reserved_quantity: 0,
        minimum_stock: 5,
        maximum_stock: None,
        unit_cost: Money::from_cents(50),
        updated_at: Utc::now(),
    }
}

/// One product event and one inventory event per product.
fn events(n: usize) -> Vec<EventEnvelope> {
    (0..n)
        .flat_map(|i| {
            let id = EntityId::new(format!("P{i}"));
            [
                EventEnvelope::new(DomainEvent::created(id.clone(), product(i)), Version::first()),
                EventEnvelope::new(
                    DomainEvent::created(EntityId::new(format!("I{i}")), stock(id, i as u32)),
                    Version::first(),
                ),
            ]
        })
        .collect()
}

fn bench_project_events(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let batch = events(500);

    c.bench_function("projections/project_1000_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let projector =
                    ProductProjector::new(Arc::new(InMemoryReadStore::new()), ReadCache::new());
                for envelope in &batch {
                    projector.project(envelope).await.unwrap();
                }
            });
        });
    });
}

fn bench_filtered_listing(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryReadStore::new();
    let repo = rt.block_on(async {
        let projector = ProductProjector::new(Arc::new(store.clone()), ReadCache::new());
        for envelope in &events(1000) {
            projector.project(envelope).await.unwrap();
        }
        ProductReadRepository::new(Arc::new(store.clone()), ReadCache::new())
    });
    let filter = ProductFilter::new()
        .category("Tools")
        .sort(ReadSortKey::TotalQuantity, SortDirection::Desc);

    c.bench_function("projections/find_all_1000_views", |b| {
        b.iter(|| {
            rt.block_on(async {
                repo.find_all(&filter, PageRequest::new(1, 20)).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_project_events, bench_filtered_listing);
criterion_main!(benches);
