//! Repository behaviour against the in-memory backend, including the
//! unique indexes the domain declares.

use std::sync::Arc;

use common::{Currency, EntityId, Money, PageRequest, SortDirection};
use domain::{
    DomainError, Inventory, InventoryQuery, InventoryRepository, NewInventory, NewProduct,
    Product, ProductQuery, ProductRepository, ProductSortKey, unique_indexes,
};
use store::{Backend, CommitError, InMemoryBackend, StoreError};

struct Fixture {
    backend: Arc<InMemoryBackend>,
    products: ProductRepository,
    inventory: InventoryRepository,
}

fn setup() -> Fixture {
    let backend = Arc::new(
        unique_indexes()
            .into_iter()
            .fold(InMemoryBackend::new(), InMemoryBackend::with_unique_index),
    );
    Fixture {
        products: ProductRepository::new(backend.clone()),
        inventory: InventoryRepository::new(backend.clone()),
        backend,
    }
}

fn new_product(id: &str, sku: &str, category: &str, cents: i64) -> Product {
    Product::create(
        EntityId::new(id),
        NewProduct {
            name: format!("Product {id}"),
            description: None,
            sku: sku.into(),
            price: Money::from_cents(cents),
            currency: Currency::Usd,
            category: category.into(),
            tags: vec![],
            specifications: Default::default(),
        },
    )
    .unwrap()
}

fn new_inventory(id: &str, product: &str, warehouse: &str, quantity: u32) -> Inventory {
    Inventory::create(
        EntityId::new(id),
        NewInventory {
            product_id: EntityId::new(product),
            warehouse_id: warehouse.into(),
            location: "A1".into(),
            quantity,
            minimum_stock: 5,
            maximum_stock: None,
            unit_cost: Money::from_cents(100),
        },
    )
    .unwrap()
}

async fn seed_products(fx: &Fixture, products: &[Product]) {
    let mut ctx = fx.backend.begin().await.unwrap();
    for p in products {
        fx.products.insert(&mut ctx, p).await.unwrap();
    }
    fx.backend.commit(ctx).await.unwrap();
}

#[tokio::test]
async fn stored_entities_carry_their_record_version() {
    let fx = setup();
    let product = new_product("P1", "SKU-1", "Tools", 500);
    seed_products(&fx, std::slice::from_ref(&product)).await;

    let mut ctx = fx.backend.begin().await.unwrap();
    let mut loaded = fx.products.find_in(&mut ctx, &product.id).await.unwrap().unwrap();
    assert_eq!(loaded.version.as_i64(), 1);
    loaded.name = "Renamed".into();
    let version = fx.products.update(&mut ctx, &loaded).await.unwrap();
    fx.backend.commit(ctx).await.unwrap();

    let committed = fx.products.find_by_id(&product.id).await.unwrap().unwrap();
    assert_eq!(version.as_i64(), 2);
    assert_eq!(committed.version, version);
    assert_eq!(committed.name, "Renamed");
}

#[tokio::test]
async fn duplicate_sku_is_a_constraint_violation() {
    let fx = setup();
    seed_products(&fx, &[new_product("P1", "SKU-1", "Tools", 500)]).await;

    let mut ctx = fx.backend.begin().await.unwrap();
    fx.products
        .insert(&mut ctx, &new_product("P2", "SKU-1", "Tools", 700))
        .await
        .unwrap();
    let err = fx.backend.commit(ctx).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Commit {
            cause: CommitError::ConstraintViolation { index: "products_sku", .. },
            ..
        }
    ));
}

#[tokio::test]
async fn product_listing_filters_sorts_and_pages() {
    let fx = setup();
    seed_products(
        &fx,
        &[
            new_product("P1", "SKU-1", "Tools", 500),
            new_product("P2", "SKU-2", "Garden", 300),
            new_product("P3", "SKU-3", "Tools", 900),
            new_product("P4", "SKU-4", "tools", 100),
        ],
    )
    .await;

    let query = ProductQuery {
        category: Some("TOOLS".into()),
        min_price: Some(Money::from_cents(200)),
        sort_by: ProductSortKey::Price,
        sort_order: SortDirection::Desc,
        ..Default::default()
    };
    let page = fx.products.find_all(&query, PageRequest::new(1, 1)).await.unwrap();

    assert_eq!(page.pagination.total, 2);
    assert!(page.pagination.has_next);
    assert_eq!(page.data[0].id.as_str(), "P3");
}

#[tokio::test]
async fn product_search_by_sku_sees_own_writes() {
    let fx = setup();
    let mut ctx = fx.backend.begin().await.unwrap();
    fx.products
        .insert(&mut ctx, &new_product("P1", "SKU-XYZ", "Tools", 500))
        .await
        .unwrap();

    let found = fx.products.find_by_sku_in(&mut ctx, "SKU-XYZ").await.unwrap();
    assert_eq!(found.unwrap().id.as_str(), "P1");
    assert!(fx.products.find_by_sku_in(&mut ctx, "NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn one_inventory_record_per_product_and_warehouse() {
    let fx = setup();
    let mut ctx = fx.backend.begin().await.unwrap();
    fx.inventory
        .insert(&mut ctx, &new_inventory("I1", "P1", "W1", 10))
        .await
        .unwrap();
    fx.inventory
        .insert(&mut ctx, &new_inventory("I2", "P1", "W1", 4))
        .await
        .unwrap();
    let err = fx.backend.commit(ctx).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Commit {
            cause: CommitError::ConstraintViolation {
                index: "inventory_product_warehouse",
                ..
            },
            ..
        }
    ));
    assert!(fx.inventory.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn inventory_lookup_by_product_and_warehouse() {
    let fx = setup();
    let mut ctx = fx.backend.begin().await.unwrap();
    fx.inventory
        .insert(&mut ctx, &new_inventory("I1", "P1", "W1", 10))
        .await
        .unwrap();
    fx.inventory
        .insert(&mut ctx, &new_inventory("I2", "P1", "W2", 2))
        .await
        .unwrap();
    fx.backend.commit(ctx).await.unwrap();

    let mut ctx = fx.backend.begin().await.unwrap();
    let hit = fx
        .inventory
        .find_by_product_and_warehouse_in(&mut ctx, &EntityId::new("P1"), "W2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.id().as_str(), "I2");
    assert_eq!(
        fx.inventory
            .find_by_product_in(&mut ctx, &EntityId::new("P1"))
            .await
            .unwrap()
            .len(),
        2
    );

    let low = fx
        .inventory
        .find_all(
            &InventoryQuery {
                low_stock: Some(true),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(low.data.len(), 1);
    assert_eq!(low.data[0].id().as_str(), "I2");
}

#[tokio::test]
async fn corrupt_record_surfaces_as_store_error() {
    let fx = setup();
    let mut ctx = fx.backend.begin().await.unwrap();
    fx.backend
        .insert(&mut ctx, domain::PRODUCTS, &EntityId::new("bad"), serde_json::json!({"sku": 1}))
        .await
        .unwrap();
    fx.backend.commit(ctx).await.unwrap();

    let err = fx.products.find_by_id(&EntityId::new("bad")).await.unwrap_err();
    assert!(matches!(err, DomainError::Store(StoreError::Serialization(_))));
}
