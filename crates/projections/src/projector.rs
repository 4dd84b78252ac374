use std::sync::Arc;

use async_trait::async_trait;
use common::{EntityId, Version};
use events::{
    DeletedEntity, DomainEvent, EntityChanges, EntitySnapshot, EventBus, EventEnvelope,
    EventHandler, EventType, HandlerError, InventorySnapshot, ProductSnapshot,
};
use tokio::sync::Mutex;

use crate::cached::{ReadCache, product_key};
use crate::read_model::{LocationStock, ProductView, ReadStore};
use crate::{ProjectionError, ProjectionGapError, Result};

/// What a projection step did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionOutcome {
    /// The read record of `product_id` was written and its cache entry dropped.
    Applied { product_id: EntityId },
    /// The event's version was already reflected; nothing changed.
    AlreadyApplied,
}

/// Keeps product projections in step with write-side events.
///
/// Every handler is idempotent: each read record remembers the write-store
/// version it last applied, and events at or below that version are skipped.
/// Product and inventory payloads are full states, so a late event never
/// hides fields a newer one already carried.
/// Inventory events fold into the owning product's record; one arriving
/// before that record exists is a [`ProjectionGapError`].
pub struct ProductProjector {
    pub(crate) store: Arc<dyn ReadStore>,
    pub(crate) cache: ReadCache,
    /// Held for every read-modify-write; shared with the [`crate::Reconciler`].
    pub(crate) write_gate: Arc<Mutex<()>>,
}

impl ProductProjector {
    pub fn new(store: Arc<dyn ReadStore>, cache: ReadCache) -> Self {
        Self {
            store,
            cache,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Subscribes the projector to every event type.
    pub fn subscribe(self: &Arc<Self>, bus: &mut EventBus) {
        bus.subscribe_all(self.clone());
    }

    /// Applies one event to the read store.
    #[tracing::instrument(
        skip(self, envelope),
        fields(
            event_type = %envelope.event_type(),
            entity_id = %envelope.entity_id(),
            version = %envelope.version
        )
    )]
    pub async fn project(&self, envelope: &EventEnvelope) -> Result<ProjectionOutcome> {
        // Read-modify-write of a record must not interleave with another
        // event's or with a resync.
        let _gate = self.write_gate.lock().await;
        let version = envelope.version;
        let event_type = envelope.event_type();

        let changed = match &envelope.event {
            DomainEvent::EntityCreated(e) => match &e.data {
                EntitySnapshot::Product(snapshot) => {
                    self.product_created(&e.entity_id, snapshot, version).await?
                }
                EntitySnapshot::Inventory(snapshot) => {
                    self.inventory_changed(event_type, &e.entity_id, snapshot, version)
                        .await?
                }
            },
            DomainEvent::EntityUpdated(e) => match &e.data {
                EntityChanges::Product(revision) => {
                    self.product_updated(&e.entity_id, &revision.snapshot, version)
                        .await?
                }
                EntityChanges::Inventory(snapshot) => {
                    self.inventory_changed(event_type, &e.entity_id, snapshot, version)
                        .await?
                }
            },
            DomainEvent::EntityDeleted(e) => match &e.data {
                DeletedEntity::Product => self.product_deleted(&e.entity_id, version).await?,
                DeletedEntity::Inventory { product_id } => {
                    self.inventory_deleted(&e.entity_id, product_id, version)
                        .await?
                }
            },
            DomainEvent::StockLevelChanged(e) => {
                self.inventory_changed(event_type, &e.entity_id, &e.data.inventory, version)
                    .await?
            }
        };

        let Some(view) = changed else {
            tracing::debug!("event already applied");
            return Ok(ProjectionOutcome::AlreadyApplied);
        };

        let product_id = view.id.clone();
        self.store.put(view).await?;
        self.cache.delete(&product_key(&product_id)).await;
        metrics::counter!("projector_events_applied_total", "event_type" => event_type.as_str())
            .increment(1);
        Ok(ProjectionOutcome::Applied { product_id })
    }

    async fn existing(
        &self,
        event_type: EventType,
        entity_id: &EntityId,
        product_id: &EntityId,
    ) -> Result<ProductView> {
        self.store.get(product_id).await?.ok_or_else(|| {
            ProjectionGapError {
                event_type,
                entity_id: entity_id.clone(),
                product_id: product_id.clone(),
            }
            .into()
        })
    }

    async fn product_created(
        &self,
        id: &EntityId,
        snapshot: &ProductSnapshot,
        version: Version,
    ) -> Result<Option<ProductView>> {
        match self.store.get(id).await? {
            None => Ok(Some(ProductView::from_snapshot(id.clone(), snapshot, version))),
            Some(view) if view.version >= version => Ok(None),
            Some(mut view) => {
                view.replace_product_fields(snapshot, version);
                Ok(Some(view))
            }
        }
    }

    async fn product_updated(
        &self,
        id: &EntityId,
        snapshot: &ProductSnapshot,
        version: Version,
    ) -> Result<Option<ProductView>> {
        let mut view = self.existing(EventType::EntityUpdated, id, id).await?;
        if view.version >= version {
            return Ok(None);
        }
        view.replace_product_fields(snapshot, version);
        Ok(Some(view))
    }

    async fn product_deleted(
        &self,
        id: &EntityId,
        version: Version,
    ) -> Result<Option<ProductView>> {
        let mut view = self.existing(EventType::EntityDeleted, id, id).await?;
        if view.version >= version {
            return Ok(None);
        }
        view.is_active = false;
        view.touch(version);
        Ok(Some(view))
    }

    async fn inventory_changed(
        &self,
        event_type: EventType,
        inventory_id: &EntityId,
        snapshot: &InventorySnapshot,
        version: Version,
    ) -> Result<Option<ProductView>> {
        let mut view = self
            .existing(event_type, inventory_id, &snapshot.product_id)
            .await?;
        if view
            .inventory
            .locations
            .get(inventory_id)
            .is_some_and(|l| l.version >= version)
        {
            return Ok(None);
        }
        view.upsert_location(
            inventory_id.clone(),
            LocationStock::from_snapshot(snapshot, version),
        );
        Ok(Some(view))
    }

    async fn inventory_deleted(
        &self,
        inventory_id: &EntityId,
        product_id: &EntityId,
        version: Version,
    ) -> Result<Option<ProductView>> {
        let gap = || ProjectionGapError {
            event_type: EventType::EntityDeleted,
            entity_id: inventory_id.clone(),
            product_id: product_id.clone(),
        };
        let mut view = self
            .existing(EventType::EntityDeleted, inventory_id, product_id)
            .await?;
        let Some(location) = view.inventory.locations.get(inventory_id) else {
            return Err(gap().into());
        };
        if location.version >= version {
            return Ok(None);
        }
        let mut location = location.clone();
        location.active = false;
        location.version = version;
        view.upsert_location(inventory_id.clone(), location);
        Ok(Some(view))
    }
}

#[async_trait]
impl EventHandler for ProductProjector {
    fn name(&self) -> &'static str {
        "ProductProjector"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> std::result::Result<(), HandlerError> {
        match self.project(envelope).await {
            Ok(_) => Ok(()),
            Err(ProjectionError::Gap(gap)) => {
                metrics::counter!("projector_gap_total", "event_type" => gap.event_type.as_str())
                    .increment(1);
                tracing::warn!(error = %gap, "read model is stale until the next resync");
                Ok(())
            }
            Err(e) => Err(HandlerError::new(e)),
        }
    }
}
