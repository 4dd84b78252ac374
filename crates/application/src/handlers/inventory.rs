use async_trait::async_trait;
use common::{EntityId, Version};
use domain::{AdjustmentKind, Inventory, InventoryError, InventoryRepository, ProductRepository};
use events::{DeletedEntity, DomainEvent, StockChange};
use store::TxContext;

use super::WriteContext;
use crate::commands::{
    AdjustInventoryCommand, CreateInventoryCommand, DeleteInventoryCommand,
    ReleaseReservationCommand, ReserveInventoryCommand, UpdateInventoryCommand,
};
use crate::mediator::CommandHandler;
use crate::{AppError, AppResult};

/// Inventory lifecycle and every stock-quantity change.
///
/// Quantity changes read their record under its row lock, so concurrent
/// changes to one record apply one after another against fresh counters.
pub struct InventoryCommandHandler {
    write: WriteContext,
    products: ProductRepository,
    inventory: InventoryRepository,
}

/// Counters before a stock change, carried into its event.
struct Before {
    quantity: u32,
    reserved: u32,
}

impl InventoryCommandHandler {
    pub fn new(write: WriteContext) -> Self {
        let backend = write.uow.backend().clone();
        Self {
            products: ProductRepository::new(backend.clone()),
            inventory: InventoryRepository::new(backend),
            write,
        }
    }

    /// Locks `id`, applies `change` to it, and commits the result.
    async fn change_stock<F>(&self, id: EntityId, change: F) -> AppResult<(Inventory, Before)>
    where
        F: FnOnce(&mut Inventory) -> Result<(), InventoryError> + Send + 'static,
    {
        let repo = self.inventory.clone();
        self.write
            .uow
            .execute_with_deadline(self.write.deadline, move |ctx| {
                Box::pin(async move {
                    let mut record = locked(&repo, ctx, &id).await?;
                    let before = Before {
                        quantity: record.quantity(),
                        reserved: record.reserved_quantity(),
                    };
                    change(&mut record)?;
                    let version = repo.update(ctx, &record).await?;
                    record.stamp_version(version);
                    Ok::<_, AppError>((record, before))
                })
            })
            .await
    }

    async fn announce_stock(&self, record: &Inventory, change: StockChange, before: Before) {
        self.write
            .publish(
                DomainEvent::stock_level_changed(
                    record.id().clone(),
                    record.stock_level(change, before.quantity, before.reserved),
                ),
                record.version(),
            )
            .await;
    }
}

async fn locked(
    repo: &InventoryRepository,
    ctx: &mut TxContext,
    id: &EntityId,
) -> AppResult<Inventory> {
    repo.lock_in(ctx, id)
        .await?
        .ok_or_else(|| AppError::not_found("Inventory", id))
}

#[async_trait]
impl CommandHandler<CreateInventoryCommand> for InventoryCommandHandler {
    #[tracing::instrument(
        skip_all,
        fields(
            inventory_id = %command.id,
            product_id = %command.inventory.product_id,
            warehouse_id = %command.inventory.warehouse_id
        )
    )]
    async fn handle(&self, command: CreateInventoryCommand) -> AppResult<Inventory> {
        let products = self.products.clone();
        let inventory = self.inventory.clone();
        let record = self
            .write
            .uow
            .execute_with_deadline(self.write.deadline, move |ctx| {
                Box::pin(async move {
                    let mut record = Inventory::create(command.id, command.inventory)?;
                    let product_id = record.product_id().clone();
                    if products.find_in(ctx, &product_id).await?.is_none() {
                        return Err(InventoryError::UnknownProduct(product_id).into());
                    }
                    if inventory
                        .find_by_product_and_warehouse_in(ctx, &product_id, record.warehouse_id())
                        .await?
                        .is_some()
                    {
                        return Err(InventoryError::AlreadyExists {
                            product_id,
                            warehouse_id: record.warehouse_id().to_string(),
                        }
                        .into());
                    }
                    let version = inventory.insert(ctx, &record).await?;
                    record.stamp_version(version);
                    Ok::<_, AppError>(record)
                })
            })
            .await?;

        self.write
            .publish(
                DomainEvent::created(record.id().clone(), record.snapshot()),
                record.version(),
            )
            .await;
        tracing::info!(quantity = record.quantity(), "inventory created");
        Ok(record)
    }
}

#[async_trait]
impl CommandHandler<UpdateInventoryCommand> for InventoryCommandHandler {
    #[tracing::instrument(skip_all, fields(inventory_id = %command.id))]
    async fn handle(&self, command: UpdateInventoryCommand) -> AppResult<Inventory> {
        let inventory = self.inventory.clone();
        let record = self
            .write
            .uow
            .execute_with_deadline(self.write.deadline, move |ctx| {
                Box::pin(async move {
                    let UpdateInventoryCommand { id, update } = command;
                    let mut record = locked(&inventory, ctx, &id).await?;
                    if let Some(warehouse) = update.warehouse_id.as_deref().map(str::trim)
                        && warehouse != record.warehouse_id()
                        && inventory
                            .find_by_product_and_warehouse_in(ctx, record.product_id(), warehouse)
                            .await?
                            .is_some()
                    {
                        return Err(InventoryError::AlreadyExists {
                            product_id: record.product_id().clone(),
                            warehouse_id: warehouse.to_string(),
                        }
                        .into());
                    }
                    record.apply(update)?;
                    let version = inventory.update(ctx, &record).await?;
                    record.stamp_version(version);
                    Ok::<_, AppError>(record)
                })
            })
            .await?;

        self.write
            .publish(
                DomainEvent::updated(record.id().clone(), record.snapshot()),
                record.version(),
            )
            .await;
        tracing::info!("inventory updated");
        Ok(record)
    }
}

#[async_trait]
impl CommandHandler<AdjustInventoryCommand> for InventoryCommandHandler {
    #[tracing::instrument(
        skip_all,
        fields(
            inventory_id = %command.id,
            kind = ?command.adjustment.kind,
            quantity = command.adjustment.quantity
        )
    )]
    async fn handle(&self, command: AdjustInventoryCommand) -> AppResult<Inventory> {
        let adjustment = command.adjustment;
        let (record, before) = self
            .change_stock(command.id, move |record| record.adjust(adjustment))
            .await?;

        let change = match adjustment.kind {
            AdjustmentKind::Reserve => StockChange::Reserved,
            AdjustmentKind::Unreserve => StockChange::Released,
            AdjustmentKind::Add | AdjustmentKind::Subtract | AdjustmentKind::Set => {
                StockChange::Adjusted
            }
        };
        self.announce_stock(&record, change, before).await;
        tracing::info!(
            reason = command.reason.as_deref().unwrap_or(""),
            quantity = record.quantity(),
            "inventory adjusted"
        );
        Ok(record)
    }
}

#[async_trait]
impl CommandHandler<ReserveInventoryCommand> for InventoryCommandHandler {
    #[tracing::instrument(
        skip_all,
        fields(inventory_id = %command.id, quantity = command.quantity)
    )]
    async fn handle(&self, command: ReserveInventoryCommand) -> AppResult<Inventory> {
        let quantity = command.quantity;
        let (record, before) = self
            .change_stock(command.id, move |record| record.reserve(quantity))
            .await?;
        self.announce_stock(&record, StockChange::Reserved, before).await;
        tracing::info!(available = record.available_quantity(), "stock reserved");
        Ok(record)
    }
}

#[async_trait]
impl CommandHandler<ReleaseReservationCommand> for InventoryCommandHandler {
    #[tracing::instrument(
        skip_all,
        fields(inventory_id = %command.id, quantity = command.quantity)
    )]
    async fn handle(&self, command: ReleaseReservationCommand) -> AppResult<Inventory> {
        let quantity = command.quantity;
        let (record, before) = self
            .change_stock(command.id, move |record| record.release(quantity))
            .await?;
        self.announce_stock(&record, StockChange::Released, before).await;
        tracing::info!(available = record.available_quantity(), "reservation released");
        Ok(record)
    }
}

#[async_trait]
impl CommandHandler<DeleteInventoryCommand> for InventoryCommandHandler {
    #[tracing::instrument(skip_all, fields(inventory_id = %command.id))]
    async fn handle(&self, command: DeleteInventoryCommand) -> AppResult<()> {
        let inventory = self.inventory.clone();
        let id = command.id.clone();
        let (product_id, version): (EntityId, Version) = self
            .write
            .uow
            .execute_with_deadline(self.write.deadline, move |ctx| {
                Box::pin(async move {
                    let record = locked(&inventory, ctx, &command.id).await?;
                    record.ensure_deletable()?;
                    inventory.delete(ctx, &command.id).await?;
                    Ok::<_, AppError>((record.product_id().clone(), record.version().next()))
                })
            })
            .await?;

        self.write
            .publish(
                DomainEvent::deleted(id, DeletedEntity::Inventory { product_id }),
                version,
            )
            .await;
        tracing::info!("inventory deleted");
        Ok(())
    }
}
