use async_trait::async_trait;
use domain::{InventoryRepository, Product, ProductError, ProductRepository};
use events::{DeletedEntity, DomainEvent, ProductRevision};

use super::WriteContext;
use crate::commands::{CreateProductCommand, DeleteProductCommand, UpdateProductCommand};
use crate::mediator::CommandHandler;
use crate::{AppError, AppResult};

/// Product create, update, and delete.
pub struct ProductCommandHandler {
    write: WriteContext,
    products: ProductRepository,
    inventory: InventoryRepository,
}

impl ProductCommandHandler {
    pub fn new(write: WriteContext) -> Self {
        let backend = write.uow.backend().clone();
        Self {
            products: ProductRepository::new(backend.clone()),
            inventory: InventoryRepository::new(backend),
            write,
        }
    }
}

#[async_trait]
impl CommandHandler<CreateProductCommand> for ProductCommandHandler {
    #[tracing::instrument(skip_all, fields(product_id = %command.id, sku = %command.product.sku))]
    async fn handle(&self, command: CreateProductCommand) -> AppResult<Product> {
        let products = self.products.clone();
        let product = self
            .write
            .uow
            .execute_with_deadline(self.write.deadline, move |ctx| {
                Box::pin(async move {
                    let mut product = Product::create(command.id, command.product)?;
                    if products.find_by_sku_in(ctx, &product.sku).await?.is_some() {
                        return Err(ProductError::DuplicateSku { sku: product.sku }.into());
                    }
                    product.version = products.insert(ctx, &product).await?;
                    Ok::<_, AppError>(product)
                })
            })
            .await?;

        self.write
            .publish(
                DomainEvent::created(product.id.clone(), product.snapshot()),
                product.version,
            )
            .await;
        tracing::info!("product created");
        Ok(product)
    }
}

#[async_trait]
impl CommandHandler<UpdateProductCommand> for ProductCommandHandler {
    #[tracing::instrument(skip_all, fields(product_id = %command.id))]
    async fn handle(&self, command: UpdateProductCommand) -> AppResult<Product> {
        let products = self.products.clone();
        let (product, changes) = self
            .write
            .uow
            .execute_with_deadline(self.write.deadline, move |ctx| {
                Box::pin(async move {
                    let UpdateProductCommand { id, update } = command;
                    let mut product = products
                        .find_in(ctx, &id)
                        .await?
                        .ok_or_else(|| AppError::not_found("Product", &id))?;
                    if let Some(sku) = update.sku.as_deref().map(str::trim)
                        && sku != product.sku
                        && products.find_by_sku_in(ctx, sku).await?.is_some()
                    {
                        return Err(ProductError::DuplicateSku { sku: sku.to_string() }.into());
                    }
                    let changes = product.apply(update)?;
                    product.version = products.update(ctx, &product).await?;
                    Ok::<_, AppError>((product, changes))
                })
            })
            .await?;

        self.write
            .publish(
                DomainEvent::updated(
                    product.id.clone(),
                    ProductRevision {
                        changes,
                        snapshot: product.snapshot(),
                    },
                ),
                product.version,
            )
            .await;
        tracing::info!(version = %product.version, "product updated");
        Ok(product)
    }
}

#[async_trait]
impl CommandHandler<DeleteProductCommand> for ProductCommandHandler {
    #[tracing::instrument(skip_all, fields(product_id = %command.id))]
    async fn handle(&self, command: DeleteProductCommand) -> AppResult<()> {
        let products = self.products.clone();
        let inventory = self.inventory.clone();
        let id = command.id.clone();
        let version = self
            .write
            .uow
            .execute_with_deadline(self.write.deadline, move |ctx| {
                Box::pin(async move {
                    let product = products
                        .find_in(ctx, &command.id)
                        .await?
                        .ok_or_else(|| AppError::not_found("Product", &command.id))?;
                    let stock = inventory.find_by_product_in(ctx, &command.id).await?;
                    if !stock.is_empty() {
                        return Err(ProductError::HasInventory { count: stock.len() }.into());
                    }
                    products.delete(ctx, &command.id).await?;
                    Ok::<_, AppError>(product.version.next())
                })
            })
            .await?;

        self.write
            .publish(DomainEvent::deleted(id, DeletedEntity::Product), version)
            .await;
        tracing::info!("product deleted");
        Ok(())
    }
}
