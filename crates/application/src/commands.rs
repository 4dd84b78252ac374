//! Write-side messages. Each one validates itself before dispatch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::EntityId;
use domain::{Adjustment, InventoryError, InventoryUpdate, NewInventory, NewProduct, ProductUpdate};
use serde::{Deserialize, Serialize};

use crate::ValidationError;
use crate::mediator::Validate;

fn require_id(field: &'static str, id: &EntityId) -> Result<(), ValidationError> {
    if id.is_blank() {
        return Err(ValidationError::field(field, "must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductCommand {
    pub id: EntityId,
    #[serde(flatten)]
    pub product: NewProduct,
}

impl CreateProductCommand {
    /// A command for a product with a freshly generated id.
    pub fn new(product: NewProduct) -> Self {
        Self::with_id(EntityId::generate(), product)
    }

    pub fn with_id(id: impl Into<EntityId>, product: NewProduct) -> Self {
        Self {
            id: id.into(),
            product,
        }
    }
}

#[async_trait]
impl Validate for CreateProductCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id("id", &self.id)?;
        Ok(self.product.validate()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProductCommand {
    pub id: EntityId,
    #[serde(flatten)]
    pub update: ProductUpdate,
}

#[async_trait]
impl Validate for UpdateProductCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id("id", &self.id)?;
        Ok(self.update.validate()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteProductCommand {
    pub id: EntityId,
}

#[async_trait]
impl Validate for DeleteProductCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id("id", &self.id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInventoryCommand {
    pub id: EntityId,
    #[serde(flatten)]
    pub inventory: NewInventory,
}

impl CreateInventoryCommand {
    pub fn new(inventory: NewInventory) -> Self {
        Self::with_id(EntityId::generate(), inventory)
    }

    pub fn with_id(id: impl Into<EntityId>, inventory: NewInventory) -> Self {
        Self {
            id: id.into(),
            inventory,
        }
    }
}

#[async_trait]
impl Validate for CreateInventoryCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id("id", &self.id)?;
        require_id("product_id", &self.inventory.product_id)?;
        Ok(self.inventory.validate()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateInventoryCommand {
    pub id: EntityId,
    #[serde(flatten)]
    pub update: InventoryUpdate,
}

#[async_trait]
impl Validate for UpdateInventoryCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id("id", &self.id)?;
        Ok(self.update.validate()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustInventoryCommand {
    pub id: EntityId,
    #[serde(flatten)]
    pub adjustment: Adjustment,
    #[serde(default)]
    pub reason: Option<String>,
}

#[async_trait]
impl Validate for AdjustInventoryCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id("id", &self.id)?;
        Ok(self.adjustment.validate()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveInventoryCommand {
    pub id: EntityId,
    pub quantity: u32,
}

impl ReserveInventoryCommand {
    pub fn new(id: impl Into<EntityId>, quantity: u32) -> Self {
        Self {
            id: id.into(),
            quantity,
        }
    }
}

#[async_trait]
impl Validate for ReserveInventoryCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id("id", &self.id)?;
        if self.quantity == 0 {
            return Err(InventoryError::NonPositiveQuantity.into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReservationCommand {
    pub id: EntityId,
    pub quantity: u32,
}

#[async_trait]
impl Validate for ReleaseReservationCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id("id", &self.id)?;
        if self.quantity == 0 {
            return Err(InventoryError::NonPositiveQuantity.into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteInventoryCommand {
    pub id: EntityId,
}

#[async_trait]
impl Validate for DeleteInventoryCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        require_id("id", &self.id)
    }
}

/// A token to revoke and the moment it would have expired on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedToken {
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Revokes the access token of a session, and its refresh token if given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutCommand {
    pub user_id: String,
    pub access_token: RevokedToken,
    #[serde(default)]
    pub refresh_token: Option<RevokedToken>,
}

impl LogoutCommand {
    pub fn tokens(&self) -> impl Iterator<Item = &RevokedToken> {
        std::iter::once(&self.access_token).chain(self.refresh_token.as_ref())
    }
}

#[async_trait]
impl Validate for LogoutCommand {
    async fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::field("user_id", "must not be empty"));
        }
        if self.tokens().any(|t| t.token_id.trim().is_empty()) {
            return Err(ValidationError::field("token_id", "must not be empty"));
        }
        Ok(())
    }
}
