use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Currency, EntityId, Money, Version};
use events::{ProductChanges, ProductSnapshot};
use serde::{Deserialize, Serialize};

use super::{
    CATEGORY_LEN, NAME_LEN, ProductError, SKU_LEN, check_description, check_len, check_tags,
};

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub sku: String,
    pub price: Money,
    #[serde(default)]
    pub currency: Currency,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), ProductError> {
        check_len(&self.name, NAME_LEN, ProductError::InvalidName)?;
        check_description(self.description.as_deref())?;
        check_len(&self.sku, SKU_LEN, ProductError::InvalidSku)?;
        if !self.price.is_positive() {
            return Err(ProductError::InvalidPrice {
                cents: self.price.cents(),
            });
        }
        check_len(&self.category, CATEGORY_LEN, ProductError::InvalidCategory)?;
        check_tags(&self.tags)
    }
}

/// Partial update of a product. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sku: Option<String>,
    pub price: Option<Money>,
    pub currency: Option<Currency>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub specifications: Option<BTreeMap<String, String>>,
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        *self == ProductUpdate::default()
    }

    pub fn validate(&self) -> Result<(), ProductError> {
        if self.is_empty() {
            return Err(ProductError::EmptyUpdate);
        }
        if let Some(name) = &self.name {
            check_len(name, NAME_LEN, ProductError::InvalidName)?;
        }
        check_description(self.description.as_deref())?;
        if let Some(sku) = &self.sku {
            check_len(sku, SKU_LEN, ProductError::InvalidSku)?;
        }
        if let Some(price) = self.price
            && !price.is_positive()
        {
            return Err(ProductError::InvalidPrice {
                cents: price.cents(),
            });
        }
        if let Some(category) = &self.category {
            check_len(category, CATEGORY_LEN, ProductError::InvalidCategory)?;
        }
        match &self.tags {
            Some(tags) => check_tags(tags),
            None => Ok(()),
        }
    }
}

/// A catalogue product as stored in the write model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: EntityId,
    /// Write-store version; filled in from the record, not stored in the body.
    #[serde(skip)]
    pub version: Version,
    pub name: String,
    pub description: Option<String>,
    pub sku: String,
    pub price: Money,
    pub currency: Currency,
    pub category: String,
    pub tags: Vec<String>,
    pub specifications: BTreeMap<String, String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates an active product after validating `input`.
    pub fn create(id: EntityId, input: NewProduct) -> Result<Self, ProductError> {
        input.validate()?;
        let now = Utc::now();
        Ok(Self {
            id,
            version: Version::initial(),
            name: input.name.trim().to_string(),
            description: input.description,
            sku: input.sku.trim().to_string(),
            price: input.price,
            currency: input.currency,
            category: input.category.trim().to_string(),
            tags: input.tags,
            specifications: input.specifications,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies `update` and returns the fields that actually changed.
    pub fn apply(&mut self, update: ProductUpdate) -> Result<ProductChanges, ProductError> {
        update.validate()?;
        let now = Utc::now();
        let mut changes = ProductChanges {
            updated_at: now,
            ..Default::default()
        };

        if let Some(name) = update.name.map(|n| n.trim().to_string())
            && name != self.name
        {
            self.name.clone_from(&name);
            changes.name = Some(name);
        }
        if let Some(description) = update.description
            && self.description.as_ref() != Some(&description)
        {
            self.description = Some(description.clone());
            changes.description = Some(description);
        }
        if let Some(sku) = update.sku.map(|s| s.trim().to_string())
            && sku != self.sku
        {
            self.sku.clone_from(&sku);
            changes.sku = Some(sku);
        }
        if let Some(price) = update.price
            && price != self.price
        {
            self.price = price;
            changes.price = Some(price);
        }
        if let Some(currency) = update.currency
            && currency != self.currency
        {
            self.currency = currency;
            changes.currency = Some(currency);
        }
        if let Some(category) = update.category.map(|c| c.trim().to_string())
            && category != self.category
        {
            self.category.clone_from(&category);
            changes.category = Some(category);
        }
        if let Some(tags) = update.tags
            && tags != self.tags
        {
            self.tags.clone_from(&tags);
            changes.tags = Some(tags);
        }
        if let Some(specifications) = update.specifications
            && specifications != self.specifications
        {
            self.specifications.clone_from(&specifications);
            changes.specifications = Some(specifications);
        }
        if let Some(is_active) = update.is_active
            && is_active != self.is_active
        {
            self.is_active = is_active;
            changes.is_active = Some(is_active);
        }

        self.updated_at = now;
        Ok(changes)
    }

    /// Event payload describing the full product.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            sku: self.sku.clone(),
            price: self.price,
            currency: self.currency,
            category: self.category.clone(),
            tags: self.tags.clone(),
            specifications: self.specifications.clone(),
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Case-insensitive match against name, description, sku and tags.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.sku.to_lowercase().contains(&needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle))
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> NewProduct {
        NewProduct {
            name: "Widget".into(),
            description: Some("A useful widget".into()),
            sku: "WID-001".into(),
            price: Money::from_cents(1999),
            currency: Currency::Usd,
            category: "Tools".into(),
            tags: vec!["metal".into()],
            specifications: BTreeMap::new(),
        }
    }

    #[test]
    fn create_trims_and_activates() {
        let mut input = widget();
        input.name = "  Widget  ".into();
        let product = Product::create(EntityId::new("P1"), input).unwrap();
        assert_eq!(product.name, "Widget");
        assert!(product.is_active);
        assert_eq!(product.version, Version::initial());
    }

    #[test]
    fn create_rejects_invalid_fields() {
        let cases: [(fn(&mut NewProduct), ProductError); 6] = [
            (|p| p.name = "W".into(), ProductError::InvalidName),
            (|p| p.sku = "AB".into(), ProductError::InvalidSku),
            (
                |p| p.price = Money::zero(),
                ProductError::InvalidPrice { cents: 0 },
            ),
            (|p| p.category = "x".into(), ProductError::InvalidCategory),
            (
                |p| p.description = Some("d".repeat(1001)),
                ProductError::DescriptionTooLong,
            ),
            (
                |p| p.tags = (0..11).map(|i| i.to_string()).collect(),
                ProductError::TooManyTags { count: 11 },
            ),
        ];
        for (mutate, expected) in cases {
            let mut input = widget();
            mutate(&mut input);
            assert_eq!(Product::create(EntityId::generate(), input), Err(expected));
        }
    }

    #[test]
    fn apply_reports_only_changed_fields() {
        let mut product = Product::create(EntityId::new("P1"), widget()).unwrap();
        let changes = product
            .apply(ProductUpdate {
                name: Some("Widget".into()),
                price: Some(Money::from_cents(2500)),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(changes.name, None);
        assert_eq!(changes.price, Some(Money::from_cents(2500)));
        assert_eq!(product.price, Money::from_cents(2500));
    }

    #[test]
    fn empty_update_is_rejected() {
        let mut product = Product::create(EntityId::new("P1"), widget()).unwrap();
        assert_eq!(
            product.apply(ProductUpdate::default()),
            Err(ProductError::EmptyUpdate)
        );
    }

    #[test]
    fn text_search_covers_tags() {
        let product = Product::create(EntityId::new("P1"), widget()).unwrap();
        assert!(product.matches_text("METAL"));
        assert!(product.matches_text("wid-0"));
        assert!(!product.matches_text("plastic"));
    }

    #[test]
    fn version_is_not_part_of_the_stored_body() {
        let mut product = Product::create(EntityId::new("P1"), widget()).unwrap();
        product.version = Version::new(7);
        let body = serde_json::to_value(&product).unwrap();
        assert!(body.get("version").is_none());
        assert_eq!(body["sku"], "WID-001");
    }
}
