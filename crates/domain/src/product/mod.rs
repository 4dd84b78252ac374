//! Product catalogue entity and its write-store repository.

mod entity;
mod repository;

pub use entity::{NewProduct, Product, ProductUpdate};
pub use repository::{ProductQuery, ProductRepository, ProductSortKey};

use thiserror::Error;

pub const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=100;
pub const SKU_LEN: std::ops::RangeInclusive<usize> = 3..=50;
pub const CATEGORY_LEN: std::ops::RangeInclusive<usize> = 2..=50;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 30;

/// Business rule violations for products.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("Product name must be between 2 and 100 characters")]
    InvalidName,

    #[error("Product description cannot exceed 1000 characters")]
    DescriptionTooLong,

    #[error("SKU must be between 3 and 50 characters")]
    InvalidSku,

    #[error("Price must be positive (got {cents} cents)")]
    InvalidPrice { cents: i64 },

    #[error("Category must be between 2 and 50 characters")]
    InvalidCategory,

    #[error("A product can have at most 10 tags (got {count})")]
    TooManyTags { count: usize },

    #[error("Tag '{tag}' exceeds 30 characters")]
    TagTooLong { tag: String },

    #[error("Product with SKU '{sku}' already exists")]
    DuplicateSku { sku: String },

    #[error("Update contains no changes")]
    EmptyUpdate,

    #[error("Cannot delete product with {count} inventory record(s); remove inventory first")]
    HasInventory { count: usize },
}

pub(crate) fn check_len(
    value: &str,
    range: std::ops::RangeInclusive<usize>,
    error: ProductError,
) -> Result<(), ProductError> {
    if range.contains(&value.trim().chars().count()) {
        Ok(())
    } else {
        Err(error)
    }
}

pub(crate) fn check_tags(tags: &[String]) -> Result<(), ProductError> {
    if tags.len() > MAX_TAGS {
        return Err(ProductError::TooManyTags { count: tags.len() });
    }
    match tags.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
        Some(tag) => Err(ProductError::TagTooLong { tag: tag.clone() }),
        None => Ok(()),
    }
}

pub(crate) fn check_description(description: Option<&str>) -> Result<(), ProductError> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(ProductError::DescriptionTooLong),
        _ => Ok(()),
    }
}
