use common::{Currency, Money, SortDirection};
use serde::{Deserialize, Serialize};

use crate::ProductView;

/// Sort keys for read-model listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
    Price,
    TotalSold,
    TotalQuantity,
}

/// Filter over product projections.
///
/// Only active products are returned unless `is_active` is overridden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,

    /// Matches products carrying any of these tags.
    pub tags: Vec<String>,

    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub currency: Option<Currency>,

    /// Case-insensitive match against name, description, sku and tags.
    pub search: Option<String>,

    pub is_active: Option<bool>,
    pub is_low_stock: Option<bool>,

    pub sort_by: ReadSortKey,
    pub sort_order: SortDirection,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category: None,
            tags: Vec::new(),
            min_price: None,
            max_price: None,
            currency: None,
            search: None,
            is_active: Some(true),
            is_low_stock: None,
            sort_by: ReadSortKey::default(),
            sort_order: SortDirection::default(),
        }
    }
}

impl ProductFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Restricts to prices within `[min, max]`; either bound may be open.
    pub fn price_range(mut self, min: Option<Money>, max: Option<Money>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// `None` includes inactive products.
    pub fn active(mut self, active: Option<bool>) -> Self {
        self.is_active = active;
        self
    }

    pub fn low_stock(mut self, low: bool) -> Self {
        self.is_low_stock = Some(low);
        self
    }

    pub fn sort(mut self, key: ReadSortKey, direction: SortDirection) -> Self {
        self.sort_by = key;
        self.sort_order = direction;
        self
    }

    pub fn matches(&self, view: &ProductView) -> bool {
        self.category
            .as_ref()
            .is_none_or(|c| view.category.eq_ignore_ascii_case(c))
            && (self.tags.is_empty() || view.tags.iter().any(|t| self.tags.contains(t)))
            && self.min_price.is_none_or(|min| view.price >= min)
            && self.max_price.is_none_or(|max| view.price <= max)
            && self.currency.is_none_or(|c| view.currency == c)
            && self.is_active.is_none_or(|a| view.is_active == a)
            && self
                .is_low_stock
                .is_none_or(|low| view.inventory.is_low_stock == low)
            && self
                .search
                .as_deref()
                .is_none_or(|needle| text_matches(view, needle))
    }

    pub fn compare(&self, a: &ProductView, b: &ProductView) -> std::cmp::Ordering {
        let ordering = match self.sort_by {
            ReadSortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            ReadSortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            ReadSortKey::Name => a.name.cmp(&b.name),
            ReadSortKey::Price => a.price.cmp(&b.price),
            ReadSortKey::TotalSold => a.sales_stats.total_sold.cmp(&b.sales_stats.total_sold),
            ReadSortKey::TotalQuantity => {
                a.inventory.total_quantity.cmp(&b.inventory.total_quantity)
            }
        };
        self.sort_order.apply(ordering.then_with(|| a.id.cmp(&b.id)))
    }
}

fn text_matches(view: &ProductView, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    let hit = |s: &str| s.to_lowercase().contains(&needle);
    hit(&view.name)
        || hit(&view.sku)
        || view.description.as_deref().is_some_and(hit)
        || view.tags.iter().any(|t| hit(t))
}
