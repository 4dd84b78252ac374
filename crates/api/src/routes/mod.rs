//! Route handlers. Each one translates HTTP input into a command or query
//! and hands it to the mediator.

pub mod auth;
pub mod fast;
pub mod health;
pub mod inventory;
pub mod metrics;
pub mod products;

use common::PageRequest;
use serde::Deserialize;

/// `?page=&limit=` parameters shared by every listing.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageParams {
    pub fn request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.limit.unwrap_or(defaults.limit),
        )
    }
}

/// Splits a comma-separated query parameter, dropping empty entries.
pub(crate) fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
