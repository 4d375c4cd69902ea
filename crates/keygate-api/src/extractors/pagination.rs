//! Pagination query parameter extractor.

use serde::Deserialize;

use keygate_core::types::pagination::{DEFAULT_PAGE_SIZE, PageRequest};

/// `?page=&page_size=&keyword=` for list and search endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    /// Page number (1-based, default: 1).
    #[serde(default = "default_page")]
    pub page: u64,
    /// Items per page (default: 10, max: 100).
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Search keyword for the `/search` endpoints.
    #[serde(default)]
    pub keyword: String,
}

fn default_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl PaginationParams {
    /// Converts to a clamped `PageRequest`.
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}
