//! Shared Data Transfer Objects (DTOs) for API handlers.
//!
//! Paging is 1-based. Services return full, already-scoped lists and the
//! handlers cut the requested page out with [`paginate`].

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::services::directory_service::ListFilter;

/// Largest page size accepted over HTTP
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination metadata for list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
    /// Total number of items across all pages
    pub total: i64,
    /// Total number of pages
    pub total_pages: u32,
}

impl Pagination {
    /// Page metadata for `total` items; `page` and `per_page` are clamped to 1.
    pub fn new(page: u32, per_page: u32, total: i64) -> Self {
        let per_page = per_page.max(1);
        let total_pages = if total <= 0 {
            0
        } else {
            ((total + per_page as i64 - 1) / per_page as i64) as u32
        };
        Self {
            page: page.max(1),
            per_page,
            total: total.max(0),
            total_pages,
        }
    }

    /// Number of items before this page
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

/// One page of a list
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

impl<T> Page<T> {
    /// Wrap a page that was already cut by the store
    pub fn from_parts(items: Vec<T>, pagination: Pagination) -> Self {
        Self { items, pagination }
    }
}

/// Cut page `page` of size `page_size` out of `items`.
///
/// Pages beyond the last one are empty.
pub fn paginate<T>(items: Vec<T>, page: u32, page_size: u32) -> Page<T> {
    let pagination = Pagination::new(page, page_size, items.len() as i64);
    let items = items
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.per_page as usize)
        .collect();
    Page { items, pagination }
}

/// Query parameters for paginated list requests.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// Requested page number (default: 1)
    pub page: Option<u32>,
    /// Requested items per page (default: configured page size, at most 100)
    pub per_page: Option<u32>,
}

impl PaginationQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self, default: u32) -> u32 {
        self.per_page.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
    }
}

/// Paging plus search for directory and catalog lists
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Case-insensitive substring filter
    pub search: Option<String>,
    /// Include soft-deleted rows; needs Full reading authority
    #[serde(default)]
    pub include_deleted: bool,
}

impl ListQuery {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn filter(&self) -> ListFilter {
        ListFilter {
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
            include_deleted: self.include_deleted,
        }
    }
}
