//! Grid query and pagination types
//!
//! The admin DataGrid and the public listings share the same query shape:
//! `?page=&per_page=&search=&sort=&order=`. Entity-specific filters are
//! separate query structs deserialized from the same query string.

use serde::{Deserialize, Serialize};

/// Default page size for admin grids
pub const ADMIN_PER_PAGE: u32 = 20;

/// Default page size for public listings
pub const PUBLIC_PER_PAGE: u32 = 10;

/// Hard upper bound for any page size
pub const MAX_PER_PAGE: u32 = 100;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Query string accepted by every list endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GridQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<SortDirection>,
}

impl GridQuery {
    /// Pagination with the given default page size
    pub fn params(&self, default_per_page: u32) -> ListParams {
        ListParams::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(default_per_page),
        )
    }

    /// Trimmed search term, `None` when empty
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Build an `ORDER BY` body from a whitelist of `(key, column)` pairs.
    ///
    /// Unknown sort keys fall back to `default_column`. The row id is always
    /// appended as a tiebreaker so pages never overlap.
    pub fn order_by(&self, allowed: &[(&str, &str)], default_column: &str, id_column: &str) -> String {
        let column = self
            .sort
            .as_deref()
            .and_then(|key| allowed.iter().find(|(k, _)| *k == key))
            .map(|(_, column)| *column)
            .unwrap_or(default_column);
        let direction = self.order.unwrap_or_default().as_sql();
        format!("{} {}, {} {}", column, direction, id_column, direction)
    }
}

/// Locale and category filters of the public listings.
///
/// `category` is a category slug; an unknown slug matches nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicFilter {
    pub locale: Option<String>,
    pub category: Option<String>,
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: PUBLIC_PER_PAGE,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    /// Limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of matching rows across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        let per_page = params.per_page.max(1) as i64;
        let total_pages = ((total.max(0) + per_page - 1) / per_page) as u32;
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
            total_pages,
            has_next: params.page < total_pages,
            has_prev: params.page > 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Convert the items while keeping the pagination metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}
