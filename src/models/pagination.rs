//! Page arithmetic shared by every paginated listing

use serde::Serialize;
use utoipa::ToSchema;

/// A resolved page request (1-based page, positive limit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Apply defaults; values are range-checked by the query validators beforehand.
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).max(1),
        }
    }

    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Pagination block returned alongside a page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub limit: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total: i64) -> Self {
        let total_pages = (total + request.limit - 1) / request.limit;
        Self {
            current_page: request.page,
            total_pages,
            total,
            limit: request.limit,
            has_next: request.page < total_pages,
            has_prev: request.page > 1,
        }
    }
}
