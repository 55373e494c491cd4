//! Pagination envelope shared by every list endpoint.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Query parameters accepted by list endpoints.
///
/// Pages are 1-based. Out-of-range values are clamped rather than rejected.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> u32 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    /// Number of rows to fetch: one extra to detect a following page.
    pub fn fetch_limit(&self) -> u32 {
        self.per_page() + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub next_page_available: bool,
}

impl<T> Paginated<T> {
    /// Build an envelope from rows fetched with [`PageParams::fetch_limit`].
    pub fn from_overfetch(mut rows: Vec<T>, params: &PageParams) -> Self {
        let per_page = params.per_page();
        let next_page_available = rows.len() > per_page as usize;
        rows.truncate(per_page as usize);
        Self {
            data: rows,
            page: params.page(),
            per_page,
            next_page_available,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            next_page_available: self.next_page_available,
        }
    }
}
