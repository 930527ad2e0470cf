use dify_api::knowledge::PaginatedResponse;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;

/// One-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Page numbers below 1 and a zero limit are raised to 1.
    #[must_use]
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    #[must_use]
    pub fn first(limit: u32) -> Self {
        Self::new(DEFAULT_PAGE, limit)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self::new(self.page.saturating_add(1), self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_LIMIT)
    }
}

/// One page of a remote collection.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub has_more: bool,
    pub page: u32,
    pub limit: u32,
}

impl<T> PageResult<T> {
    /// Build from the service envelope, falling back to the requested window
    /// when the service omits `page` or `limit`.
    pub fn from_response(response: PaginatedResponse<T>, request: PageRequest) -> Self {
        Self {
            data: response.data,
            total: response.total,
            has_more: response.has_more,
            page: if response.page == 0 { request.page } else { response.page },
            limit: if response.limit == 0 { request.limit } else { response.limit },
        }
    }

    #[must_use]
    pub fn total_pages(&self) -> u64 {
        total_pages(self.total, self.limit)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// `ceil(total / limit)`, never less than 1.
#[must_use]
pub fn total_pages(total: u64, limit: u32) -> u64 {
    if limit == 0 {
        return 1;
    }
    total.div_ceil(u64::from(limit)).max(1)
}
