use serde::{Deserialize, Serialize};

pub const MAX_LIMIT: u32 = 100;

/// 1-based page window, always within bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamp client input: page >= 1, limit in 1..=MAX_LIMIT
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// Query-string form shared by every list endpoint
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn resolve(&self, default_limit: u32) -> PageRequest {
        PageRequest::new(self.page, self.limit, default_limit)
    }
}

/// One page of results plus the total match count
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub request: PageRequest,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            request,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            request: self.request,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.request, self.items.len() as u64, self.total)
    }

    /// Apply a page window to an already-sorted in-memory result set
    pub fn slice(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(request.limit as usize)
            .collect();
        Self::new(items, total, request)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current: u32,
    pub pages: u32,
    pub count: u64,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
    pub next: Option<u32>,
    pub prev: Option<u32>,
}

impl Pagination {
    pub fn new(request: PageRequest, count: u64, total: u64) -> Self {
        let pages = u32::try_from(total.div_ceil(u64::from(request.limit))).unwrap_or(u32::MAX);
        let has_next = request.page < pages;
        let has_prev = request.page > 1;
        Self {
            current: request.page,
            pages,
            count,
            total,
            has_next,
            has_prev,
            next: has_next.then(|| request.page + 1),
            prev: has_prev.then(|| request.page - 1),
        }
    }
}
