//! Offset pagination for list endpoints.

use serde::{Deserialize, Serialize};

/// Requested page of a listing.
///
/// Deserialized from the query string; out-of-range values are clamped rather
/// than rejected so that hand-edited URLs still work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "PageRequest::default_page")]
    page: u32,
    #[serde(default = "PageRequest::default_per_page")]
    per_page: u32,
}

impl PageRequest {
    /// Items per page when the client does not ask.
    pub const DEFAULT_PER_PAGE: u32 = 20;

    /// Upper bound on items per page.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Create a page request, clamping both values into range.
    #[must_use]
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    const fn default_page() -> u32 {
        1
    }

    const fn default_per_page() -> u32 {
        Self::DEFAULT_PER_PAGE
    }

    /// One-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// Items per page.
    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page.clamp(1, Self::MAX_PER_PAGE)
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * self.limit()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PER_PAGE)
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Assemble a page from a query result and its `COUNT(*)`.
    #[must_use]
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        let per_page = request.per_page();
        let total_pages = u32::try_from(total.max(0))
            .unwrap_or(u32::MAX)
            .div_ceil(per_page);

        Self {
            items,
            total,
            page: request.page(),
            per_page,
            total_pages,
        }
    }

    /// Transform the items while keeping the paging metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_query() {
        let req: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.page(), 1);
        assert_eq!(req.per_page(), PageRequest::DEFAULT_PER_PAGE);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_clamps_out_of_range() {
        let req = PageRequest::new(0, 10_000);
        assert_eq!(req.page(), 1);
        assert_eq!(req.per_page(), PageRequest::MAX_PER_PAGE);

        // Deserialized values bypass `new`, so accessors clamp too.
        let req: PageRequest = serde_json::from_str(r#"{"page":0,"per_page":0}"#).unwrap();
        assert_eq!(req.page(), 1);
        assert_eq!(req.per_page(), 1);
    }

    #[test]
    fn test_offset() {
        let req = PageRequest::new(3, 25);
        assert_eq!(req.limit(), 25);
        assert_eq!(req.offset(), 50);
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = Page::new(vec![1, 2], 41, PageRequest::new(1, 20));
        assert_eq!(page.total_pages, 3);

        let empty: Page<i32> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = Page::new(vec![1, 2], 2, PageRequest::default()).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 2);
    }
}
