//! Pagination primitives
//!
//! HTTP lists are 1-based `page` / `per_page`; repositories take
//! `limit` / `offset`. [`PageRequest`] converts between the two and
//! [`Page`] carries the slice together with the unpaginated total.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// A normalized page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// Builds a request, defaulting missing values and capping `per_page`
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let per_page = per_page
            .filter(|p| *p > 0)
            .unwrap_or(DEFAULT_PER_PAGE)
            .min(MAX_PER_PAGE);
        Self { page, per_page }
    }

    pub fn limit(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        Self {
            items,
            total_count,
            page: request.page,
            per_page: request.per_page,
        }
    }

    /// Last 1-based page number; an empty result still has page 1
    pub fn last_page(&self) -> u32 {
        let per_page = u64::from(self.per_page.max(1));
        let pages = self.total_count.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_more(&self) -> bool {
        self.page < self.last_page()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_cap() {
        assert_eq!(PageRequest::new(None, None), PageRequest { page: 1, per_page: 20 });
        assert_eq!(PageRequest::new(Some(0), Some(500)).per_page, MAX_PER_PAGE);
        assert_eq!(PageRequest::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn test_last_page_of_empty_result() {
        let page: Page<u8> = Page::new(vec![], 0, PageRequest::default());
        assert_eq!(page.last_page(), 1);
        assert!(!page.has_more());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn has_more_iff_before_last_page(
            total in 0u64..10_000,
            page in 1u32..200,
            per_page in 1u32..150
        ) {
            let request = PageRequest::new(Some(page), Some(per_page));
            let p: Page<()> = Page::new(vec![], total, request);
            prop_assert_eq!(p.has_more(), p.page < p.last_page());
            prop_assert!(request.per_page <= MAX_PER_PAGE);
        }
    }
}
