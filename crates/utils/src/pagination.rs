//! Page slicing over an in-memory list, as used by listing endpoints.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const DEFAULT_PER_PAGE: usize = 12;
pub const MAX_PER_PAGE: usize = 100;

/// Query parameters for a paginated listing (1-based page)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    /// Page number with 0 treated as the first page
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    pub fn per_page(&self) -> usize {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }
}

/// One page of items plus the metadata a client needs to render paging controls
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Slice `items` into the requested page. Pages past the end are empty.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let page = request.page();
    let per_page = request.per_page();
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page);
    let start = (page - 1).saturating_mul(per_page);

    let items: Vec<T> = items.into_iter().skip(start).take(per_page).collect();

    Page {
        items,
        page,
        per_page,
        total_items,
        total_pages,
        has_next: page < total_pages,
        has_previous: page > 1 && total_pages > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page() {
        let page = paginate((1..=25).collect::<Vec<_>>(), PageRequest::new(1, 10));
        assert_eq!(page.items, (1..=10).collect::<Vec<_>>());
        assert_eq!(page.total_items, 25);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_last_partial_page() {
        let page = paginate((1..=25).collect::<Vec<_>>(), PageRequest::new(3, 10));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let page = paginate(vec![1, 2, 3], PageRequest::new(5, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next);
    }

    #[test]
    fn test_clamps_page_and_per_page() {
        let page = paginate((1..=500).collect::<Vec<_>>(), PageRequest::new(0, 1000));
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, MAX_PER_PAGE);
        assert_eq!(page.items.len(), MAX_PER_PAGE);

        let page = paginate(vec![1, 2], PageRequest::new(1, 0));
        assert_eq!(page.per_page, 1);
        assert_eq!(page.items, vec![1]);
    }

    #[test]
    fn test_empty_list() {
        let page = paginate(Vec::<i32>::new(), PageRequest::default());
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }
}
