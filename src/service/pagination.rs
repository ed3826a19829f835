use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;

/// Paging parameters as sent by clients; both are optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    /// Page number, at least 1
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, between 1 and `MAX_LIMIT`
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
}

impl<T> Page<T> {
    /// Cut one page out of an already filtered and ordered list
    pub fn paginate(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len();
        let limit = request.limit();
        let data = items
            .into_iter()
            .skip(request.offset())
            .take(limit)
            .collect();

        Self {
            data,
            total,
            page: request.page(),
            total_pages: total.div_ceil(limit),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            total_pages: self.total_pages,
        }
    }
}

/// Case-insensitive substring match used by the list endpoints
pub fn matches_search(value: Option<&str>, search: Option<&str>) -> bool {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        None => true,
        Some(needle) => value
            .map(|v| v.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_bounds() {
        let request = PageRequest::default();
        assert_eq!((request.page(), request.limit()), (1, DEFAULT_LIMIT));

        let request = PageRequest::new(0, 500);
        assert_eq!((request.page(), request.limit()), (1, MAX_LIMIT));
    }

    #[test]
    fn test_paginate_last_partial_page() {
        let page = Page::paginate((1..=45).collect::<Vec<_>>(), PageRequest::new(3, 20));
        assert_eq!(page.data, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total, 45);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_paginate_empty() {
        let page = Page::paginate(Vec::<u8>::new(), PageRequest::default());
        assert!(page.data.is_empty());
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_page_far_past_the_end() {
        let page = Page::paginate(vec![1, 2, 3], PageRequest::new(usize::MAX, 20));
        assert!(page.data.is_empty());
        assert_eq!((page.total, page.total_pages, page.page), (3, 1, usize::MAX));
    }

    #[test]
    fn test_search() {
        assert!(matches_search(Some("Jakarta"), None));
        assert!(matches_search(Some("Jakarta"), Some("  ")));
        assert!(matches_search(Some("Jakarta"), Some("KART")));
        assert!(!matches_search(Some("Bandung"), Some("kart")));
        assert!(!matches_search(None, Some("kart")));
    }
}
