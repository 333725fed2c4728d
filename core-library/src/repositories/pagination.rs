//! Offset pagination for listing queries such as the orphan review list.

use serde::{Deserialize, Serialize};

/// Zero-based page of `page_size` items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// ```
    /// use core_library::repositories::PageRequest;
    ///
    /// let request = PageRequest::new(2, 25);
    /// assert_eq!(request.offset(), 50);
    /// assert_eq!(request.limit(), 25);
    /// ```
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// SQL `OFFSET`; widened so large page numbers cannot overflow.
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.page_size)
    }

    /// SQL `LIMIT`
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, 50)
    }
}

/// One page of results plus the size of the whole result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        }
    }

    /// Whether rows remain beyond this page
    pub fn has_next(&self) -> bool {
        let seen = (u64::from(self.page) + 1) * u64::from(self.page_size);
        self.page_size > 0 && seen < self.total
    }

    /// Convert the items, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request() {
        let request = PageRequest::default();
        assert_eq!(request.offset(), 0);
        assert_eq!(request.limit(), 50);
    }

    #[test]
    fn test_offset_does_not_overflow() {
        let request = PageRequest::new(u32::MAX, u32::MAX);
        assert_eq!(request.offset(), i64::from(u32::MAX) * i64::from(u32::MAX));
    }

    #[test]
    fn test_has_next() {
        assert!(Page::new(vec![1; 10], 25, PageRequest::new(1, 10)).has_next());
        assert!(!Page::new(vec![1; 5], 25, PageRequest::new(2, 10)).has_next());
        assert!(!Page::new(vec![1; 10], 20, PageRequest::new(1, 10)).has_next());
        assert!(!Page::<i32>::new(vec![], 25, PageRequest::new(0, 0)).has_next());
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = Page::new(vec!["dune", "emma"], 7, PageRequest::new(1, 2));

        let lengths = page.map(str::len);

        assert_eq!(lengths.items, vec![4, 4]);
        assert_eq!(lengths.total, 7);
        assert_eq!(lengths.page, 1);
        assert!(lengths.has_next());
    }

    #[test]
    fn test_page_serializes_camel_case() {
        let json = serde_json::to_value(Page::new(vec![1], 1, PageRequest::new(0, 10))).unwrap();
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["total"], 1);
    }
}
