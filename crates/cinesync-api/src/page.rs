//! Paginated list results.

use serde::{Deserialize, Serialize};

/// One page of a list read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Matches across all pages.
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// The `(0, empty)` result of a read with no hits.
    #[must_use]
    pub fn empty(page: u32, size: u32) -> Self {
        Self {
            total: 0,
            page,
            size,
            items: Vec::new(),
        }
    }

    /// `true` if more matches follow this page.
    #[must_use]
    pub fn has_next(&self) -> bool {
        u64::from(self.page) * u64::from(self.size) < self.total
    }

    #[must_use]
    pub fn next_page(&self) -> Option<u32> {
        if self.has_next() {
            self.page.checked_add(1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: u32, total: u64) -> Page<u8> {
        Page {
            total,
            page,
            size: 10,
            items: vec![0; 10],
        }
    }

    #[test]
    fn next_page_while_matches_remain() {
        assert_eq!(page(1, 50).next_page(), Some(2));
        assert_eq!(page(4, 50).next_page(), Some(5));
        assert_eq!(page(5, 50).next_page(), None);
    }

    #[test]
    fn empty_page_has_no_next() {
        let empty: Page<u8> = Page::empty(1, 10);
        assert_eq!(empty.total, 0);
        assert!(!empty.has_next());
    }
}
