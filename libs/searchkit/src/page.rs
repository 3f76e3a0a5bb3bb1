//! Offset-paginated result page.

use serde::Serialize;

/// One page of results plus the total count of matching rows.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[must_use]
pub struct Page<T> {
    pub content: Vec<T>,
    /// Zero-based page index.
    pub number: u64,
    /// Requested page size (the content may be shorter on the last page).
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
    /// Set when entity materialization lost rows to a concurrent delete; the
    /// surviving subset is still returned.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub integrity_degraded: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, number: u64, size: u64, total_elements: u64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total_elements.div_ceil(size)
        };
        Self {
            content,
            number,
            size,
            total_elements,
            total_pages,
            integrity_degraded: false,
        }
    }

    pub fn empty(number: u64, size: u64) -> Self {
        Self::new(Vec::new(), number, size, 0)
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.number + 1 < self.total_pages
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.number > 0
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        !self.has_previous()
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        !self.has_next()
    }

    /// Map the page content, keeping the pagination metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            number: self.number,
            size: self.size,
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            integrity_degraded: self.integrity_degraded,
        }
    }
}
