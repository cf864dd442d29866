//! Pagination types
//!
//! Parameter naming, walk options and the per-call cursor.

use crate::error::{Error, Result};
use serde_json::Value;

/// Default number of items requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default upper bound on pages fetched in one walk
pub const DEFAULT_MAX_PAGES: u32 = 10_000;

/// Query parameter names used for the page index and page size.
///
/// Jamf Pro endpoints disagree on the size parameter (`page-size` on most
/// versioned endpoints, `pageSize` on some others), so every walk names the
/// pair explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageParams {
    /// Page index parameter
    pub page_param: String,
    /// Page size parameter
    pub size_param: String,
}

impl PageParams {
    /// Custom parameter names
    pub fn new(page_param: impl Into<String>, size_param: impl Into<String>) -> Self {
        Self {
            page_param: page_param.into(),
            size_param: size_param.into(),
        }
    }

    /// `page` / `page-size`
    pub fn versioned() -> Self {
        Self::new("page", "page-size")
    }

    /// `page` / `pageSize`
    pub fn camel_case() -> Self {
        Self::new("page", "pageSize")
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_param.trim().is_empty() || self.size_param.trim().is_empty() {
            return Err(Error::invalid_request(
                "page and page size parameter names must not be empty",
            ));
        }
        if self.page_param == self.size_param {
            return Err(Error::invalid_request(
                "page and page size parameter names must differ",
            ));
        }
        Ok(())
    }
}

/// Options for a paginated walk
#[derive(Debug, Clone)]
pub struct PaginationOptions {
    /// Items requested per page
    pub page_size: u32,
    /// Index of the first page
    pub start_page: u32,
    /// Pages fetched before the walk gives up
    pub max_pages: u32,
    /// Envelope field holding the page's items
    pub results_field: String,
    /// Envelope field holding the reported total
    pub total_field: String,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            start_page: 0,
            max_pages: DEFAULT_MAX_PAGES,
            results_field: "results".to_string(),
            total_field: "totalCount".to_string(),
        }
    }
}

impl PaginationOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page size
    #[must_use]
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Set the first page index
    #[must_use]
    pub fn start_page(mut self, page: u32) -> Self {
        self.start_page = page;
        self
    }

    /// Set the safety cap
    #[must_use]
    pub fn max_pages(mut self, pages: u32) -> Self {
        self.max_pages = pages;
        self
    }

    /// Set the envelope field names
    #[must_use]
    pub fn fields(mut self, results: impl Into<String>, total: impl Into<String>) -> Self {
        self.results_field = results.into();
        self.total_field = total.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::invalid_request("page size must be at least 1"));
        }
        if self.max_pages == 0 {
            return Err(Error::invalid_request("max pages must be at least 1"));
        }
        if self.start_page.checked_add(self.max_pages - 1).is_none() {
            return Err(Error::invalid_request(format!(
                "start page {} plus {} pages exceeds the page index range",
                self.start_page, self.max_pages
            )));
        }
        Ok(())
    }
}

/// Item count and reported total read from one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// Items on this page
    pub items: usize,
    /// Total reported by the server, if any
    pub total: Option<u64>,
}

impl PageInfo {
    /// Read the envelope of a page body
    pub fn from_body(body: &[u8], options: &PaginationOptions) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::decode(format!("page body is not JSON: {e}")))?;
        let items = match value.get(&options.results_field) {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Null) | None => 0,
            Some(_) => {
                return Err(Error::decode(format!(
                    "page field '{}' is not an array",
                    options.results_field
                )))
            }
        };
        let total = value.get(&options.total_field).and_then(Value::as_u64);
        Ok(Self { items, total })
    }
}

/// Why a walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page held fewer items than requested
    ShortPage,
    /// The running count reached the reported total
    TotalReached,
}

/// Decision after merging a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    /// Fetch the next page
    Continue,
    /// Stop cleanly
    Done(StopReason),
    /// Safety cap hit without an end-of-data signal
    CapReached,
}

/// Walk state for one paginated call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Page index of the next request
    pub page: u32,
    /// Items requested per page
    pub page_size: u32,
    /// Items merged so far
    pub seen: u64,
    /// Pages merged so far
    pub pages: u32,
    /// Last total reported by the server
    pub total: Option<u64>,
    max_pages: u32,
}

impl PageCursor {
    /// Start a walk
    pub fn new(options: &PaginationOptions) -> Self {
        Self {
            page: options.start_page,
            page_size: options.page_size,
            seen: 0,
            pages: 0,
            total: None,
            max_pages: options.max_pages,
        }
    }

    /// Record a merged page and decide what to do next.
    ///
    /// Checked in order: short page, total reached, safety cap.
    pub fn advance(&mut self, info: PageInfo) -> NextPage {
        self.pages += 1;
        self.seen += info.items as u64;
        if info.total.is_some() {
            self.total = info.total;
        }

        if info.items < self.page_size as usize {
            return NextPage::Done(StopReason::ShortPage);
        }
        if self.total.is_some_and(|total| self.seen >= total) {
            return NextPage::Done(StopReason::TotalReached);
        }
        if self.pages >= self.max_pages {
            return NextPage::CapReached;
        }

        match self.page.checked_add(1) {
            Some(next) => {
                self.page = next;
                NextPage::Continue
            }
            None => NextPage::CapReached,
        }
    }

    /// Summary of the walk so far
    pub fn summary(&self) -> PageSummary {
        PageSummary {
            pages: self.pages,
            items: self.seen,
            total: self.total,
        }
    }
}

/// Result of a completed walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageSummary {
    /// Pages merged
    pub pages: u32,
    /// Items merged
    pub items: u64,
    /// Last total reported by the server
    pub total: Option<u64>,
}
