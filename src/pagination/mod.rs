//! Pagination module
//!
//! Walks Jamf Pro list endpoints that return `{"totalCount", "results"}`
//! envelopes, one page at a time.
//!
//! # Overview
//!
//! Each page body is handed unparsed to a caller-supplied merge callback,
//! which owns the accumulator. The walk ends on a short page or when the
//! merged count reaches the reported total. A safety cap on the number of
//! pages turns a misbehaving server into an error instead of an endless
//! loop.

mod fetch;
mod types;

pub use fetch::{collect_all, fetch_all};
pub use types::{
    NextPage, PageCursor, PageInfo, PageParams, PageSummary, PaginationOptions, StopReason,
    DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE,
};

#[cfg(test)]
mod tests;
