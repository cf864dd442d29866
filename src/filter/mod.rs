//! RSQL filter expressions
//!
//! Builds the `filter` query parameter accepted by Jamf Pro list endpoints.
//! Expressions are trees of predicates combined with AND/OR; nested groups
//! with more than one child are always parenthesized.
//!
//! ```
//! use jamfpro_core::filter::Filter;
//!
//! let filter = Filter::equal("general.name", "MacBook Pro")
//!     .and(Filter::greater_than("hardware.totalRamMegabytes", "8192"));
//! assert_eq!(
//!     filter.build().unwrap(),
//!     r#"general.name=="MacBook Pro" and hardware.totalRamMegabytes>"8192""#
//! );
//! ```

mod builder;
mod expr;

pub use builder::FilterBuilder;
pub use expr::{escape_literal, quote, Comparator, Filter, JoinStyle, Predicate};
