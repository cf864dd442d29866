//! Fluent filter builder
//!
//! Predicates added one after another are AND-ed; [`FilterBuilder::or`]
//! starts a new alternative, so `a and b or c` reads as `(a and b) or c`,
//! matching RSQL precedence. [`FilterBuilder::group`] nests a sub-expression.

use super::expr::{Filter, JoinStyle};
use crate::error::Result;

/// Fluent front end for [`Filter`]
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    alternatives: Vec<Filter>,
    current: Vec<Filter>,
    style: JoinStyle,
}

impl FilterBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given join style when building
    #[must_use]
    pub fn style(mut self, style: JoinStyle) -> Self {
        self.style = style;
        self
    }

    /// Add an arbitrary expression
    #[must_use]
    pub fn push(mut self, filter: Filter) -> Self {
        self.current.push(filter);
        self
    }

    /// `field=="value"`
    #[must_use]
    pub fn equal(self, field: &str, value: &str) -> Self {
        self.push(Filter::equal(field, value))
    }

    /// `field!="value"`
    #[must_use]
    pub fn not_equal(self, field: &str, value: &str) -> Self {
        self.push(Filter::not_equal(field, value))
    }

    /// `field<"value"`
    #[must_use]
    pub fn less_than(self, field: &str, value: &str) -> Self {
        self.push(Filter::less_than(field, value))
    }

    /// `field<="value"`
    #[must_use]
    pub fn less_or_equal(self, field: &str, value: &str) -> Self {
        self.push(Filter::less_or_equal(field, value))
    }

    /// `field>"value"`
    #[must_use]
    pub fn greater_than(self, field: &str, value: &str) -> Self {
        self.push(Filter::greater_than(field, value))
    }

    /// `field>="value"`
    #[must_use]
    pub fn greater_or_equal(self, field: &str, value: &str) -> Self {
        self.push(Filter::greater_or_equal(field, value))
    }

    /// `field=in=(...)`
    #[must_use]
    pub fn is_in(self, field: &str, values: &[&str]) -> Self {
        self.push(Filter::is_in(field, values.iter().copied()))
    }

    /// `field=out=(...)`
    #[must_use]
    pub fn not_in(self, field: &str, values: &[&str]) -> Self {
        self.push(Filter::not_in(field, values.iter().copied()))
    }

    /// Substring match
    #[must_use]
    pub fn contains(self, field: &str, value: &str) -> Self {
        self.push(Filter::contains(field, value))
    }

    /// Prefix match
    #[must_use]
    pub fn starts_with(self, field: &str, value: &str) -> Self {
        self.push(Filter::starts_with(field, value))
    }

    /// Suffix match
    #[must_use]
    pub fn ends_with(self, field: &str, value: &str) -> Self {
        self.push(Filter::ends_with(field, value))
    }

    /// Explicit AND; adjacent predicates are AND-ed anyway
    #[must_use]
    pub fn and(self) -> Self {
        self
    }

    /// Start a new OR alternative
    #[must_use]
    pub fn or(mut self) -> Self {
        self.close_chain();
        self
    }

    /// Add a parenthesized sub-expression
    #[must_use]
    pub fn group(self, build: impl FnOnce(FilterBuilder) -> FilterBuilder) -> Self {
        let inner = build(FilterBuilder::new());
        match inner.into_filter() {
            Some(filter) => self.push(filter),
            None => self.push(Filter::All(Vec::new())),
        }
    }

    /// Check if nothing has been added
    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty() && self.current.is_empty()
    }

    /// The expression tree, or `None` if empty
    pub fn into_filter(mut self) -> Option<Filter> {
        self.close_chain();
        match self.alternatives.len() {
            0 => None,
            1 => self.alternatives.pop(),
            _ => Some(Filter::Any(self.alternatives)),
        }
    }

    // A one-predicate chain stands for itself, not a group of one
    fn close_chain(&mut self) {
        let mut chain = std::mem::take(&mut self.current);
        match chain.len() {
            0 => {}
            1 => self.alternatives.extend(chain.pop()),
            _ => self.alternatives.push(Filter::All(chain)),
        }
    }

    /// Serialize. An empty builder yields an empty string.
    pub fn build(self) -> Result<String> {
        let style = self.style;
        match self.into_filter() {
            Some(filter) => filter.to_rsql(style),
            None => Ok(String::new()),
        }
    }
}
