//! Filter expression tree and RSQL serialization

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Field names: dotted identifiers such as `general.name`
static FIELD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("FIELD_REGEX should compile")
});

/// Comparison operator of a leaf predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `field=="value"`; `*` in the value acts as a wildcard
    Equal,
    /// `field!="value"`
    NotEqual,
    /// `field<"value"`
    LessThan,
    /// `field<="value"`
    LessOrEqual,
    /// `field>"value"`
    GreaterThan,
    /// `field>="value"`
    GreaterOrEqual,
    /// `field=in=("a","b")`
    In,
    /// `field=out=("a","b")`
    NotIn,
    /// `field=="*value*"` with literal `*` escaped
    Contains,
    /// `field=="value*"`
    StartsWith,
    /// `field=="*value"`
    EndsWith,
}

impl Comparator {
    /// Operator token on the wire
    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Equal
            | Comparator::Contains
            | Comparator::StartsWith
            | Comparator::EndsWith => "==",
            Comparator::NotEqual => "!=",
            Comparator::LessThan => "<",
            Comparator::LessOrEqual => "<=",
            Comparator::GreaterThan => ">",
            Comparator::GreaterOrEqual => ">=",
            Comparator::In => "=in=",
            Comparator::NotIn => "=out=",
        }
    }

    fn is_list(self) -> bool {
        matches!(self, Comparator::In | Comparator::NotIn)
    }
}

/// How composites are joined on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinStyle {
    /// ` and ` / ` or `
    #[default]
    Keyword,
    /// `;` / `,`
    Symbolic,
}

impl JoinStyle {
    fn and(self) -> &'static str {
        match self {
            JoinStyle::Keyword => " and ",
            JoinStyle::Symbolic => ";",
        }
    }

    fn or(self) -> &'static str {
        match self {
            JoinStyle::Keyword => " or ",
            JoinStyle::Symbolic => ",",
        }
    }
}

/// A single `field <op> value` comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    /// Field name
    pub field: String,
    /// Operator
    pub op: Comparator,
    /// Operand values; exactly one except for `In`/`NotIn`
    pub values: Vec<String>,
}

/// Filter expression tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Leaf comparison
    Predicate(Predicate),
    /// All children must hold
    All(Vec<Filter>),
    /// Any child may hold
    Any(Vec<Filter>),
}

impl Filter {
    /// Leaf with a single value
    pub fn compare(field: impl Into<String>, op: Comparator, value: impl Into<String>) -> Self {
        Filter::Predicate(Predicate {
            field: field.into(),
            op,
            values: vec![value.into()],
        })
    }

    /// `field=="value"`
    pub fn equal(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Comparator::Equal, value)
    }

    /// `field!="value"`
    pub fn not_equal(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Comparator::NotEqual, value)
    }

    /// `field<"value"`
    pub fn less_than(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Comparator::LessThan, value)
    }

    /// `field<="value"`
    pub fn less_or_equal(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Comparator::LessOrEqual, value)
    }

    /// `field>"value"`
    pub fn greater_than(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Comparator::GreaterThan, value)
    }

    /// `field>="value"`
    pub fn greater_or_equal(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Comparator::GreaterOrEqual, value)
    }

    /// `field=in=(...)`
    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::list(field, Comparator::In, values)
    }

    /// `field=out=(...)`
    pub fn not_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self::list(field, Comparator::NotIn, values)
    }

    /// Substring match
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Comparator::Contains, value)
    }

    /// Prefix match
    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Comparator::StartsWith, value)
    }

    /// Suffix match
    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::compare(field, Comparator::EndsWith, value)
    }

    /// Conjunction of `children`
    pub fn all(children: impl IntoIterator<Item = Filter>) -> Self {
        Filter::All(children.into_iter().collect())
    }

    /// Disjunction of `children`
    pub fn any(children: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Any(children.into_iter().collect())
    }

    /// `self AND other`, extending an existing conjunction
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All(mut children) => {
                children.push(other);
                Filter::All(children)
            }
            first => Filter::All(vec![first, other]),
        }
    }

    /// `self OR other`, extending an existing disjunction
    #[must_use]
    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Any(mut children) => {
                children.push(other);
                Filter::Any(children)
            }
            first => Filter::Any(vec![first, other]),
        }
    }

    fn list<I, V>(field: impl Into<String>, op: Comparator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Filter::Predicate(Predicate {
            field: field.into(),
            op,
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Check field names, operand counts and group sizes
    pub fn validate(&self) -> Result<()> {
        match self {
            Filter::Predicate(p) => p.validate(),
            Filter::All(children) | Filter::Any(children) => {
                if children.is_empty() {
                    return Err(Error::invalid_filter("group must contain at least one expression"));
                }
                children.iter().try_for_each(Filter::validate)
            }
        }
    }

    /// Serialize with ` and ` / ` or ` joins
    pub fn build(&self) -> Result<String> {
        self.to_rsql(JoinStyle::default())
    }

    /// Serialize with the given join style
    pub fn to_rsql(&self, style: JoinStyle) -> Result<String> {
        self.validate()?;
        let mut out = String::new();
        self.write(&mut out, style, false);
        Ok(out)
    }

    /// `("filter", <rsql>)` ready to append to a query
    pub fn to_query(&self) -> Result<(String, String)> {
        Ok(("filter".to_string(), self.build()?))
    }

    fn write(&self, out: &mut String, style: JoinStyle, nested: bool) {
        let (children, sep) = match self {
            Filter::Predicate(p) => {
                p.write(out);
                return;
            }
            Filter::All(children) => (children, style.and()),
            Filter::Any(children) => (children, style.or()),
        };

        if let [only] = children.as_slice() {
            only.write(out, style, nested);
            return;
        }

        if nested {
            out.push('(');
        }
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            child.write(out, style, true);
        }
        if nested {
            out.push(')');
        }
    }
}

impl From<Predicate> for Filter {
    fn from(p: Predicate) -> Self {
        Filter::Predicate(p)
    }
}

impl Predicate {
    fn validate(&self) -> Result<()> {
        if self.field.is_empty() {
            return Err(Error::invalid_filter("field name must not be empty"));
        }
        if !FIELD_REGEX.is_match(&self.field) {
            return Err(Error::invalid_filter(format!(
                "invalid field name '{}'",
                self.field
            )));
        }
        if self.op.is_list() {
            if self.values.is_empty() {
                return Err(Error::invalid_filter(format!(
                    "'{}' list for field '{}' must not be empty",
                    self.op.symbol(),
                    self.field
                )));
            }
        } else if self.values.len() != 1 {
            return Err(Error::invalid_filter(format!(
                "'{}' takes exactly one value for field '{}'",
                self.op.symbol(),
                self.field
            )));
        }
        Ok(())
    }

    fn write(&self, out: &mut String) {
        out.push_str(&self.field);
        out.push_str(self.op.symbol());
        match self.op {
            Comparator::In | Comparator::NotIn => {
                out.push('(');
                for (i, v) in self.values.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    push_quoted(out, v);
                }
                out.push(')');
            }
            Comparator::Contains => push_pattern(out, "*", &self.values[0], "*"),
            Comparator::StartsWith => push_pattern(out, "", &self.values[0], "*"),
            Comparator::EndsWith => push_pattern(out, "*", &self.values[0], ""),
            _ => push_quoted(out, &self.values[0]),
        }
    }
}

/// Quote a value, escaping `\` and `"`. `*` is left as a wildcard.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    push_quoted(&mut out, value);
    out
}

/// Escape a value so `\`, `*` and `"` are taken literally
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '*' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn push_quoted(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

fn push_pattern(out: &mut String, prefix: &str, value: &str, suffix: &str) {
    out.push('"');
    out.push_str(prefix);
    out.push_str(&escape_literal(value));
    out.push_str(suffix);
    out.push('"');
}
