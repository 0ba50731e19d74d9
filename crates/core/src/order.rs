//! Ordering specifications.
//!
//! An [`OrderSpec`] is parsed from Django-style field lists
//! (`"age,-created"`) and always ends in a key tie-breaker, so two
//! distinct records never compare equal.

use std::cmp::Ordering;
use std::fmt;

use crate::models::{Record, Value, is_key_field};
use crate::ports::OrderDirection;

/// One `(field, direction)` pair of an ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderField {
    pub field: String,
    pub direction: OrderDirection,
}

impl OrderField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }

    pub fn is_descending(&self) -> bool {
        self.direction == OrderDirection::Desc
    }

    /// Compare two records on this field alone.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = compare_values(&a.value(&self.field), &b.value(&self.field));
        match self.direction {
            OrderDirection::Asc => ord,
            OrderDirection::Desc => ord.reverse(),
        }
    }

    fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        let (field, direction) = match token.strip_prefix('-') {
            Some(rest) => (rest.trim(), OrderDirection::Desc),
            None => (token, OrderDirection::Asc),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            direction,
        })
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_descending() {
            write!(f, "-{}", self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

/// A non-empty, total ordering over records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderSpec {
    fields: Vec<OrderField>,
}

impl OrderSpec {
    /// Parse a comma-joined list such as `"age,-pk"`.
    ///
    /// Falls back to `default` when `raw` holds no fields, and to key
    /// order when `default` is empty too.
    pub fn parse(raw: &str, default: &[String]) -> Self {
        Self::from_tokens(raw.split(','), default)
    }

    /// Same as [`OrderSpec::parse`] for an already split list.
    pub fn from_tokens<I, S>(tokens: I, default: &[String]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fields = collect_fields(tokens);
        if fields.is_empty() {
            fields = collect_fields(default);
        }
        if !fields.iter().any(|f| is_key_field(&f.field)) {
            fields.push(OrderField::asc("pk"));
        }
        Self { fields }
    }

    /// Key-only ascending order.
    pub fn by_key() -> Self {
        Self {
            fields: vec![OrderField::asc("pk")],
        }
    }

    pub fn fields(&self) -> &[OrderField] {
        &self.fields
    }

    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.fields
            .iter()
            .map(|f| f.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Stable sort of `records` by this ordering.
    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

fn collect_fields<I, S>(tokens: I) -> Vec<OrderField>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut fields: Vec<OrderField> = Vec::new();
    for field in tokens.into_iter().filter_map(|t| OrderField::parse(t.as_ref())) {
        let seen = fields.iter().any(|f| {
            f.field == field.field || (is_key_field(&f.field) && is_key_field(&field.field))
        });
        if !seen {
            fields.push(field);
        }
    }
    fields
}

/// Ascending comparison with nulls last.
///
/// Values of different kinds fall back to a fixed kind rank so the
/// result stays a total order.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a
            .compare(b)
            .unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b))),
    }
}

fn kind_rank(v: &Value) -> u8 {
    match v {
        Value::Bool(_) => 0,
        Value::Int(_) | Value::Float(_) => 1,
        Value::Text(_) => 2,
        Value::Timestamp(_) => 3,
        Value::Null => 4,
    }
}
