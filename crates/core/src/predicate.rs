//! Keyset predicates.
//!
//! A [`Predicate`] is a disjunction of conjunctions ("OR of ANDs") of
//! field comparisons. The keyset strategy builds one per cursor anchor:
//! for every prefix length `k` of the ordering it requires equality on
//! the first `k - 1` fields and a strict comparison on field `k`.
//!
//! Predicates are backend-agnostic: the in-memory source evaluates them
//! with [`Predicate::matches`], the PostgreSQL source compiles them to a
//! `WHERE` clause.

use std::cmp::Ordering;

use crate::models::{Record, Value};
use crate::order::OrderSpec;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Eq,
    Lt,
    Gt,
}

impl Comparison {
    /// SQL spelling of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Lt => "<",
            Comparison::Gt => ">",
        }
    }

    fn accepts(&self, ord: Ordering) -> bool {
        matches!(
            (self, ord),
            (Comparison::Eq, Ordering::Equal)
                | (Comparison::Lt, Ordering::Less)
                | (Comparison::Gt, Ordering::Greater)
        )
    }
}

/// `field <op> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: Comparison,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// SQL semantics: comparisons against null or across kinds are false.
    pub fn matches(&self, record: &Record) -> bool {
        record
            .value(&self.field)
            .compare(&self.value)
            .is_some_and(|ord| self.op.accepts(ord))
    }
}

/// Which side of the anchor a keyset predicate selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Before,
    After,
}

/// Disjunction of conjunctions of [`Condition`]s.
///
/// A predicate with no branches matches nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub branches: Vec<Vec<Condition>>,
}

impl Predicate {
    /// Records sorting strictly before `anchor` under `order`.
    pub fn before(order: &OrderSpec, anchor: &Record) -> Self {
        Self::split(order, anchor, Side::Before)
    }

    /// Records sorting strictly after `anchor` under `order`.
    pub fn after(order: &OrderSpec, anchor: &Record) -> Self {
        Self::split(order, anchor, Side::After)
    }

    /// Records whose `field` equals `value`.
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            branches: vec![vec![Condition::new(field, Comparison::Eq, value)]],
        }
    }

    fn split(order: &OrderSpec, anchor: &Record, side: Side) -> Self {
        let mut branches = Vec::with_capacity(order.fields().len());
        let mut prefix: Vec<Condition> = Vec::new();

        for field in order.fields() {
            let value = anchor.value(&field.field).into_owned();
            // No meaningful inequality against null; the field is skipped
            if value.is_null() {
                continue;
            }

            let op = match (side, field.is_descending()) {
                (Side::After, false) | (Side::Before, true) => Comparison::Gt,
                (Side::Before, false) | (Side::After, true) => Comparison::Lt,
            };

            let mut branch = prefix.clone();
            branch.push(Condition::new(field.field.clone(), op, value.clone()));
            branches.push(branch);

            prefix.push(Condition::new(field.field.clone(), Comparison::Eq, value));
        }

        Self { branches }
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.branches
            .iter()
            .any(|branch| branch.iter().all(|c| c.matches(record)))
    }

    /// Field names referenced by any condition.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.branches
            .iter()
            .flatten()
            .map(|c| c.field.as_str())
    }
}
