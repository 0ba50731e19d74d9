//! Selection-set relation planning.
//!
//! Walks the fields requested for a connection and reports every
//! relation reachable through them, so the data layer can decide
//! between joining (every hop to-one) and batch loading (some hop
//! to-many). Planning is advisory and performs no I/O.

use std::collections::HashSet;

use tracing::trace;

use crate::ports::RelationSchema;

/// Separator between hops of a relation path (`parent__children`).
pub const PATH_SEPARATOR: &str = "__";

/// A requested field and its sub-selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub name: String,
    pub children: Vec<Selection>,
}

impl Selection {
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn node(name: impl Into<String>, children: Vec<Selection>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

/// A relation reachable through the selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationHint {
    /// Dotted path from the paginated type (`parent__children`).
    pub path: String,
    /// Whether every hop of the path is to-one.
    pub to_one: bool,
}

/// Relation paths partitioned by load strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationPlan {
    /// Paths made only of to-one hops, safe to join.
    pub eager: Vec<String>,
    /// Paths crossing a to-many hop, to be batch loaded.
    pub batched: Vec<String>,
}

impl RelationPlan {
    pub fn from_hints(hints: &[RelationHint]) -> Self {
        let (eager, batched): (Vec<_>, Vec<_>) = hints.iter().partition(|h| h.to_one);
        Self {
            eager: eager.into_iter().map(|h| h.path.clone()).collect(),
            batched: batched.into_iter().map(|h| h.path.clone()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.eager.is_empty() && self.batched.is_empty()
    }
}

/// Collect relation hints for `selection` rooted at `record_type`.
///
/// `selection` holds the sub-fields of the paginated field. The Relay
/// wrappers `edges` and `node` are walked through transparently unless
/// the record type declares a relation with that name.
pub fn plan_relations(
    selection: &[Selection],
    record_type: &str,
    schema: &dyn RelationSchema,
) -> Vec<RelationHint> {
    let mut hints = Vec::new();
    let mut seen = HashSet::new();
    walk(selection, record_type, None, true, schema, &mut hints, &mut seen);
    trace!(record_type, hints = hints.len(), "Relations planned");
    hints
}

fn walk(
    selection: &[Selection],
    record_type: &str,
    prefix: Option<&str>,
    prefix_to_one: bool,
    schema: &dyn RelationSchema,
    hints: &mut Vec<RelationHint>,
    seen: &mut HashSet<String>,
) {
    for field in selection {
        let Some(relation) = schema.resolve(record_type, &field.name) else {
            if is_connection_wrapper(&field.name) {
                walk(&field.children, record_type, prefix, prefix_to_one, schema, hints, seen);
            }
            continue;
        };

        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, PATH_SEPARATOR, field.name),
            None => field.name.clone(),
        };
        let to_one = prefix_to_one && relation.to_one;

        if seen.insert(path.clone()) {
            hints.push(RelationHint {
                path: path.clone(),
                to_one,
            });
        }

        walk(&field.children, &relation.target, Some(&path), to_one, schema, hints, seen);
    }
}

fn is_connection_wrapper(name: &str) -> bool {
    matches!(name, "edges" | "node")
}
