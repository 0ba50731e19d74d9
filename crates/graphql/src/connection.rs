//! Relay connection plumbing between async-graphql and the core engine.
//!
//! - [`PageInfo`] and [`define_connection!`] generate output types
//! - [`page_args`] converts field arguments into core [`PageArgs`]
//! - [`selection_tree`] and [`relation_plan`] feed the relation planner
//! - [`graphql_error`] maps engine errors with a machine-readable `code`

use async_graphql::{ErrorExtensions, Result, SelectionField};
use tracing::debug;

use pagewise_core::error::PaginationError;
use pagewise_core::planner::{RelationPlan, Selection, plan_relations};
use pagewise_core::ports::{Cursor, PageArgs, RelationSchema};

/// Maximum length for cursor strings.
const MAX_CURSOR_LENGTH: usize = 64;
/// Maximum length for `orderBy` values.
const MAX_ORDER_BY_LENGTH: usize = 256;

// -----------------------------------------------------------------------------
// Connection Types (Relay-style pagination)
// -----------------------------------------------------------------------------

#[derive(async_graphql::SimpleObject, Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

impl From<pagewise_core::ports::PageInfo> for PageInfo {
    fn from(info: pagewise_core::ports::PageInfo) -> Self {
        Self {
            has_next_page: info.has_next_page,
            has_previous_page: info.has_previous_page,
            start_cursor: info.start_cursor.map(|c| c.value),
            end_cursor: info.end_cursor.map(|c| c.value),
        }
    }
}

/// Generate Relay-style connection types (Edge + Connection) with From impl.
#[macro_export]
macro_rules! define_connection {
    ($node:ty, $core_model:ty, $edge:ident, $connection:ident) => {
        #[derive(async_graphql::SimpleObject)]
        pub struct $edge {
            pub node: $node,
            pub cursor: String,
        }

        #[derive(async_graphql::SimpleObject)]
        pub struct $connection {
            pub edges: Vec<$edge>,
            pub page_info: $crate::PageInfo,
            pub total_count: Option<i64>,
        }

        impl From<pagewise_core::ports::Connection<$core_model>> for $connection {
            fn from(conn: pagewise_core::ports::Connection<$core_model>) -> Self {
                Self {
                    edges: conn
                        .edges
                        .into_iter()
                        .map(|e| $edge {
                            node: <$node>::from(e.node),
                            cursor: e.cursor.value,
                        })
                        .collect(),
                    page_info: $crate::PageInfo::from(conn.page_info),
                    total_count: conn.total_count,
                }
            }
        }
    };
}

// -----------------------------------------------------------------------------
// Arguments
// -----------------------------------------------------------------------------

/// Build core pagination arguments from connection field arguments.
pub fn page_args(
    first: Option<i32>,
    after: Option<String>,
    last: Option<i32>,
    before: Option<String>,
) -> Result<PageArgs> {
    Ok(PageArgs {
        first: first.map(i64::from),
        after: parse_cursor(after, "after")?,
        last: last.map(i64::from),
        before: parse_cursor(before, "before")?,
    })
}

fn parse_cursor(value: Option<String>, argument: &str) -> Result<Option<Cursor>> {
    match value {
        Some(v) if v.len() > MAX_CURSOR_LENGTH => Err(graphql_error(PaginationError::InvalidCursor(
            format!("`{}` too long: maximum {} characters allowed", argument, MAX_CURSOR_LENGTH),
        ))),
        Some(v) => Ok(Some(Cursor::new(v))),
        None => Ok(None),
    }
}

/// Validate an `orderBy` argument.
pub fn validate_order_by(order_by: &Option<String>) -> Result<()> {
    if let Some(value) = order_by
        && value.len() > MAX_ORDER_BY_LENGTH
    {
        return Err(async_graphql::Error::new(format!(
            "orderBy too long: maximum {} characters allowed",
            MAX_ORDER_BY_LENGTH
        )));
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Selection Planning
// -----------------------------------------------------------------------------

/// Sub-selection of a field as a planner tree, with snake_case names.
pub fn selection_tree(field: &SelectionField<'_>) -> Vec<Selection> {
    field
        .selection_set()
        .map(|child| Selection::node(snake_case(child.name()), selection_tree(&child)))
        .collect()
}

/// Relation plan for the connection field being resolved.
pub fn relation_plan(
    field: &SelectionField<'_>,
    record_type: &str,
    schema: &dyn RelationSchema,
) -> RelationPlan {
    let hints = plan_relations(&selection_tree(field), record_type, schema);
    let plan = RelationPlan::from_hints(&hints);
    if !plan.is_empty() {
        debug!(
            field = field.name(),
            eager = ?plan.eager,
            batched = ?plan.batched,
            "Relation plan"
        );
    }
    plan
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

// -----------------------------------------------------------------------------
// Errors
// -----------------------------------------------------------------------------

/// Convert an engine error into a GraphQL error with a `code` extension.
pub fn graphql_error(err: PaginationError) -> async_graphql::Error {
    let code = err.code();
    async_graphql::Error::new(err.to_string()).extend_with(|_, ext| ext.set("code", code))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tests de validation critiques - protègent contre les entrées abusives

    #[test]
    fn test_page_args_conversion() {
        let args = page_args(Some(2), Some("0x2".into()), None, None).unwrap();
        assert_eq!(args, PageArgs::first(2).after(Cursor::new("0x2")));

        // Les valeurs négatives passent: le moteur les rejette avec un code
        assert_eq!(page_args(Some(-1), None, None, None).unwrap().first, Some(-1));
    }

    #[test]
    fn test_oversized_inputs_rejected() {
        assert!(page_args(None, Some("f".repeat(100)), None, None).is_err());
        assert!(validate_order_by(&Some("a,".repeat(200))).is_err());
        assert!(validate_order_by(&Some("-pub_date".into())).is_ok());
        assert!(validate_order_by(&None).is_ok());
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("pageInfo"), "page_info");
        assert_eq!(snake_case("reporter"), "reporter");
        assert_eq!(snake_case("pubDate"), "pub_date");
    }

    #[test]
    fn test_graphql_error_carries_code() {
        let err = graphql_error(PaginationError::MissingPaginationBound {
            field: "allReporters".into(),
        });
        assert!(err.message.contains("allReporters"));
        let code = err.extensions.as_ref().and_then(|e| e.get("code")).cloned();
        assert_eq!(code, Some(async_graphql::Value::from("MISSING_PAGINATION_BOUND")));
    }
}
