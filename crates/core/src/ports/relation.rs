//! Port trait for relation metadata.
//!
//! The relation planner only needs to know, for a record type and a
//! field name, whether the field is a relation, its cardinality and
//! its target type. [`crate::registry::TypeRegistry`] is the bundled
//! implementation.

/// Cardinality and target of a relation field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationDescriptor {
    /// `true` for one-to-one and many-to-one relations.
    pub to_one: bool,
    /// Record type on the other side of the relation.
    pub target: String,
}

impl RelationDescriptor {
    pub fn to_one(target: impl Into<String>) -> Self {
        Self {
            to_one: true,
            target: target.into(),
        }
    }

    pub fn to_many(target: impl Into<String>) -> Self {
        Self {
            to_one: false,
            target: target.into(),
        }
    }
}

/// Relation lookup for record types.
pub trait RelationSchema: Send + Sync {
    /// Describe `field` of `record_type`, or `None` when it is not a relation.
    fn resolve(&self, record_type: &str, field: &str) -> Option<RelationDescriptor>;
}
