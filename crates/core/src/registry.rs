//! Registry of record types.
//!
//! The registry is an explicit object owned by the application (or a
//! test) and handed to whatever needs type metadata. It describes each
//! record type's fields and natural ordering, and serves as the
//! [`RelationSchema`] consulted by the relation planner.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::models::{Record, Value};
use crate::ports::{RelationDescriptor, RelationSchema};

/// Supported kinds of record fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    /// One-to-one or many-to-one relation.
    ToOne { target: String },
    /// One-to-many or many-to-many relation.
    ToMany { target: String },
}

impl FieldKind {
    /// Parse a kind tag such as `"int"` or `"to_many"`.
    ///
    /// Relation kinds take their target from `target`. Unknown tags
    /// and relations without a target are rejected.
    pub fn parse(field: &str, tag: &str, target: Option<&str>) -> RegistryResult<Self> {
        let unsupported = || RegistryError::UnsupportedFieldKind {
            field: field.to_string(),
            kind: tag.to_string(),
        };

        let kind = match tag.to_ascii_lowercase().as_str() {
            "int" | "integer" => FieldKind::Integer,
            "float" => FieldKind::Float,
            "text" | "string" => FieldKind::Text,
            "bool" | "boolean" => FieldKind::Boolean,
            "timestamp" | "datetime" => FieldKind::Timestamp,
            "to_one" | "foreign_key" | "one_to_one" => FieldKind::ToOne {
                target: target.ok_or_else(unsupported)?.to_string(),
            },
            "to_many" | "many_to_many" | "reverse" => FieldKind::ToMany {
                target: target.ok_or_else(unsupported)?.to_string(),
            },
            _ => return Err(unsupported()),
        };
        Ok(kind)
    }

    /// Convert a loosely typed value, as decoded from JSON, to this kind.
    ///
    /// Values that do not convert are returned unchanged.
    pub fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (FieldKind::Timestamp, Value::Text(raw)) => parse_timestamp(&raw)
                .map(Value::Timestamp)
                .unwrap_or(Value::Text(raw)),
            (FieldKind::Float, Value::Int(i)) => Value::Float(i as f64),
            (_, value) => value,
        }
    }

    pub fn relation(&self) -> Option<RelationDescriptor> {
        match self {
            FieldKind::ToOne { target } => Some(RelationDescriptor::to_one(target.clone())),
            FieldKind::ToMany { target } => Some(RelationDescriptor::to_many(target.clone())),
            _ => None,
        }
    }
}

/// A named field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

/// Description of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    /// Natural ordering, Django style (`["-created", "pk"]`).
    pub ordering: Vec<String>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            ordering: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn ordering<I, S>(mut self, ordering: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ordering = ordering.into_iter().map(Into::into).collect();
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == field)
    }
}

impl RecordType {
    /// Coerce every declared scalar field of `record` to its kind.
    pub fn coerce(&self, record: &mut Record) {
        for field in &self.fields {
            if let Some(value) = record.fields.remove(&field.name) {
                record.fields.insert(field.name.clone(), field.kind.coerce(value));
            }
        }
    }
}

/// RFC 3339, or a naive timestamp taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serialized form of a record type, as found in schema files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordTypeDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub ordering: Vec<String>,
}

/// Serialized form of a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub target: Option<String>,
}

impl TryFrom<RecordTypeDef> for RecordType {
    type Error = RegistryError;

    fn try_from(def: RecordTypeDef) -> RegistryResult<Self> {
        let fields = def
            .fields
            .into_iter()
            .map(|f| {
                Ok(FieldDescriptor {
                    kind: FieldKind::parse(&f.name, &f.kind, f.target.as_deref())?,
                    name: f.name,
                })
            })
            .collect::<RegistryResult<Vec<_>>>()?;

        Ok(Self {
            name: def.name,
            fields,
            ordering: def.ordering,
        })
    }
}

/// Registry of record types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, RecordType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record type. Names are unique.
    pub fn register(&mut self, record_type: RecordType) -> RegistryResult<()> {
        if self.types.contains_key(&record_type.name) {
            return Err(RegistryError::DuplicateType(record_type.name));
        }
        debug!(
            record_type = %record_type.name,
            fields = record_type.fields.len(),
            "Registering record type"
        );
        self.types.insert(record_type.name.clone(), record_type);
        Ok(())
    }

    /// Register every definition, then check relation targets.
    pub fn register_all(&mut self, defs: Vec<RecordTypeDef>) -> RegistryResult<()> {
        for def in defs {
            self.register(RecordType::try_from(def)?)?;
        }
        self.validate()
    }

    pub fn get(&self, name: &str) -> Option<&RecordType> {
        self.types.get(name)
    }

    /// Like [`TypeRegistry::get`], failing on unknown names.
    pub fn require(&self, name: &str) -> RegistryResult<&RecordType> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check that every relation points to a registered type.
    pub fn validate(&self) -> RegistryResult<()> {
        for record_type in self.types.values() {
            for field in &record_type.fields {
                if let Some(relation) = field.kind.relation()
                    && !self.contains(&relation.target)
                {
                    return Err(RegistryError::UnknownRelationTarget {
                        record_type: record_type.name.clone(),
                        field: field.name.clone(),
                        target: relation.target,
                    });
                }
            }
        }
        Ok(())
    }

    /// Forget every registered type.
    pub fn reset(&mut self) {
        self.types.clear();
    }
}

impl RelationSchema for TypeRegistry {
    fn resolve(&self, record_type: &str, field: &str) -> Option<RelationDescriptor> {
        self.get(record_type)?.get(field)?.kind.relation()
    }
}
