//! Domain models for paginated records.
//!
//! These models are storage-agnostic: every backend converts its rows
//! into [`Record`]s made of [`Value`]s.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Values
// =============================================================================

/// A single field value.
///
/// Serialized through `serde_json::Value`, so fixtures and API payloads
/// use plain JSON scalars. Timestamps serialize as RFC 3339 strings and
/// come back as [`Value::Text`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compare two values of compatible kinds.
    ///
    /// Returns `None` when either side is null or the kinds differ
    /// (integers and floats are compatible).
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.total_cmp(b)),
            (Value::Int(a), Value::Float(b)) => Some((*a as f64).total_cmp(b)),
            (Value::Float(a), Value::Int(b)) => Some(a.total_cmp(&(*b as f64))),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            // Non-finite floats have no JSON representation
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s),
            Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v $(as $cast)?)
                }
            }
        )*
    };
}

value_from!(
    bool => Bool,
    i64 => Int,
    i32 => Int as i64,
    u32 => Int as i64,
    f64 => Float,
    String => Text,
    DateTime<Utc> => Timestamp,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Records
// =============================================================================

/// Largest accepted record key (bigint range).
pub const MAX_KEY: u64 = i64::MAX as u64;

/// An item of a paginated collection.
///
/// `pk` is the stable unique key. Keys are bigint-ranged: they are
/// exposed to comparisons as [`Value::Int`], and entry points reject
/// keys above [`MAX_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub pk: u64,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(pk: u64) -> Self {
        Self {
            pk,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Value of a field, with `pk` and `id` resolving to the key.
    ///
    /// Missing fields read as [`Value::Null`].
    pub fn value(&self, field: &str) -> Cow<'_, Value> {
        if is_key_field(field) {
            return Cow::Owned(Value::Int(i64::try_from(self.pk).unwrap_or(i64::MAX)));
        }
        match self.fields.get(field) {
            Some(v) => Cow::Borrowed(v),
            None => Cow::Owned(Value::Null),
        }
    }

    /// Field values as a JSON object, key included under `pk`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("pk".to_string(), serde_json::Value::from(self.pk));
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.clone().into());
        }
        serde_json::Value::Object(map)
    }
}

/// Whether a field name designates the record key.
pub fn is_key_field(field: &str) -> bool {
    field == "pk" || field == "id"
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn value_compare_mixed_numbers() {
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Float(3.0).compare(&Value::Int(3)), Some(Ordering::Equal));
    }

    #[test]
    fn value_compare_null_and_mismatched_kinds() {
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
        assert_eq!(Value::Text("a".into()).compare(&Value::Int(1)), None);
    }

    #[test]
    fn record_key_aliases() {
        let r = Record::new(7).with("name", "rex");
        assert_eq!(*r.value("pk"), Value::Int(7));
        assert_eq!(*r.value("id"), Value::Int(7));
        assert_eq!(*r.value("name"), Value::Text("rex".into()));
        assert!(r.value("missing").is_null());
    }

    #[test]
    fn record_deserializes_from_plain_json() {
        let r: Record = serde_json::from_value(json!({
            "pk": 3,
            "fields": {"age": 4, "weight": 1.5, "name": "tom", "alive": true, "owner": null}
        }))
        .unwrap();

        assert_eq!(r.pk, 3);
        assert_eq!(*r.value("age"), Value::Int(4));
        assert_eq!(*r.value("weight"), Value::Float(1.5));
        assert_eq!(*r.value("alive"), Value::Bool(true));
        assert!(r.value("owner").is_null());
        assert_eq!(r.to_json()["name"], json!("tom"));
    }
}
