//! Shared helper functions for PostgreSQL binding and row conversion.

use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::Postgres;

use pagewise_core::error::{StorageError, StorageResult};
use pagewise_core::models::{Record, Value};
use pagewise_core::registry::RecordType;

/// Row shape produced by the generated `SELECT`s.
#[derive(sqlx::FromRow)]
pub(super) struct RecordRow {
    pub pk: i64,
    pub fields: serde_json::Value,
}

impl RecordRow {
    /// Convert into a [`Record`], dropping the key column from the fields
    /// and coercing declared fields to their kinds.
    pub fn into_record(self, pk_column: &str, declared: Option<&RecordType>) -> StorageResult<Record> {
        let pk = u64::try_from(self.pk).map_err(|_| {
            StorageError::SerializationError(format!("negative key {} in column {}", self.pk, pk_column))
        })?;

        let serde_json::Value::Object(columns) = self.fields else {
            return Err(StorageError::SerializationError(format!(
                "row {} did not serialize to an object",
                pk
            )));
        };

        let mut record = Record::new(pk);
        for (name, value) in columns {
            if name != pk_column {
                record.set(name, Value::from(value));
            }
        }
        if let Some(declared) = declared {
            declared.coerce(&mut record);
        }
        Ok(record)
    }
}

/// Bind a value to a positional parameter.
pub(super) fn bind_value<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    value: &Value,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Timestamp(ts) => query.bind(*ts),
    }
}
