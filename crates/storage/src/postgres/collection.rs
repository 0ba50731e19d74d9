//! PostgreSQL implementation of `CollectionSource`.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument, trace};

use pagewise_core::error::{StorageError, StorageResult};
use pagewise_core::models::Record;
use pagewise_core::order::OrderSpec;
use pagewise_core::ports::{CollectionQuery, CollectionSource};
use pagewise_core::registry::{RecordType, TypeRegistry};

use super::database::Database;
use super::helpers::{RecordRow, bind_value};
use super::sql::{self, SqlFragment, TableMapping};

// =============================================================================
// Source Implementation
// =============================================================================

/// A mapped record type.
#[derive(Debug, Clone)]
struct MappedType {
    table: TableMapping,
    declared: Option<RecordType>,
}

/// Collection source reading record types from PostgreSQL tables.
///
/// Rows are returned whole (`to_jsonb`), so any column can be used for
/// ordering and filtering without declaring it first.
pub struct PgSource {
    pool: PgPool,
    types: HashMap<String, MappedType>,
}

impl PgSource {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            types: HashMap::new(),
        }
    }

    /// Map a record type to a table.
    pub fn map_type(mut self, record_type: impl Into<String>, table: TableMapping) -> Self {
        self.types.insert(
            record_type.into(),
            MappedType {
                table,
                declared: None,
            },
        );
        self
    }

    /// Map every registered type to the table of the same name, keyed by `id`.
    pub fn from_registry(db: &Database, registry: &TypeRegistry) -> StorageResult<Self> {
        let mut source = Self::new(db);
        for name in registry.names() {
            let declared = registry
                .get(name)
                .cloned()
                .ok_or_else(|| StorageError::UnknownRecordType(name.to_string()))?;
            source.types.insert(
                name.to_string(),
                MappedType {
                    table: TableMapping::new(name, "id")?,
                    declared: Some(declared),
                },
            );
        }
        debug!(types = source.types.len(), "PostgreSQL types mapped");
        Ok(source)
    }

    fn mapped(&self, record_type: &str) -> StorageResult<&MappedType> {
        self.types
            .get(record_type)
            .ok_or_else(|| StorageError::UnknownRecordType(record_type.to_string()))
    }

    async fn fetch_rows(&self, mapped: &MappedType, fragment: SqlFragment) -> StorageResult<Vec<Record>> {
        trace!(sql = %fragment.sql, params = fragment.params.len(), "Executing query");

        let mut query = sqlx::query_as::<_, RecordRow>(&fragment.sql);
        for value in &fragment.params {
            query = bind_value(query, value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

        rows.into_iter()
            .map(|row| row.into_record(&mapped.table.pk_column, mapped.declared.as_ref()))
            .collect()
    }
}

#[async_trait]
impl CollectionSource for PgSource {
    fn natural_order(&self, record_type: &str) -> Vec<String> {
        self.types
            .get(record_type)
            .and_then(|t| t.declared.as_ref())
            .map(|t| t.ordering.clone())
            .unwrap_or_default()
    }

    #[instrument(skip_all, fields(record_type = %query.record_type))]
    async fn count(&self, query: &CollectionQuery) -> StorageResult<usize> {
        let mapped = self.mapped(&query.record_type)?;
        let fragment = sql::count(&mapped.table, query)?;
        trace!(sql = %fragment.sql, "Executing count");

        let mut q = sqlx::query_as::<_, (i64,)>(&fragment.sql);
        for value in &fragment.params {
            q = bind_value(q, value);
        }
        let (count,) = q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

        usize::try_from(count).map_err(|_| StorageError::QueryError(format!("negative count {}", count)))
    }

    #[instrument(skip_all, fields(record_type = %query.record_type))]
    async fn fetch(&self, query: &CollectionQuery) -> StorageResult<Vec<Record>> {
        let mapped = self.mapped(&query.record_type)?;
        let order = query
            .order
            .clone()
            .unwrap_or_else(|| OrderSpec::from_tokens(self.natural_order(&query.record_type), &[]));

        if !query.relations.is_empty() {
            // Rows are read as JSON; relation plans are logged for inspection only
            debug!(
                eager = ?query.relations.eager,
                batched = ?query.relations.batched,
                "Relation plan attached"
            );
        }

        let fragment = sql::select(&mapped.table, query, &order)?;
        self.fetch_rows(mapped, fragment).await
    }

    async fn get(&self, record_type: &str, pk: u64) -> StorageResult<Option<Record>> {
        let mapped = self.mapped(record_type)?;
        let fragment = sql::get(&mapped.table, pk)?;
        Ok(self.fetch_rows(mapped, fragment).await?.into_iter().next())
    }
}
