//! In-memory collection source.
//!
//! Records are kept per record type in snapshot tables guarded by a
//! `tokio::sync::RwLock`. Queries are evaluated in the same order as
//! the SQL backend: filters, ordering, then the window.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, trace};

use pagewise_core::error::{StorageError, StorageResult};
use pagewise_core::models::{MAX_KEY, Record};
use pagewise_core::order::OrderSpec;
use pagewise_core::ports::{CollectionQuery, CollectionSource};
use pagewise_core::registry::{RecordTypeDef, TypeRegistry};

// =============================================================================
// Fixtures
// =============================================================================

/// JSON fixture: optional schema plus records per type.
///
/// ```json
/// {
///   "schema": [{"name": "pet", "fields": [{"name": "age", "kind": "int"}]}],
///   "types": {"pet": [{"pk": 1, "fields": {"age": 3}}]}
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub schema: Vec<RecordTypeDef>,
    #[serde(default)]
    pub types: BTreeMap<String, Vec<Record>>,
}

impl Fixture {
    pub fn from_json(raw: &str) -> StorageResult<Self> {
        serde_json::from_str(raw).map_err(|e| StorageError::FixtureError(e.to_string()))
    }

    /// Read and parse a fixture file.
    pub async fn load(path: &Path) -> StorageResult<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            StorageError::FixtureError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Registry built from the fixture schema.
    pub fn registry(&self) -> StorageResult<TypeRegistry> {
        let mut registry = TypeRegistry::new();
        registry
            .register_all(self.schema.clone())
            .map_err(|e| StorageError::FixtureError(e.to_string()))?;
        Ok(registry)
    }
}

// =============================================================================
// Source
// =============================================================================

/// Snapshot tables evaluated in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    orderings: HashMap<String, Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a record type with its natural ordering.
    pub fn with_type<I, S>(mut self, record_type: impl Into<String>, ordering: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let record_type = record_type.into();
        self.orderings
            .insert(record_type.clone(), ordering.into_iter().map(Into::into).collect());
        self.tables.get_mut().entry(record_type).or_default();
        self
    }

    /// Declare every type of `registry`.
    pub fn from_registry(registry: &TypeRegistry) -> Self {
        registry.names().into_iter().fold(Self::new(), |source, name| {
            let ordering = registry
                .get(name)
                .map(|t| t.ordering.clone())
                .unwrap_or_default();
            source.with_type(name, ordering)
        })
    }

    /// Load a fixture: types from its schema, then its records.
    ///
    /// Declared fields are coerced to their kinds. Duplicate keys within
    /// a type and keys above [`MAX_KEY`] are rejected.
    pub fn from_fixture(fixture: &Fixture) -> StorageResult<Self> {
        Self::from_fixture_with(fixture, &fixture.registry()?)
    }

    /// Load fixture records against an externally supplied registry.
    #[instrument(skip_all)]
    pub fn from_fixture_with(fixture: &Fixture, registry: &TypeRegistry) -> StorageResult<Self> {
        let mut source = Self::from_registry(registry);

        for (record_type, records) in &fixture.types {
            let mut rows = Vec::with_capacity(records.len());
            let mut seen = std::collections::HashSet::new();
            for record in records {
                if record.pk > MAX_KEY {
                    return Err(StorageError::SerializationError(format!(
                        "key {} for type `{}` exceeds the bigint range",
                        record.pk, record_type
                    )));
                }
                if !seen.insert(record.pk) {
                    return Err(StorageError::FixtureError(format!(
                        "duplicate key {} for type `{}`",
                        record.pk, record_type
                    )));
                }
                let mut record = record.clone();
                if let Some(declared) = registry.get(record_type) {
                    declared.coerce(&mut record);
                }
                rows.push(record);
            }
            debug!(record_type = %record_type, rows = rows.len(), "Fixture table loaded");
            source.orderings.entry(record_type.clone()).or_default();
            source.tables.get_mut().insert(record_type.clone(), rows);
        }

        info!(types = source.orderings.len(), "📦 Fixture loaded");
        Ok(source)
    }

    /// Insert or replace a record.
    pub async fn insert(&self, record_type: &str, record: Record) {
        let mut tables = self.tables.write().await;
        let rows = tables.entry(record_type.to_string()).or_default();
        rows.retain(|r| r.pk != record.pk);
        rows.push(record);
    }

    /// Remove a record; returns whether it existed.
    pub async fn remove(&self, record_type: &str, pk: u64) -> bool {
        let mut tables = self.tables.write().await;
        match tables.get_mut(record_type) {
            Some(rows) => {
                let before = rows.len();
                rows.retain(|r| r.pk != pk);
                rows.len() != before
            }
            None => false,
        }
    }

    /// Number of records stored for a type.
    pub async fn len(&self, record_type: &str) -> usize {
        self.tables
            .read()
            .await
            .get(record_type)
            .map_or(0, Vec::len)
    }

    async fn filtered(&self, query: &CollectionQuery) -> StorageResult<Vec<Record>> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(&query.record_type)
            .ok_or_else(|| StorageError::UnknownRecordType(query.record_type.clone()))?;
        Ok(rows.iter().filter(|r| query.matches(r)).cloned().collect())
    }
}

#[async_trait]
impl CollectionSource for MemorySource {
    fn natural_order(&self, record_type: &str) -> Vec<String> {
        self.orderings.get(record_type).cloned().unwrap_or_default()
    }

    async fn count(&self, query: &CollectionQuery) -> StorageResult<usize> {
        let matching = self.filtered(query).await?.len();
        Ok(query.window_len(matching))
    }

    async fn fetch(&self, query: &CollectionQuery) -> StorageResult<Vec<Record>> {
        let mut rows = self.filtered(query).await?;
        let order = query
            .order
            .clone()
            .unwrap_or_else(|| OrderSpec::from_tokens(self.natural_order(&query.record_type), &[]));
        order.sort(&mut rows);

        let len = query.window_len(rows.len());
        trace!(
            record_type = %query.record_type,
            offset = query.offset,
            len,
            eager = ?query.relations.eager,
            "Window evaluated"
        );
        Ok(rows.into_iter().skip(query.offset).take(len).collect())
    }

    async fn get(&self, record_type: &str, pk: u64) -> StorageResult<Option<Record>> {
        let tables = self.tables.read().await;
        let rows = tables
            .get(record_type)
            .ok_or_else(|| StorageError::UnknownRecordType(record_type.to_string()))?;
        Ok(rows.iter().find(|r| r.pk == pk).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pagewise_core::ports::{Collection, Cursor, PageArgs};
    use pagewise_core::predicate::Predicate;
    use pagewise_core::slice::{ConnectionConfig, Strategy};
    use pagewise_core::{models::Value, resolve_connection};

    const FIXTURE: &str = r#"{
        "schema": [
            {"name": "pet", "ordering": ["-age"], "fields": [
                {"name": "name", "kind": "text"},
                {"name": "age", "kind": "int"},
                {"name": "born", "kind": "timestamp"}
            ]}
        ],
        "types": {
            "pet": [
                {"pk": 1, "fields": {"name": "Rex", "age": 3, "born": "2021-05-01T00:00:00Z"}},
                {"pk": 2, "fields": {"name": "Tom", "age": 7}},
                {"pk": 3, "fields": {"name": "Kit", "age": 3}},
                {"pk": 4, "fields": {"name": "Max", "age": 1}}
            ]
        }
    }"#;

    fn source() -> Arc<MemorySource> {
        let fixture = Fixture::from_json(FIXTURE).unwrap();
        Arc::new(MemorySource::from_fixture(&fixture).unwrap())
    }

    #[tokio::test]
    async fn test_fixture_natural_order_and_coercion() {
        let source = source();
        let pets = Collection::new(source.clone(), "pet");

        // -age puis pk (départage)
        let keys: Vec<u64> = pets.fetch().await.unwrap().iter().map(|r| r.pk).collect();
        assert_eq!(keys, vec![2, 1, 3, 4]);

        let rex = pets.get(1).await.unwrap().unwrap();
        assert!(matches!(rex.value("born").into_owned(), Value::Timestamp(_)));
    }

    #[tokio::test]
    async fn test_window_and_filters() {
        let source = source();
        let pets = Collection::new(source.clone(), "pet");
        let anchor = pets.get(1).await.unwrap().unwrap();
        let after = pets.filter(Predicate::after(&pets.ordering(), &anchor));

        assert_eq!(after.count().await.unwrap(), 2);
        assert_eq!(after.slice(1, None).fetch().await.unwrap()[0].pk, 4);
        assert_eq!(pets.slice(1, Some(3)).count().await.unwrap(), 2);
        assert!(!pets.slice(4, None).exists().await.unwrap());
    }

    // Test critique: les doublons de clé dans une fixture sont refusés
    #[test]
    fn test_fixture_rejects_duplicate_keys() {
        let fixture = Fixture::from_json(r#"{"types": {"pet": [{"pk": 1}, {"pk": 1}]}}"#).unwrap();
        let err = MemorySource::from_fixture(&fixture).unwrap_err();
        assert!(err.to_string().contains("duplicate key 1"));

        assert!(Fixture::from_json("{").is_err());
    }

    // Test critique: une clé hors de la plage bigint est refusée au chargement
    #[test]
    fn test_fixture_rejects_key_above_bigint_range() {
        let fixture =
            Fixture::from_json(r#"{"types": {"pet": [{"pk": 1}, {"pk": 9223372036854775813}]}}"#)
                .unwrap();
        let err = MemorySource::from_fixture(&fixture).unwrap_err();
        assert!(matches!(err, StorageError::SerializationError(_)));
        assert!(err.to_string().contains("9223372036854775813"));

        let fixture = Fixture::from_json(r#"{"types": {"pet": [{"pk": 9223372036854775807}]}}"#).unwrap();
        assert!(MemorySource::from_fixture(&fixture).is_ok());
    }

    #[tokio::test]
    async fn test_fixture_with_external_registry() {
        use pagewise_core::registry::{FieldKind, RecordType};

        let mut registry = TypeRegistry::new();
        registry
            .register(RecordType::new("pet").field("age", FieldKind::Float).ordering(["age"]))
            .unwrap();
        let fixture =
            Fixture::from_json(r#"{"types": {"pet": [{"pk": 1, "fields": {"age": 4}}, {"pk": 2, "fields": {"age": 2}}]}}"#)
                .unwrap();
        let source = Arc::new(MemorySource::from_fixture_with(&fixture, &registry).unwrap());
        let pets = Collection::new(source, "pet");

        let records = pets.fetch().await.unwrap();
        assert_eq!(records.iter().map(|r| r.pk).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(records[0].value("age").into_owned(), Value::Float(2.0));
    }

    #[tokio::test]
    async fn test_unknown_type_is_an_error() {
        let pets = Collection::new(source(), "dinosaur");
        assert!(matches!(
            pets.count().await.unwrap_err(),
            StorageError::UnknownRecordType(_)
        ));
    }

    // Test critique: le curseur indexé retrouve son ancre après insertion
    #[tokio::test]
    async fn test_offset_relocation_after_insert() {
        let source = source();
        let config = ConnectionConfig::default().with_strategy(Strategy::Offset);
        let order = OrderSpec::parse("", &source.natural_order("pet"));
        let pets = || Collection::new(source.clone(), "pet");

        let first = resolve_connection("allPets", &PageArgs::first(2), &order, pets().into(), &config)
            .await
            .unwrap();
        let end = first.page_info.end_cursor.clone().unwrap();
        assert_eq!(end, Cursor::new("0x1,0x1"));

        // Un animal plus âgé passe en tête
        source.insert("pet", Record::new(9).with("age", 12i64)).await;
        assert_eq!(source.len("pet").await, 5);

        let next = resolve_connection("allPets", &PageArgs::first(2).after(end), &order, pets().into(), &config)
            .await
            .unwrap();
        let keys: Vec<u64> = next.nodes().map(|r| r.pk).collect();
        assert_eq!(keys, vec![3, 4]);

        assert!(source.remove("pet", 9).await);
        assert!(!source.remove("pet", 9).await);
    }
}
