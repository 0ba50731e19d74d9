//! Port traits for paged collections.
//!
//! [`CollectionSource`] is the storage interface used by the slice
//! resolver. Implementations live in the infrastructure layer
//! (e.g., `pagewise-storage`). [`Collection`] is a cheap, lazily
//! evaluated query handle over a source, in the spirit of an ORM
//! query set: combinators build a [`CollectionQuery`], and only
//! `count`, `exists`, `fetch` and `get` reach the backend.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::Record;
use crate::order::OrderSpec;
use crate::planner::RelationPlan;
use crate::predicate::Predicate;

// =============================================================================
// Query Description
// =============================================================================

/// A predicate kept or removed from a collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Keep records matching the predicate.
    Include(Predicate),
    /// Drop records matching the predicate.
    Exclude(Predicate),
}

impl Filter {
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Include(p) => p.matches(record),
            Filter::Exclude(p) => !p.matches(record),
        }
    }
}

/// Backend-agnostic description of a collection query.
///
/// Evaluation order is fixed: filters, then ordering, then the
/// `offset`/`limit` window.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    pub record_type: String,
    pub filters: Vec<Filter>,
    /// Explicit ordering; `None` means the record type's natural ordering.
    pub order: Option<OrderSpec>,
    pub offset: usize,
    pub limit: Option<usize>,
    /// Advisory join plan for backends able to honour it.
    pub relations: RelationPlan,
}

impl CollectionQuery {
    pub fn new(record_type: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            filters: Vec::new(),
            order: None,
            offset: 0,
            limit: None,
            relations: RelationPlan::default(),
        }
    }

    /// Whether a record passes every filter (window not considered).
    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Apply the window to a total number of filtered rows.
    pub fn window_len(&self, total: usize) -> usize {
        let available = total.saturating_sub(self.offset);
        match self.limit {
            Some(limit) => available.min(limit),
            None => available,
        }
    }
}

// =============================================================================
// Source Port
// =============================================================================

/// Storage backend able to evaluate [`CollectionQuery`]s.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// Declared natural ordering of a record type (may be empty).
    fn natural_order(&self, record_type: &str) -> Vec<String>;

    /// Number of records in the query window.
    async fn count(&self, query: &CollectionQuery) -> StorageResult<usize>;

    /// Whether the query window holds at least one record.
    async fn exists(&self, query: &CollectionQuery) -> StorageResult<bool> {
        let mut first = query.clone();
        first.limit = Some(first.limit.map_or(1, |l| l.min(1)));
        Ok(self.count(&first).await? > 0)
    }

    /// Materialize the records of the query window, in order.
    async fn fetch(&self, query: &CollectionQuery) -> StorageResult<Vec<Record>>;

    /// Look a record up by key, ignoring any filter.
    async fn get(&self, record_type: &str, pk: u64) -> StorageResult<Option<Record>>;
}

// =============================================================================
// Collection Handle
// =============================================================================

/// Lazily evaluated query handle over a [`CollectionSource`].
#[derive(Clone)]
pub struct Collection {
    source: Arc<dyn CollectionSource>,
    query: CollectionQuery,
}

impl Collection {
    /// Handle over every record of `record_type`.
    pub fn new(source: Arc<dyn CollectionSource>, record_type: impl Into<String>) -> Self {
        Self {
            source,
            query: CollectionQuery::new(record_type),
        }
    }

    pub fn record_type(&self) -> &str {
        &self.query.record_type
    }

    pub fn query(&self) -> &CollectionQuery {
        &self.query
    }

    /// Declared natural ordering of the record type.
    pub fn natural_order(&self) -> Vec<String> {
        self.source.natural_order(&self.query.record_type)
    }

    /// Effective ordering: explicit if set, natural otherwise.
    pub fn ordering(&self) -> OrderSpec {
        match &self.query.order {
            Some(order) => order.clone(),
            None => OrderSpec::from_tokens(self.natural_order(), &[]),
        }
    }

    /// Keep records matching `predicate`.
    ///
    /// Filters apply before the window, so callers filter first and
    /// slice last.
    pub fn filter(&self, predicate: Predicate) -> Self {
        self.with(|q| q.filters.push(Filter::Include(predicate)))
    }

    /// Drop records matching `predicate`.
    pub fn exclude(&self, predicate: Predicate) -> Self {
        self.with(|q| q.filters.push(Filter::Exclude(predicate)))
    }

    pub fn order_by(&self, order: OrderSpec) -> Self {
        self.with(|q| q.order = Some(order))
    }

    pub fn with_relations(&self, relations: RelationPlan) -> Self {
        self.with(|q| q.relations = relations)
    }

    /// Range slice `[start:end]` relative to the current window.
    pub fn slice(&self, start: usize, end: Option<usize>) -> Self {
        self.with(|q| {
            let remaining = q.limit.map(|l| l.saturating_sub(start));
            let requested = end.map(|e| e.saturating_sub(start));
            q.offset = q.offset.saturating_add(start);
            q.limit = match (remaining, requested) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, None) => a,
                (None, b) => b,
            };
        })
    }

    pub async fn count(&self) -> StorageResult<usize> {
        self.source.count(&self.query).await
    }

    pub async fn exists(&self) -> StorageResult<bool> {
        self.source.exists(&self.query).await
    }

    pub async fn fetch(&self) -> StorageResult<Vec<Record>> {
        self.source.fetch(&self.query).await
    }

    /// Look a record of this type up by key, ignoring filters and window.
    pub async fn get(&self, pk: u64) -> StorageResult<Option<Record>> {
        self.source.get(&self.query.record_type, pk).await
    }

    /// Key of the record at `index` within the current window.
    pub async fn pk_at(&self, index: usize) -> StorageResult<Option<u64>> {
        let rows = self.slice(index, Some(index.saturating_add(1))).fetch().await?;
        Ok(rows.first().map(|r| r.pk))
    }

    fn with(&self, f: impl FnOnce(&mut CollectionQuery)) -> Self {
        let mut query = self.query.clone();
        f(&mut query);
        Self {
            source: self.source.clone(),
            query,
        }
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
