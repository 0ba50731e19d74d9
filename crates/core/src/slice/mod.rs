//! Slice resolution: turning pagination arguments into a page.
//!
//! [`resolve_connection`] validates the arguments, then slices the
//! source with one of three strategies:
//!
//! - [`Strategy::Keyset`] - cursors carry the record key; bounds become
//!   keyset predicates over the ordering ([`keyset`]).
//! - [`Strategy::Offset`] - cursors carry the absolute position and the
//!   key; anchors are relocated by a bounded search ([`offset`]).
//! - materialized lists - array-slice arithmetic over indexed cursors
//!   ([`list`]).

mod keyset;
mod list;
mod offset;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::cursor::{CursorCodec, DecodedCursor};
use crate::error::{PaginationError, PaginationResult};
use crate::metrics::{self, ResolveTimer};
use crate::models::Record;
use crate::order::OrderSpec;
use crate::ports::{Connection, ConnectionSource, Cursor, Edge, PageArgs};

/// Default number of positions searched on each side of a stale anchor.
pub const DEFAULT_SEARCH_WINDOW: usize = 10;

// =============================================================================
// Configuration
// =============================================================================

/// Slicing strategy for collection sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Key cursors and keyset predicates.
    #[default]
    Keyset,
    /// Indexed cursors and positional windows.
    Offset,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Keyset => "keyset",
            Strategy::Offset => "offset",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = PaginationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyset" => Ok(Strategy::Keyset),
            "offset" => Ok(Strategy::Offset),
            other => Err(PaginationError::Configuration(format!(
                "unknown strategy `{}` (expected `keyset` or `offset`)",
                other
            ))),
        }
    }
}

/// What to do with a `before`/`after` cursor that does not decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InvalidCursorPolicy {
    /// Log, count, and treat the bound as absent.
    Ignore,
    /// Fail with [`PaginationError::InvalidCursor`].
    #[default]
    Reject,
}

impl FromStr for InvalidCursorPolicy {
    type Err = PaginationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(InvalidCursorPolicy::Ignore),
            "reject" => Ok(InvalidCursorPolicy::Reject),
            other => Err(PaginationError::Configuration(format!(
                "unknown invalid-cursor policy `{}` (expected `ignore` or `reject`)",
                other
            ))),
        }
    }
}

/// What to do with a cursor whose anchor cannot be found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StaleCursorPolicy {
    /// Log, count, and treat the bound as absent.
    #[default]
    Ignore,
    /// Fail with [`PaginationError::StaleCursor`].
    Reject,
}

impl FromStr for StaleCursorPolicy {
    type Err = PaginationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(StaleCursorPolicy::Ignore),
            "reject" => Ok(StaleCursorPolicy::Reject),
            other => Err(PaginationError::Configuration(format!(
                "unknown stale-cursor policy `{}` (expected `ignore` or `reject`)",
                other
            ))),
        }
    }
}

/// Per-field pagination settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Maximum page size; requests must then carry `first` or `last`.
    pub max_limit: Option<usize>,
    /// Require `first` or `last` even without a maximum.
    pub enforce_first_or_last: bool,
    pub strategy: Strategy,
    pub invalid_cursor: InvalidCursorPolicy,
    pub stale_cursor: StaleCursorPolicy,
    /// Positions searched on each side of a moved anchor (offset strategy).
    pub search_window: usize,
    /// Count the window between cursor bounds.
    pub include_total_count: bool,
    /// Upper bound on the whole resolution.
    pub timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_limit: None,
            enforce_first_or_last: false,
            strategy: Strategy::Keyset,
            invalid_cursor: InvalidCursorPolicy::Reject,
            stale_cursor: StaleCursorPolicy::Ignore,
            search_window: DEFAULT_SEARCH_WINDOW,
            include_total_count: false,
            timeout: None,
        }
    }
}

impl ConnectionConfig {
    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = Some(max_limit);
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_total_count(mut self) -> Self {
        self.include_total_count = true;
        self
    }
}

// =============================================================================
// Argument Validation
// =============================================================================

/// Validated, non-negative page size bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub first: Option<usize>,
    pub last: Option<usize>,
}

/// Check `first`/`last` against the field's configuration.
///
/// Checks run in a fixed order: sign, presence, maximum.
pub fn validate_args(
    field: &str,
    args: &PageArgs,
    config: &ConnectionConfig,
) -> PaginationResult<Bounds> {
    let first = non_negative(field, "first", args.first)?;
    let last = non_negative(field, "last", args.last)?;

    if config.enforce_first_or_last && first.is_none() && last.is_none() {
        return Err(PaginationError::MissingPaginationBound {
            field: field.to_string(),
        });
    }

    if let Some(max) = config.max_limit {
        for requested in [first, last].into_iter().flatten() {
            if requested > max {
                return Err(PaginationError::LimitExceeded {
                    field: field.to_string(),
                    requested,
                    max,
                });
            }
        }
        if first.is_none() && last.is_none() {
            return Err(PaginationError::Configuration(format!(
                "the `{}` connection has a maximum page size of {} but no `first` or `last` was provided",
                field, max
            )));
        }
    }

    Ok(Bounds { first, last })
}

fn non_negative(field: &str, argument: &'static str, value: Option<i64>) -> PaginationResult<Option<usize>> {
    match value {
        None => Ok(None),
        Some(v) => usize::try_from(v)
            .map(Some)
            .map_err(|_| PaginationError::NegativeBound {
                field: field.to_string(),
                argument,
                value: v,
            }),
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolve one page of `source` under `order`.
///
/// `field` names the connection in errors and logs. The whole
/// resolution, anchor lookups included, runs under `config.timeout`
/// when one is set.
pub async fn resolve_connection(
    field: &str,
    args: &PageArgs,
    order: &OrderSpec,
    source: ConnectionSource,
    config: &ConnectionConfig,
) -> PaginationResult<Connection<Record>> {
    let bounds = validate_args(field, args, config)?;
    within(config.timeout, slice_source(field, args, order, source, bounds, config)).await
}

/// Slice an already validated request. No time limit is applied here;
/// callers wrap their whole pipeline with [`within`].
#[instrument(skip_all, fields(field = field, strategy = tracing::field::Empty))]
pub(crate) async fn slice_source(
    field: &str,
    args: &PageArgs,
    order: &OrderSpec,
    source: ConnectionSource,
    bounds: Bounds,
    config: &ConnectionConfig,
) -> PaginationResult<Connection<Record>> {
    let _timer = ResolveTimer::new();

    let strategy = match &source {
        ConnectionSource::List(_) => "list",
        ConnectionSource::Collection(_) => config.strategy.as_str(),
    };
    tracing::Span::current().record("strategy", strategy);

    let connection = match source {
        ConnectionSource::Collection(collection) => match config.strategy {
            Strategy::Keyset => keyset::resolve(&collection, order, args, bounds, config).await?,
            Strategy::Offset => offset::resolve(&collection, order, args, bounds, config).await?,
        },
        ConnectionSource::List(records) => list::resolve(records, args, bounds, config)?,
    };

    metrics::record_connection_resolved(strategy);
    debug!(
        edges = connection.edges.len(),
        has_previous_page = connection.page_info.has_previous_page,
        has_next_page = connection.page_info.has_next_page,
        "Connection resolved"
    );
    Ok(connection)
}

/// Run `future` under an optional time limit.
pub(crate) async fn within<T>(
    limit: Option<Duration>,
    future: impl Future<Output = PaginationResult<T>>,
) -> PaginationResult<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| PaginationError::Timeout(limit))?,
        None => future.await,
    }
}

/// Decode an optional bound, applying the invalid-cursor policy.
fn decode_bound(
    codec: CursorCodec,
    cursor: Option<&Cursor>,
    argument: &'static str,
    config: &ConnectionConfig,
) -> PaginationResult<Option<DecodedCursor>> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    match codec.decode(cursor) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            metrics::record_cursor_decode_failure(argument);
            match config.invalid_cursor {
                InvalidCursorPolicy::Reject => Err(e),
                InvalidCursorPolicy::Ignore => {
                    warn!(argument, cursor = %cursor, error = %e, "⚠️  Ignoring invalid cursor");
                    Ok(None)
                }
            }
        }
    }
}

/// Apply the stale-cursor policy to an anchor that was not found.
fn stale_anchor(
    argument: &'static str,
    cursor: DecodedCursor,
    config: &ConnectionConfig,
) -> PaginationResult<()> {
    metrics::record_stale_cursor(argument);
    match config.stale_cursor {
        StaleCursorPolicy::Reject => Err(PaginationError::StaleCursor(format!(
            "`{}` anchor {:#x} is no longer in the collection",
            argument, cursor.pk
        ))),
        StaleCursorPolicy::Ignore => {
            warn!(argument, pk = cursor.pk, index = ?cursor.index, "⚠️  Ignoring stale cursor");
            Ok(())
        }
    }
}

/// Build edges for records located at `start..`, or keyed when
/// `start` is `None`.
fn edges(codec: CursorCodec, records: Vec<Record>, start: Option<usize>) -> Vec<Edge<Record>> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, node)| Edge {
            cursor: codec.encode(&node, start.map(|s| s + i)),
            node,
        })
        .collect()
}

fn to_total(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Vec-backed collection source shared by the strategy tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock};

    use async_trait::async_trait;

    use crate::error::StorageResult;
    use crate::models::Record;
    use crate::order::OrderSpec;
    use crate::ports::{Collection, CollectionQuery, CollectionSource};

    #[derive(Default)]
    pub struct VecSource {
        pub tables: RwLock<HashMap<String, Vec<Record>>>,
        pub natural: Vec<String>,
        pub fetches: AtomicUsize,
    }

    impl VecSource {
        pub fn new(record_type: &str, records: Vec<Record>) -> Arc<Self> {
            let mut tables = HashMap::new();
            tables.insert(record_type.to_string(), records);
            Arc::new(Self {
                tables: RwLock::new(tables),
                ..Default::default()
            })
        }

        pub fn insert(&self, record_type: &str, record: Record) {
            self.tables
                .write()
                .unwrap()
                .entry(record_type.to_string())
                .or_default()
                .push(record);
        }

        pub fn remove(&self, record_type: &str, pk: u64) {
            if let Some(rows) = self.tables.write().unwrap().get_mut(record_type) {
                rows.retain(|r| r.pk != pk);
            }
        }

        fn window(&self, query: &CollectionQuery) -> Vec<Record> {
            let tables = self.tables.read().unwrap();
            let mut rows: Vec<Record> = tables
                .get(&query.record_type)
                .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
                .unwrap_or_default();
            let order = query
                .order
                .clone()
                .unwrap_or_else(|| OrderSpec::from_tokens(&self.natural, &[]));
            order.sort(&mut rows);
            let len = query.window_len(rows.len());
            rows.into_iter().skip(query.offset).take(len).collect()
        }
    }

    #[async_trait]
    impl CollectionSource for VecSource {
        fn natural_order(&self, _: &str) -> Vec<String> {
            self.natural.clone()
        }

        async fn count(&self, query: &CollectionQuery) -> StorageResult<usize> {
            Ok(self.window(query).len())
        }

        async fn fetch(&self, query: &CollectionQuery) -> StorageResult<Vec<Record>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.window(query))
        }

        async fn get(&self, record_type: &str, pk: u64) -> StorageResult<Option<Record>> {
            let tables = self.tables.read().unwrap();
            Ok(tables
                .get(record_type)
                .and_then(|rows| rows.iter().find(|r| r.pk == pk).cloned()))
        }
    }

    /// Pets with keys 1..=n and ages `10 * pk`.
    pub fn pets(n: u64) -> Vec<Record> {
        (1..=n)
            .map(|pk| Record::new(pk).with("age", (pk * 10) as i64))
            .collect()
    }

    pub fn collection(source: &Arc<VecSource>) -> Collection {
        Collection::new(source.clone(), "pet")
    }

    pub fn keys(connection: &crate::ports::Connection<Record>) -> Vec<u64> {
        connection.nodes().map(|r| r.pk).collect()
    }
}
