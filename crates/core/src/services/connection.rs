//! Connection field service - composes a resolver pipeline with slicing.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::PaginationResult;
use crate::models::Record;
use crate::order::OrderSpec;
use crate::planner::RelationPlan;
use crate::ports::{
    Collection, Connection, ConnectionSource, DefaultResolver, PageArgs, ResolverLayer,
    SourceResolver,
};
use crate::slice::{Bounds, ConnectionConfig, slice_source, validate_args, within};

// =============================================================================
// ConnectionField
// =============================================================================

/// A paginated field over one record type.
///
/// # Pipeline
///
/// 1. Validate `first`/`last` against the field configuration
/// 2. Run the (layered) resolver
/// 3. Fall back to the default collection when it yields nothing
/// 4. Parse the ordering against the source's natural ordering
/// 5. Slice the source into a [`Connection`]
pub struct ConnectionField {
    name: String,
    default_collection: Collection,
    config: ConnectionConfig,
    resolver: Arc<dyn SourceResolver>,
}

impl ConnectionField {
    pub fn builder(name: impl Into<String>, default_collection: Collection) -> ConnectionFieldBuilder {
        ConnectionFieldBuilder {
            name: name.into(),
            default_collection,
            config: ConnectionConfig::default(),
            resolver: Arc::new(DefaultResolver),
            layers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn record_type(&self) -> &str {
        self.default_collection.record_type()
    }

    /// Resolve one page.
    ///
    /// `order_by` is a comma-joined field list; absent or blank means
    /// the natural ordering. `relations` is attached to collection
    /// sources for backends that can honour it. The resolver and the
    /// slice share a single `config.timeout` deadline.
    #[instrument(skip_all, fields(field = %self.name))]
    pub async fn resolve(
        &self,
        args: &PageArgs,
        order_by: Option<&str>,
        relations: RelationPlan,
    ) -> PaginationResult<Connection<Record>> {
        let bounds = validate_args(&self.name, args, &self.config)?;
        within(self.config.timeout, self.run(args, order_by, relations, bounds)).await
    }

    async fn run(
        &self,
        args: &PageArgs,
        order_by: Option<&str>,
        relations: RelationPlan,
        bounds: Bounds,
    ) -> PaginationResult<Connection<Record>> {
        let source = match self.resolver.resolve(args).await? {
            Some(ConnectionSource::Collection(collection)) => {
                ConnectionSource::Collection(collection.with_relations(relations))
            }
            Some(list @ ConnectionSource::List(_)) => list,
            None => {
                debug!("Resolver returned nothing, using default collection");
                ConnectionSource::Collection(self.default_collection.with_relations(relations))
            }
        };

        let natural = match &source {
            ConnectionSource::Collection(collection) => collection.natural_order(),
            ConnectionSource::List(_) => self.default_collection.natural_order(),
        };
        let order = OrderSpec::parse(order_by.unwrap_or_default(), &natural);
        debug!(order = %order, "Ordering resolved");

        slice_source(&self.name, args, &order, source, bounds, &self.config).await
    }
}

impl fmt::Debug for ConnectionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionField")
            .field("name", &self.name)
            .field("record_type", &self.record_type())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ConnectionField`].
pub struct ConnectionFieldBuilder {
    name: String,
    default_collection: Collection,
    config: ConnectionConfig,
    resolver: Arc<dyn SourceResolver>,
    layers: Vec<Arc<dyn ResolverLayer>>,
}

impl ConnectionFieldBuilder {
    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(mut self, resolver: impl SourceResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Add a layer. The last layer added is the outermost.
    pub fn layer(mut self, layer: impl ResolverLayer + 'static) -> Self {
        self.layers.push(Arc::new(layer));
        self
    }

    pub fn build(self) -> ConnectionField {
        let resolver = self
            .layers
            .iter()
            .fold(self.resolver, |inner, layer| layer.wrap(inner));

        ConnectionField {
            name: self.name,
            default_collection: self.default_collection,
            config: self.config,
            resolver,
        }
    }
}

// =============================================================================
// Layers
// =============================================================================

/// Logs every resolver call with its duration and outcome.
#[derive(Debug, Clone, Default)]
pub struct TracingLayer;

impl ResolverLayer for TracingLayer {
    fn wrap(&self, inner: Arc<dyn SourceResolver>) -> Arc<dyn SourceResolver> {
        Arc::new(Traced { inner })
    }
}

struct Traced {
    inner: Arc<dyn SourceResolver>,
}

#[async_trait]
impl SourceResolver for Traced {
    async fn resolve(&self, args: &PageArgs) -> PaginationResult<Option<ConnectionSource>> {
        let start = Instant::now();
        let result = self.inner.resolve(args).await;
        let outcome = match &result {
            Ok(Some(ConnectionSource::Collection(_))) => "collection",
            Ok(Some(ConnectionSource::List(_))) => "list",
            Ok(None) => "default",
            Err(_) => "error",
        };
        debug!(
            outcome,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Resolver finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PaginationError, StorageResult};
    use crate::ports::{CollectionQuery, CollectionSource};
    use crate::slice::testing::{VecSource, keys, pets};
    use std::sync::Mutex;

    /// Records its name on the way in, then delegates.
    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ResolverLayer for Recording {
        fn wrap(&self, inner: Arc<dyn SourceResolver>) -> Arc<dyn SourceResolver> {
            Arc::new(RecordingResolver {
                name: self.name,
                log: self.log.clone(),
                inner,
            })
        }
    }

    struct RecordingResolver {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        inner: Arc<dyn SourceResolver>,
    }

    #[async_trait]
    impl SourceResolver for RecordingResolver {
        async fn resolve(&self, args: &PageArgs) -> PaginationResult<Option<ConnectionSource>> {
            self.log.lock().unwrap().push(self.name);
            self.inner.resolve(args).await
        }
    }

    struct ListResolver(Vec<Record>);

    #[async_trait]
    impl SourceResolver for ListResolver {
        async fn resolve(&self, _: &PageArgs) -> PaginationResult<Option<ConnectionSource>> {
            Ok(Some(ConnectionSource::List(self.0.clone())))
        }
    }

    fn default_collection() -> Collection {
        Collection::new(VecSource::new("pet", pets(5)), "pet")
    }

    // Test critique: la dernière couche ajoutée est la plus externe
    #[tokio::test]
    async fn test_layers_wrap_in_construction_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let field = ConnectionField::builder("allPets", default_collection())
            .layer(Recording { name: "inner", log: log.clone() })
            .layer(Recording { name: "outer", log: log.clone() })
            .layer(TracingLayer)
            .build();

        field.resolve(&PageArgs::first(1), None, RelationPlan::default()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn test_none_falls_back_to_default_collection() {
        let field = ConnectionField::builder("allPets", default_collection()).build();

        let conn = field
            .resolve(&PageArgs::first(2), Some("-age"), RelationPlan::default())
            .await
            .unwrap();
        assert_eq!(keys(&conn), vec![5, 4]);
    }

    #[tokio::test]
    async fn test_resolver_list_is_sliced_by_position() {
        let field = ConnectionField::builder("allPets", default_collection())
            .resolver(ListResolver(pets(3)))
            .build();

        let conn = field.resolve(&PageArgs::last(1), None, RelationPlan::default()).await.unwrap();
        assert_eq!(keys(&conn), vec![3]);
        assert_eq!(conn.edges[0].cursor.value, "0x2,0x3");
    }

    /// Waits `delay` before deferring to the default collection.
    struct SlowResolver(std::time::Duration);

    #[async_trait]
    impl SourceResolver for SlowResolver {
        async fn resolve(&self, _: &PageArgs) -> PaginationResult<Option<ConnectionSource>> {
            tokio::time::sleep(self.0).await;
            Ok(None)
        }
    }

    /// Counts a window after `delay`.
    struct SlowCount {
        delay: std::time::Duration,
        inner: Arc<VecSource>,
    }

    #[async_trait]
    impl CollectionSource for SlowCount {
        fn natural_order(&self, record_type: &str) -> Vec<String> {
            self.inner.natural_order(record_type)
        }
        async fn count(&self, query: &CollectionQuery) -> StorageResult<usize> {
            tokio::time::sleep(self.delay).await;
            self.inner.count(query).await
        }
        async fn fetch(&self, query: &CollectionQuery) -> StorageResult<Vec<Record>> {
            self.inner.fetch(query).await
        }
        async fn get(&self, record_type: &str, pk: u64) -> StorageResult<Option<Record>> {
            self.inner.get(record_type, pk).await
        }
    }

    // Test critique: resolver et découpage partagent une seule échéance
    #[tokio::test(start_paused = true)]
    async fn test_timeout_covers_whole_pipeline_once() {
        use std::time::Duration;

        let slow = SlowCount {
            delay: Duration::from_millis(60),
            inner: VecSource::new("pet", pets(5)),
        };
        let config = ConnectionConfig {
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        // 60 ms de resolver + 60 ms de comptage: chaque étape tient seule, pas la somme
        let field = ConnectionField::builder("allPets", Collection::new(Arc::new(slow), "pet"))
            .config(config)
            .resolver(SlowResolver(Duration::from_millis(60)))
            .build();

        let err = field
            .resolve(&PageArgs::first(2), None, RelationPlan::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::Timeout(d) if d == Duration::from_millis(100)));
    }

    // La validation précède le resolver
    #[tokio::test]
    async fn test_validation_runs_before_resolver() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let field = ConnectionField::builder("allPets", default_collection())
            .config(ConnectionConfig::default().with_max_limit(3))
            .layer(Recording { name: "resolver", log: log.clone() })
            .build();

        let err = field
            .resolve(&PageArgs::first(5), None, RelationPlan::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PaginationError::LimitExceeded { .. }));
        assert!(log.lock().unwrap().is_empty());
    }
}
