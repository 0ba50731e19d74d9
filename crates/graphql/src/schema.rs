//! Demo GraphQL schema over `reporter` and `article` record types.

use std::sync::Arc;

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ID, Object, ObjectType, Result, Schema,
    SchemaBuilder,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pagewise_core::error::{PaginationResult, RegistryResult};
use pagewise_core::models::{Record, Value};
use pagewise_core::order::OrderSpec;
use pagewise_core::ports::{
    Collection, CollectionSource, Connection, ConnectionSource, PageArgs, SourceResolver,
};
use pagewise_core::predicate::Predicate;
use pagewise_core::registry::{FieldKind, RecordType, TypeRegistry};
use pagewise_core::services::{ConnectionField, TracingLayer};
use pagewise_core::slice::ConnectionConfig;

use crate::connection::{graphql_error, page_args, relation_plan, validate_order_by};
use crate::define_connection;

/// Maximum query depth allowed.
pub const MAX_QUERY_DEPTH: usize = 15;

/// Maximum query complexity allowed.
pub const MAX_QUERY_COMPLEXITY: usize = 500;

/// Record types served by [`DemoQuery`].
///
/// Reporters are in key order; articles newest first.
pub fn demo_registry() -> RegistryResult<TypeRegistry> {
    let mut registry = TypeRegistry::new();
    registry.register(
        RecordType::new("reporter")
            .field("first_name", FieldKind::Text)
            .field("last_name", FieldKind::Text)
            .field("email", FieldKind::Text)
            .field(
                "articles",
                FieldKind::ToMany {
                    target: "article".into(),
                },
            ),
    )?;
    registry.register(
        RecordType::new("article")
            .field("headline", FieldKind::Text)
            .field("pub_date", FieldKind::Timestamp)
            .field(
                "reporter",
                FieldKind::ToOne {
                    target: "reporter".into(),
                },
            )
            .ordering(["-pub_date"]),
    )?;
    registry.validate()?;
    Ok(registry)
}

// -----------------------------------------------------------------------------
// Node Types
// -----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Reporter(Record);

impl From<Record> for Reporter {
    fn from(record: Record) -> Self {
        Self(record)
    }
}

#[Object]
impl Reporter {
    async fn id(&self) -> ID {
        ID::from(self.0.pk.to_string())
    }

    async fn first_name(&self) -> Option<String> {
        text(&self.0, "first_name")
    }

    async fn last_name(&self) -> Option<String> {
        text(&self.0, "last_name")
    }

    async fn email(&self) -> Option<String> {
        text(&self.0, "email")
    }

    /// Articles written by this reporter, paginated in memory.
    #[allow(clippy::too_many_arguments)]
    async fn articles(
        &self,
        ctx: &Context<'_>,
        first: Option<i32>,
        after: Option<String>,
        last: Option<i32>,
        before: Option<String>,
        order_by: Option<String>,
    ) -> Result<ArticleConnection> {
        validate_order_by(&order_by)?;
        let source = ctx.data::<Arc<dyn CollectionSource>>()?;
        let config = ctx.data::<ConnectionConfig>()?;

        let written = Collection::new(source.clone(), "article")
            .filter(Predicate::equals("reporter", self.0.pk as i64));
        let order = OrderSpec::parse(order_by.as_deref().unwrap_or_default(), &written.natural_order());

        let field = ConnectionField::builder("articles", written.clone())
            .config(config.clone())
            .resolver(Materialized(written.order_by(order)))
            .layer(TracingLayer)
            .build();

        let args = page_args(first, after, last, before)?;
        resolve(ctx, &field, &args, order_by.as_deref()).await.map(Into::into)
    }
}

#[derive(Debug, Clone)]
pub struct Article(Record);

impl From<Record> for Article {
    fn from(record: Record) -> Self {
        Self(record)
    }
}

#[Object]
impl Article {
    async fn id(&self) -> ID {
        ID::from(self.0.pk.to_string())
    }

    async fn headline(&self) -> Option<String> {
        text(&self.0, "headline")
    }

    async fn pub_date(&self) -> Option<DateTime<Utc>> {
        match &*self.0.value("pub_date") {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    async fn reporter(&self, ctx: &Context<'_>) -> Result<Option<Reporter>> {
        let Some(pk) = self.0.value("reporter").as_i64() else {
            return Ok(None);
        };
        let Ok(pk) = u64::try_from(pk) else {
            return Ok(None);
        };
        let source = ctx.data::<Arc<dyn CollectionSource>>()?;
        let reporter = source
            .get("reporter", pk)
            .await
            .map_err(|e| graphql_error(e.into()))?;
        Ok(reporter.map(Reporter::from))
    }
}

fn text(record: &Record, field: &str) -> Option<String> {
    record.value(field).as_str().map(str::to_string)
}

define_connection!(Reporter, Record, ReporterEdge, ReporterConnection);
define_connection!(Article, Record, ArticleEdge, ArticleConnection);

// -----------------------------------------------------------------------------
// Resolvers
// -----------------------------------------------------------------------------

/// Serves an already-ordered collection as a materialised list.
struct Materialized(Collection);

#[async_trait]
impl SourceResolver for Materialized {
    async fn resolve(&self, _args: &PageArgs) -> PaginationResult<Option<ConnectionSource>> {
        Ok(Some(ConnectionSource::List(self.0.fetch().await?)))
    }
}

async fn resolve(
    ctx: &Context<'_>,
    field: &ConnectionField,
    args: &PageArgs,
    order_by: Option<&str>,
) -> Result<Connection<Record>> {
    let registry = ctx.data::<Arc<TypeRegistry>>()?;
    let plan = relation_plan(&ctx.field(), field.record_type(), registry.as_ref());
    field
        .resolve(args, order_by, plan)
        .await
        .map_err(graphql_error)
}

// -----------------------------------------------------------------------------
// Query Root
// -----------------------------------------------------------------------------

#[derive(Default)]
pub struct DemoQuery;

#[Object]
impl DemoQuery {
    /// Paginated reporters.
    #[allow(clippy::too_many_arguments)]
    async fn reporters(
        &self,
        ctx: &Context<'_>,
        first: Option<i32>,
        after: Option<String>,
        last: Option<i32>,
        before: Option<String>,
        order_by: Option<String>,
    ) -> Result<ReporterConnection> {
        validate_order_by(&order_by)?;
        let field = collection_field(ctx, "reporters", "reporter")?;
        let args = page_args(first, after, last, before)?;
        resolve(ctx, &field, &args, order_by.as_deref()).await.map(Into::into)
    }

    /// Paginated articles, newest first by default.
    #[allow(clippy::too_many_arguments)]
    async fn articles(
        &self,
        ctx: &Context<'_>,
        first: Option<i32>,
        after: Option<String>,
        last: Option<i32>,
        before: Option<String>,
        order_by: Option<String>,
    ) -> Result<ArticleConnection> {
        validate_order_by(&order_by)?;
        let field = collection_field(ctx, "articles", "article")?;
        let args = page_args(first, after, last, before)?;
        resolve(ctx, &field, &args, order_by.as_deref()).await.map(Into::into)
    }

    /// Registered record type names.
    async fn record_types(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let registry = ctx.data::<Arc<TypeRegistry>>()?;
        Ok(registry.names().into_iter().map(str::to_string).collect())
    }
}

fn collection_field(ctx: &Context<'_>, name: &str, record_type: &str) -> Result<ConnectionField> {
    let source = ctx.data::<Arc<dyn CollectionSource>>()?;
    let config = ctx.data::<ConnectionConfig>()?;
    Ok(
        ConnectionField::builder(name, Collection::new(source.clone(), record_type))
            .config(config.clone())
            .layer(TracingLayer)
            .build(),
    )
}

// -----------------------------------------------------------------------------
// Schema Builders
// -----------------------------------------------------------------------------

/// Schema builder for any query root, with the engine's context data and
/// DoS protection (depth and complexity limits) applied.
pub fn schema_builder<Q>(
    query: Q,
    source: Arc<dyn CollectionSource>,
    registry: Arc<TypeRegistry>,
    config: ConnectionConfig,
) -> SchemaBuilder<Q, EmptyMutation, EmptySubscription>
where
    Q: ObjectType + 'static,
{
    Schema::build(query, EmptyMutation, EmptySubscription)
        .data(source)
        .data(registry)
        .data(config)
        .limit_depth(MAX_QUERY_DEPTH)
        .limit_complexity(MAX_QUERY_COMPLEXITY)
}

/// Build the demo schema.
pub fn build_schema(
    source: Arc<dyn CollectionSource>,
    registry: Arc<TypeRegistry>,
    config: ConnectionConfig,
) -> Schema<DemoQuery, EmptyMutation, EmptySubscription> {
    schema_builder(DemoQuery, source, registry, config).finish()
}
