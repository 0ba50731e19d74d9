//! Port traits for connection field resolvers.
//!
//! A [`SourceResolver`] produces the data a connection field paginates.
//! Cross-cutting behaviour (logging, access checks, argument rewriting)
//! is added by wrapping resolvers with [`ResolverLayer`]s when the field
//! is built, instead of patching resolvers at runtime.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PaginationResult;
use crate::models::Record;
use crate::ports::{Collection, PageArgs};

/// Data a connection is paginated over.
#[derive(Debug, Clone)]
pub enum ConnectionSource {
    /// Lazy query handle, sliced by the configured strategy.
    Collection(Collection),
    /// Already materialized records, sliced by position.
    List(Vec<Record>),
}

impl From<Collection> for ConnectionSource {
    fn from(collection: Collection) -> Self {
        ConnectionSource::Collection(collection)
    }
}

impl From<Vec<Record>> for ConnectionSource {
    fn from(records: Vec<Record>) -> Self {
        ConnectionSource::List(records)
    }
}

/// Produces the source of a connection field.
///
/// Returning `Ok(None)` makes the field fall back to the default
/// collection of its record type.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, args: &PageArgs) -> PaginationResult<Option<ConnectionSource>>;
}

/// Resolver that always defers to the default collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

#[async_trait]
impl SourceResolver for DefaultResolver {
    async fn resolve(&self, _args: &PageArgs) -> PaginationResult<Option<ConnectionSource>> {
        Ok(None)
    }
}

/// Wraps a resolver with additional behaviour.
pub trait ResolverLayer: Send + Sync {
    fn wrap(&self, inner: Arc<dyn SourceResolver>) -> Arc<dyn SourceResolver>;
}
