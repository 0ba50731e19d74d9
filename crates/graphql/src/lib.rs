//! GraphQL API for Pagewise connections.
//!
//! Exposes Relay connections resolved by `pagewise-core` over
//! async-graphql, and serves them with axum.
//!
//! # Building a Schema with Your Own Query Root
//!
//! Use [`define_connection!`] for the output types and `schema_builder`
//! to get the engine's context data (collection source, type registry,
//! connection config) and query limits:
//!
//! ```ignore
//! use pagewise_graphql::{define_connection, schema_builder};
//!
//! define_connection!(Pet, Record, PetEdge, PetConnection);
//!
//! let schema = schema_builder(PetQuery, source, registry, config)
//!     .finish();
//! ```

mod connection;
mod schema;
mod server;
mod types;

pub use connection::{
    PageInfo, graphql_error, page_args, relation_plan, selection_tree, validate_order_by,
};
pub use schema::{
    Article, DemoQuery, MAX_QUERY_COMPLEXITY, MAX_QUERY_DEPTH, Reporter, build_schema,
    demo_registry, schema_builder,
};
pub use server::{ServerConfig, router, serve, serve_with_shutdown};
pub use types::PagewiseSchema;
