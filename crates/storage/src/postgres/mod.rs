//! PostgreSQL storage adapter.
//!
//! This module implements the `CollectionSource` port defined in
//! `pagewise-core` using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool management
//! - [`PgSource`] - Collection source over mapped tables
//! - [`sql`] - Pure query compilation (predicates, ordering, windows)
//!
//! # Usage
//!
//! ```ignore
//! let config = DatabaseConfig::for_graphql(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! let source = PgSource::from_registry(&db, &registry)?;
//! ```

mod collection;
mod database;
mod helpers;
pub mod sql;

pub use collection::PgSource;
pub use database::{Database, DatabaseConfig};
pub use sql::TableMapping;
