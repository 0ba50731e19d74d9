//! Storage layer for Pagewise.
//!
//! This crate provides implementations of the `CollectionSource` port
//! defined in `pagewise-core`:
//!
//! - [`memory::MemorySource`] - Snapshot tables in memory, loaded from
//!   JSON fixtures
//! - [`postgres::PgSource`] - PostgreSQL tables through a `sqlx` pool
//!
//! # Usage
//!
//! ```ignore
//! use pagewise_storage::{Database, DatabaseConfig, PgSource};
//!
//! // Connect to the database
//! let config = DatabaseConfig::for_graphql(&database_url);
//! let db = Database::connect(&config).await?;
//!
//! // Map registered record types to tables
//! let source = Arc::new(PgSource::from_registry(&db, &registry)?);
//! ```

pub mod memory;
pub mod postgres;

pub use memory::{Fixture, MemorySource};
pub use postgres::{Database, DatabaseConfig, PgSource, TableMapping};
