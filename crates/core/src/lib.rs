//! Core domain layer for Pagewise.
//!
//! This crate contains the pagination engine: cursor codec, ordering,
//! keyset predicates, slice resolution, relation planning and the port
//! traits (interfaces) storage backends implement. It follows hexagonal
//! architecture principles - this is the innermost layer with no
//! dependencies on infrastructure.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     pagewise (binary)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   pagewise-graphql (API)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     pagewise-storage                        │
//! │                 (in-memory, PostgreSQL)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     pagewise-core  ← YOU ARE HERE           │
//! │        (cursor, order, slice, planner, ports, services)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cursor`] - Key and indexed cursor encoding
//! - [`order`] - Ordering specifications with a key tie-breaker
//! - [`predicate`] - Keyset predicates (OR of ANDs)
//! - [`slice`] - Argument validation and slicing strategies
//! - [`planner`] - Selection-set relation planning
//! - [`registry`] - Record type registry
//! - [`ports`] - Interface traits for adapters to implement
//! - [`services`] - Connection fields and resolver layers
//! - [`models`] - Records and field values
//! - [`error`] - Error types
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Key Concepts
//!
//! ## Ports
//!
//! - [`ports::CollectionSource`] - Count, test and fetch query windows
//! - [`ports::RelationSchema`] - Relation cardinality lookup
//! - [`ports::SourceResolver`] - Produce the data behind a field
//!
//! ## Resolution Lifecycle
//!
//! 1. Validate `first`/`last` against the field configuration
//! 2. Resolve the source (layered resolver, default collection fallback)
//! 3. Parse the ordering, appending the key tie-breaker
//! 4. Apply cursor bounds (keyset predicates or relocated offsets)
//! 5. Apply `first`/`last` and build the page

pub mod cursor;
pub mod error;
pub mod metrics;
pub mod models;
pub mod order;
pub mod planner;
pub mod ports;
pub mod predicate;
pub mod registry;
pub mod services;
pub mod slice;

pub use cursor::CursorCodec;
pub use order::OrderSpec;
pub use planner::plan_relations;
pub use registry::TypeRegistry;
pub use services::ConnectionField;
pub use slice::{ConnectionConfig, resolve_connection};
