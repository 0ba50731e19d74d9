//! Error types for the pagination engine.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`PaginationError`] - Request-level pagination failures
//! - [`StorageError`] - Collection backend errors
//! - [`RegistryError`] - Record type registration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Pagination Errors
// =============================================================================

/// Failures surfaced to the caller of a connection resolution.
///
/// None of these are retried: they are deterministic functions of the
/// request arguments and the configured limits.
#[derive(Debug, Error)]
pub enum PaginationError {
    /// A maximum page size is configured but the request has no bound.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// `first` or `last` is larger than the configured maximum.
    #[error(
        "Requesting {requested} records on the `{field}` connection exceeds the limit of {max} records"
    )]
    LimitExceeded {
        /// Connection field name.
        field: String,
        /// Requested page size.
        requested: usize,
        /// Configured maximum page size.
        max: usize,
    },

    /// Neither `first` nor `last` was provided while one is required.
    #[error("You must provide a `first` or `last` value to properly paginate the `{field}` connection")]
    MissingPaginationBound {
        /// Connection field name.
        field: String,
    },

    /// `first` or `last` is negative.
    #[error("Argument `{argument}` on the `{field}` connection must be non-negative, got {value}")]
    NegativeBound {
        /// Connection field name.
        field: String,
        /// Offending argument (`first` or `last`).
        argument: &'static str,
        /// Value received.
        value: i64,
    },

    /// Cursor string is not well-formed.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Cursor anchor could not be located in the current snapshot.
    #[error("Stale cursor: {0}")]
    StaleCursor(String),

    /// Resolution did not finish within the request timeout.
    #[error("Connection resolution timed out after {0:?}")]
    Timeout(Duration),

    /// No collection or type is known under this name.
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    /// Backend operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PaginationError {
    /// Stable machine-readable code, used by API adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            Self::MissingPaginationBound { .. } => "MISSING_PAGINATION_BOUND",
            Self::NegativeBound { .. } => "NEGATIVE_BOUND",
            Self::InvalidCursor(_) => "INVALID_CURSOR",
            Self::StaleCursor(_) => "STALE_CURSOR",
            Self::Timeout(_) => "TIMEOUT",
            Self::UnknownRecordType(_) => "UNKNOWN_RECORD_TYPE",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Collection backend errors.
///
/// These errors originate from the adapters implementing
/// [`crate::ports::CollectionSource`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// Query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// A field or table name is not a safe SQL identifier.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The backend has no table for this record type.
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    /// Data serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Fixture file could not be loaded.
    #[error("Fixture error: {0}")]
    FixtureError(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Record type registration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A type with this name is already registered.
    #[error("Record type already registered: {0}")]
    DuplicateType(String),

    /// No type with this name is registered.
    #[error("Unknown record type: {0}")]
    UnknownType(String),

    /// Field kind tag is not one of the supported kinds.
    #[error("Unsupported field kind `{kind}` for field `{field}`")]
    UnsupportedFieldKind {
        /// Field name.
        field: String,
        /// Kind tag as provided.
        kind: String,
    },

    /// Relation points to a type that is not registered.
    #[error("Relation `{record_type}.{field}` targets unknown type `{target}`")]
    UnknownRelationTarget {
        /// Owning record type.
        record_type: String,
        /// Relation field name.
        field: String,
        /// Missing target type.
        target: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for pagination operations.
pub type PaginationResult<T> = Result<T, PaginationError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
