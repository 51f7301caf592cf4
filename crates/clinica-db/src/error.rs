//! # Database Error Types
//!
//! Error types for storage operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization; also          │
//! │       │                  carries the storage-level domain conflicts     │
//! │       │                  (slot unavailable, already closed, ...)        │
//! │       ▼                                                                 │
//! │  ActionError (clinica-actions) ← code + Spanish message for frontend    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use clinica_core::{CoreError, ValidationError};
use thiserror::Error;

/// Storage operation errors.
///
/// Wraps sqlx errors and carries the domain conflicts that can only be
/// detected at the storage boundary (overlaps, stale statuses, closed
/// dates, stock guards).
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in the database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The requested time slot overlaps an agenda-blocking appointment
    /// of the same doctor.
    ///
    /// ## When This Occurs
    /// Detected inside the booking/reschedule transaction, after the
    /// write lock is held - the storage-level equivalent of an
    /// exclusion constraint. Never retried automatically: picking a new
    /// time is a human decision.
    #[error("slot unavailable for field {field}")]
    SlotUnavailable { field: &'static str },

    /// A compare-and-swap status write affected zero rows: the status
    /// changed between read and write.
    ///
    /// ## When This Occurs
    /// Two concurrent status updates for the same entity. The caller
    /// must re-fetch and retry deliberately.
    #[error("{entity} {id}: status changed concurrently")]
    StatusConflict { entity: &'static str, id: String },

    /// The entity is not in the state the operation requires.
    #[error("{entity} {id} is {status}, cannot perform operation")]
    InvalidState {
        entity: &'static str,
        id: String,
        status: &'static str,
    },

    /// A closing already exists for this date.
    #[error("date {date} already closed by closing {closing_id}")]
    AlreadyClosed { closing_id: String, date: String },

    /// A guarded stock decrement would drive stock negative.
    #[error("insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// The acting user lacks the role the procedure requires. Checked
    /// against the users table inside the transaction, never trusted
    /// from the caller.
    #[error("user {user_id} is not authorized to {action}")]
    Unauthorized { user_id: String, action: &'static str },

    /// A business rule violation raised by clinica-core from inside a
    /// procedure (transition tables, justification policies, closing
    /// gate).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Unique constraint violation.
    #[error("duplicate {field}: already exists")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    #[error("foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Write lock contention (SQLITE_BUSY). The numbering procedures
    /// retry once on this before surfacing it.
    #[error("database is busy")]
    Busy,

    /// Database connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint / busy
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "registro",
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite error text for constraints and contention:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                // Busy: "database is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation { field }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked")
                    || msg.contains("database table is locked")
                {
                    DbError::Busy
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
