//! Database Error Types
//!
//! This module defines error types for storage operations, providing
//! clear error handling for connection, initialization, and query failures.

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors
///
/// Covers connection, schema initialization and SQL execution. Engine-level
/// failures (not found, cyclic move, contention) are expressed by
/// `TreeError` in the operations layer.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish database connection
    #[error("Failed to connect to database at {path}: {source}")]
    ConnectionFailed {
        path: PathBuf,
        source: libsql::Error,
    },

    /// Failed to initialize database schema
    #[error("Failed to initialize database schema: {0}")]
    InitializationFailed(String),

    /// Permission denied when accessing database
    #[error("Permission denied for database path: {path}")]
    PermissionDenied { path: PathBuf },

    /// Failed to create the data directory
    #[error("Failed to create data directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    /// libsql operation error
    #[error("Database operation failed: {0}")]
    LibsqlError(#[from] libsql::Error),

    /// `BEGIN` was refused; the source keeps SQLite's result code
    #[error("Failed to begin transaction: {source}")]
    BeginFailed { source: libsql::Error },

    /// SQL execution error with context
    #[error("SQL execution failed: {context}")]
    SqlExecutionError { context: String },

    /// A stored row could not be converted into a node
    #[error("Malformed row: {0}")]
    MalformedRow(String),
}

impl DatabaseError {
    /// Create a connection failed error
    pub fn connection_failed(path: PathBuf, source: libsql::Error) -> Self {
        Self::ConnectionFailed { path, source }
    }

    /// Create an initialization failed error
    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a permission denied error
    pub fn permission_denied(path: PathBuf) -> Self {
        Self::PermissionDenied { path }
    }

    /// Create a SQL execution error with context
    pub fn sql_execution(context: impl Into<String>) -> Self {
        Self::SqlExecutionError {
            context: context.into(),
        }
    }

    /// Create a malformed row error
    pub fn malformed_row(msg: impl Into<String>) -> Self {
        Self::MalformedRow(msg.into())
    }

    /// Whether SQLite refused the statement because another writer holds the lock
    ///
    /// Decided by the SQLite result code (`SQLITE_BUSY`, `SQLITE_LOCKED` and
    /// their extended codes), never by message text.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::BeginFailed { source }
            | Self::LibsqlError(source)
            | Self::ConnectionFailed { source, .. } => is_busy_code(source),
            _ => false,
        }
    }
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

fn is_busy_code(err: &libsql::Error) -> bool {
    match err {
        // Extended codes keep the primary code in the low byte
        libsql::Error::SqliteFailure(code, _) => {
            matches!(*code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)
        }
        _ => false,
    }
}
