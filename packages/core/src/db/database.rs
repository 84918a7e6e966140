//! Database Connection Management
//!
//! This module provides connection and schema management for the hierarchy
//! engine using libsql (embedded SQLite).
//!
//! # Architecture
//!
//! - **One file per tree**: every `TreeKind` has its own database file and
//!   table. SQLite's write lock is per file, so a write transaction on the menu
//!   tree never waits on the taxonomy tree.
//! - **WAL mode**: readers see a consistent snapshot and never block writers.
//! - **Idempotent schema**: `CREATE TABLE IF NOT EXISTS` on every open.
//!
//! # Database Connection Patterns
//!
//! Always use `connect_with_timeout()` in async code. The busy timeout makes
//! a competing connection wait instead of failing immediately with
//! `SQLITE_BUSY`.
//!
//! ```no_run
//! # use hierarchy_core::config::EngineConfig;
//! # use hierarchy_core::db::DatabaseService;
//! # use hierarchy_core::models::TreeKind;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = DatabaseService::new(&EngineConfig::new("./data")).await?;
//! let conn = db.connect_with_timeout(TreeKind::Menu).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::EngineConfig;
use crate::db::error::DatabaseError;
use crate::models::TreeKind;
use libsql::{Builder, Connection, Database};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Database service owning one libsql database per tree kind
#[derive(Clone)]
pub struct DatabaseService {
    databases: Arc<HashMap<TreeKind, Database>>,

    /// Directory holding the database files
    pub data_dir: PathBuf,

    busy_timeout_ms: u64,
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService")
            .field("data_dir", &self.data_dir)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

impl DatabaseService {
    /// Open (or create) the database files for every tree kind
    ///
    /// This will:
    /// 1. Ensure the data directory exists (create if needed)
    /// 2. Open/create one database file per `TreeKind`
    /// 3. Initialize each tree's table and indexes
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created, a database
    /// cannot be opened, or schema initialization fails.
    pub async fn new(config: &EngineConfig) -> Result<Self, DatabaseError> {
        ensure_dir(&config.data_dir)?;

        let mut databases = HashMap::new();
        for kind in TreeKind::ALL {
            let path = config.data_dir.join(kind.file_name());
            let db = Builder::new_local(&path)
                .build()
                .await
                .map_err(|e| DatabaseError::connection_failed(path.clone(), e))?;
            databases.insert(kind, db);
        }

        let service = Self {
            databases: Arc::new(databases),
            data_dir: config.data_dir.clone(),
            busy_timeout_ms: config.busy_timeout_ms,
        };

        for kind in TreeKind::ALL {
            service.initialize_schema(kind).await?;
        }

        tracing::debug!("Opened hierarchy databases in {:?}", service.data_dir);
        Ok(service)
    }

    /// Get a raw connection to one tree's database
    ///
    /// Prefer `connect_with_timeout()`; this connection fails immediately on
    /// lock contention.
    pub fn connect(&self, kind: TreeKind) -> Result<Connection, DatabaseError> {
        let db = self.databases.get(&kind).ok_or_else(|| {
            DatabaseError::initialization_failed(format!("No database opened for {}", kind))
        })?;
        db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get a connection with the configured busy timeout applied
    pub async fn connect_with_timeout(&self, kind: TreeKind) -> Result<Connection, DatabaseError> {
        let conn = self.connect(kind)?;
        execute_pragma(
            &conn,
            &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms),
        )
        .await?;
        Ok(conn)
    }

    pub fn busy_timeout_ms(&self) -> u64 {
        self.busy_timeout_ms
    }

    /// Create the tree table and its indexes
    ///
    /// `lft`/`rgt` hold the nested-set interval (`left`/`right` are SQL
    /// keywords). Soft-deleted rows keep their interval until purged.
    async fn initialize_schema(&self, kind: TreeKind) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout(kind).await?;

        execute_pragma(&conn, "PRAGMA journal_mode = WAL").await?;

        let table = kind.table();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    parent_id TEXT,
                    lft INTEGER NOT NULL,
                    rgt INTEGER NOT NULL,
                    depth INTEGER NOT NULL DEFAULT 0,
                    ordering INTEGER NOT NULL DEFAULT 0,
                    deleted_at TEXT,
                    label TEXT NOT NULL,
                    properties TEXT NOT NULL DEFAULT '{{}}',
                    created_at TEXT NOT NULL,
                    modified_at TEXT NOT NULL
                )"
            ),
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create {}: {}", table, e))
        })?;

        for (suffix, columns) in [
            ("interval", "lft, rgt"),
            ("parent", "parent_id, ordering"),
            ("deleted", "deleted_at"),
        ] {
            conn.execute(
                &format!("CREATE INDEX IF NOT EXISTS idx_{table}_{suffix} ON {table}({columns})"),
                (),
            )
            .await
            .map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index idx_{}_{}: {}",
                    table, suffix, e
                ))
            })?;
        }

        Ok(())
    }
}

/// Execute a PRAGMA statement
///
/// PRAGMA statements return rows, so they must go through `query()` rather
/// than `execute()`.
pub(crate) async fn execute_pragma(conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
    let mut stmt = conn.prepare(pragma).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
    })?;
    let _ = stmt.query(()).await.map_err(|e| {
        DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
    })?;
    Ok(())
}

fn ensure_dir(dir: &Path) -> Result<(), DatabaseError> {
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            DatabaseError::permission_denied(dir.to_path_buf())
        } else {
            DatabaseError::DirectoryCreationFailed(e)
        }
    })
}

//
// TRANSACTIONS
//

/// Begin a write transaction, taking SQLite's write lock immediately
pub(crate) async fn begin_write(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute("BEGIN IMMEDIATE", ())
        .await
        .map_err(|source| DatabaseError::BeginFailed { source })?;
    Ok(())
}

/// Begin a deferred read transaction so several statements share one snapshot
pub(crate) async fn begin_read(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute("BEGIN", ())
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to begin snapshot: {}", e)))?;
    Ok(())
}

/// Commit on success, roll back on failure, and hand the outcome back
///
/// A failed commit is itself rolled back and reported.
pub(crate) async fn finish<T, E>(conn: &Connection, result: Result<T, E>) -> Result<T, E>
where
    E: From<DatabaseError>,
{
    match result {
        Ok(value) => {
            if let Err(e) = conn.execute("COMMIT", ()).await {
                let _rollback = conn.execute("ROLLBACK", ()).await;
                return Err(DatabaseError::sql_execution(format!(
                    "Failed to commit transaction: {}",
                    e
                ))
                .into());
            }
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                tracing::warn!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_new_creates_one_file_per_tree() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("nested").join("data");

        let db = DatabaseService::new(&EngineConfig::new(&data_dir))
            .await
            .unwrap();

        for kind in TreeKind::ALL {
            assert!(data_dir.join(kind.file_name()).exists());
            let conn = db.connect_with_timeout(kind).await.unwrap();
            let mut rows = conn
                .query(&format!("SELECT COUNT(*) FROM {}", kind.table()), ())
                .await
                .unwrap();
            let row = rows.next().await.unwrap().unwrap();
            assert_eq!(row.get::<i64>(0).unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_schema_initialization_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let config = EngineConfig::new(temp_dir.path());

        DatabaseService::new(&config).await.unwrap();
        DatabaseService::new(&config).await.unwrap();
    }

    #[tokio::test]
    async fn test_finish_rolls_back_on_error() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::new(&EngineConfig::new(temp_dir.path()))
            .await
            .unwrap();
        let conn = db.connect_with_timeout(TreeKind::Menu).await.unwrap();

        begin_write(&conn).await.unwrap();
        conn.execute(
            "INSERT INTO menus (id, lft, rgt, label, created_at, modified_at)
             VALUES ('x', 1, 2, 'X', 'now', 'now')",
            (),
        )
        .await
        .unwrap();
        let outcome: Result<(), DatabaseError> =
            finish(&conn, Err(DatabaseError::sql_execution("forced"))).await;
        assert!(outcome.is_err());

        let mut rows = conn.query("SELECT COUNT(*) FROM menus", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_competing_writer_is_reported_busy() {
        let temp_dir = TempDir::new().unwrap();
        let db = DatabaseService::new(&EngineConfig::new(temp_dir.path()))
            .await
            .unwrap();
        let holder = db.connect_with_timeout(TreeKind::Taxonomy).await.unwrap();
        let waiter = db.connect(TreeKind::Taxonomy).unwrap();
        execute_pragma(&waiter, "PRAGMA busy_timeout = 0").await.unwrap();

        begin_write(&holder).await.unwrap();
        let err = begin_write(&waiter).await.unwrap_err();
        assert!(err.is_busy(), "expected busy, got {err}");

        finish::<(), DatabaseError>(&holder, Ok(())).await.unwrap();
        begin_write(&waiter).await.unwrap();
        finish::<(), DatabaseError>(&waiter, Ok(())).await.unwrap();
    }
}
