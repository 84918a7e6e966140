//! Row conversion and shared query helpers
//!
//! Every read path selects `NODE_COLUMNS` and converts rows through
//! `row_to_node`, so the column order below is the single source of truth.

use crate::db::DatabaseError;
use crate::models::TreeNode;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::params::IntoParams;
use libsql::{Connection, Row};

/// Column list matching `row_to_node`
pub(crate) const NODE_COLUMNS: &str =
    "id, parent_id, lft, rgt, depth, ordering, deleted_at, label, properties, created_at, modified_at";

/// Which rows a read may see
///
/// Soft-deleted rows keep their interval, so structural computations (gap
/// positions, sibling ordering, validation counts) use `All`, while every
/// caller-facing read uses `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Active,
    All,
}

impl Visibility {
    /// SQL predicate for this visibility, qualified by `alias` when given
    ///
    /// Always a complete boolean expression, so it composes with `AND`.
    pub fn predicate(self, alias: Option<&str>) -> String {
        match (self, alias) {
            (Self::Active, Some(alias)) => format!("{alias}.deleted_at IS NULL"),
            (Self::Active, None) => "deleted_at IS NULL".to_string(),
            (Self::All, _) => "1 = 1".to_string(),
        }
    }
}

/// Parse a stored timestamp - handles both SQLite and RFC3339 formats
///
/// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
/// The engine writes RFC3339: "YYYY-MM-DDTHH:MM:SS.ffffffZ"
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    Err(DatabaseError::malformed_row(format!(
        "Unable to parse timestamp '{}' as RFC3339 or SQLite format",
        s
    )))
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

fn missing(name: &str, e: libsql::Error) -> DatabaseError {
    DatabaseError::malformed_row(format!("Failed to get {}: {}", name, e))
}

pub(crate) fn get_string(row: &Row, idx: i32, name: &str) -> Result<String, DatabaseError> {
    row.get::<String>(idx).map_err(|e| missing(name, e))
}

pub(crate) fn get_optional_string(row: &Row, idx: i32, name: &str) -> Result<Option<String>, DatabaseError> {
    row.get::<Option<String>>(idx).map_err(|e| missing(name, e))
}

pub(crate) fn get_integer(row: &Row, idx: i32, name: &str) -> Result<i64, DatabaseError> {
    row.get::<i64>(idx).map_err(|e| missing(name, e))
}

fn coordinate(row: &Row, idx: i32, name: &str) -> Result<u32, DatabaseError> {
    let raw = get_integer(row, idx, name)?;
    u32::try_from(raw)
        .map_err(|_| DatabaseError::malformed_row(format!("{} out of range: {}", name, raw)))
}

/// Convert a row selected with `NODE_COLUMNS` into a `TreeNode`
pub(crate) fn row_to_node(row: &Row) -> Result<TreeNode, DatabaseError> {
    let id = get_string(row, 0, "id")?;
    let parent_id = get_optional_string(row, 1, "parent_id")?;
    let left = coordinate(row, 2, "lft")?;
    let right = coordinate(row, 3, "rgt")?;
    let depth = coordinate(row, 4, "depth")?;
    let ordering = get_integer(row, 5, "ordering")?;
    let deleted_at = get_optional_string(row, 6, "deleted_at")?;
    let label = get_string(row, 7, "label")?;
    let properties_json = get_string(row, 8, "properties")?;
    let created_at = get_string(row, 9, "created_at")?;
    let modified_at = get_string(row, 10, "modified_at")?;

    let properties = serde_json::from_str(&properties_json).map_err(|e| {
        DatabaseError::malformed_row(format!("Failed to parse properties of {}: {}", id, e))
    })?;

    Ok(TreeNode {
        parent_id,
        left,
        right,
        depth,
        ordering,
        deleted_at: deleted_at.as_deref().map(parse_timestamp).transpose()?,
        label,
        properties,
        created_at: parse_timestamp(&created_at)?,
        modified_at: parse_timestamp(&modified_at)?,
        id,
    })
}

/// Run a query and convert every row into a node
pub(crate) async fn query_nodes(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Vec<TreeNode>, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to query nodes: {}", e)))?;

    let mut nodes = Vec::new();
    while let Some(row) = rows.next().await? {
        nodes.push(row_to_node(&row)?);
    }
    Ok(nodes)
}

/// Run a query expected to match at most one node
pub(crate) async fn query_node(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Option<TreeNode>, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to query node: {}", e)))?;

    match rows.next().await? {
        Some(row) => Ok(Some(row_to_node(&row)?)),
        None => Ok(None),
    }
}

/// Run a query returning a single integer (COUNT, MAX, COALESCE...)
pub(crate) async fn query_scalar(
    conn: &Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query(sql, params)
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to query scalar: {}", e)))?;

    match rows.next().await? {
        Some(row) => get_integer(&row, 0, "scalar"),
        None => Err(DatabaseError::sql_execution(format!(
            "Scalar query returned no rows: {}",
            sql
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2025-01-03T10:20:30+00:00").unwrap();
        let sqlite = parse_timestamp("2025-01-03 10:20:30").unwrap();
        assert_eq!(rfc, sqlite);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_visibility_predicate() {
        assert_eq!(Visibility::Active.predicate(None), "deleted_at IS NULL");
        assert_eq!(Visibility::Active.predicate(Some("d")), "d.deleted_at IS NULL");
        assert_eq!(Visibility::All.predicate(Some("d")), "1 = 1");
    }
}
