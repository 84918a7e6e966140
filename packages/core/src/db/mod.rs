//! Database Layer
//!
//! This module handles all database interactions using libsql:
//!
//! - One database file and table per tree kind, schema initialization
//! - Row conversion shared by every read and write path
//! - The Tree Repository: read contract (`TreeRepository`) and its libsql
//!   implementation (`TreeStore`)
//!
//! Soft-deleted rows are filtered through a single composable predicate
//! (`Visibility`) rather than ad hoc checks in each query.

pub(crate) mod database;
mod error;
pub(crate) mod rows;
mod tree_repository;
pub(crate) mod tree_store;

pub use database::DatabaseService;
pub use error::DatabaseError;
pub use rows::Visibility;
pub use tree_repository::TreeRepository;
pub use tree_store::TreeStore;
