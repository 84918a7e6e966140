//! Hierarchy Core - nested-set tree engine
//!
//! Stores menu, taxonomy and organization hierarchies as nested sets: every
//! node carries a `left`/`right` interval that strictly contains the
//! intervals of its descendants, so subtree and ancestor reads are single
//! range queries.
//!
//! # Architecture
//!
//! - **libsql**: embedded SQLite, one database file (and table) per tree kind
//! - **Per-tree locking**: mutations on one tree serialize behind a lock with
//!   a timeout; different trees never wait on each other
//! - **Soft delete**: deleted rows keep their interval until purged
//!
//! # Modules
//!
//! - [`models`] - Node model, placements and rendered trees
//! - [`db`] - Storage and the Tree Repository (reads)
//! - [`operations`] - Tree Mutator (writes) and per-tree locks
//! - [`maintenance`] - Tree Validator and Tree Rebuilder
//! - [`services`] - `HierarchyService` facade
//! - [`config`] - Engine configuration

pub mod config;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{ErrorCategory, TreeError, TreeResult};
pub use models::*;
pub use services::{DeleteMode, HierarchyService};
