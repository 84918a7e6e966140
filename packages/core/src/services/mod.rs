//! Engine Services
//!
//! - `HierarchyService` - the facade consumed by CRUD/API, seed and admin
//!   collaborators

pub mod hierarchy_service;

pub use hierarchy_service::{DeleteMode, HierarchyService};
