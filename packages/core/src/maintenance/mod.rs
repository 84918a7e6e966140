//! Maintenance paths
//!
//! Out-of-band tooling over one whole tree: the [`TreeValidator`] reports
//! broken invariants and the [`TreeRebuilder`] recomputes every coordinate
//! from parent pointers. Neither runs on the request path.

mod rebuilder;
mod structure;
mod validator;

pub use rebuilder::{Coordinates, TreeRebuilder};
pub use structure::{ParentLink, StoredRow};
pub use validator::{TreeValidator, ValidationReport, Violation};
