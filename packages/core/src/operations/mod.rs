//! Tree Mutator
//!
//! Coordinate-changing operations and the machinery they share:
//!
//! - [`TreeMutator`] - insert, move, delete, swap and batch operations
//! - [`TreeLocks`] - one write lock per tree kind, acquired with a timeout
//! - [`OrderingCalculator`] - integer sibling ordering arithmetic
//!
//! The gap primitives (`shift`) and placement resolution (`placement`) are
//! internal; they are only correct inside a locked write transaction.

mod lock;
mod mutator;
mod ordering;
pub(crate) mod placement;
pub(crate) mod shift;

pub use lock::{TreeLockGuard, TreeLocks};
pub use mutator::TreeMutator;
pub use ordering::OrderingCalculator;
