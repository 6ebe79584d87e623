//! Collaborator seams.
//!
//! Applications implement these to plug in access control and statement
//! execution.

pub mod executor;
pub mod visibility;

pub use executor::Executor;
pub use visibility::{visible_relation, Unrestricted, VisibilitySource};
