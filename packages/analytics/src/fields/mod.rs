//! Field model - typed resolution of dotted paths into schema nodes.
//!
//! A path like `workitem[review,last].document[review-form].score` is
//! resolved segment by segment against the children each node offers for
//! the current schema snapshot. Each node knows how to compile itself into
//! an [`crate::ir::IrField`].

pub mod model;
pub mod node;
pub mod path;

pub use model::FieldModel;
pub use node::{AttributeType, FieldId, FieldKind, FieldNode, WorkItemPolicy};
pub use path::{parse_path, split_path, Segment};
