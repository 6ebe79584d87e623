//! Query IR - the layer between resolved fields and SQL text.
//!
//! - [`query`]: nested query tree
//! - [`field`]: one field's compiled contribution
//! - [`planner`]: the annotate pass with its join cache
//! - [`render`]: tree → parameterized SQL

pub mod field;
pub mod params;
pub mod planner;
pub mod query;
pub mod render;

pub use field::{IrField, IrKind, JoinSpec};
pub use params::{content_hash, param_name, shape_alias};
pub use planner::{QueryId, QueryPlanner};
pub use query::{DatePart, Expr, Join, OrderBy, Predicate, Projection, Query, QuerySource, SqlType, JOIN_KEY};
pub use render::{OutputFilter, SqlRenderer, SqlStatement, OUTER_ALIAS};
