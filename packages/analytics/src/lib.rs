//! Analytics Table Compiler
//!
//! Compiles declarative reporting tables into a single access-controlled SQL
//! statement and flattens the results into records.
//!
//! An operator picks a root entity family (`cases`, `work_items`,
//! `documents`) and addresses output columns by dotted paths into the live
//! schema: `created_at.quarter`, `meta.region`,
//! `workitem[review,last].document[review-form].score`. Paths sharing a
//! prefix share the joins they need.
//!
//! # Usage
//!
//! ```rust,ignore
//! use analytics::{ExtractionEngine, FieldSpec, Function, PivotEngine, PivotSpec, TableSpec};
//! use analytics::postgres::{load_schema, PgExecutor};
//!
//! let executor = PgExecutor::connect(&database_url).await?;
//! let schema = load_schema(executor.pool(), &config).await?;
//! let engine = ExtractionEngine::new(schema, visibility);
//!
//! let table = TableSpec::new("amounts", "cases")
//!     .with_field(FieldSpec::new("document[main].region", "region"))
//!     .with_field(FieldSpec::new("document[main].amount", "amount"));
//! let rows = engine.execute(&table, &executor).await?;
//!
//! // Sum per region over the same rows
//! let pivot = PivotSpec::new("by-region")
//!     .with_field(FieldSpec::new("region", "region").with_function(Function::Group))
//!     .with_field(FieldSpec::new("amount", "total").with_function(Function::Sum));
//! let totals = PivotEngine::new()
//!     .compile(&engine.compile(&table)?, &pivot)?
//!     .execute(&executor)
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`fields`] - Path resolution into typed field nodes
//! - [`ir`] - Query IR, planner and SQL renderer
//! - [`pipeline`] - Extraction and pivot engines
//! - [`traits`] - Visibility and executor seams
//! - [`types`] - Configuration, schema and value types
//! - [`postgres`] - sqlx executor and schema loader (feature `postgres`)
//! - [`testing`] - Mock executor and fixtures

pub mod error;
pub mod fields;
pub mod ir;
pub mod pipeline;
pub mod testing;
pub mod traits;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export core types at crate root
pub use error::{AnalyticsError, Result};
pub use fields::{FieldId, FieldKind, FieldModel, FieldNode};
pub use ir::{Query, SqlRenderer, SqlStatement};
pub use pipeline::{CompiledPivot, CompiledTable, ExtractionEngine, PivotEngine};
pub use traits::{Executor, Unrestricted, VisibilitySource};
pub use types::{
    config::{AnalyticsConfig, FieldSpec, Function, PivotSpec, StartingObject, TableSpec},
    schema::{Form, Question, QuestionType, Schema, Task},
    value::{Record, Value, ValueRule},
};

#[cfg(feature = "postgres")]
pub use postgres::{load_schema, PgExecutor};
