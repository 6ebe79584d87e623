//! Compile-and-run pipeline.
//!
//! - [`extract`]: extraction tables over the field model
//! - [`pivot`]: grouped/aggregated rewrites of compiled extraction tables
//! - [`parse`]: re-hydration of raw rows into output records

pub mod extract;
pub mod parse;
pub mod pivot;

pub use extract::{CompiledField, CompiledTable, ExtractionEngine};
pub use parse::{parse_rows, OutputColumn};
pub use pivot::{CompiledPivot, PivotEngine, PivotField};
