//! Data types shared across the analytics pipeline.

pub mod config;
pub mod schema;
pub mod value;
